pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_from_config, connect_with_settings, DbPool};
pub use fixtures::{SeedResult, TreeSeedDataset, VerificationResult};
pub use repositories::{InMemoryTreeStore, RepositoryError, SqlTreeStore};
