use thiserror::Error;

use triage_core::store::StoreError;

pub mod memory;
pub mod tree;

pub use memory::InMemoryTreeStore;
pub use tree::SqlTreeStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => Self::Backend(error.to_string()),
            RepositoryError::Decode(message) => Self::Decode(message),
        }
    }
}
