use async_trait::async_trait;
use thiserror::Error;

use crate::domain::path::{PathSubmission, RecordId};
use crate::domain::tree::{DecisionTree, TreeId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("decision tree `{0}` was not found")]
    NotFound(TreeId),
    #[error("path submission failed: {0}")]
    Submit(String),
    #[error("store backend failure: {0}")]
    Backend(String),
    #[error("stored data could not be decoded: {0}")]
    Decode(String),
}

/// Persistence for decision trees and submitted paths.
///
/// Each call is a single round trip with no retry and no transaction spanning
/// calls. Trees returned by `fetch_tree` have not been validated.
#[async_trait]
pub trait TreeStore: Send + Sync {
    async fn fetch_tree(&self, id: &TreeId) -> Result<DecisionTree, StoreError>;
    async fn append_path(&self, submission: PathSubmission) -> Result<RecordId, StoreError>;
}
