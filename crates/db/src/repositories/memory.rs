use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use triage_core::domain::path::{PathRecord, PathSubmission, RecordId};
use triage_core::domain::tree::{DecisionTree, TreeId};
use triage_core::store::{StoreError, TreeStore};

use super::RepositoryError;

/// Process-local tree store. Paths are kept in append order.
#[derive(Default)]
pub struct InMemoryTreeStore {
    trees: RwLock<HashMap<String, DecisionTree>>,
    paths: RwLock<Vec<PathRecord>>,
}

impl InMemoryTreeStore {
    pub fn with_trees(trees: impl IntoIterator<Item = DecisionTree>) -> Self {
        let trees = trees.into_iter().map(|tree| (tree.id.0.clone(), tree)).collect();
        Self { trees: RwLock::new(trees), paths: RwLock::default() }
    }

    pub async fn save_tree(&self, tree: &DecisionTree) -> Result<(), RepositoryError> {
        let mut trees = self.trees.write().await;
        trees.insert(tree.id.0.clone(), tree.clone());
        Ok(())
    }

    pub async fn paths_for_tree(&self, id: &TreeId) -> Result<Vec<PathRecord>, RepositoryError> {
        let paths = self.paths.read().await;
        Ok(paths.iter().filter(|record| &record.tree_id == id).cloned().collect())
    }
}

#[async_trait]
impl TreeStore for InMemoryTreeStore {
    async fn fetch_tree(&self, id: &TreeId) -> Result<DecisionTree, StoreError> {
        let trees = self.trees.read().await;
        trees.get(&id.0).cloned().ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn append_path(&self, submission: PathSubmission) -> Result<RecordId, StoreError> {
        if !self.trees.read().await.contains_key(&submission.tree_id.0) {
            return Err(StoreError::Submit(format!(
                "decision tree `{}` is not stored",
                submission.tree_id
            )));
        }

        let record_id = RecordId(Uuid::new_v4().to_string());
        let mut paths = self.paths.write().await;
        paths.push(PathRecord {
            id: record_id.clone(),
            owner_id: submission.owner_id,
            tree_id: submission.tree_id,
            path: submission.path,
            created_at: submission.submitted_at,
        });
        Ok(record_id)
    }
}
