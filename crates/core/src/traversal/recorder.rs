use chrono::Utc;
use tracing::{info, warn};

use crate::domain::path::{OwnerId, PathEntry, PathSubmission, RecordId};
use crate::domain::tree::{NodeId, TreeId};
use crate::store::{StoreError, TreeStore};

/// Append-only record of the questions answered in one session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathRecorder {
    entries: Vec<PathEntry>,
}

impl PathRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, node_id: NodeId, chosen_label: impl Into<String>) {
        self.entries.push(PathEntry::new(node_id, chosen_label));
    }

    pub fn entries(&self) -> &[PathEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Snapshot of the path stamped with the current time.
    pub fn submission(&self, owner_id: &OwnerId, tree_id: &TreeId) -> PathSubmission {
        PathSubmission {
            owner_id: owner_id.clone(),
            tree_id: tree_id.clone(),
            path: self.entries.clone(),
            submitted_at: Utc::now(),
        }
    }

    /// Best-effort hand-off to the store. The recorder is never modified,
    /// whatever the outcome.
    pub async fn submit<S>(
        &self,
        store: &S,
        owner_id: &OwnerId,
        tree_id: &TreeId,
    ) -> Result<RecordId, StoreError>
    where
        S: TreeStore + ?Sized,
    {
        let result = store.append_path(self.submission(owner_id, tree_id)).await;
        match &result {
            Ok(record_id) => info!(
                event_name = "path.submitted",
                tree_id = %tree_id,
                record_id = %record_id.0,
                entries = self.entries.len(),
                "decision path submitted"
            ),
            Err(error) => warn!(
                event_name = "path.submit_failed",
                tree_id = %tree_id,
                entries = self.entries.len(),
                error = %error,
                "decision path could not be submitted"
            ),
        }
        result
    }
}
