use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tree::{NodeId, TreeId};

/// Caller identity attached to a submitted path. Passed through opaquely.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub String);

/// Identifier the store assigns to an appended path record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

/// One answered question: the node that was current and the label picked there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    #[serde(rename = "nodeId")]
    pub node_id: NodeId,
    #[serde(rename = "answer")]
    pub chosen_label: String,
}

impl PathEntry {
    pub fn new(node_id: NodeId, chosen_label: impl Into<String>) -> Self {
        Self { node_id, chosen_label: chosen_label.into() }
    }
}

/// A full path handed to the store's append operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSubmission {
    pub owner_id: OwnerId,
    pub tree_id: TreeId,
    pub path: Vec<PathEntry>,
    pub submitted_at: DateTime<Utc>,
}

/// A submission as read back from a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRecord {
    pub id: RecordId,
    pub owner_id: OwnerId,
    pub tree_id: TreeId,
    pub path: Vec<PathEntry>,
    pub created_at: DateTime<Utc>,
}
