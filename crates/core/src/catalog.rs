//! Decision trees shipped with the binary.

use crate::domain::tree::{DecisionTree, TreeId};

pub const ESCALATION_TREE_ID: &str = "escalation_decision_tree_v1";

const ESCALATION_TREE_JSON: &str = include_str!("../../../trees/escalation_v1.json");

/// The issue escalation questionnaire: should this go to management, or can it
/// be handled at the current level?
pub fn escalation_tree() -> Result<DecisionTree, serde_json::Error> {
    DecisionTree::from_json(ESCALATION_TREE_JSON)
}

pub fn builtin(id: &TreeId) -> Option<Result<DecisionTree, serde_json::Error>> {
    (id.0 == ESCALATION_TREE_ID).then(escalation_tree)
}
