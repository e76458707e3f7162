use tracing::info;
use triage_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use triage_core::domain::tree::{DecisionTree, TreeId};

use crate::commands::{build_runtime, load_tree, CommandResult, TreeSource};

pub fn run(source: TreeSource, tree_id: Option<String>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions {
        overrides: ConfigOverrides { default_tree_id: tree_id, ..ConfigOverrides::default() },
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "validate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("validate", error_class, message, exit_code);
        }
    };

    let tree_id = TreeId(config.session.default_tree_id.clone());
    let tree = match load_tree(&source, &tree_id, &config, &runtime) {
        Ok(tree) => tree,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("validate", error_class, message, exit_code);
        }
    };

    match check(&tree) {
        Ok(message) => CommandResult::success("validate", message),
        Err(message) => CommandResult::failure("validate", "tree_invalid", message, 6),
    }
}

fn check(tree: &DecisionTree) -> Result<String, String> {
    tree.validate().map_err(|error| format!("decision tree `{}` is malformed: {error}", tree.id))?;

    let questions = tree.nodes.values().filter(|node| !node.is_terminal()).count();
    let results = tree.nodes.len() - questions;
    info!(
        event_name = "tree.validated",
        tree_id = %tree.id,
        questions,
        results,
        "decision tree is structurally valid"
    );

    Ok(format!(
        "decision tree `{}` v{} is valid: {questions} questions, {results} results, at most {} questions per walk",
        tree.id,
        tree.version,
        tree.depth()
    ))
}

#[cfg(test)]
mod tests {
    use triage_core::catalog::escalation_tree;
    use triage_core::domain::tree::{Node, NodeId};

    use super::check;

    #[test]
    fn builtin_tree_passes_with_summary() {
        let tree = escalation_tree().expect("embedded tree");

        let message = check(&tree).expect("valid tree");

        assert_eq!(
            message,
            "decision tree `escalation_decision_tree_v1` v1.0 is valid: 9 questions, 2 results, at most 3 questions per walk"
        );
    }

    #[test]
    fn dangling_target_is_reported_with_node_and_label() {
        let mut tree = escalation_tree().expect("embedded tree");
        if let Some(Node::Question(question)) = tree.nodes.get_mut(&NodeId::from("q3_low")) {
            question.options[0].target = NodeId::from("r9_missing");
        }

        let message = check(&tree).expect_err("dangling reference");

        assert!(message.contains("q3_low"));
        assert!(message.contains("r9_missing"));
    }
}
