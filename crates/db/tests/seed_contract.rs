use serde_json::Value;
use std::collections::HashSet;

use triage_db::{connect_with_settings, migrations, SqlTreeStore, TreeSeedDataset};

type SeedContractTestResult<T = ()> = Result<T, String>;

const SEEDED_TREE: &str = include_str!("../../../trees/escalation_v1.json");

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
    ($left:expr, $right:expr, $($arg:tt)*) => {
        if $left != $right {
            return Err(format!($($arg)*));
        }
    };
}

fn require_field<'a>(value: &'a Value, field_name: &str) -> SeedContractTestResult<&'a Value> {
    value.get(field_name).ok_or_else(|| format!("{field_name} should be present"))
}

fn require_str<'a>(value: &'a Value, field_name: &str) -> SeedContractTestResult<&'a str> {
    require_field(value, field_name)?
        .as_str()
        .ok_or_else(|| format!("{field_name} should be a string"))
}

fn require_array<'a>(value: &'a Value, field_name: &str) -> SeedContractTestResult<&'a [Value]> {
    require_field(value, field_name)?
        .as_array()
        .map(|values| values.as_slice())
        .ok_or_else(|| format!("{field_name} should be an array"))
}

fn seeded_document() -> SeedContractTestResult<Value> {
    serde_json::from_str(SEEDED_TREE).map_err(|error| format!("tree file is not JSON: {error}"))
}

#[test]
fn seeded_tree_uses_the_stored_document_shape() -> SeedContractTestResult {
    let document = seeded_document()?;

    require_eq!(require_str(&document, "tree_id")?, "escalation_decision_tree_v1");
    require_str(&document, "name")?;
    require_str(&document, "version")?;
    let root = require_str(&document, "root_node_id")?;

    let nodes = require_field(&document, "nodes")?
        .as_object()
        .ok_or_else(|| "nodes should be an object keyed by node id".to_string())?;
    require!(nodes.contains_key(root), "root `{root}` should be one of the nodes");

    for (key, node) in nodes {
        require_eq!(require_str(node, "id")?, key.as_str(), "node `{key}` should repeat its key");
        require_str(node, "text")?;

        match require_str(node, "type")? {
            "question" => {
                let options = require_array(node, "options")?;
                require!(!options.is_empty(), "question `{key}` should offer options");
                for option in options {
                    require_str(option, "text")?;
                    let target = require_str(option, "next_node_id")?;
                    require!(nodes.contains_key(target), "`{key}` points at missing `{target}`");
                }
            }
            "result" => {
                let verdict = require_str(node, "result")?;
                require!(
                    verdict == "escalate" || verdict == "handle",
                    "result `{key}` has unknown verdict `{verdict}`"
                );
                require_str(node, "title")?;
                require_str(node, "description")?;
                require!(
                    !require_array(node, "next_steps")?.is_empty(),
                    "result `{key}` should list next steps"
                );
            }
            other => return Err(format!("node `{key}` has unknown type `{other}`")),
        }
    }

    Ok(())
}

#[test]
fn every_node_is_reachable_from_the_root() -> SeedContractTestResult {
    let document = seeded_document()?;
    let nodes = require_field(&document, "nodes")?;
    let mut seen = HashSet::new();
    let mut pending = vec![require_str(&document, "root_node_id")?.to_string()];

    while let Some(id) = pending.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let node = require_field(nodes, &id)?;
        if let Some(options) = node.get("options").and_then(Value::as_array) {
            for option in options {
                pending.push(require_str(option, "next_node_id")?.to_string());
            }
        }
    }

    let total = nodes.as_object().map(|nodes| nodes.len()).unwrap_or_default();
    require_eq!(seen.len(), total, "unreachable nodes in the seeded tree");
    Ok(())
}

#[tokio::test]
async fn seeded_row_keeps_the_document_verbatim_in_tree_data() -> SeedContractTestResult {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("connect: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrate: {error}"))?;
    TreeSeedDataset::load(&pool).await.map_err(|error| format!("seed: {error}"))?;

    let (name, version, tree_data): (String, String, String) = sqlx::query_as(
        "SELECT name, version, tree_data FROM decision_trees WHERE id = 'escalation_decision_tree_v1'",
    )
    .fetch_one(&pool)
    .await
    .map_err(|error| format!("load seeded row: {error}"))?;

    let stored: Value =
        serde_json::from_str(&tree_data).map_err(|error| format!("tree_data: {error}"))?;
    require_eq!(stored, seeded_document()?);
    require_eq!(name, "Issue Escalation Decision Tree");
    require_eq!(version, "1.0");

    let paths = SqlTreeStore::new(pool)
        .paths_for_tree(&"escalation_decision_tree_v1".into())
        .await
        .map_err(|error| format!("list paths: {error}"))?;
    require!(paths.is_empty(), "seeding should not create paths");
    Ok(())
}
