pub mod config;
pub mod migrate;
pub mod seed;
pub mod validate;
pub mod walk;

use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use tokio::runtime::Runtime;
use triage_core::catalog;
use triage_core::config::AppConfig;
use triage_core::domain::tree::{DecisionTree, TreeId};
use triage_core::errors::ApplicationError;
use triage_core::store::{StoreError, TreeStore};
use triage_db::{connection::connect_from_config, migrations, DbPool, SqlTreeStore};
use uuid::Uuid;

/// Error class, message and exit code for a failed command step.
pub(crate) type Failure = (&'static str, String, u8);

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Puts human-readable text above the JSON outcome line.
    pub fn with_preamble(mut self, preamble: &str) -> Self {
        if !preamble.is_empty() {
            self.output = format!("{}\n{}", preamble.trim_end_matches('\n'), self.output);
        }
        self
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Where a command reads its decision tree from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeSource {
    Store,
    Builtin,
    File(PathBuf),
}

pub(crate) fn build_runtime() -> Result<Runtime, Failure> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        ("runtime_init", format!("failed to initialize async runtime: {error}"), 3)
    })
}

/// Connects with the configured pool settings and brings the schema up to date.
pub(crate) async fn open_store(config: &AppConfig) -> Result<(DbPool, SqlTreeStore), Failure> {
    let pool = connect_from_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;
    Ok((pool.clone(), SqlTreeStore::new(pool)))
}

/// Loads a tree without validating it.
pub(crate) fn load_tree(
    source: &TreeSource,
    tree_id: &TreeId,
    config: &AppConfig,
    runtime: &Runtime,
) -> Result<DecisionTree, Failure> {
    match source {
        TreeSource::File(path) => {
            let raw = fs::read_to_string(path).map_err(|error| {
                ("tree_read", format!("could not read `{}`: {error}", path.display()), 6u8)
            })?;
            DecisionTree::from_json(&raw).map_err(|error| {
                ("tree_parse", format!("could not parse `{}`: {error}", path.display()), 6u8)
            })
        }
        TreeSource::Builtin => match catalog::builtin(tree_id) {
            Some(parsed) => parsed.map_err(|error| {
                ("tree_parse", format!("built-in tree `{tree_id}`: {error}"), 6u8)
            }),
            None => {
                Err(("not_found", format!("no built-in decision tree named `{tree_id}`"), 6u8))
            }
        },
        TreeSource::Store => runtime.block_on(async {
            let (pool, store) = open_store(config).await?;
            let fetched = fetch_stored(&store, tree_id).await;
            pool.close().await;
            fetched
        }),
    }
}

/// Fetches a tree from an already open store. A stored document that cannot
/// be decoded is reported as an invalid tree rather than a store outage.
pub(crate) async fn fetch_stored(
    store: &SqlTreeStore,
    tree_id: &TreeId,
) -> Result<DecisionTree, Failure> {
    store.fetch_tree(tree_id).await.map_err(|error| {
        let error_class = match &error {
            StoreError::Decode(_) => "tree_invalid",
            _ => ApplicationError::from(error.clone())
                .into_interface(Uuid::new_v4().to_string())
                .error_class(),
        };
        (error_class, error.to_string(), 6u8)
    })
}
