use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use triage_core::domain::path::{OwnerId, PathEntry, PathRecord, PathSubmission, RecordId};
use triage_core::domain::tree::{DecisionTree, TreeId};
use triage_core::store::{StoreError, TreeStore};

use super::RepositoryError;
use crate::DbPool;

/// Tree store over the `decision_trees` and `decision_paths` tables.
pub struct SqlTreeStore {
    pool: DbPool,
}

impl SqlTreeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_tree(&self, id: &TreeId) -> Result<Option<DecisionTree>, RepositoryError> {
        let row = sqlx::query("SELECT id, tree_data FROM decision_trees WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(tree_from_row).transpose()
    }

    /// Inserts or replaces the stored document for `tree.id`.
    pub async fn save_tree(&self, tree: &DecisionTree) -> Result<(), RepositoryError> {
        let tree_data = serde_json::to_string(tree)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO decision_trees (
                id,
                name,
                description,
                version,
                tree_data,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                version = excluded.version,
                tree_data = excluded.tree_data,
                updated_at = excluded.updated_at",
        )
        .bind(&tree.id.0)
        .bind(&tree.name)
        .bind(&tree.description)
        .bind(&tree.version)
        .bind(tree_data)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn paths_for_tree(&self, id: &TreeId) -> Result<Vec<PathRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, tree_id, path, created_at
             FROM decision_paths
             WHERE tree_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(path_from_row).collect()
    }

    async fn insert_path(&self, submission: &PathSubmission) -> Result<RecordId, RepositoryError> {
        let record_id = RecordId(Uuid::new_v4().to_string());
        let path = serde_json::to_string(&submission.path)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO decision_paths (id, user_id, tree_id, path, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record_id.0)
        .bind(&submission.owner_id.0)
        .bind(&submission.tree_id.0)
        .bind(path)
        .bind(submission.submitted_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(record_id)
    }
}

#[async_trait]
impl TreeStore for SqlTreeStore {
    async fn fetch_tree(&self, id: &TreeId) -> Result<DecisionTree, StoreError> {
        let tree = self.find_tree(id).await?.ok_or_else(|| StoreError::NotFound(id.clone()))?;
        debug!(event_name = "store.tree_fetched", tree_id = %id, nodes = tree.nodes.len());
        Ok(tree)
    }

    async fn append_path(&self, submission: PathSubmission) -> Result<RecordId, StoreError> {
        self.insert_path(&submission).await.map_err(|error| {
            warn!(
                event_name = "store.path_rejected",
                tree_id = %submission.tree_id,
                error = %error,
                "decision path insert failed"
            );
            StoreError::Submit(error.to_string())
        })
    }
}

fn tree_from_row(row: SqliteRow) -> Result<DecisionTree, RepositoryError> {
    let row_id: String = row.try_get("id")?;
    let tree_data: String = row.try_get("tree_data")?;
    let tree = DecisionTree::from_json(&tree_data).map_err(|error| {
        RepositoryError::Decode(format!("invalid tree_data for `{row_id}`: {error}"))
    })?;

    if tree.id.0 != row_id {
        return Err(RepositoryError::Decode(format!(
            "tree_data for `{row_id}` declares tree id `{}`",
            tree.id
        )));
    }

    Ok(tree)
}

fn path_from_row(row: SqliteRow) -> Result<PathRecord, RepositoryError> {
    let path_raw: String = row.try_get("path")?;
    let path: Vec<PathEntry> = serde_json::from_str(&path_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid path json: {error}")))?;

    Ok(PathRecord {
        id: RecordId(row.try_get("id")?),
        owner_id: OwnerId(row.try_get("user_id")?),
        tree_id: TreeId(row.try_get("tree_id")?),
        path,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
