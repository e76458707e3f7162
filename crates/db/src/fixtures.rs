use triage_core::catalog;
use triage_core::domain::tree::DecisionTree;

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlTreeStore};

/// Seeds the decision trees shipped with the binary into `decision_trees`.
///
/// Loading is an upsert, so running it twice leaves one row per tree and
/// never touches recorded paths.
pub struct TreeSeedDataset;

impl TreeSeedDataset {
    fn trees() -> Result<Vec<DecisionTree>, RepositoryError> {
        let tree = catalog::escalation_tree()
            .map_err(|error| RepositoryError::Decode(format!("embedded tree: {error}")))?;
        Ok(vec![tree])
    }

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let store = SqlTreeStore::new(pool.clone());
        let mut trees_seeded = Vec::new();

        for tree in Self::trees()? {
            store.save_tree(&tree).await?;
            trees_seeded.push(TreeSeedInfo {
                tree_id: tree.id.0.clone(),
                name: tree.name.clone(),
                node_count: tree.nodes.len(),
            });
        }

        Ok(SeedResult { trees_seeded })
    }

    /// Checks each shipped tree is stored, matches the embedded copy and is
    /// structurally valid.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let store = SqlTreeStore::new(pool.clone());
        let mut checks = Vec::new();

        for expected in Self::trees()? {
            let stored = store.find_tree(&expected.id).await?;
            let id = &expected.id.0;

            checks.push((format!("{id}:present"), stored.is_some()));
            checks.push((
                format!("{id}:matches-embedded"),
                stored.as_ref().is_some_and(|tree| tree == &expected),
            ));
            checks.push((
                format!("{id}:structurally-valid"),
                stored.as_ref().is_some_and(|tree| tree.validate().is_ok()),
            ));
        }

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes shipped trees and, through the cascade, their paths.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for tree in Self::trees()? {
            sqlx::query("DELETE FROM decision_trees WHERE id = ?")
                .bind(&tree.id.0)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub trees_seeded: Vec<TreeSeedInfo>,
}

#[derive(Debug)]
pub struct TreeSeedInfo {
    pub tree_id: String,
    pub name: String,
    pub node_count: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
