use crate::commands::{build_runtime, open_store, CommandResult, Failure};
use triage_core::config::{AppConfig, LoadOptions};
use triage_db::{fixtures::TreeSeedInfo, TreeSeedDataset};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("seed", error_class, message, exit_code);
        }
    };

    let result = runtime.block_on(async {
        let (pool, _store) = open_store(&config).await?;

        let seed_result = TreeSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = TreeSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<Vec<TreeSeedInfo>, Failure> = if verification.all_present {
            Ok(seed_result.trees_seeded)
        } else {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_failure_message(&failed_checks), 6u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(trees) => CommandResult::success("seed", seeded_message(&trees)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seeded_message(trees: &[TreeSeedInfo]) -> String {
    let lines: Vec<String> = trees
        .iter()
        .map(|tree| format!("  - {}: {} ({} nodes)", tree.tree_id, tree.name, tree.node_count))
        .collect();
    format!("decision trees seeded:\n{}", lines.join("\n"))
}

fn verification_failure_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
