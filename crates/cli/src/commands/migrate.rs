use crate::commands::{build_runtime, open_store, CommandResult};
use triage_core::config::{AppConfig, LoadOptions};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("migrate", error_class, message, exit_code);
        }
    };

    let result = runtime.block_on(async {
        let (pool, _store) = open_store(&config).await?;
        pool.close().await;
        Ok::<(), crate::commands::Failure>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
