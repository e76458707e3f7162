use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;
use triage_core::config::{AppConfig, LoadOptions};

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let lines = render(&config, config_file_doc.as_ref(), config_file_path.as_deref());

    CommandResult::success("config", "effective configuration rendered")
        .with_preamble(&lines.join("\n"))
}

fn render(
    config: &AppConfig,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> Vec<String> {
    let fields: [(&str, String, &[&str]); 8] = [
        ("database.url", config.database.url.clone(), &["TRIAGE_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["TRIAGE_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["TRIAGE_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "session.default_tree_id",
            config.session.default_tree_id.clone(),
            &["TRIAGE_SESSION_DEFAULT_TREE_ID"],
        ),
        ("session.owner_id", config.session.owner_id.clone(), &["TRIAGE_SESSION_OWNER_ID"]),
        (
            "session.submit_paths",
            config.session.submit_paths.to_string(),
            &["TRIAGE_SESSION_SUBMIT_PATHS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["TRIAGE_LOGGING_LEVEL", "TRIAGE_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["TRIAGE_LOGGING_FORMAT", "TRIAGE_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields {
        lines.push(render_line(
            key,
            &value,
            field_source(key, env_keys, config_file_doc, config_file_path),
        ));
    }
    lines
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("triage.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/triage.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()))
    {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
