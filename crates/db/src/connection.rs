use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::debug;
use triage_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Opens a pool sized from the `[database]` config section.
pub async fn connect_from_config(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&database.url, database.max_connections, database.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    debug!(
        event_name = "db.pool.connect",
        max_connections = max_connections.max(1),
        timeout_secs = timeout_secs.max(1),
        "opening sqlite pool"
    );

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use triage_core::config::AppConfig;

    use super::connect_from_config;

    #[tokio::test]
    async fn pool_enforces_foreign_keys() {
        let mut database = AppConfig::default().database;
        database.url = "sqlite::memory:".to_string();
        database.max_connections = 1;

        let pool = connect_from_config(&database).await.expect("connect");
        let enabled: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");

        assert_eq!(enabled, 1);
    }
}
