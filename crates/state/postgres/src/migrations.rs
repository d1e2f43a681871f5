use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating the state table if it does not exist.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let state_table = config.state_table();

    let create_state = format!(
        "CREATE TABLE IF NOT EXISTS {state_table} (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            version BIGINT NOT NULL DEFAULT 1,
            expires_at TIMESTAMPTZ
        )"
    );

    // Supports the key-prefix scans used for listing records by kind.
    let create_prefix_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}state_key_prefix_idx ON {state_table} (key text_pattern_ops)",
        config.table_prefix
    );

    sqlx::query(&create_state).execute(pool).await?;
    sqlx::query(&create_prefix_idx).execute(pool).await?;

    tracing::debug!(table = %state_table, "state migrations applied");
    Ok(())
}
