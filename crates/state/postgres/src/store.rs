use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use farmgate_state::error::StateError;
use farmgate_state::key::{KeyKind, StateKey};
use farmgate_state::store::{CasResult, StateStore, Versioned};

use crate::config::PostgresConfig;
use crate::migrations;

/// Build `PgConnectOptions` from a [`PostgresConfig`], applying SSL settings
/// when configured.
pub(crate) fn build_connect_options(
    config: &PostgresConfig,
) -> Result<sqlx::postgres::PgConnectOptions, StateError> {
    let mut options: sqlx::postgres::PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| StateError::Connection(e.to_string()))?;

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            other => {
                return Err(StateError::Connection(format!("unknown ssl_mode: {other}")));
            }
        };
        options = options.ssl_mode(ssl_mode);
    }

    if let Some(ref path) = config.ssl_root_cert {
        options = options.ssl_root_cert(path);
    }

    Ok(options)
}

fn backend(e: sqlx::Error) -> StateError {
    StateError::Backend(e.to_string())
}

fn to_version(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

/// PostgreSQL-backed implementation of [`StateStore`].
///
/// Each record is one row keyed by its canonical key, with a `version`
/// column that every write bumps. TTL is handled via an `expires_at
/// TIMESTAMPTZ` column: reads filter out expired rows with
/// `WHERE (expires_at IS NULL OR expires_at > NOW())`.
pub struct PostgresStateStore {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresStateStore {
    /// Connect, create the pool and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Connection`] if pool creation fails, or
    /// [`StateError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StateError> {
        let connect_options = build_connect_options(&config)?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_with(connect_options)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::run_migrations(&pool, &config)
            .await
            .map_err(backend)?;

        tracing::info!(table = %config.state_table(), "postgres state store ready");
        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    fn expires_at_from_ttl(ttl: Option<Duration>) -> Option<chrono::DateTime<chrono::Utc>> {
        ttl.map(|d| chrono::Utc::now() + d)
    }

    async fn delete_expired(&self, canonical: &str) -> Result<(), StateError> {
        let table = self.config.state_table();
        let query = format!(
            "DELETE FROM {table} WHERE key = $1 AND expires_at IS NOT NULL AND expires_at <= NOW()"
        );
        sqlx::query(&query)
            .bind(canonical)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn current(&self, canonical: &str) -> Result<CasResult, StateError> {
        let table = self.config.state_table();
        let query = format!(
            "SELECT value, version FROM {table} \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())"
        );
        let row: Option<(String, i64)> = sqlx::query_as(&query)
            .bind(canonical)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(match row {
            Some((value, version)) => CasResult::Conflict {
                current_value: Some(value),
                current_version: to_version(version),
            },
            None => CasResult::Conflict {
                current_value: None,
                current_version: 0,
            },
        })
    }
}

#[async_trait]
impl StateStore for PostgresStateStore {
    async fn check_and_set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StateError> {
        let canonical = key.canonical();
        let expires_at = Self::expires_at_from_ttl(ttl);
        let table = self.config.state_table();

        self.delete_expired(&canonical).await?;

        let query = format!(
            "INSERT INTO {table} (key, value, version, expires_at) \
             VALUES ($1, $2, 1, $3) \
             ON CONFLICT (key) DO NOTHING"
        );

        let result = sqlx::query(&query)
            .bind(&canonical)
            .bind(value)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError> {
        Ok(self.get_versioned(key).await?.map(|v| v.value))
    }

    async fn get_versioned(&self, key: &StateKey) -> Result<Option<Versioned>, StateError> {
        let table = self.config.state_table();
        let query = format!(
            "SELECT value, version FROM {table} \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())"
        );

        let row: Option<(String, i64)> = sqlx::query_as(&query)
            .bind(key.canonical())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.map(|(value, version)| Versioned {
            value,
            version: to_version(version),
        }))
    }

    async fn set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StateError> {
        let expires_at = Self::expires_at_from_ttl(ttl);
        let table = self.config.state_table();

        let query = format!(
            "INSERT INTO {table} (key, value, version, expires_at) \
             VALUES ($1, $2, 1, $3) \
             ON CONFLICT (key) DO UPDATE \
             SET value = EXCLUDED.value, \
                 version = {table}.version + 1, \
                 expires_at = EXCLUDED.expires_at"
        );

        sqlx::query(&query)
            .bind(key.canonical())
            .bind(value)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(())
    }

    async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
        let table = self.config.state_table();

        // Deleting an expired key reports false.
        let query = format!(
            "DELETE FROM {table} \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())"
        );

        let result = sqlx::query(&query)
            .bind(key.canonical())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn compare_and_delete(
        &self,
        key: &StateKey,
        expected_version: u64,
    ) -> Result<CasResult, StateError> {
        let canonical = key.canonical();
        let table = self.config.state_table();
        let expected_version = i64::try_from(expected_version).unwrap_or(i64::MAX);

        let query = format!(
            "DELETE FROM {table} \
             WHERE key = $1 AND version = $2 \
               AND (expires_at IS NULL OR expires_at > NOW())"
        );

        let result = sqlx::query(&query)
            .bind(&canonical)
            .bind(expected_version)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() > 0 {
            Ok(CasResult::Ok)
        } else {
            self.current(&canonical).await
        }
    }

    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        let canonical = key.canonical();
        let expires_at = Self::expires_at_from_ttl(ttl);
        let table = self.config.state_table();

        // The counter restarts from zero once its window has expired.
        self.delete_expired(&canonical).await?;

        let query = format!(
            "INSERT INTO {table} (key, value, version, expires_at) \
             VALUES ($1, $2::text, 1, $3) \
             ON CONFLICT (key) DO UPDATE \
             SET value = ({table}.value::bigint + $2)::text, \
                 version = {table}.version + 1, \
                 expires_at = COALESCE({table}.expires_at, EXCLUDED.expires_at) \
             RETURNING value"
        );

        let row: (String,) = sqlx::query_as(&query)
            .bind(&canonical)
            .bind(delta)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        row.0
            .parse::<i64>()
            .map_err(|e| StateError::Serialization(e.to_string()))
    }

    async fn compare_and_swap(
        &self,
        key: &StateKey,
        expected_version: u64,
        new_value: &str,
        ttl: Option<Duration>,
    ) -> Result<CasResult, StateError> {
        let canonical = key.canonical();
        let expires_at = Self::expires_at_from_ttl(ttl);
        let table = self.config.state_table();
        let expected_version = i64::try_from(expected_version).unwrap_or(i64::MAX);

        // A single conditional UPDATE; the row lock makes concurrent writers
        // with the same expected version serialize, and only one matches.
        let update_query = format!(
            "UPDATE {table} \
             SET value = $1, version = version + 1, \
                 expires_at = COALESCE($2, expires_at) \
             WHERE key = $3 AND version = $4 \
               AND (expires_at IS NULL OR expires_at > NOW())"
        );

        let result = sqlx::query(&update_query)
            .bind(new_value)
            .bind(expires_at)
            .bind(&canonical)
            .bind(expected_version)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() > 0 {
            Ok(CasResult::Ok)
        } else {
            self.current(&canonical).await
        }
    }

    async fn scan_keys(
        &self,
        namespace: &str,
        kind: KeyKind,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, String)>, StateError> {
        let table = self.config.state_table();
        let mut key_prefix = StateKey::kind_prefix(namespace, &kind);
        if let Some(p) = prefix {
            key_prefix.push_str(p);
        }

        // starts_with avoids LIKE treating `_` in kind names as a wildcard.
        let query = format!(
            "SELECT key, value FROM {table} \
             WHERE starts_with(key, $1) AND (expires_at IS NULL OR expires_at > NOW())"
        );

        let rows: Vec<(String, String)> = sqlx::query_as(&query)
            .bind(&key_prefix)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        Ok(rows)
    }
}
