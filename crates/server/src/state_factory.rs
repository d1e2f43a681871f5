use std::sync::Arc;

use farmgate_state::StateStore;
use farmgate_state_memory::MemoryStateStore;
#[cfg(feature = "postgres")]
use farmgate_state_postgres::{PostgresConfig, PostgresStateStore};
use tracing::info;

use crate::config::StateConfig;
use crate::error::ServerError;

/// Create a state store from the given configuration.
#[allow(clippy::unused_async)]
pub async fn create_state(config: &StateConfig) -> Result<Arc<dyn StateStore>, ServerError> {
    let store: Arc<dyn StateStore> = match config.backend.as_str() {
        "memory" => {
            info!("using in-memory state store, records are lost on restart");
            Arc::new(MemoryStateStore::new())
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = config.url.as_deref().ok_or_else(|| {
                ServerError::Config("postgres state backend requires [state] url".into())
            })?;
            let defaults = PostgresConfig::default();
            let pg_config = PostgresConfig {
                url: url.to_owned(),
                pool_size: config.pool_size.unwrap_or(defaults.pool_size),
                schema: config.schema.clone().unwrap_or(defaults.schema),
                table_prefix: config.prefix.clone().unwrap_or(defaults.table_prefix),
                ..defaults
            };
            let store = PostgresStateStore::new(pg_config)
                .await
                .map_err(|e| ServerError::Config(format!("state postgres: {e}")))?;
            Arc::new(store)
        }
        other => {
            return Err(ServerError::Config(format!(
                "unsupported state backend: {other}"
            )));
        }
    };
    Ok(store)
}
