use std::sync::Arc;

use tokio::sync::broadcast;

use farmgate_blob::BlobStore;
use farmgate_core::{Clock, SystemClock};
use farmgate_state::StateStore;

use crate::config::{MAX_RECOVERY_WINDOW_SECONDS, ModerationConfig};
use crate::error::ModerationError;
use crate::metrics::ModerationMetrics;
use crate::ratelimit::SubmissionLimiter;
use crate::service::PhotoService;

/// Default capacity of the event bus.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Fluent builder for constructing a [`PhotoService`].
///
/// A [`StateStore`] and a [`BlobStore`] must be supplied. Everything else has
/// a default: the system clock, default limits, fresh metrics and an event
/// bus of 256 slots.
pub struct PhotoServiceBuilder {
    state: Option<Arc<dyn StateStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    clock: Arc<dyn Clock>,
    config: ModerationConfig,
    metrics: Option<Arc<ModerationMetrics>>,
    event_capacity: usize,
}

impl PhotoServiceBuilder {
    pub fn new() -> Self {
        Self {
            state: None,
            blobs: None,
            clock: Arc::new(SystemClock),
            config: ModerationConfig::default(),
            metrics: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    #[must_use]
    pub fn state(mut self, state: Arc<dyn StateStore>) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(mut self, config: ModerationConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing metrics instance.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<ModerationMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Number of events a slow subscriber may fall behind before it starts
    /// skipping.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Consume the builder and produce a [`PhotoService`].
    pub fn build(self) -> Result<PhotoService, ModerationError> {
        let state = self
            .state
            .ok_or_else(|| ModerationError::Configuration("state store is required".into()))?;
        let blobs = self
            .blobs
            .ok_or_else(|| ModerationError::Configuration("blob store is required".into()))?;
        if self.event_capacity == 0 {
            return Err(ModerationError::Configuration(
                "event capacity must be positive".into(),
            ));
        }
        if self.config.namespace.is_empty() {
            return Err(ModerationError::Configuration(
                "namespace must not be empty".into(),
            ));
        }

        if self.config.recovery_window_seconds > MAX_RECOVERY_WINDOW_SECONDS {
            return Err(ModerationError::Configuration(format!(
                "recovery window of {}s exceeds the maximum of {MAX_RECOVERY_WINDOW_SECONDS}s",
                self.config.recovery_window_seconds
            )));
        }

        let (events, _) = broadcast::channel(self.event_capacity);
        let limiter = SubmissionLimiter::new(
            Arc::clone(&state),
            self.config.namespace.clone(),
            self.config.rate_limit.clone(),
        );

        Ok(PhotoService {
            state,
            blobs,
            clock: self.clock,
            events,
            metrics: self.metrics.unwrap_or_default(),
            config: self.config,
            limiter,
        })
    }
}

impl Default for PhotoServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmgate_blob::MemoryBlobStore;
    use farmgate_state_memory::MemoryStateStore;

    #[test]
    fn missing_state_store_is_a_configuration_error() {
        let err = PhotoServiceBuilder::new()
            .blobs(Arc::new(MemoryBlobStore::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ModerationError::Configuration(_)));
    }

    #[test]
    fn missing_blob_store_is_a_configuration_error() {
        let err = PhotoServiceBuilder::new()
            .state(Arc::new(MemoryStateStore::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ModerationError::Configuration(_)));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = PhotoServiceBuilder::new()
            .state(Arc::new(MemoryStateStore::new()))
            .blobs(Arc::new(MemoryBlobStore::new()))
            .event_capacity(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ModerationError::Configuration(_)));
    }

    #[test]
    fn oversized_recovery_window_is_rejected() {
        let config = ModerationConfig {
            recovery_window_seconds: u64::MAX,
            ..ModerationConfig::default()
        };
        let err = PhotoServiceBuilder::new()
            .state(Arc::new(MemoryStateStore::new()))
            .blobs(Arc::new(MemoryBlobStore::new()))
            .config(config)
            .build()
            .unwrap_err();
        assert!(matches!(err, ModerationError::Configuration(msg) if msg.contains("recovery window")));
    }

    #[test]
    fn recovery_window_at_the_maximum_is_accepted() {
        let config = ModerationConfig {
            recovery_window_seconds: MAX_RECOVERY_WINDOW_SECONDS,
            ..ModerationConfig::default()
        };
        let service = PhotoServiceBuilder::new()
            .state(Arc::new(MemoryStateStore::new()))
            .blobs(Arc::new(MemoryBlobStore::new()))
            .config(config)
            .build()
            .unwrap();
        assert_eq!(service.config().recovery_window(), chrono::Duration::days(365));
    }

    #[test]
    fn builds_with_defaults() {
        let service = PhotoServiceBuilder::new()
            .state(Arc::new(MemoryStateStore::new()))
            .blobs(Arc::new(MemoryBlobStore::new()))
            .build()
            .unwrap();
        assert_eq!(service.config().namespace, "farmgate");
        assert_eq!(service.metrics().snapshot().submissions, 0);
    }
}
