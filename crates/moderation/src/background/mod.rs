//! Background processor for periodic tasks.
//!
//! The only periodic task is the cleanup sweep, which permanently removes
//! deleted photos once their recovery window has closed.

mod workers;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info};

use crate::service::PhotoService;

/// Configuration for the background processor.
#[derive(Debug, Clone)]
pub struct BackgroundConfig {
    /// How often to run the cleanup sweep (default: 300 seconds).
    pub cleanup_interval: Duration,
    /// Whether the cleanup sweep is enabled (default: true).
    pub enable_cleanup: bool,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(300),
            enable_cleanup: true,
        }
    }
}

/// Event emitted after each cleanup sweep.
#[derive(Debug, Clone)]
pub struct CleanupEvent {
    /// Number of photos permanently removed.
    pub purged: usize,
    /// When the sweep finished.
    pub swept_at: DateTime<Utc>,
}

/// Background processor for periodic moderation tasks.
pub struct BackgroundProcessor {
    pub(crate) config: BackgroundConfig,
    pub(crate) service: Arc<PhotoService>,
    shutdown_rx: mpsc::Receiver<()>,
    /// Channel to send cleanup events.
    pub(crate) cleanup_tx: Option<mpsc::Sender<CleanupEvent>>,
}

impl BackgroundProcessor {
    /// Create a new background processor.
    pub fn new(
        config: BackgroundConfig,
        service: Arc<PhotoService>,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            config,
            service,
            shutdown_rx,
            cleanup_tx: None,
        }
    }

    /// Set a channel to receive cleanup events.
    #[must_use]
    pub fn with_cleanup_channel(mut self, tx: mpsc::Sender<CleanupEvent>) -> Self {
        self.cleanup_tx = Some(tx);
        self
    }

    /// Run the background processor until shutdown is signaled.
    pub async fn run(&mut self) {
        info!("background processor starting");

        let mut cleanup_interval = interval(self.config.cleanup_interval);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("background processor received shutdown signal");
                    break;
                }
                _ = cleanup_interval.tick(), if self.config.enable_cleanup => {
                    if let Err(e) = self.run_cleanup().await {
                        error!(error = %e, "error running cleanup");
                    }
                }
            }
        }

        info!("background processor stopped");
    }
}
