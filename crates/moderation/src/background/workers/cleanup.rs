use tracing::{debug, info, warn};

use crate::error::ModerationError;

use super::super::{BackgroundProcessor, CleanupEvent};

impl BackgroundProcessor {
    /// Sweep expired soft-deleted photos.
    pub(crate) async fn run_cleanup(&mut self) -> Result<(), ModerationError> {
        let purged = self.service.cleanup_expired().await?;
        if purged > 0 {
            info!(purged, "cleanup sweep complete");
        } else {
            debug!("cleanup sweep complete, nothing to remove");
        }

        if let Some(ref tx) = self.cleanup_tx {
            let event = CleanupEvent {
                purged,
                swept_at: self.service.now(),
            };
            if let Err(e) = tx.try_send(event) {
                warn!(error = %e, "failed to send cleanup event");
            }
        }
        Ok(())
    }
}
