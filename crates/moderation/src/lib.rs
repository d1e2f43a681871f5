//! The photo moderation workflow.
//!
//! [`PhotoService`] owns every transition of a submission: intake,
//! approve/reject, deletion requests and their review, timed recovery and the
//! cleanup sweep. Each committed transition is published as a
//! [`PhotoEvent`](farmgate_core::PhotoEvent) on a broadcast bus, which the
//! [`NotificationDispatcher`] and [`ThumbnailWorker`] consume independently.

pub mod background;
pub mod builder;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod ratelimit;
pub mod service;
pub mod thumbnail;
pub mod validation;

pub use background::{BackgroundConfig, BackgroundProcessor, CleanupEvent};
pub use builder::PhotoServiceBuilder;
pub use config::{MAX_RECOVERY_WINDOW_SECONDS, ModerationConfig, RateLimitConfig};
pub use error::ModerationError;
pub use metrics::{MetricsSnapshot, ModerationMetrics};
pub use notifier::{NotificationConfig, NotificationDispatcher};
pub use ratelimit::SubmissionLimiter;
pub use service::{DeletionRequestInput, PhotoService, StoredImage, SubmissionInput};
pub use thumbnail::{ImageThumbnailer, Thumbnailer, ThumbnailWorker};
pub use validation::{DecodedImage, decode_data_url, is_valid_email};
