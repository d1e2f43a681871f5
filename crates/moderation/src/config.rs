use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Longest recovery window the service accepts: one year.
pub const MAX_RECOVERY_WINDOW_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Limits and timings for the moderation workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// State store namespace for every record this service writes.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Maximum description length in characters.
    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,

    /// Maximum decoded image size in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    /// Accepted image MIME types.
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,

    /// How long a deleted photo stays recoverable, in seconds. At most
    /// [`MAX_RECOVERY_WINDOW_SECONDS`].
    #[serde(default = "default_recovery_window_seconds")]
    pub recovery_window_seconds: u64,

    /// Minimum length of a deletion request reason, in characters.
    #[serde(default = "default_min_deletion_reason_length")]
    pub min_deletion_reason_length: usize,

    /// Reviewer recorded when the caller does not name one.
    #[serde(default = "default_reviewer")]
    pub default_reviewer: String,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl ModerationConfig {
    #[must_use]
    pub fn recovery_window(&self) -> chrono::Duration {
        let secs = self
            .recovery_window_seconds
            .min(MAX_RECOVERY_WINDOW_SECONDS);
        i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(chrono::Duration::zero)
    }

    /// Whether `content_type` is one of the accepted image types.
    #[must_use]
    pub fn accepts(&self, content_type: &str) -> bool {
        self.allowed_content_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            max_description_length: default_max_description_length(),
            max_image_bytes: default_max_image_bytes(),
            allowed_content_types: default_allowed_content_types(),
            recovery_window_seconds: default_recovery_window_seconds(),
            min_deletion_reason_length: default_min_deletion_reason_length(),
            default_reviewer: default_reviewer(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Per-submitter submission limits, keyed by email address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Submissions allowed per hour.
    #[serde(default = "default_per_hour")]
    pub per_hour: u32,

    /// Submissions allowed per day.
    #[serde(default = "default_per_day")]
    pub per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_hour: default_per_hour(),
            per_day: default_per_day(),
        }
    }
}

impl RateLimitConfig {
    /// The `(window, limit)` pairs to enforce.
    #[must_use]
    pub fn windows(&self) -> [(Duration, u32); 2] {
        [
            (Duration::from_secs(3600), self.per_hour),
            (Duration::from_secs(86_400), self.per_day),
        ]
    }
}

fn default_namespace() -> String {
    "farmgate".to_owned()
}

fn default_max_description_length() -> usize {
    500
}

fn default_max_image_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_content_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/webp"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_recovery_window_seconds() -> u64 {
    4 * 3600
}

fn default_min_deletion_reason_length() -> usize {
    10
}

fn default_reviewer() -> String {
    "admin".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_per_hour() -> u32 {
    10
}

fn default_per_day() -> u32 {
    50
}
