use serde::Deserialize;

/// Configuration for background tasks (cleanup sweep, thumbnails).
#[derive(Debug, Deserialize)]
pub struct BackgroundProcessingConfig {
    /// Whether the periodic cleanup sweep runs.
    #[serde(default = "default_enabled")]
    pub enable_cleanup: bool,
    /// How often to sweep for expired deletions (seconds).
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// Whether thumbnails are generated for new submissions.
    #[serde(default = "default_enabled")]
    pub enable_thumbnails: bool,
}

impl Default for BackgroundProcessingConfig {
    fn default() -> Self {
        Self {
            enable_cleanup: default_enabled(),
            cleanup_interval_seconds: default_cleanup_interval(),
            enable_thumbnails: default_enabled(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_cleanup_interval() -> u64 {
    300
}
