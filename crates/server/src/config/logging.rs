use serde::Deserialize;

/// Log output configuration.
///
/// `RUST_LOG` takes precedence over `level` when set.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `"info"` or `"farmgate_moderation=debug,info"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// `"text"` for human-readable lines or `"json"` for one object per line.
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

fn default_level() -> String {
    "info".to_owned()
}

fn default_format() -> String {
    "text".to_owned()
}
