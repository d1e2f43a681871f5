//! Tracing subscriber initialization.
//!
//! Installs an [`EnvFilter`](tracing_subscriber::EnvFilter) built from
//! `RUST_LOG`, falling back to `[logging] level`, and either a human-readable
//! or a JSON `fmt` layer.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Output formats accepted by `[logging] format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Parse a format name. Unknown names fall back to text.
    pub fn from_str_loose(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Build the filter: `RUST_LOG` wins, then the configured level, then `info`.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
pub fn init(config: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(env_filter(config));
    match LogFormat::from_str_loose(&config.format) {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!(LogFormat::from_str_loose("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_loose("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_loose("text"), LogFormat::Text);
        assert_eq!(LogFormat::from_str_loose("pretty"), LogFormat::Text);
    }
}
