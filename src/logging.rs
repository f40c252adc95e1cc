//! Diagnostic logging on stderr.
//!
//! The level comes from `[log] level` in `mill.toml` (or `--log-level`);
//! `RUST_LOG` overrides both. Command output stays on stdout so it can be
//! piped while logs are visible.

use std::env;
use std::str::FromStr;

use serde::Deserialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    Pretty,
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!(
                "unknown log format '{other}': expected json, pretty or compact"
            )),
        }
    }
}

fn build_filter(level: &str) -> EnvFilter {
    if let Ok(directives) = env::var("RUST_LOG") {
        return EnvFilter::new(directives);
    }
    EnvFilter::try_new(format!("millflow={level},mill={level}"))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(level: &str, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(build_filter(level));
    let writer = std::io::stderr;

    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(writer))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false).with_writer(writer))
            .try_init(),
    };
    // A subscriber is already installed (tests, embedding); keep it.
    let _ = result;
}
