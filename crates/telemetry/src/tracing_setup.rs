//! Structured logging setup.
//!
//! Driven by the `[log]` section of the service config. `RUST_LOG`, when
//! set, still takes precedence over the configured filter.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, one event per line
    #[default]
    Text,
    /// One JSON object per event, for log shippers
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directive string, e.g. `info,worker=debug`
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Emit span open/close events (tick and job spans)
    #[serde(default)]
    pub span_events: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
            span_events: false,
        }
    }
}

impl LogConfig {
    /// Filter to install: `RUST_LOG` if valid, then the configured
    /// directives, then plain `info`.
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.filter))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Installs the global subscriber.
///
/// Returns `false` if one was already installed; tests rely on repeated
/// calls being harmless.
pub fn init_tracing(config: &LogConfig) -> bool {
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(config.env_filter());
    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_events(span_events)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_span_events(span_events).with_target(true))
            .try_init(),
    }
    .is_ok();

    if installed {
        tracing::info!(
            filter = %config.filter,
            format = ?config.format,
            "Logging initialized"
        );
    }
    installed
}
