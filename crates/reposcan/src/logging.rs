//! Process-wide logging setup.
//!
//! Library code logs through both `log` and `tracing`; `init` bridges the
//! former into the latter and installs one subscriber for both.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}', expected text or json", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to install log bridge: {0}")]
    Bridge(#[from] log::SetLoggerError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Call once, early in `main`.
pub fn init(format: LogFormat) -> Result<(), LoggingError> {
    tracing_log::LogTracer::init()?;

    let (text, json) = match format {
        LogFormat::Text => (Some(tracing_fmt::layer().with_target(false)), None),
        LogFormat::Json => (None, Some(tracing_fmt::layer().json().with_current_span(true))),
    };

    let subscriber = Registry::default().with(env_filter()).with(text).with(json);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
