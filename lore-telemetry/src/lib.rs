//! # lore-telemetry
//!
//! Logging setup shared by the lore binaries and tests.
//!
//! - [`init_telemetry`] installs a global `tracing` subscriber filtered by
//!   `RUST_LOG` (default `info`), printing human-readable or JSON lines.
//! - [`memory`] captures events in memory so tests can assert on them.
//!
//! ```rust,no_run
//! use lore_telemetry::{LogFormat, init_telemetry};
//!
//! init_telemetry("lore", LogFormat::Json).expect("telemetry already initialized");
//! tracing::info!(chunk_count = 4, "indexed document");
//! ```

pub mod memory;

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, fmt as tfmt};

pub use memory::{CapturedEvent, InMemoryEventLayer, SharedEventStorage};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// How log lines are written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, one line per event.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" | "plain" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected 'pretty' or 'json')")),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let layer = tfmt::layer().with_writer(std::io::stderr).with_target(true);
    match format {
        LogFormat::Pretty => layer.boxed(),
        LogFormat::Json => layer.json().with_current_span(false).boxed(),
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init_telemetry(service_name: &str, format: LogFormat) -> Result<(), TryInitError> {
    tracing_subscriber::registry().with(env_filter()).with(fmt_layer(format)).try_init()?;
    tracing::debug!(service = service_name, log_format = %format, "telemetry initialized");
    Ok(())
}

/// Install the global subscriber and also record every event in `storage`.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init_with_storage(
    service_name: &str,
    format: LogFormat,
    storage: SharedEventStorage,
) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer(format))
        .with(InMemoryEventLayer::new(storage))
        .try_init()?;
    tracing::debug!(service = service_name, log_format = %format, "telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_formats() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" JSON ".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }

    #[test]
    fn display_round_trips() {
        for format in [LogFormat::Pretty, LogFormat::Json] {
            assert_eq!(format.to_string().parse::<LogFormat>(), Ok(format));
        }
    }

    #[tokio::test]
    async fn second_global_init_fails() {
        let storage = SharedEventStorage::new();
        // Only one global subscriber per process; this test owns it.
        init_with_storage("test-service", LogFormat::Json, storage.clone()).unwrap();
        assert!(init_telemetry("test-service", LogFormat::Pretty).is_err());

        tracing::warn!(attempt = 1u64, "transient failure, retrying");
        let events = storage.find("transient failure");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].field("attempt"), Some(&serde_json::json!(1)));
    }
}
