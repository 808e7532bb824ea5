//! Structured logging for the `trueno-densest` binary
//!
//! Installs a global `tracing` subscriber writing to stderr, so comparison
//! reports printed on stdout stay machine-readable. `RUST_LOG` selects the
//! level (default `info`) and `TRUENO_DENSEST_LOG_FORMAT` picks `human` or
//! `json` output.

use std::{env, str::FromStr, sync::OnceLock};

use thiserror::Error;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "TRUENO_DENSEST_LOG_FORMAT";

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Log line rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact human-readable lines
    #[default]
    Human,
    /// One JSON object per event, with span context
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(LoggingError::UnsupportedFormat {
                provided: other.to_owned(),
            }),
        }
    }
}

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The format variable held invalid UTF-8
    #[error("environment variable `{name}` contained invalid UTF-8: {source}")]
    InvalidUnicode {
        /// Variable name
        name: &'static str,
        /// Underlying failure
        #[source]
        source: env::VarError,
    },
    /// The format variable named an unknown format
    #[error("unsupported log format `{provided}`; expected `human` or `json`")]
    UnsupportedFormat {
        /// Raw value
        provided: String,
    },
    /// Another subscriber already owns the global slot
    #[error("failed to install tracing subscriber: {source}")]
    InstallFailed {
        /// Error from `tracing_subscriber`
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
}

/// Format requested through [`LOG_FORMAT_ENV`]
///
/// # Errors
///
/// Returns [`LoggingError`] for non-UTF-8 or unknown values.
pub fn format_from_env() -> Result<LogFormat, LoggingError> {
    match env::var(LOG_FORMAT_ENV) {
        Ok(raw) => raw.parse(),
        Err(env::VarError::NotPresent) => Ok(LogFormat::Human),
        Err(source @ env::VarError::NotUnicode(_)) => Err(LoggingError::InvalidUnicode {
            name: LOG_FORMAT_ENV,
            source,
        }),
    }
}

/// Install global logging once; later calls are no-ops
///
/// # Errors
///
/// Returns [`LoggingError`] if the format variable is invalid. A subscriber
/// installed elsewhere is reported on stderr and otherwise tolerated.
pub fn init_logging() -> Result<(), LoggingError> {
    if INITIALISED.get().is_some() {
        return Ok(());
    }

    match install_subscriber(format_from_env()?) {
        Ok(()) => {}
        Err(LoggingError::InstallFailed { source }) => {
            eprintln!("structured logging already configured elsewhere: {source}");
        }
        Err(err) => return Err(err),
    }
    let _ = INITIALISED.set(());
    Ok(())
}

fn install_subscriber(format: LogFormat) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Span close events carry the busy/idle time of each engine run
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    let fmt_layer = match format {
        LogFormat::Json => fmt_layer.json().with_current_span(true).with_span_list(true).boxed(),
        LogFormat::Human => fmt_layer.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|source| LoggingError::InstallFailed { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_supported_formats() {
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert_eq!("HUMAN".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert_eq!(" json ".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }

    #[test]
    fn test_rejects_unknown_format() {
        match "xml".parse::<LogFormat>() {
            Err(LoggingError::UnsupportedFormat { provided }) => assert_eq!(provided, "xml"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging().unwrap();
        init_logging().unwrap();
    }
}
