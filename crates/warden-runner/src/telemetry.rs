//! Diagnostics for the runner process.
//!
//! Standard output carries the sandbox protocol, so every event is written to
//! standard error. The subscriber is installed at most once per process.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::{self, SetGlobalDefaultError};
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use warden_config::{Config, LogFormat};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Proof that diagnostics are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors raised while configuring diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression does not parse.
    #[error("invalid log filter '{filter}': {reason}")]
    Filter {
        /// Expression as configured.
        filter: String,
        /// Parser message.
        reason: String,
    },
    /// Another global subscriber is already installed.
    #[error("failed to install telemetry subscriber: {source}")]
    Subscriber {
        /// Error from `tracing`.
        #[source]
        source: SetGlobalDefaultError,
    },
}

/// Installs the stderr subscriber on first use.
///
/// Later calls return a handle without reconfiguring anything.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or another subscriber
/// already owns the process.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| install(config))
        .map(|_| TelemetryHandle)
}

fn install(config: &Config) -> Result<(), TelemetryError> {
    let base = Registry::default().with(parse_filter(config.log_filter())?);
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(true)
        .with_timer(UtcTime::rfc_3339());

    let installed = match config.log_format() {
        LogFormat::Json => {
            subscriber::set_global_default(base.with(layer.json().flatten_event(true)))
        }
        LogFormat::Compact => subscriber::set_global_default(base.with(layer.compact())),
    };
    installed.map_err(|source| TelemetryError::Subscriber { source })
}

fn parse_filter(filter: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(filter).map_err(|error| TelemetryError::Filter {
        filter: filter.to_owned(),
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("info")]
    #[case("warden_runner=debug,warn")]
    fn accepts_filter_expressions(#[case] filter: &str) {
        assert!(parse_filter(filter).is_ok());
    }

    #[test]
    fn rejects_invalid_filter() {
        let error = parse_filter("warden=notalevel").expect_err("filter should fail");
        assert!(matches!(
            error,
            TelemetryError::Filter { ref filter, .. } if filter == "warden=notalevel"
        ));
    }
}
