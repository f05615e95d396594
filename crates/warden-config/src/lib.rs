//! Shared configuration for the Warden sandbox runner.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then an
//! optional configuration file (`--config-path` or `WARDEN_CONFIG_PATH`),
//! then `WARDEN_*` environment variables, then command-line flags. The
//! runner's standard output is reserved for the sandbox protocol, so every
//! setting here concerns the local side of the process: diagnostics, limits,
//! and how application logic is acquired.

mod choices;
mod defaults;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use choices::{LogFormat, LogFormatParseError, PreReadyPolicy, PreReadyPolicyParseError};
pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_RECORD_BYTES, default_log_filter, default_log_filter_string,
    default_log_format, default_max_record_bytes, default_pre_ready_policy,
};

/// Resolved runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "WARDEN")]
pub struct Config {
    /// `tracing` filter expression applied to stderr diagnostics.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for stderr diagnostics.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Largest inbound record accepted from the host, in bytes.
    #[ortho_config(default = default_max_record_bytes())]
    pub max_record_bytes: usize,
    /// Application source loaded at startup instead of waiting for the
    /// `initialize` command.
    pub app_path: Option<Utf8PathBuf>,
    /// JSON object merged into the application context when `app_path` is
    /// used.
    pub app_context_path: Option<Utf8PathBuf>,
    /// Treatment of commands that arrive before the application is ready.
    #[ortho_config(default = default_pre_ready_policy())]
    pub pre_ready_policy: PreReadyPolicy,
    /// Emit runner status records (`Starting sandbox ...`) on the protocol
    /// channel.
    #[ortho_config(default = false)]
    pub lifecycle_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            max_record_bytes: default_max_record_bytes(),
            app_path: None,
            app_context_path: None,
            pre_ready_policy: default_pre_ready_policy(),
            lifecycle_logs: false,
        }
    }
}

impl Config {
    /// Filter expression for the diagnostic subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Format for the diagnostic subscriber.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Inbound record size limit.
    #[must_use]
    pub const fn max_record_bytes(&self) -> usize {
        self.max_record_bytes
    }

    /// Path of the application source to preload, if any.
    #[must_use]
    pub fn app_path(&self) -> Option<&Utf8PathBuf> {
        self.app_path.as_ref()
    }

    /// Path of the context object accompanying [`Self::app_path`], if any.
    #[must_use]
    pub fn app_context_path(&self) -> Option<&Utf8PathBuf> {
        self.app_context_path.as_ref()
    }

    /// Treatment of commands that arrive before the application is ready.
    #[must_use]
    pub const fn pre_ready_policy(&self) -> PreReadyPolicy {
        self.pre_ready_policy
    }

    /// Whether runner status records are written to the protocol channel.
    #[must_use]
    pub const fn lifecycle_logs(&self) -> bool {
        self.lifecycle_logs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.max_record_bytes(), DEFAULT_MAX_RECORD_BYTES);
        assert_eq!(config.pre_ready_policy(), PreReadyPolicy::Reject);
        assert!(config.app_path().is_none());
        assert!(!config.lifecycle_logs());
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("COMPACT".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
    }
}
