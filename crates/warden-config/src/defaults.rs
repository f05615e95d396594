use crate::choices::{LogFormat, PreReadyPolicy};

/// Default log filter expression used by the runner.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default upper bound for a single inbound record, in bytes.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Default log filter expression used by the runner.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the runner.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default inbound record limit.
#[must_use]
pub const fn default_max_record_bytes() -> usize {
    DEFAULT_MAX_RECORD_BYTES
}

/// Default treatment of commands received before the application loads.
#[must_use]
pub const fn default_pre_ready_policy() -> PreReadyPolicy {
    PreReadyPolicy::Reject
}
