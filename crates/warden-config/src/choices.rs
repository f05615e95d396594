//! Enumerated settings parsed from configuration text.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output format of the diagnostics written to standard error.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, fields flattened.
    #[default]
    Json,
    /// Terse single-line text for terminals.
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

/// Treatment of commands that arrive before the application is loaded.
///
/// Only the `initialize` command is meaningful while the runner is loading.
/// Anything else is a protocol violation; the policy decides whether it is
/// rejected with a diagnostic or held back until the application is ready.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PreReadyPolicy {
    /// Drop the command and emit a warning diagnostic on the outbound channel.
    #[default]
    Reject,
    /// Hold the command and dispatch it, in arrival order, once the
    /// initialization handler has run.
    Buffer,
}

/// Errors encountered while parsing a [`PreReadyPolicy`] from text.
pub type PreReadyPolicyParseError = strum::ParseError;
