//! Error types for loading applications and driving the protocol channel.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;
use warden_protocol::EncodeError;

use crate::lifecycle::ExitStatus;

/// Errors raised while acquiring or executing application source.
///
/// Every variant is fatal: the runner writes a `log.error` diagnostic and
/// exits with [`ExitStatus::LoadFailed`].
#[derive(Debug, Error)]
pub enum LoadError {
    /// The `initialize` command carried no source text.
    #[error("initialize command carries no application source")]
    MissingSource,

    /// The initial context could not be used.
    #[error("invalid application context: {reason}")]
    InvalidContext {
        /// Why the context was rejected.
        reason: String,
    },

    /// The sandbox rejected the application source.
    #[error("application source failed to load: {reason}")]
    Source {
        /// Description supplied by the sandbox.
        reason: String,
    },

    /// A source or context file could not be read.
    #[error("failed to read '{path}': {source}")]
    Io {
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl LoadError {
    /// Builds a [`LoadError::Source`].
    #[must_use]
    pub fn source_rejected(reason: impl Into<String>) -> Self {
        Self::Source {
            reason: reason.into(),
        }
    }

    /// Builds a [`LoadError::InvalidContext`].
    #[must_use]
    pub fn invalid_context(reason: impl Into<String>) -> Self {
        Self::InvalidContext {
            reason: reason.into(),
        }
    }
}

/// Input that is well formed but not acceptable in the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// A command other than `initialize` arrived before the application
    /// loaded.
    #[error("command '{command}' received before the application was ready")]
    CommandBeforeReady {
        /// Name of the rejected command.
        command: String,
    },

    /// A second `initialize` arrived after the application loaded.
    #[error("initialize received after the application was already loaded")]
    RepeatedInitialize,
}

/// Failures of the protocol channel itself.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Reading from the input channel failed.
    #[error("failed to read from input channel: {source}")]
    Read {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing to the output channel failed.
    #[error("failed to write to output channel: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An outbound command could not be serialised.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl RunnerError {
    /// Exit status reported when the runner stops on this error.
    #[must_use]
    pub const fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Read { .. } | Self::Write { .. } | Self::Encode(_) => ExitStatus::ChannelFailed,
        }
    }
}
