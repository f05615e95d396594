//! Errors raised while framing and decoding protocol records.
//!
//! Both error families are local to a single record: the runner drops the
//! offending record and keeps reading. Neither is ever fatal to the stream.

use std::str::Utf8Error;

use thiserror::Error;

/// Errors raised while splitting the inbound byte stream into records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// A record grew beyond the configured size limit.
    #[error("record too large: {size} bytes exceeds {max_size} byte limit")]
    RecordTooLarge {
        /// Bytes observed for the record when it was rejected.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },

    /// A record was not valid UTF-8.
    #[error("record is not valid UTF-8: {source}")]
    InvalidUtf8 {
        /// Underlying decoding error.
        #[source]
        source: Utf8Error,
    },

    /// The stream ended with a fragment that was never terminated.
    #[error("input ended inside an unterminated record of {size} bytes")]
    Unterminated {
        /// Size of the discarded fragment.
        size: usize,
    },
}

/// Errors raised while decoding a framed record into a command.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The record is not valid JSON.
    #[error("invalid JSON: {source}")]
    InvalidJson {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The record is valid JSON but not an object.
    #[error("record must be a JSON object")]
    NotAnObject,

    /// A required envelope field is absent.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// An envelope field has the wrong JSON type.
    #[error("field '{field}' must be {expected}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Description of the accepted type.
        expected: &'static str,
    },
}

/// Errors raised while encoding an outbound command.
#[derive(Debug, Error)]
#[error("failed to encode command '{name}': {source}")]
pub struct EncodeError {
    /// Command name being encoded.
    pub name: String,
    /// Underlying serialisation error.
    #[source]
    pub source: serde_json::Error,
}
