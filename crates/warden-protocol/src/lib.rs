//! Wire protocol shared by the Warden runner and its host.
//!
//! The channel carries UTF-8 text, one JSON object per newline-terminated
//! record. [`Framer`] recovers records from arbitrarily chunked reads and
//! [`Command`] encodes and decodes the `cmd`/`cmd_id`/`reply` envelope.

mod command;
mod error;
mod framer;

pub use command::{Command, CorrelationId, INITIALIZE_COMMAND, RESERVED_FIELDS};
pub use error::{EncodeError, FrameError, ParseError};
pub use framer::{Framer, Records};
