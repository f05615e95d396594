//! Outbound record writer.

use std::io::Write;

use warden_protocol::Command;

use crate::error::RunnerError;

/// Writes encoded commands to the output channel.
///
/// Each command becomes one JSON line. Nothing is flushed implicitly; the
/// dispatcher flushes once per drain.
#[derive(Debug)]
pub struct OutboundWriter<W> {
    writer: W,
}

impl<W: Write> OutboundWriter<W> {
    /// Wraps an output stream.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Encodes and writes one command.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn write_command(&mut self, command: &Command) -> Result<(), RunnerError> {
        let line = command.encode()?;
        self.writer
            .write_all(line.as_bytes())
            .map_err(|source| RunnerError::Write { source })
    }

    /// Flushes buffered output.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<(), RunnerError> {
        self.writer
            .flush()
            .map_err(|source| RunnerError::Write { source })
    }

    /// Borrows the underlying stream.
    #[must_use]
    pub const fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Returns the underlying stream.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}
