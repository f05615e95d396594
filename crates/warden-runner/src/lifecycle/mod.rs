//! Runner lifecycle: startup, the read loop and shutdown.
//!
//! ```text
//! Loading --load ok--> Ready --terminal record flushed--> Terminating --> Terminated
//! Loading --load failed--> Terminated
//! ```
//!
//! The [`Runner`] owns the [`Framer`] separately from the controller that
//! dispatches records, so records can be handled while the framer is still
//! iterating over a chunk.

mod controller;

use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use strum::Display;
use warden_config::{Config, PreReadyPolicy};
use warden_protocol::Framer;

use crate::error::RunnerError;
use crate::loader::Loader;
use crate::reporter::LifecycleReporter;

use controller::Controller;

/// Tracing target for lifecycle events.
pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Phase of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RuntimeState {
    /// Waiting for application source.
    Loading,
    /// Dispatching commands to the loaded application.
    Ready,
    /// The terminal record has been written.
    Terminating,
    /// No further input is processed.
    Terminated,
}

/// Outcome of a runner session, mapped to a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ExitStatus {
    /// The application ended the session.
    Clean,
    /// Input ended before the application ended the session.
    InputClosed,
    /// The application could not be loaded.
    LoadFailed,
    /// Reading or writing the protocol channel failed.
    ChannelFailed,
}

impl ExitStatus {
    /// Numeric process exit code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Clean | Self::InputClosed => 0,
            Self::LoadFailed => 1,
            Self::ChannelFailed => 2,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        Self::from(status.code())
    }
}

/// Settings that shape a runner session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Largest accepted inbound record, in bytes.
    pub max_record_bytes: usize,
    /// Treatment of commands arriving before the application is ready.
    pub pre_ready_policy: PreReadyPolicy,
    /// Whether status records are written to the protocol channel.
    pub lifecycle_logs: bool,
    /// Application source to load at startup.
    pub app_path: Option<Utf8PathBuf>,
    /// Context file accompanying `app_path`.
    pub app_context_path: Option<Utf8PathBuf>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RunnerOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_record_bytes: config.max_record_bytes(),
            pre_ready_policy: config.pre_ready_policy(),
            lifecycle_logs: config.lifecycle_logs(),
            app_path: config.app_path().cloned(),
            app_context_path: config.app_context_path().cloned(),
        }
    }
}

/// Drives one sandboxed application over a duplex byte stream.
#[derive(Debug)]
pub struct Runner<W> {
    framer: Framer,
    controller: Controller<W>,
}

impl<W: Write> Runner<W> {
    /// Creates a runner writing protocol records to `output`.
    #[must_use]
    pub fn new(
        options: RunnerOptions,
        loader: Loader,
        output: W,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> Self {
        Self {
            framer: Framer::new(options.max_record_bytes),
            controller: Controller::new(options, loader, output, reporter),
        }
    }

    /// Announces startup and loads `app_path` when configured.
    ///
    /// Returns the exit status if the session already ended.
    ///
    /// # Errors
    ///
    /// Returns an error if the output channel fails.
    pub fn start(&mut self) -> Result<Option<ExitStatus>, RunnerError> {
        self.controller.start()
    }

    /// Processes a chunk of input.
    ///
    /// Every record the chunk completes is dispatched, in order, before this
    /// returns. Returns the exit status once the session has ended.
    ///
    /// # Errors
    ///
    /// Returns an error if the output channel fails.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<ExitStatus>, RunnerError> {
        if let Some(status) = self.controller.exit_status() {
            return Ok(Some(status));
        }
        for record in self.framer.feed(chunk) {
            if let Some(status) = self.controller.handle_record(record)? {
                return Ok(Some(status));
            }
        }
        Ok(None)
    }

    /// Handles the end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the output channel fails.
    pub fn finish(&mut self) -> Result<ExitStatus, RunnerError> {
        if let Some(status) = self.controller.exit_status() {
            return Ok(status);
        }
        if let Some(error) = self.framer.finish() {
            self.controller.reject_frame(&error);
        }
        Ok(self.controller.close_input())
    }

    /// Runs a whole session: start, read until exit or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing output fails.
    pub fn run<R: Read>(&mut self, mut input: R) -> Result<ExitStatus, RunnerError> {
        if let Some(status) = self.start()? {
            return Ok(status);
        }
        let mut chunk = [0_u8; READ_CHUNK_BYTES];
        loop {
            let count = read_with_retry(&mut input, &mut chunk)?;
            if count == 0 {
                return self.finish();
            }
            if let Some(status) = self.feed(chunk.get(..count).unwrap_or_default())? {
                return Ok(status);
            }
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn state(&self) -> RuntimeState {
        self.controller.state()
    }

    /// Borrows the output stream.
    #[must_use]
    pub const fn output(&self) -> &W {
        self.controller.output()
    }

    /// Returns the output stream.
    #[must_use]
    pub fn into_output(self) -> W {
        self.controller.into_output()
    }
}

/// Reads from the input, retrying on interrupts.
fn read_with_retry<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<usize, RunnerError> {
    loop {
        match input.read(buf) {
            Ok(count) => return Ok(count),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(source) => return Err(RunnerError::Read { source }),
        }
    }
}
