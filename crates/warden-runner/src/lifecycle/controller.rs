//! Per-record state machine behind [`super::Runner`].

use std::collections::VecDeque;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use warden_config::PreReadyPolicy;
use warden_protocol::{Command, FrameError, INITIALIZE_COMMAND};

use super::{ExitStatus, LIFECYCLE_TARGET, RunnerOptions, RuntimeState};
use crate::api::{LogLevel, log_payload};
use crate::dispatch::{Dispatcher, Flow};
use crate::error::{LoadError, ProtocolViolation, RunnerError};
use crate::loader::{AppSource, Loader};
use crate::reporter::LifecycleReporter;

const STARTING_STATUS: &str = "Starting sandbox ...";
const LOADING_STATUS: &str = "Loading sandboxed code ...";
const PRELOAD_ID: &str = "0";

pub(super) struct Controller<W> {
    state: RuntimeState,
    exit: Option<ExitStatus>,
    options: RunnerOptions,
    loader: Loader,
    dispatcher: Dispatcher<W>,
    backlog: VecDeque<Command>,
    reporter: Arc<dyn LifecycleReporter>,
}

impl<W: Write> Controller<W> {
    pub(super) fn new(
        options: RunnerOptions,
        loader: Loader,
        output: W,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> Self {
        Self {
            state: RuntimeState::Loading,
            exit: None,
            options,
            loader,
            dispatcher: Dispatcher::new(output),
            backlog: VecDeque::new(),
            reporter,
        }
    }

    pub(super) const fn state(&self) -> RuntimeState {
        self.state
    }

    pub(super) const fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }

    pub(super) const fn output(&self) -> &W {
        self.dispatcher.output()
    }

    pub(super) fn into_output(self) -> W {
        self.dispatcher.into_output()
    }

    pub(super) fn start(&mut self) -> Result<Option<ExitStatus>, RunnerError> {
        self.reporter.runner_starting();
        if self.options.lifecycle_logs {
            self.write_status(STARTING_STATUS)?;
        }
        let Some(path) = self.options.app_path.clone() else {
            return Ok(None);
        };
        self.begin_load()?;
        let app = AppSource::from_files(&path, self.options.app_context_path.as_deref());
        let mut payload = Map::new();
        payload.insert("app_path".to_owned(), Value::String(path.into_string()));
        let init = Command::request(INITIALIZE_COMMAND, PRELOAD_ID, payload);
        self.complete_load(app, &init)
    }

    pub(super) fn handle_record(
        &mut self,
        record: Result<String, FrameError>,
    ) -> Result<Option<ExitStatus>, RunnerError> {
        let text = match record {
            Ok(text) => text,
            Err(error) => {
                self.reject_frame(&error);
                return Ok(None);
            }
        };
        match Command::decode(&text) {
            Ok(command) => self.handle_command(command),
            Err(error) => {
                self.reporter.record_rejected(&error);
                Ok(None)
            }
        }
    }

    pub(super) fn reject_frame(&self, error: &FrameError) {
        self.reporter.frame_rejected(error);
    }

    pub(super) fn close_input(&mut self) -> ExitStatus {
        if !self.backlog.is_empty() {
            debug!(
                target: LIFECYCLE_TARGET,
                dropped = self.backlog.len(),
                "discarding commands buffered before ready"
            );
            self.backlog.clear();
        }
        self.reporter.input_closed();
        self.finish_with(ExitStatus::InputClosed)
    }

    fn handle_command(&mut self, command: Command) -> Result<Option<ExitStatus>, RunnerError> {
        match self.state {
            RuntimeState::Loading => self.handle_before_ready(command),
            RuntimeState::Ready => self.handle_ready(&command),
            RuntimeState::Terminating | RuntimeState::Terminated => Ok(self.exit),
        }
    }

    fn handle_before_ready(
        &mut self,
        command: Command,
    ) -> Result<Option<ExitStatus>, RunnerError> {
        if command.is_initialize() {
            self.begin_load()?;
            let app = AppSource::from_initialize(&command);
            return self.complete_load(app, &command);
        }
        if command.is_reply() {
            debug!(
                target: LIFECYCLE_TARGET,
                cmd_id = %command.cmd_id(),
                "dropping reply received before ready"
            );
            return Ok(None);
        }
        match self.options.pre_ready_policy {
            PreReadyPolicy::Buffer => {
                debug!(
                    target: LIFECYCLE_TARGET,
                    command = command.name(),
                    "buffering command until ready"
                );
                self.backlog.push_back(command);
            }
            PreReadyPolicy::Reject => {
                self.violation(&ProtocolViolation::CommandBeforeReady {
                    command: command.name().to_owned(),
                })?;
            }
        }
        Ok(None)
    }

    fn handle_ready(&mut self, command: &Command) -> Result<Option<ExitStatus>, RunnerError> {
        if command.is_initialize() {
            self.violation(&ProtocolViolation::RepeatedInitialize)?;
            return Ok(None);
        }
        let flow = if command.is_reply() {
            self.dispatcher.dispatch_reply(command)?
        } else {
            self.dispatcher.dispatch_command(command)?
        };
        self.settle(flow)
    }

    fn begin_load(&mut self) -> Result<(), RunnerError> {
        self.reporter.app_loading();
        if self.options.lifecycle_logs {
            self.write_status(LOADING_STATUS)?;
        }
        Ok(())
    }

    fn complete_load(
        &mut self,
        app: Result<AppSource, LoadError>,
        init: &Command,
    ) -> Result<Option<ExitStatus>, RunnerError> {
        let loaded = match app.and_then(|source| self.loader.load(source)) {
            Ok(loaded) => loaded,
            Err(error) => return Ok(Some(self.fail_load(&error))),
        };
        let handler_count = loaded.handlers.len();
        self.dispatcher.install(loaded.handlers, loaded.context);
        self.state = RuntimeState::Ready;
        self.reporter.app_ready(handler_count);

        let flow = self.dispatcher.dispatch_init(init)?;
        if let Some(status) = self.settle(flow)? {
            return Ok(Some(status));
        }
        while let Some(command) = self.backlog.pop_front() {
            if let Some(status) = self.handle_ready(&command)? {
                return Ok(Some(status));
            }
        }
        Ok(None)
    }

    /// Runs scheduled turns after a dispatch and applies termination.
    fn settle(&mut self, flow: Flow) -> Result<Option<ExitStatus>, RunnerError> {
        let outcome = match flow {
            Flow::Terminate => Flow::Terminate,
            Flow::Continue => self.dispatcher.run_scheduled()?,
        };
        match outcome {
            Flow::Continue => Ok(None),
            Flow::Terminate => {
                self.state = RuntimeState::Terminating;
                self.reporter.terminating();
                Ok(Some(self.finish_with(ExitStatus::Clean)))
            }
        }
    }

    fn fail_load(&mut self, error: &LoadError) -> ExitStatus {
        self.reporter.load_failed(error);
        let diagnostic = log_payload(format!("Failed to load application: {error}"));
        if let Err(write_error) = self
            .dispatcher
            .write_direct(LogLevel::Error.command(), diagnostic)
        {
            warn!(
                target: LIFECYCLE_TARGET,
                error = %write_error,
                "failed to report load failure"
            );
        }
        self.finish_with(ExitStatus::LoadFailed)
    }

    fn violation(&mut self, violation: &ProtocolViolation) -> Result<(), RunnerError> {
        self.reporter.protocol_violation(violation);
        self.dispatcher
            .write_direct(LogLevel::Warning.command(), log_payload(violation.to_string()))
    }

    fn write_status(&mut self, status: &str) -> Result<(), RunnerError> {
        self.dispatcher
            .write_direct(LogLevel::Info.command(), log_payload(status))
    }

    fn finish_with(&mut self, status: ExitStatus) -> ExitStatus {
        self.state = RuntimeState::Terminated;
        self.exit = Some(status);
        status
    }
}

impl<W> fmt::Debug for Controller<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.state)
            .field("exit", &self.exit)
            .field("options", &self.options)
            .field("dispatcher", &self.dispatcher)
            .field("backlog", &self.backlog.len())
            .finish_non_exhaustive()
    }
}
