//! Test harness utilities shared by the runner suites.

use std::cell::RefCell;
use std::ffi::OsString;
use std::sync::{Arc, Mutex};

use ortho_config::{OrthoConfig, OrthoError};
use serde_json::{Value, json};

use warden_config::{Config, PreReadyPolicy};
use warden_protocol::{FrameError, ParseError};

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::error::{LoadError, ProtocolViolation};
use crate::lifecycle::{ExitStatus, Runner, RunnerOptions};
use crate::loader::Loader;
use crate::reporter::LifecycleReporter;

/// Script used by most suites: greets on init, echoes unknown commands and
/// ends the session once the host acknowledges an inbound message.
pub fn demo_script() -> String {
    json!({
        "on_init": [{"log": {"msg": "From init!"}}],
        "on_unknown": [{"log": {"msg": "Unknown command: {command.cmd}"}}],
        "on_inbound_message": [{"log": {
            "msg": "From command: {command.cmd}",
            "then": [
                {"log": {"msg": "Log successful: {command.success}"}},
                "done"
            ]
        }}]
    })
    .to_string()
}

/// Encodes an `initialize` record carrying `source`.
pub fn initialize_record(source: &str) -> String {
    line(&json!({"cmd": "initialize", "cmd_id": "init-1", "source": source}))
}

/// Encodes a plain command record.
pub fn command_record(name: &str, cmd_id: &str) -> String {
    line(&json!({"cmd": name, "cmd_id": cmd_id}))
}

/// Encodes a successful reply to request `cmd_id`.
pub fn reply_record(cmd_id: &str) -> String {
    line(&json!({"cmd": "log.info", "cmd_id": cmd_id, "reply": true, "success": true}))
}

fn line(value: &Value) -> String {
    format!("{value}\n")
}

/// Decodes every record written to `output`.
pub fn records(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|text| serde_json::from_str(text).expect("runner wrote invalid JSON"))
        .collect()
}

/// Extracts the `msg` field of every record that has one.
pub fn messages(output: &[u8]) -> Vec<String> {
    records(output)
        .iter()
        .filter_map(|record| record.get("msg").and_then(Value::as_str))
        .map(str::to_owned)
        .collect()
}

/// Builds a runner over an in-memory sink with a recording reporter.
pub fn recording_runner(
    options: RunnerOptions,
) -> (Runner<Vec<u8>>, Arc<RecordingLifecycleReporter>) {
    let reporter = Arc::new(RecordingLifecycleReporter::default());
    let runner = Runner::new(options, Loader::default(), Vec::new(), reporter.clone());
    (runner, reporter)
}

/// Loader that fails by passing an unknown pre-ready policy.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("warden-runner"),
            OsString::from("--pre-ready-policy"),
            OsString::from("sometimes"),
        ];
        Config::load_from_iter(args)
    }
}

/// Records lifecycle events for assertions.
#[derive(Default)]
pub struct RecordingLifecycleReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingLifecycleReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingLifecycleReporter {
    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(LifecycleEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(LifecycleEvent::BootstrapFailed(error.to_string()));
    }

    fn runner_starting(&self) {
        self.record(LifecycleEvent::RunnerStarting);
    }

    fn app_loading(&self) {
        self.record(LifecycleEvent::AppLoading);
    }

    fn app_ready(&self, handlers: usize) {
        self.record(LifecycleEvent::AppReady(handlers));
    }

    fn load_failed(&self, error: &LoadError) {
        self.record(LifecycleEvent::LoadFailed(error.to_string()));
    }

    fn frame_rejected(&self, error: &FrameError) {
        self.record(LifecycleEvent::FrameRejected(error.to_string()));
    }

    fn record_rejected(&self, error: &ParseError) {
        self.record(LifecycleEvent::RecordRejected(error.to_string()));
    }

    fn protocol_violation(&self, violation: &ProtocolViolation) {
        self.record(LifecycleEvent::Violation(violation.clone()));
    }

    fn terminating(&self) {
        self.record(LifecycleEvent::Terminating);
    }

    fn input_closed(&self) {
        self.record(LifecycleEvent::InputClosed);
    }
}

/// Lifecycle events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Bootstrap completed.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The runner started.
    RunnerStarting,
    /// Application source is being loaded.
    AppLoading,
    /// The application is ready with this many handlers.
    AppReady(usize),
    /// Loading failed with an error description.
    LoadFailed(String),
    /// A record could not be framed.
    FrameRejected(String),
    /// A record could not be decoded.
    RecordRejected(String),
    /// Input arrived in the wrong state.
    Violation(ProtocolViolation),
    /// The terminal record was flushed.
    Terminating,
    /// Input ended early.
    InputClosed,
}

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    options: RunnerOptions,
    source: String,
    runner: Option<Runner<Vec<u8>>>,
    pub reporter: Arc<RecordingLifecycleReporter>,
    status: Option<ExitStatus>,
}

impl TestWorld {
    /// Builds a world running the demo script with default options.
    pub fn new() -> Self {
        Self {
            options: RunnerOptions::default(),
            source: demo_script(),
            runner: None,
            reporter: Arc::new(RecordingLifecycleReporter::default()),
            status: None,
        }
    }

    /// Selects how commands sent before `initialize` are handled.
    pub fn use_policy(&mut self, policy: PreReadyPolicy) {
        self.options.pre_ready_policy = policy;
    }

    /// Replaces the application source sent with `initialize`.
    pub fn use_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    /// Sends `initialize` with the configured source.
    pub fn send_initialize(&mut self) {
        let record = initialize_record(&self.source);
        self.send(&record);
    }

    /// Sends a command record.
    pub fn send_command(&mut self, name: &str) {
        self.send(&command_record(name, "host-1"));
    }

    /// Acknowledges request `cmd_id`.
    pub fn send_reply(&mut self, cmd_id: &str) {
        self.send(&reply_record(cmd_id));
    }

    /// Closes the input stream.
    pub fn close_input(&mut self) {
        if self.status.is_some() {
            return;
        }
        let status = self
            .runner()
            .finish()
            .expect("in-memory output cannot fail");
        self.status = Some(status);
    }

    /// Exit status, once the session has ended.
    pub const fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Records written so far.
    pub fn records(&self) -> Vec<Value> {
        self.runner
            .as_ref()
            .map(|runner| records(runner.output()))
            .unwrap_or_default()
    }

    /// Messages written so far.
    pub fn messages(&self) -> Vec<String> {
        self.runner
            .as_ref()
            .map(|runner| messages(runner.output()))
            .unwrap_or_default()
    }

    fn send(&mut self, record: &str) {
        let outcome = self
            .runner()
            .feed(record.as_bytes())
            .expect("in-memory output cannot fail");
        if outcome.is_some() {
            self.status = outcome;
        }
    }

    fn runner(&mut self) -> &mut Runner<Vec<u8>> {
        let options = self.options.clone();
        let reporter = self.reporter.clone();
        self.runner.get_or_insert_with(|| {
            let mut runner = Runner::new(options, Loader::default(), Vec::new(), reporter);
            runner.start().expect("in-memory output cannot fail");
            runner
        })
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a fresh world for a scenario.
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
