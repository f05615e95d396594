//! Capability surface handed to application logic.
//!
//! Application code never touches the output channel. Every operation on
//! [`SandboxApi`] only records intent: requests land in the deferred queue and
//! tasks in the turn queue, and the dispatcher releases both once the calling
//! handler has returned.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use warden_protocol::{Command, CorrelationId};

use crate::correlation::CorrelationRegistry;
use crate::queue::{DeferredQueue, DeferredRequest};

/// Function invoked with the reply to an earlier request.
pub type Continuation = Box<dyn FnOnce(&mut SandboxApi<'_>, &Command)>;

/// Function invoked for an inbound command.
pub type Handler = Box<dyn Fn(&mut SandboxApi<'_>, &Command)>;

/// Work scheduled for a later turn of the dispatch loop.
pub type Task = Box<dyn FnOnce(&mut SandboxApi<'_>)>;

/// Message logged by [`SandboxApi::done`].
pub const DONE_MESSAGE: &str = "Done.";

/// Severity of a log request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogLevel {
    /// `log.debug`.
    Debug,
    /// `log.info`.
    #[default]
    Info,
    /// `log.warning`.
    Warning,
    /// `log.error`.
    Error,
    /// `log.critical`.
    Critical,
}

impl LogLevel {
    /// Command name carrying a message at this level.
    #[must_use]
    pub const fn command(self) -> &'static str {
        match self {
            Self::Debug => "log.debug",
            Self::Info => "log.info",
            Self::Warning => "log.warning",
            Self::Error => "log.error",
            Self::Critical => "log.critical",
        }
    }
}

/// Builds the payload of a `log.*` request.
#[must_use]
pub fn log_payload(msg: impl Into<String>) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("msg".to_owned(), Value::String(msg.into()));
    payload
}

/// Operations available to application handlers and continuations.
pub struct SandboxApi<'a> {
    registry: &'a mut CorrelationRegistry,
    queue: &'a mut DeferredQueue,
    tasks: &'a mut VecDeque<Task>,
    context: &'a Map<String, Value>,
}

impl<'a> SandboxApi<'a> {
    pub(crate) const fn new(
        registry: &'a mut CorrelationRegistry,
        queue: &'a mut DeferredQueue,
        tasks: &'a mut VecDeque<Task>,
        context: &'a Map<String, Value>,
    ) -> Self {
        Self {
            registry,
            queue,
            tasks,
            context,
        }
    }

    /// Issues a fire-and-forget request. Returns the id it will carry.
    pub fn request(&mut self, name: &str, payload: Map<String, Value>) -> CorrelationId {
        self.enqueue(name, payload, None, false)
    }

    /// Issues a request whose reply is passed to `continuation`.
    pub fn request_then<F>(
        &mut self,
        name: &str,
        payload: Map<String, Value>,
        continuation: F,
    ) -> CorrelationId
    where
        F: FnOnce(&mut SandboxApi<'_>, &Command) + 'static,
    {
        self.enqueue(name, payload, Some(Box::new(continuation)), false)
    }

    /// Logs `msg` at `level`.
    pub fn log(&mut self, level: LogLevel, msg: impl Into<String>) -> CorrelationId {
        self.request(level.command(), log_payload(msg))
    }

    /// Logs `msg` at `level`, passing the host's acknowledgement to
    /// `continuation`.
    pub fn log_then<F>(
        &mut self,
        level: LogLevel,
        msg: impl Into<String>,
        continuation: F,
    ) -> CorrelationId
    where
        F: FnOnce(&mut SandboxApi<'_>, &Command) + 'static,
    {
        self.request_then(level.command(), log_payload(msg), continuation)
    }

    /// Logs `msg` at info level.
    pub fn log_info(&mut self, msg: impl Into<String>) -> CorrelationId {
        self.log(LogLevel::Info, msg)
    }

    /// Ends the session: the runner exits once `Done.` has been written.
    ///
    /// Requests issued after `done` within the same dispatch are discarded.
    pub fn done(&mut self) -> CorrelationId {
        self.enqueue(
            LogLevel::Info.command(),
            log_payload(DONE_MESSAGE),
            None,
            true,
        )
    }

    /// Schedules `task` to run as its own dispatch after the current one.
    pub fn defer<F>(&mut self, task: F)
    where
        F: FnOnce(&mut SandboxApi<'_>) + 'static,
    {
        self.tasks.push_back(Box::new(task));
    }

    /// Application context supplied at load time.
    #[must_use]
    pub const fn context(&self) -> &Map<String, Value> {
        self.context
    }

    fn enqueue(
        &mut self,
        name: &str,
        payload: Map<String, Value>,
        continuation: Option<Continuation>,
        terminal: bool,
    ) -> CorrelationId {
        let id = self.registry.next_id();
        let mut request = DeferredRequest::new(Command::request(name, id.clone(), payload));
        request.continuation = continuation;
        request.terminal = terminal;
        self.queue.enqueue(request);
        id
    }
}

impl fmt::Debug for SandboxApi<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxApi")
            .field("scheduled_tasks", &self.tasks.len())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Parts {
        registry: CorrelationRegistry,
        queue: DeferredQueue,
        tasks: VecDeque<Task>,
        context: Map<String, Value>,
    }

    impl Parts {
        fn api(&mut self) -> SandboxApi<'_> {
            SandboxApi::new(
                &mut self.registry,
                &mut self.queue,
                &mut self.tasks,
                &self.context,
            )
        }
    }

    #[rstest]
    #[case(LogLevel::Debug, "log.debug")]
    #[case(LogLevel::Info, "log.info")]
    #[case(LogLevel::Warning, "log.warning")]
    #[case(LogLevel::Error, "log.error")]
    #[case(LogLevel::Critical, "log.critical")]
    fn log_levels_map_to_commands(#[case] level: LogLevel, #[case] command: &str) {
        let mut parts = Parts::default();
        parts.api().log(level, "hello");
        let drained = parts.queue.drain();
        let request = drained.first().expect("request queued");
        assert_eq!(request.command.name(), command);
        assert_eq!(request.command.get("msg"), Some(&json!("hello")));
    }

    #[test]
    fn log_level_parses_from_text() {
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("CRITICAL".parse::<LogLevel>(), Ok(LogLevel::Critical));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn requests_are_queued_not_written() {
        let mut parts = Parts::default();
        {
            let mut api = parts.api();
            let first = api.log_info("one");
            let second = api.request_then("outbound.send", Map::new(), |_, _| {});
            assert_eq!(first.as_str(), "1");
            assert_eq!(second.as_str(), "2");
        }
        let drained = parts.queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained.first().is_some_and(|item| item.continuation.is_none()));
        assert!(drained.get(1).is_some_and(|item| item.continuation.is_some()));
        assert_eq!(parts.registry.pending_len(), 0);
    }

    #[test]
    fn done_queues_terminal_log() {
        let mut parts = Parts::default();
        parts.api().done();
        let drained = parts.queue.drain();
        let request = drained.first().expect("request queued");
        assert!(request.terminal);
        assert_eq!(request.command.name(), "log.info");
        assert_eq!(request.command.get("msg"), Some(&json!(DONE_MESSAGE)));
    }

    #[test]
    fn defer_schedules_task() {
        let mut parts = Parts::default();
        parts.api().defer(|api| {
            api.log_info("later");
        });
        assert_eq!(parts.tasks.len(), 1);
        assert!(parts.queue.is_empty());
    }
}
