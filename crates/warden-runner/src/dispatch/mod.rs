//! Routing of inbound commands and replies to application code.
//!
//! A dispatch runs one piece of application code (a handler, a continuation
//! or a scheduled task) to completion and then releases everything it asked
//! for. Requests are written in emission order, each continuation is
//! registered after its request has been written, and the output is flushed
//! once the batch is out. Nothing a handler does can reach the wire while the
//! handler is still running.

mod writer;

use std::collections::VecDeque;
use std::fmt;
use std::io::Write;

use serde_json::{Map, Value};
use tracing::debug;
use warden_protocol::Command;

use crate::api::{SandboxApi, Task};
use crate::correlation::CorrelationRegistry;
use crate::error::RunnerError;
use crate::handler::HandlerTable;
use crate::queue::{DeferredQueue, DeferredRequest};

pub use writer::OutboundWriter;

/// Tracing target for dispatch events.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// What the runner should do after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading input.
    Continue,
    /// A terminal request has been written and flushed.
    Terminate,
}

/// Owns the handler table, pending replies and queues of one runner.
pub struct Dispatcher<W> {
    handlers: HandlerTable,
    context: Map<String, Value>,
    registry: CorrelationRegistry,
    queue: DeferredQueue,
    tasks: VecDeque<Task>,
    writer: OutboundWriter<W>,
}

impl<W: Write> Dispatcher<W> {
    /// Creates a dispatcher with no handlers, writing to `output`.
    #[must_use]
    pub fn new(output: W) -> Self {
        Self {
            handlers: HandlerTable::new(),
            context: Map::new(),
            registry: CorrelationRegistry::new(),
            queue: DeferredQueue::new(),
            tasks: VecDeque::new(),
            writer: OutboundWriter::new(output),
        }
    }

    /// Installs the loaded application's handlers and context.
    pub fn install(&mut self, handlers: HandlerTable, context: Map<String, Value>) {
        self.handlers = handlers;
        self.context = context;
    }

    /// Runs the initialisation handler, if any, with `command`.
    ///
    /// # Errors
    ///
    /// Returns an error if released requests cannot be written.
    pub fn dispatch_init(&mut self, command: &Command) -> Result<Flow, RunnerError> {
        if let Some(handler) = self.handlers.init() {
            let mut api = SandboxApi::new(
                &mut self.registry,
                &mut self.queue,
                &mut self.tasks,
                &self.context,
            );
            handler(&mut api, command);
        }
        self.release()
    }

    /// Runs the handler for an inbound command.
    ///
    /// Commands with neither a named nor a fallback handler are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if released requests cannot be written.
    pub fn dispatch_command(&mut self, command: &Command) -> Result<Flow, RunnerError> {
        let Some(handler) = self.handlers.lookup(command.name()) else {
            debug!(
                target: DISPATCH_TARGET,
                command = command.name(),
                "no handler for command"
            );
            return Ok(Flow::Continue);
        };
        debug!(
            target: DISPATCH_TARGET,
            command = command.name(),
            cmd_id = %command.cmd_id(),
            "dispatching command"
        );
        let mut api = SandboxApi::new(
            &mut self.registry,
            &mut self.queue,
            &mut self.tasks,
            &self.context,
        );
        handler(&mut api, command);
        self.release()
    }

    /// Runs the continuation registered for a reply's correlation id.
    ///
    /// Replies nobody is waiting for are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if released requests cannot be written.
    pub fn dispatch_reply(&mut self, reply: &Command) -> Result<Flow, RunnerError> {
        let Some(continuation) = self.registry.resolve(reply.cmd_id()) else {
            debug!(
                target: DISPATCH_TARGET,
                command = reply.name(),
                cmd_id = %reply.cmd_id(),
                "dropping reply with no pending request"
            );
            return Ok(Flow::Continue);
        };
        let mut api = SandboxApi::new(
            &mut self.registry,
            &mut self.queue,
            &mut self.tasks,
            &self.context,
        );
        continuation(&mut api, reply);
        self.release()
    }

    /// Runs scheduled tasks, each as its own dispatch, until none remain.
    ///
    /// Tasks scheduled by a task run in the same call.
    ///
    /// # Errors
    ///
    /// Returns an error if released requests cannot be written.
    pub fn run_scheduled(&mut self) -> Result<Flow, RunnerError> {
        while let Some(task) = self.tasks.pop_front() {
            let mut api = SandboxApi::new(
                &mut self.registry,
                &mut self.queue,
                &mut self.tasks,
                &self.context,
            );
            task(&mut api);
            if self.release()? == Flow::Terminate {
                self.tasks.clear();
                return Ok(Flow::Terminate);
            }
        }
        Ok(Flow::Continue)
    }

    /// Writes and flushes a command produced by the runner itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be written.
    pub fn write_direct(
        &mut self,
        name: &str,
        payload: Map<String, Value>,
    ) -> Result<(), RunnerError> {
        let command = Command::request(name, self.registry.next_id(), payload);
        self.writer.write_command(&command)?;
        self.writer.flush()
    }

    /// Writes every queued request and flushes.
    fn release(&mut self) -> Result<Flow, RunnerError> {
        let mut requests = self.queue.drain().into_iter();
        let mut flow = Flow::Continue;
        for request in requests.by_ref() {
            let DeferredRequest {
                command,
                continuation,
                terminal,
            } = request;
            self.writer.write_command(&command)?;
            if terminal {
                flow = Flow::Terminate;
                break;
            }
            if let Some(pending) = continuation {
                self.registry.register(command.cmd_id().clone(), pending);
            }
        }
        let discarded = requests.len();
        if discarded > 0 {
            debug!(
                target: DISPATCH_TARGET,
                discarded, "discarding requests issued after done"
            );
        }
        self.writer.flush()?;
        Ok(flow)
    }

    /// Number of requests awaiting a reply.
    #[must_use]
    pub fn pending_replies(&self) -> usize {
        self.registry.pending_len()
    }

    /// Number of tasks waiting for a later turn.
    #[must_use]
    pub fn scheduled_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// The installed handler table.
    #[must_use]
    pub const fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// Borrows the output stream.
    #[must_use]
    pub const fn output(&self) -> &W {
        self.writer.get_ref()
    }

    /// Returns the output stream.
    #[must_use]
    pub fn into_output(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> fmt::Debug for Dispatcher<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers)
            .field("registry", &self.registry)
            .field("queued", &self.queue)
            .field("scheduled_tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}
