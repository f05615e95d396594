//! Requests held back until the running handler returns.

use std::fmt;

use warden_protocol::Command;

use crate::api::Continuation;

/// An outbound request emitted by application code during one dispatch.
pub struct DeferredRequest {
    /// Command to write.
    pub command: Command,
    /// Continuation to register once the command has been written.
    pub continuation: Option<Continuation>,
    /// Whether the runner terminates after writing this command.
    pub terminal: bool,
}

impl DeferredRequest {
    /// Wraps a command that expects no reply handling.
    #[must_use]
    pub const fn new(command: Command) -> Self {
        Self {
            command,
            continuation: None,
            terminal: false,
        }
    }

    /// Attaches a continuation.
    #[must_use]
    pub fn with_continuation(mut self, continuation: Continuation) -> Self {
        self.continuation = Some(continuation);
        self
    }

    /// Marks the request as the last one the runner writes.
    #[must_use]
    pub const fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

impl fmt::Debug for DeferredRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRequest")
            .field("command", &self.command)
            .field("has_continuation", &self.continuation.is_some())
            .field("terminal", &self.terminal)
            .finish()
    }
}

/// FIFO buffer of [`DeferredRequest`]s.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    requests: Vec<DeferredRequest>,
}

impl DeferredQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request.
    pub fn enqueue(&mut self, request: DeferredRequest) {
        self.requests.push(request);
    }

    /// Empties the queue, returning requests in the order they were enqueued.
    pub fn drain(&mut self) -> Vec<DeferredRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Whether any requests are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
