//! Sandboxed application runner.
//!
//! The runner loads untrusted application logic, exposes it only the
//! [`SandboxApi`] capability surface and brokers every interaction with the
//! host over a line-delimited JSON channel on standard input and output.
//!
//! Inbound bytes are framed and decoded by [`warden_protocol`]. Commands are
//! routed by name to the handlers the application defined at load time, and
//! replies are routed by correlation id to the continuation that awaits them.
//! Whatever a handler asks for is held back until it returns, then written in
//! order and flushed, so side effects of two dispatches never interleave.
//! The session ends when the application calls [`SandboxApi::done`], when
//! loading fails, or when input closes.
//!
//! Application source is executed by an [`ExecutionSandbox`]. The bundled
//! [`ScriptSandbox`] interprets declarative JSON scripts; native handler sets
//! plug in through the same trait.

mod api;
mod bootstrap;
mod correlation;
mod dispatch;
mod error;
mod handler;
mod lifecycle;
mod loader;
mod queue;
mod reporter;
mod telemetry;

pub use api::{Continuation, DONE_MESSAGE, Handler, LogLevel, SandboxApi, Task, log_payload};
pub use bootstrap::{
    BootstrapError, ConfigLoader, Session, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use correlation::CorrelationRegistry;
pub use dispatch::{Dispatcher, Flow, OutboundWriter};
pub use error::{LoadError, ProtocolViolation, RunnerError};
pub use handler::{HANDLER_PREFIX, HandlerTable, INIT_HANDLER, UNKNOWN_HANDLER, handler_name};
pub use lifecycle::{ExitStatus, Runner, RunnerOptions, RuntimeState};
pub use loader::{
    Action, AppSource, ExecutionSandbox, LoadedApp, Loader, LogAction, RequestAction,
    ScriptSandbox, render,
};
pub use queue::{DeferredQueue, DeferredRequest};
pub use reporter::{LifecycleReporter, StructuredLifecycleReporter};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
