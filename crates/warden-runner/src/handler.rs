//! Handler table built once at load time.

use std::collections::HashMap;
use std::fmt;

use warden_protocol::Command;

use crate::api::{Handler, SandboxApi};

/// Prefix shared by every handler name.
pub const HANDLER_PREFIX: &str = "on_";

/// Handler run once after the application loads.
pub const INIT_HANDLER: &str = "on_init";

/// Handler receiving commands with no dedicated handler.
pub const UNKNOWN_HANDLER: &str = "on_unknown";

/// Maps a command name to the name of its handler.
///
/// Every `.` and `-` becomes `_`, so `inbound-message` and `inbound.message`
/// both route to `on_inbound_message`.
#[must_use]
pub fn handler_name(command: &str) -> String {
    let mut name = String::with_capacity(HANDLER_PREFIX.len() + command.len());
    name.push_str(HANDLER_PREFIX);
    name.extend(
        command
            .chars()
            .map(|ch| if matches!(ch, '.' | '-') { '_' } else { ch }),
    );
    name
}

/// Handlers defined by the loaded application, keyed by handler name.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
}

impl HandlerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for the command called `command`.
    #[must_use]
    pub fn on<F>(mut self, command: &str, handler: F) -> Self
    where
        F: Fn(&mut SandboxApi<'_>, &Command) + 'static,
    {
        self.insert(handler_name(command), Box::new(handler));
        self
    }

    /// Registers the initialisation handler.
    #[must_use]
    pub fn on_init<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut SandboxApi<'_>, &Command) + 'static,
    {
        self.insert(INIT_HANDLER.to_owned(), Box::new(handler));
        self
    }

    /// Registers the fallback handler.
    #[must_use]
    pub fn on_unknown<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut SandboxApi<'_>, &Command) + 'static,
    {
        self.insert(UNKNOWN_HANDLER.to_owned(), Box::new(handler));
        self
    }

    /// Registers a handler under an already normalised handler name.
    pub fn insert(&mut self, name: String, handler: Handler) {
        self.handlers.insert(name, handler);
    }

    /// The initialisation handler, if defined.
    #[must_use]
    pub fn init(&self) -> Option<&Handler> {
        self.handlers.get(INIT_HANDLER)
    }

    /// Finds the handler for `command`, falling back to the unknown handler.
    ///
    /// The initialisation handler is never selected by name; it runs once,
    /// at load time.
    #[must_use]
    pub fn lookup(&self, command: &str) -> Option<&Handler> {
        let name = handler_name(command);
        self.handlers
            .get(&name)
            .filter(|_| name != INIT_HANDLER)
            .or_else(|| self.handlers.get(UNKNOWN_HANDLER))
    }

    /// Whether a handler named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerTable")
            .field("handlers", &names)
            .finish()
    }
}
