//! Acquisition and execution of application source.
//!
//! The runner never interprets application source itself. It hands an
//! [`AppSource`] to an [`ExecutionSandbox`], which runs it once and reports
//! the handlers it defined. [`ScriptSandbox`] is the bundled implementation;
//! native handler sets plug in through the same trait, including plain
//! closures.

mod script;
mod template;

use std::fs;

use camino::Utf8Path;
use serde_json::{Map, Value};
use warden_protocol::Command;

use crate::error::LoadError;
use crate::handler::HandlerTable;

pub use script::{Action, LogAction, RequestAction, ScriptSandbox};
pub use template::render;

/// Payload field carrying application source.
pub const SOURCE_FIELD: &str = "source";

/// Older name for [`SOURCE_FIELD`], still accepted.
pub const LEGACY_SOURCE_FIELD: &str = "javascript";

/// Payload field carrying the initial application context.
pub const CONTEXT_FIELD: &str = "app_context";

/// Application source and the context it starts with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppSource {
    /// Source text understood by the sandbox.
    pub source: String,
    /// Initial context, visible to handlers through the API surface.
    pub context: Map<String, Value>,
}

impl AppSource {
    /// Creates a source with an empty context.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            context: Map::new(),
        }
    }

    /// Extracts source and context from an `initialize` command.
    ///
    /// The context may be a JSON object or a string holding one.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::MissingSource`] when no source text is present and
    /// [`LoadError::InvalidContext`] when the context is not an object.
    pub fn from_initialize(command: &Command) -> Result<Self, LoadError> {
        let source = command
            .get(SOURCE_FIELD)
            .or_else(|| command.get(LEGACY_SOURCE_FIELD))
            .and_then(Value::as_str)
            .ok_or(LoadError::MissingSource)?;
        let context = match command.get(CONTEXT_FIELD) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(context)) => context.clone(),
            Some(Value::String(text)) => parse_context(text)?,
            Some(_) => {
                return Err(LoadError::invalid_context(
                    "expected an object or a string holding one",
                ));
            }
        };
        Ok(Self {
            source: source.to_owned(),
            context,
        })
    }

    /// Reads source from `path` and, optionally, a context object from
    /// `context_path`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Io`] when a file cannot be read and
    /// [`LoadError::InvalidContext`] when the context file is not an object.
    pub fn from_files(
        path: &Utf8Path,
        context_path: Option<&Utf8Path>,
    ) -> Result<Self, LoadError> {
        let source = read_file(path)?;
        let context = match context_path {
            Some(context_file) => parse_context(&read_file(context_file)?)?,
            None => Map::new(),
        };
        Ok(Self { source, context })
    }
}

fn read_file(path: &Utf8Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })
}

fn parse_context(text: &str) -> Result<Map<String, Value>, LoadError> {
    if text.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(text) {
        Ok(Value::Object(context)) => Ok(context),
        Ok(_) => Err(LoadError::invalid_context("expected a JSON object")),
        Err(error) => Err(LoadError::invalid_context(error.to_string())),
    }
}

/// Executes application source once and reports the handlers it defines.
pub trait ExecutionSandbox {
    /// Runs `app` and returns its handler table.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the source cannot be executed.
    fn load(&self, app: &AppSource) -> Result<HandlerTable, LoadError>;
}

impl<F> ExecutionSandbox for F
where
    F: Fn(&AppSource) -> Result<HandlerTable, LoadError>,
{
    fn load(&self, app: &AppSource) -> Result<HandlerTable, LoadError> {
        self(app)
    }
}

/// Handlers and context produced by a successful load.
#[derive(Debug)]
pub struct LoadedApp {
    /// Handlers defined by the application.
    pub handlers: HandlerTable,
    /// Context visible through the API surface.
    pub context: Map<String, Value>,
}

/// Runs application source through a sandbox.
pub struct Loader {
    sandbox: Box<dyn ExecutionSandbox>,
}

impl Loader {
    /// Wraps a sandbox.
    #[must_use]
    pub fn new(sandbox: Box<dyn ExecutionSandbox>) -> Self {
        Self { sandbox }
    }

    /// Executes `app` in the sandbox.
    ///
    /// # Errors
    ///
    /// Propagates the sandbox's [`LoadError`].
    pub fn load(&self, app: AppSource) -> Result<LoadedApp, LoadError> {
        let handlers = self.sandbox.load(&app)?;
        Ok(LoadedApp {
            handlers,
            context: app.context,
        })
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(Box::new(ScriptSandbox))
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader").finish_non_exhaustive()
    }
}
