//! Declarative script sandbox.
//!
//! A script is a JSON object mapping handler names to action lists:
//!
//! ```json
//! {
//!   "on_init": [{"log": {"msg": "From init!"}}],
//!   "on_inbound_message": [
//!     {"log": {"msg": "From command: {command.cmd}", "then": [
//!       {"log": {"msg": "Log successful: {command.success}"}},
//!       "done"
//!     ]}}
//!   ]
//! }
//! ```
//!
//! Actions reach nothing but the [`SandboxApi`]. Inside a `then` list the
//! `command` placeholders refer to the reply being handled.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Deserialize;
use serde_json::{Map, Value};
use warden_protocol::Command;

use super::template::{render, render_value};
use super::{AppSource, ExecutionSandbox};
use crate::api::{LogLevel, SandboxApi};
use crate::error::LoadError;
use crate::handler::{HANDLER_PREFIX, HandlerTable};

/// One step of a script handler.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Issue a `log.<level>` request.
    Log(LogAction),
    /// Issue an arbitrary request.
    Request(RequestAction),
    /// Run the nested actions as a later, separate dispatch.
    Defer(Vec<Action>),
    /// End the session.
    Done,
}

/// Parameters of [`Action::Log`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogAction {
    /// Message template.
    pub msg: String,
    /// Severity.
    #[serde(default)]
    pub level: LogLevel,
    /// Actions run with the host's acknowledgement.
    #[serde(default)]
    pub then: Option<Vec<Action>>,
}

/// Parameters of [`Action::Request`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestAction {
    /// Command name.
    pub cmd: String,
    /// Payload; string values are templates.
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Actions run with the reply.
    #[serde(default)]
    pub then: Option<Vec<Action>>,
}

/// Sandbox that interprets declarative scripts.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptSandbox;

impl ScriptSandbox {
    /// Parses `source` into handler action lists without running anything.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Source`] when the source is not a script or names
    /// a handler without the `on_` prefix.
    pub fn parse(source: &str) -> Result<BTreeMap<String, Vec<Action>>, LoadError> {
        let script: BTreeMap<String, Vec<Action>> = serde_json::from_str(source)
            .map_err(|error| LoadError::source_rejected(format!("invalid script: {error}")))?;
        if let Some(name) = script.keys().find(|name| !name.starts_with(HANDLER_PREFIX)) {
            return Err(LoadError::source_rejected(format!(
                "handler '{name}' must start with '{HANDLER_PREFIX}'"
            )));
        }
        Ok(script)
    }
}

impl ExecutionSandbox for ScriptSandbox {
    fn load(&self, app: &AppSource) -> Result<HandlerTable, LoadError> {
        let mut table = HandlerTable::new();
        for (name, actions) in Self::parse(&app.source)? {
            let actions: Rc<[Action]> = actions.into();
            table.insert(
                name,
                Box::new(move |api: &mut SandboxApi<'_>, command: &Command| {
                    perform(&actions, api, command);
                }),
            );
        }
        Ok(table)
    }
}

fn perform(actions: &[Action], api: &mut SandboxApi<'_>, command: &Command) {
    for action in actions {
        match action {
            Action::Log(log) => {
                let msg = render(&log.msg, command, api.context());
                match continuation(log.then.as_ref()) {
                    Some(then) => {
                        api.log_then(log.level, msg, move |next, reply| {
                            perform(&then, next, reply);
                        });
                    }
                    None => {
                        api.log(log.level, msg);
                    }
                }
            }
            Action::Request(request) => {
                let payload = render_payload(&request.payload, command, api.context());
                match continuation(request.then.as_ref()) {
                    Some(then) => {
                        api.request_then(&request.cmd, payload, move |next, reply| {
                            perform(&then, next, reply);
                        });
                    }
                    None => {
                        api.request(&request.cmd, payload);
                    }
                }
            }
            Action::Defer(later) => {
                let deferred: Rc<[Action]> = later.clone().into();
                let origin = command.clone();
                api.defer(move |next| perform(&deferred, next, &origin));
            }
            Action::Done => {
                api.done();
            }
        }
    }
}

fn continuation(then: Option<&Vec<Action>>) -> Option<Rc<[Action]>> {
    then.map(|actions| Rc::from(actions.as_slice()))
}

fn render_payload(
    payload: &Map<String, Value>,
    command: &Command,
    context: &Map<String, Value>,
) -> Map<String, Value> {
    payload
        .iter()
        .map(|(key, value)| (key.clone(), render_value(value, command, context)))
        .collect()
}
