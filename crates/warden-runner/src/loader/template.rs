//! Placeholder interpolation for script messages and payloads.
//!
//! `{command.<path>}` reads from the command being handled (`cmd`, `cmd_id`
//! and `reply` name the envelope, anything else the payload) and
//! `{context.<path>}` from the application context. Paths may descend into
//! nested objects with further dots. Missing values render as empty text and
//! braces that do not form a placeholder are kept verbatim.

use serde_json::{Map, Value};
use warden_protocol::Command;

const COMMAND_SCOPE: &str = "command.";
const CONTEXT_SCOPE: &str = "context.";

/// Expands every placeholder in `template`.
#[must_use]
pub fn render(template: &str, command: &Command, context: &Map<String, Value>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((before, after_open)) = rest.split_once('{') {
        output.push_str(before);
        let Some((inner, after_close)) = after_open.split_once('}') else {
            output.push('{');
            rest = after_open;
            break;
        };
        // Only the innermost `{` before this `}` can open a placeholder.
        let key = match inner.rsplit_once('{') {
            Some((literal, tail)) => {
                output.push('{');
                output.push_str(literal);
                tail
            }
            None => inner,
        };
        match lookup(key, command, context) {
            Some(value) => output.push_str(&value),
            None if is_placeholder(key) => {}
            None => {
                output.push('{');
                output.push_str(key);
                output.push('}');
            }
        }
        rest = after_close;
    }
    output.push_str(rest);
    output
}

/// Expands placeholders in every string inside `value`.
#[must_use]
pub fn render_value(value: &Value, command: &Command, context: &Map<String, Value>) -> Value {
    match value {
        Value::String(text) => Value::String(render(text, command, context)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| render_value(item, command, context))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, item)| (key.clone(), render_value(item, command, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_placeholder(key: &str) -> bool {
    key.starts_with(COMMAND_SCOPE) || key.starts_with(CONTEXT_SCOPE)
}

fn lookup(key: &str, command: &Command, context: &Map<String, Value>) -> Option<String> {
    if let Some(path) = key.strip_prefix(COMMAND_SCOPE) {
        let (field, nested) = split_path(path);
        let root = match field {
            "cmd" => Value::String(command.name().to_owned()),
            "cmd_id" => Value::String(command.cmd_id().to_string()),
            "reply" => Value::Bool(command.is_reply()),
            _ => command.get(field)?.clone(),
        };
        return descend(&root, nested).map(display);
    }
    let path = key.strip_prefix(CONTEXT_SCOPE)?;
    let (field, nested) = split_path(path);
    descend(context.get(field)?, nested).map(display)
}

fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, tail)) => (head, Some(tail)),
        None => (path, None),
    }
}

fn descend<'a>(value: &'a Value, path: Option<&str>) -> Option<&'a Value> {
    let Some(segments) = path else {
        return Some(value);
    };
    segments
        .split('.')
        .try_fold(value, |current, segment| current.get(segment))
}

fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
