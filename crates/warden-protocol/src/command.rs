//! Command envelope and its JSON line codec.
//!
//! Every record on the channel is a flat JSON object. Three keys form the
//! envelope: `cmd` (the command name), `cmd_id` (the correlation id) and
//! `reply` (whether the record answers an earlier request). Every other key is
//! payload.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EncodeError, ParseError};

/// Name of the command that carries application source to a runner.
pub const INITIALIZE_COMMAND: &str = "initialize";

const CMD_FIELD: &str = "cmd";
const CMD_ID_FIELD: &str = "cmd_id";
const REPLY_FIELD: &str = "reply";

/// Payload keys reserved for runner bookkeeping; never written to the wire.
pub const RESERVED_FIELDS: [&str; 2] = ["_last", "_callback"];

/// Identifier pairing a request with its reply.
///
/// Inbound records may carry the id as a JSON string or number; both are
/// normalised to their textual form so that `"7"` and `7` resolve alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Creates an id from its textual form.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for CorrelationId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// A single protocol record: request, command or reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    cmd_id: CorrelationId,
    reply: bool,
    payload: Map<String, Value>,
}

impl Command {
    /// Builds an outbound request (`reply: false`).
    #[must_use]
    pub fn request(
        name: impl Into<String>,
        cmd_id: impl Into<CorrelationId>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            cmd_id: cmd_id.into(),
            reply: false,
            payload,
        }
    }

    /// Builds the reply to this command, echoing its name and id.
    #[must_use]
    pub fn reply_to(&self, payload: Map<String, Value>) -> Self {
        Self {
            name: self.name.clone(),
            cmd_id: self.cmd_id.clone(),
            reply: true,
            payload,
        }
    }

    /// Command name as written on the wire.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Correlation id.
    #[must_use]
    pub const fn cmd_id(&self) -> &CorrelationId {
        &self.cmd_id
    }

    /// Whether this record answers an earlier request.
    #[must_use]
    pub const fn is_reply(&self) -> bool {
        self.reply
    }

    /// Whether this is the command carrying application source.
    #[must_use]
    pub fn is_initialize(&self) -> bool {
        !self.reply && self.name == INITIALIZE_COMMAND
    }

    /// Payload fields, excluding the envelope.
    #[must_use]
    pub const fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Looks up a payload field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    /// Parses one framed record.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the record is not a JSON object or its
    /// envelope fields are missing or mistyped.
    pub fn decode(record: &str) -> Result<Self, ParseError> {
        let value: Value =
            serde_json::from_str(record).map_err(|source| ParseError::InvalidJson { source })?;
        let Value::Object(mut payload) = value else {
            return Err(ParseError::NotAnObject);
        };

        let name = match payload.remove(CMD_FIELD) {
            Some(Value::String(name)) => name,
            Some(_) => {
                return Err(ParseError::InvalidField {
                    field: CMD_FIELD,
                    expected: "a string",
                });
            }
            None => return Err(ParseError::MissingField { field: CMD_FIELD }),
        };

        let cmd_id = match payload.remove(CMD_ID_FIELD) {
            Some(Value::String(id)) => CorrelationId(id),
            Some(Value::Number(id)) => CorrelationId(id.to_string()),
            Some(_) => {
                return Err(ParseError::InvalidField {
                    field: CMD_ID_FIELD,
                    expected: "a string or number",
                });
            }
            None => return Err(ParseError::MissingField { field: CMD_ID_FIELD }),
        };

        let reply = match payload.remove(REPLY_FIELD) {
            Some(Value::Bool(reply)) => reply,
            None | Some(Value::Null) => false,
            Some(_) => {
                return Err(ParseError::InvalidField {
                    field: REPLY_FIELD,
                    expected: "a boolean",
                });
            }
        };

        Ok(Self {
            name,
            cmd_id,
            reply,
            payload,
        })
    }

    /// Serialises the command as one newline-terminated JSON record.
    ///
    /// Envelope fields take precedence over payload keys of the same name and
    /// [`RESERVED_FIELDS`] are omitted. Other payload keys pass through
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] if serialisation fails.
    pub fn encode(&self) -> Result<String, EncodeError> {
        let mut object: Map<String, Value> = self
            .payload
            .iter()
            .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        object.insert(CMD_FIELD.to_owned(), Value::String(self.name.clone()));
        object.insert(
            CMD_ID_FIELD.to_owned(),
            Value::String(self.cmd_id.0.clone()),
        );
        object.insert(REPLY_FIELD.to_owned(), Value::Bool(self.reply));

        let mut line =
            serde_json::to_string(&Value::Object(object)).map_err(|source| EncodeError {
                name: self.name.clone(),
                source,
            })?;
        line.push('\n');
        Ok(line)
    }
}
