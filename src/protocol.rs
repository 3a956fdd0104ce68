//! Wire types for the line-delimited JSON protocol.
//!
//! Each request line is a JSON object with an `action` field; each response line is one
//! of the [`Response`] shapes. Commands are decoded by hand from a `serde_json::Value`
//! rather than with a tagged serde enum, because an unrecognized or missing action is a
//! regular command ([`Command::Unknown`]) and must not be a decode error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::transcript::{Sentence, Transcript};

pub const ACTION_PING: &str = "ping";
pub const ACTION_TRANSCRIBE: &str = "transcribe";
pub const ACTION_QUIT: &str = "quit";

/// Stringified form of an absent or `null` action in `Unknown action: ...` messages.
const MISSING_ACTION: &str = "None";

/// One decoded request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Quit,
    /// `audio_path` is `None` when the field is missing or falsy (`null`, `""`, `0`, `false`,
    /// `[]`, `{}`). Other non-string values carry their JSON text.
    Transcribe { audio_path: Option<String> },
    /// Anything else, carrying the stringified `action` for the error message.
    Unknown(String),
}

impl Command {
    /// Parse one input line.
    ///
    /// Fails with [`Error::InvalidJson`] when the line is not JSON at all, and with
    /// [`Error::Server`] when it is JSON but not an object.
    pub fn parse(line: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(line.trim()).map_err(|e| Error::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let Some(obj) = value.as_object() else {
            return Err(Error::Server(format!(
                "expected a JSON object, got {}",
                json_kind(value)
            )));
        };

        let action = obj.get("action");
        let command = match action.and_then(Value::as_str) {
            Some(ACTION_PING) => Self::Ping,
            Some(ACTION_QUIT) => Self::Quit,
            Some(ACTION_TRANSCRIBE) => Self::Transcribe {
                audio_path: audio_path_field(obj),
            },
            _ => Self::Unknown(describe_action(action)),
        };

        Ok(command)
    }

    /// Encode this command as the JSON object a client writes.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Ping => json!({ "action": ACTION_PING }),
            Self::Quit => json!({ "action": ACTION_QUIT }),
            Self::Transcribe {
                audio_path: Some(path),
            } => json!({ "action": ACTION_TRANSCRIBE, "audio_path": path }),
            Self::Transcribe { audio_path: None } => json!({ "action": ACTION_TRANSCRIBE }),
            Self::Unknown(action) => json!({ "action": action }),
        }
    }

    /// The action name, as used in logs.
    pub fn action(&self) -> &str {
        match self {
            Self::Ping => ACTION_PING,
            Self::Quit => ACTION_QUIT,
            Self::Transcribe { .. } => ACTION_TRANSCRIBE,
            Self::Unknown(action) => action,
        }
    }
}

fn audio_path_field(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("audio_path")? {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(fields) if fields.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn describe_action(action: Option<&Value>) -> String {
    match action {
        None | Some(Value::Null) => MISSING_ACTION.to_owned(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One response line.
///
/// Serialized untagged, so each variant's fields are the whole JSON object. Variant order
/// matters for deserialization: the most specific shape comes first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Transcription {
        success: bool,
        text: String,
        sentences: Vec<Sentence>,
    },
    Message {
        success: bool,
        message: String,
    },
    Error {
        error: String,
    },
}

impl Response {
    pub fn pong() -> Self {
        Self::message("pong")
    }

    pub fn shutting_down() -> Self {
        Self::message("Shutting down")
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            success: true,
            message: message.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Self::Transcription { success, .. } | Self::Message { success, .. } => *success,
            Self::Error { .. } => false,
        }
    }

    /// The error message, if this is an error response.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }
}

impl From<Transcript> for Response {
    fn from(t: Transcript) -> Self {
        Self::Transcription {
            success: true,
            text: t.text,
            sentences: t.sentences,
        }
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        Self::error(err.to_string())
    }
}
