//! Response parsing for interpreter stdout.
//!
//! Every script prints one JSON object: a shape-specific payload field plus
//! an optional `error` string. [`ResponseParser`] decodes that object and
//! turns a reported error into the matching [`BridgeError`] variant.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::BridgeError;
use crate::types::{null_as_default, OperationAck, Project, Tag, Task, TaskCounts};

/// Error text the scripts emit when OmniFocus is not running.
pub const DEFAULT_NOT_RUNNING_MESSAGE: &str = "OmniFocus is not running";

// ---------------------------------------------------------------------------
// Wire envelopes
// ---------------------------------------------------------------------------

/// A decoded envelope: its reported error and its payload.
trait Envelope: DeserializeOwned {
    type Payload;

    fn error(&self) -> Option<&str>;

    /// The payload, or a description of what is missing.
    fn into_payload(self) -> Result<Self::Payload, String>;
}

macro_rules! collection_envelope {
    ($envelope:ident, $field:ident, $item:ty) => {
        #[derive(Deserialize)]
        struct $envelope {
            #[serde(default, deserialize_with = "null_as_default")]
            $field: Vec<$item>,
            #[serde(default)]
            error: Option<String>,
        }

        impl Envelope for $envelope {
            type Payload = Vec<$item>;

            fn error(&self) -> Option<&str> {
                self.error.as_deref()
            }

            fn into_payload(self) -> Result<Self::Payload, String> {
                Ok(self.$field)
            }
        }
    };
}

macro_rules! item_envelope {
    ($envelope:ident, $field:ident, $item:ty) => {
        #[derive(Deserialize)]
        struct $envelope {
            #[serde(default)]
            $field: Option<$item>,
            #[serde(default)]
            error: Option<String>,
        }

        impl Envelope for $envelope {
            type Payload = $item;

            fn error(&self) -> Option<&str> {
                self.error.as_deref()
            }

            fn into_payload(self) -> Result<Self::Payload, String> {
                self.$field
                    .ok_or_else(|| format!("missing `{}` field", stringify!($field)))
            }
        }
    };
}

collection_envelope!(TasksEnvelope, tasks, Task);
collection_envelope!(ProjectsEnvelope, projects, Project);
collection_envelope!(TagsEnvelope, tags, Tag);
item_envelope!(TaskEnvelope, task, Task);
item_envelope!(ProjectEnvelope, project, Project);
item_envelope!(TagEnvelope, tag, Tag);

#[derive(Deserialize)]
struct AckEnvelope {
    #[serde(default, deserialize_with = "null_as_default")]
    success: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    message: String,
    #[serde(default)]
    error: Option<String>,
}

impl Envelope for AckEnvelope {
    type Payload = OperationAck;

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn into_payload(self) -> Result<Self::Payload, String> {
        Ok(OperationAck {
            success: self.success,
            id: self.id,
            message: self.message,
        })
    }
}

#[derive(Deserialize)]
struct CountsEnvelope {
    #[serde(default, deserialize_with = "null_as_default")]
    counts: TaskCounts,
    #[serde(default)]
    error: Option<String>,
}

impl Envelope for CountsEnvelope {
    type Payload = TaskCounts;

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn into_payload(self) -> Result<Self::Payload, String> {
        Ok(self.counts)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Decodes interpreter stdout into typed payloads.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    not_running_message: String,
}

impl ResponseParser {
    /// A parser that maps exactly `not_running_message` to
    /// [`BridgeError::NotAvailable`].
    pub fn new(not_running_message: impl Into<String>) -> Self {
        Self {
            not_running_message: not_running_message.into(),
        }
    }

    pub fn parse_tasks(&self, text: &str) -> Result<Vec<Task>, BridgeError> {
        self.parse::<TasksEnvelope>(text)
    }

    pub fn parse_task(&self, text: &str) -> Result<Task, BridgeError> {
        self.parse::<TaskEnvelope>(text)
    }

    pub fn parse_projects(&self, text: &str) -> Result<Vec<Project>, BridgeError> {
        self.parse::<ProjectsEnvelope>(text)
    }

    pub fn parse_project(&self, text: &str) -> Result<Project, BridgeError> {
        self.parse::<ProjectEnvelope>(text)
    }

    pub fn parse_tags(&self, text: &str) -> Result<Vec<Tag>, BridgeError> {
        self.parse::<TagsEnvelope>(text)
    }

    pub fn parse_tag(&self, text: &str) -> Result<Tag, BridgeError> {
        self.parse::<TagEnvelope>(text)
    }

    pub fn parse_ack(&self, text: &str) -> Result<OperationAck, BridgeError> {
        self.parse::<AckEnvelope>(text)
    }

    pub fn parse_counts(&self, text: &str) -> Result<TaskCounts, BridgeError> {
        self.parse::<CountsEnvelope>(text)
    }

    fn parse<E: Envelope>(&self, text: &str) -> Result<E::Payload, BridgeError> {
        let envelope: E = serde_json::from_str(text.trim())
            .map_err(|e| BridgeError::MalformedResponse(e.to_string()))?;

        match envelope.error() {
            Some(msg) if msg == self.not_running_message => return Err(BridgeError::NotAvailable),
            Some(msg) if !msg.is_empty() => {
                return Err(BridgeError::ApplicationReported(msg.to_string()))
            }
            _ => {}
        }

        envelope
            .into_payload()
            .map_err(BridgeError::MalformedResponse)
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(DEFAULT_NOT_RUNNING_MESSAGE)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
