//! A2A message types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A message in the A2A layer.
///
/// Messages are the primary unit of agent-to-agent communication. Each
/// message has a role, one or more parts, and identifiers linking it to a
/// conversation context and optionally a task. Role and parts are fixed at
/// construction; the `with_*` methods return modified copies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Role of the sender
    pub role: Role,

    /// Content parts, in order
    pub parts: Vec<Part>,

    /// Identifier grouping a conversation
    pub context_id: String,

    /// Unique identifier of this message
    pub message_id: String,

    /// Optional link to a task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Optional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl Message {
    /// Create a message with the given role and parts. Context and message
    /// identifiers are freshly generated.
    pub fn create(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            parts,
            context_id: Uuid::new_v4().to_string(),
            message_id: Uuid::new_v4().to_string(),
            task_id: None,
            metadata: None,
        }
    }

    /// A user message with a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::create(Role::User, vec![Part::text(text)])
    }

    /// An agent message with a single text part.
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self::create(Role::Agent, vec![Part::text(text)])
    }

    /// Rebind the message to an existing conversation context.
    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = context_id.into();
        self
    }

    /// Link the message to a task.
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Add a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Concatenation of every text part, in order. Empty if there are none.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message from a user
    User,

    /// Message from an agent
    Agent,
}

/// File content for file parts: a MIME type plus exactly one of inline
/// base64 bytes or a URI reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    /// MIME type of the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Base64-encoded file content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<String>,

    /// URI reference to the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// A part of a message. Exactly one content variant is populated; the
/// `kind` tag on the wire reflects which.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    /// Text content
    Text {
        /// The text content
        text: String,
    },

    /// File reference
    File {
        /// The file content descriptor
        file: FileContent,
    },

    /// Structured data
    Data {
        /// The structured data
        data: Value,
    },
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a file part carrying inline base64 content.
    pub fn file_inline(mime_type: impl Into<String>, base64: impl Into<String>) -> Self {
        Self::File {
            file: FileContent {
                mime_type: Some(mime_type.into()),
                bytes: Some(base64.into()),
                uri: None,
            },
        }
    }

    /// Create a file part referencing a URI.
    pub fn file_uri(mime_type: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::File {
            file: FileContent {
                mime_type: Some(mime_type.into()),
                bytes: None,
                uri: Some(uri.into()),
            },
        }
    }

    /// Create a structured data part.
    pub fn data(data: Value) -> Self {
        Self::Data { data }
    }
}
