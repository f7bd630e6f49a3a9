//! The A2A semantic layer: messages, tasks, artifacts, agent cards.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub mod agent;
pub mod error;
pub mod message;
pub mod task;

pub use agent::{
    AgentCapabilities, AgentCard, AgentInterface, AgentProvider, AgentSkill, SecurityScheme,
    AGENT_PROTOCOL_VERSION,
};
pub use error::TaskError;
pub use message::{FileContent, Message, Part, Role};
pub use task::{Task, TaskState, TaskStatus};

/// An output produced by a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Unique identifier of the artifact
    pub artifact_id: String,

    /// Human-readable name
    pub name: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Contents, at least one part
    pub parts: Vec<Part>,

    /// Optional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Artifact {
    /// Create an artifact with a fresh identifier.
    pub fn new(name: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            artifact_id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            parts,
            metadata: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
