//! A2A task types and lifecycle management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::TaskError;
use super::message::Message;
use super::Artifact;

/// A task in the A2A layer.
///
/// Tasks represent asynchronous operations performed by agents. A task
/// moves from `Submitted` through `Working` (possibly pausing in
/// `InputRequired`) to one of the terminal states; transitions out of a
/// terminal state are rejected. Tasks are mutated only by their creator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task
    pub id: String,

    /// Conversation context the task belongs to
    pub context_id: String,

    /// Current status
    pub status: TaskStatus,

    /// Artifacts produced by the task, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    /// Messages exchanged while working on the task, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Message>,
}

impl Task {
    /// Create a task in `Submitted` with fresh identifiers.
    pub fn new() -> Self {
        Self::for_context(Uuid::new_v4().to_string())
    }

    /// Create a task in `Submitted` bound to an existing context.
    pub fn for_context(context_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            context_id: context_id.into(),
            status: TaskStatus::now(TaskState::Submitted),
            artifacts: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Replace the status, stamping the transition time.
    ///
    /// Rejects any transition out of a terminal state.
    pub fn set_status(
        &mut self,
        state: TaskState,
        message: Option<Message>,
    ) -> Result<(), TaskError> {
        if self.status.state.is_terminal() {
            return Err(TaskError::TerminalTransition {
                from: self.status.state,
                to: state,
            });
        }
        self.status = TaskStatus {
            state,
            message,
            timestamp: Utc::now(),
        };
        Ok(())
    }

    /// Append an artifact.
    ///
    /// Allowed after a terminal transition so late-delivered artifacts are
    /// not lost, but callers should treat that as unusual.
    pub fn add_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    /// Append a message to the task history.
    pub fn add_message(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Whether the task has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.status.state.is_terminal()
    }

    /// Whether the task is paused waiting for client input.
    pub fn needs_input(&self) -> bool {
        self.status.state == TaskState::InputRequired
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

/// Status of a task: the state plus an optional status message and the
/// time of the last transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    /// Lifecycle state
    pub state: TaskState,

    /// Optional message accompanying the transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,

    /// When the state was entered
    pub timestamp: DateTime<Utc>,
}

impl TaskStatus {
    fn now(state: TaskState) -> Self {
        Self {
            state,
            message: None,
            timestamp: Utc::now(),
        }
    }
}

/// Task lifecycle state.
///
/// `Submitted` → `Working` → (`InputRequired` → `Working`)* →
/// `Completed` | `Failed` | `Canceled`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Received and queued for processing
    Submitted,

    /// Being processed
    Working,

    /// Paused waiting for additional client input
    InputRequired,

    /// Finished successfully
    Completed,

    /// Finished with an error
    Failed,

    /// Canceled by the client
    Canceled,
}

impl TaskState {
    /// Whether this state ends the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}
