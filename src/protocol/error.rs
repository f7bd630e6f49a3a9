//! Errors raised by the A2A model types

use thiserror::Error;

use super::task::TaskState;

/// Why a task mutation was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task already reached a terminal state
    #[error("cannot leave terminal state {from:?} for {to:?}")]
    TerminalTransition {
        /// Terminal state the task is in
        from: TaskState,
        /// State the caller asked for
        to: TaskState,
    },
}
