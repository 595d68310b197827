//! Error types for deflow.

use thiserror::Error;

use crate::identity::Identity;

/// A `Result` alias with [`enum@Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a decision cycle or a workflow definition.
///
/// Business failures (an activity failed, a lambda timed out) are never
/// reported through this type. They are history data and resolve to
/// decisions through the default action of the corresponding event.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to serialize or deserialize a control blob or wire payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration argument was empty or otherwise invalid.
    #[error("invalid argument `{argument}`: {message}")]
    InvalidArgument {
        /// Name of the offending argument.
        argument: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The same item identity was configured more than once.
    #[error("workflow item {0} is configured more than once")]
    DuplicateItem(Identity),

    /// An item declares a parent that is not part of the workflow.
    #[error("workflow item {item} depends on {parent}, which is not part of the workflow")]
    UnknownParent {
        /// The item declaring the dependency.
        item: Identity,
        /// The missing parent.
        parent: Identity,
    },

    /// The item graph is not a DAG.
    ///
    /// Carries the first item found on the cycle, which is the item itself
    /// for a self-referencing parent.
    #[error("cyclic dependency detected at workflow item {0}")]
    CyclicDependency(Identity),

    /// A jump target lies outside of the jumping item's parent and child branches.
    #[error("cannot jump from {jump_from} to {jump_to}: target is not in the same branch")]
    OutOfBranchJump {
        /// Item the jump originates from.
        jump_from: Identity,
        /// Requested target.
        jump_to: Identity,
    },

    /// An action or lookup referenced an item the workflow does not define.
    #[error("workflow item {0} is not part of the workflow")]
    UnknownItem(Identity),

    /// A terminal event's originating event is missing from the supplied history.
    ///
    /// Signals that the caller supplied the wrong slice of history; it is
    /// never a business failure.
    #[error(
        "incomplete event graph: event {event_id} references {expected} event {reference_id}, which is not in the history"
    )]
    IncompleteEventGraph {
        /// The event being built.
        event_id: i64,
        /// Kind of the referenced event (e.g. `ActivityTaskScheduled`).
        expected: &'static str,
        /// The referenced event id.
        reference_id: i64,
    },

    /// The history has no `WorkflowExecutionStarted` event.
    #[error("incomplete event graph: history has no workflow started event")]
    MissingWorkflowStarted,

    /// The history contains an item event the current workflow definition
    /// does not know about (code/history version mismatch).
    #[error("incompatible workflow: {0}")]
    IncompatibleWorkflow(String),

    /// The operation is not supported for this event or item.
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl Error {
    /// Create an invalid argument error.
    pub fn invalid_argument(argument: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            argument,
            message: message.into(),
        }
    }

    /// Create an incomplete event graph error.
    pub fn incomplete_event_graph(event_id: i64, expected: &'static str, reference_id: i64) -> Self {
        Error::IncompleteEventGraph {
            event_id,
            expected,
            reference_id,
        }
    }

    /// Returns `true` for errors raised while defining a workflow.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument { .. }
                | Error::DuplicateItem(_)
                | Error::UnknownParent { .. }
                | Error::CyclicDependency(_)
                | Error::OutOfBranchJump { .. }
                | Error::UnknownItem(_)
        )
    }
}
