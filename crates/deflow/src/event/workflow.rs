use time::OffsetDateTime;

use crate::action::WorkflowAction;
use crate::context::DecisionContext;
use crate::error::Result;
use crate::history::{EventAttributes, HistoryEvent, WorkflowExecutionStarted};

/// The workflow run was started.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowStartedEvent {
    pub event_id: i64,
    pub timestamp: OffsetDateTime,
    pub attributes: WorkflowExecutionStarted,
}

impl WorkflowStartedEvent {
    pub fn input(&self) -> Option<&str> {
        self.attributes.input.as_deref()
    }
}

/// Someone asked the service to cancel this workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowCancelRequestedEvent {
    pub event_id: i64,
    pub timestamp: OffsetDateTime,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSignaledEvent {
    pub event_id: i64,
    pub timestamp: OffsetDateTime,
    pub signal_name: String,
    pub input: Option<String>,
}

/// An event addressed to the workflow as a whole rather than to one item.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    Started(WorkflowStartedEvent),
    CancelRequested(WorkflowCancelRequestedEvent),
    Signaled(WorkflowSignaledEvent),
}

impl WorkflowEvent {
    pub fn from_history(event: &HistoryEvent) -> Option<Self> {
        match &event.attributes {
            EventAttributes::WorkflowExecutionStarted(a) => Some(Self::Started(WorkflowStartedEvent {
                event_id: event.event_id,
                timestamp: event.timestamp,
                attributes: a.clone(),
            })),
            EventAttributes::WorkflowExecutionCancelRequested(a) => {
                Some(Self::CancelRequested(WorkflowCancelRequestedEvent {
                    event_id: event.event_id,
                    timestamp: event.timestamp,
                    cause: a.cause.clone(),
                }))
            }
            EventAttributes::WorkflowExecutionSignaled(a) => Some(Self::Signaled(WorkflowSignaledEvent {
                event_id: event.event_id,
                timestamp: event.timestamp,
                signal_name: a.signal_name.clone(),
                input: a.input.clone(),
            })),
            _ => None,
        }
    }

    pub fn event_id(&self) -> i64 {
        match self {
            Self::Started(e) => e.event_id,
            Self::CancelRequested(e) => e.event_id,
            Self::Signaled(e) => e.event_id,
        }
    }

    /// Start the graph, cancel the workflow, or ignore the signal.
    pub fn default_action(&self) -> WorkflowAction {
        match self {
            Self::Started(_) => WorkflowAction::Start,
            Self::CancelRequested(e) => {
                WorkflowAction::cancel_workflow(e.cause.clone().unwrap_or_default())
            }
            Self::Signaled(_) => WorkflowAction::ignore(),
        }
    }

    /// Resolve through the workflow's handler, falling back to the default action.
    pub fn interpret(&self, ctx: DecisionContext<'_>) -> Result<WorkflowAction> {
        let workflow = ctx.workflow();
        let handled = match self {
            Self::Started(e) => workflow.on_started.as_ref().map(|h| h(e, ctx)),
            Self::CancelRequested(e) => workflow.on_cancel_requested.as_ref().map(|h| h(e, ctx)),
            Self::Signaled(e) => workflow.on_signal.get(&e.signal_name).map(|h| h(e, ctx)),
        };
        handled.unwrap_or_else(|| Ok(self.default_action()))
    }
}
