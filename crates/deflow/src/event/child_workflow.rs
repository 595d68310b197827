use time::OffsetDateTime;

use super::{EventType, originating, text};
use crate::action::WorkflowAction;
use crate::error::Result;
use crate::history::{EventAttributes, EventGraph, HistoryEvent, StartChildWorkflowExecutionInitiated};
use crate::identity::{Identity, ScheduleData, ScheduleId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildWorkflowState {
    /// The service accepted the start request (`StartChildWorkflowExecutionInitiated`).
    Scheduled,
    Started { run_id: String },
    Completed { result: Option<String> },
    Failed { reason: Option<String>, details: Option<String> },
    TimedOut { timeout_type: String },
    Cancelled { details: Option<String> },
    Terminated,
    StartFailed { cause: String },
    CancelRequested,
    CancellationFailed { cause: String },
}

/// A child workflow event, denormalized with its initiation attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildWorkflowEvent {
    pub event_id: i64,
    pub timestamp: OffsetDateTime,
    /// The child's workflow id.
    pub schedule_id: ScheduleId,
    pub name: String,
    pub version: String,
    pub positional_name: String,
    pub input: Option<String>,
    pub state: ChildWorkflowState,
}

impl ChildWorkflowEvent {
    pub fn from_history(event: &HistoryEvent, graph: &EventGraph<'_>) -> Result<Option<Self>> {
        let (initiated_event_id, state) = match &event.attributes {
            EventAttributes::StartChildWorkflowExecutionInitiated(a) => {
                return Ok(Some(Self::initiated(event, a, ChildWorkflowState::Scheduled)));
            }
            EventAttributes::ChildWorkflowExecutionStarted(a) => (
                a.initiated_event_id,
                ChildWorkflowState::Started {
                    run_id: a.workflow_execution.run_id.clone(),
                },
            ),
            EventAttributes::ChildWorkflowExecutionCompleted(a) => (
                a.initiated_event_id,
                ChildWorkflowState::Completed {
                    result: a.result.clone(),
                },
            ),
            EventAttributes::ChildWorkflowExecutionFailed(a) => (
                a.initiated_event_id,
                ChildWorkflowState::Failed {
                    reason: a.reason.clone(),
                    details: a.details.clone(),
                },
            ),
            EventAttributes::ChildWorkflowExecutionTimedOut(a) => (
                a.initiated_event_id,
                ChildWorkflowState::TimedOut {
                    timeout_type: text(&a.timeout_type),
                },
            ),
            EventAttributes::ChildWorkflowExecutionCanceled(a) => (
                a.initiated_event_id,
                ChildWorkflowState::Cancelled {
                    details: a.details.clone(),
                },
            ),
            EventAttributes::ChildWorkflowExecutionTerminated(a) => {
                (a.initiated_event_id, ChildWorkflowState::Terminated)
            }
            EventAttributes::StartChildWorkflowExecutionFailed(a) => (
                a.initiated_event_id,
                ChildWorkflowState::StartFailed {
                    cause: a.cause.clone(),
                },
            ),
            EventAttributes::RequestCancelExternalWorkflowExecutionInitiated(a) => {
                return Ok(Some(Self::external(
                    event,
                    &a.workflow_id,
                    ChildWorkflowState::CancelRequested,
                )));
            }
            EventAttributes::RequestCancelExternalWorkflowExecutionFailed(a) => {
                let state = ChildWorkflowState::CancellationFailed {
                    cause: a.cause.clone(),
                };
                return Ok(Some(Self::external(event, &a.workflow_id, state)));
            }
            _ => return Ok(None),
        };

        let initiated = originating(
            graph,
            event.event_id,
            initiated_event_id,
            "StartChildWorkflowExecutionInitiated",
            |attributes| match attributes {
                EventAttributes::StartChildWorkflowExecutionInitiated(a) => Some(a),
                _ => None,
            },
        )?;
        Ok(Some(Self::initiated(event, initiated, state)))
    }

    fn initiated(
        event: &HistoryEvent,
        initiated: &StartChildWorkflowExecutionInitiated,
        state: ChildWorkflowState,
    ) -> Self {
        let data = ScheduleData::from_control(initiated.control.as_deref());
        Self {
            event_id: event.event_id,
            timestamp: event.timestamp,
            schedule_id: ScheduleId::raw(&initiated.workflow_id),
            name: initiated.workflow_type.name.clone(),
            version: initiated.workflow_type.version.clone(),
            positional_name: data.positional_name,
            input: initiated.input.clone(),
            state,
        }
    }

    fn external(event: &HistoryEvent, workflow_id: &str, state: ChildWorkflowState) -> Self {
        Self {
            event_id: event.event_id,
            timestamp: event.timestamp,
            schedule_id: ScheduleId::raw(workflow_id),
            name: String::new(),
            version: String::new(),
            positional_name: String::new(),
            input: None,
            state,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self.state {
            ChildWorkflowState::Scheduled => EventType::Scheduled,
            ChildWorkflowState::Started { .. } => EventType::Started,
            ChildWorkflowState::Completed { .. } => EventType::Completed,
            ChildWorkflowState::Failed { .. } => EventType::Failed,
            ChildWorkflowState::TimedOut { .. } => EventType::TimedOut,
            ChildWorkflowState::Cancelled { .. } => EventType::Cancelled,
            ChildWorkflowState::Terminated => EventType::Terminated,
            ChildWorkflowState::StartFailed { .. } => EventType::StartFailed,
            ChildWorkflowState::CancelRequested => EventType::CancelRequested,
            ChildWorkflowState::CancellationFailed { .. } => EventType::CancellationFailed,
        }
    }

    pub fn result(&self) -> Option<&str> {
        match &self.state {
            ChildWorkflowState::Completed { result } => result.as_deref(),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.state {
            ChildWorkflowState::Failed { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match &self.state {
            ChildWorkflowState::Failed { details, .. } | ChildWorkflowState::Cancelled { details } => {
                details.as_deref()
            }
            _ => None,
        }
    }

    pub(crate) fn default_action(&self, item: &Identity) -> WorkflowAction {
        match &self.state {
            ChildWorkflowState::Completed { .. } => WorkflowAction::continue_from(item.clone()),
            ChildWorkflowState::Failed { reason, details } => {
                WorkflowAction::fail_workflow(text(reason), text(details))
            }
            ChildWorkflowState::TimedOut { timeout_type } => {
                WorkflowAction::fail_workflow("CHILD_WORKFLOW_TIMEDOUT", timeout_type.clone())
            }
            ChildWorkflowState::Cancelled { details } => WorkflowAction::cancel_workflow(text(details)),
            ChildWorkflowState::Terminated => {
                WorkflowAction::fail_workflow("CHILD_WORKFLOW_TERMINATED", "")
            }
            ChildWorkflowState::StartFailed { cause } => {
                WorkflowAction::fail_workflow("CHILD_WORKFLOW_START_FAILED", cause.clone())
            }
            ChildWorkflowState::CancellationFailed { cause } => {
                WorkflowAction::fail_workflow("CHILD_WORKFLOW_CANCELLATION_FAILED", cause.clone())
            }
            ChildWorkflowState::Scheduled
            | ChildWorkflowState::Started { .. }
            | ChildWorkflowState::CancelRequested => WorkflowAction::ignore(),
        }
    }
}
