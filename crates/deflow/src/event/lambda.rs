use std::time::Duration;

use time::OffsetDateTime;

use super::{EventType, originating, text};
use crate::action::WorkflowAction;
use crate::error::Result;
use crate::history::{EventAttributes, EventGraph, HistoryEvent, LambdaFunctionScheduled};
use crate::identity::{Identity, ScheduleData, ScheduleId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LambdaState {
    Scheduled,
    Started,
    Completed { result: Option<String> },
    Failed { reason: Option<String>, details: Option<String> },
    TimedOut { timeout_type: String },
    SchedulingFailed { cause: String },
    StartFailed { cause: String, message: Option<String> },
}

/// A lambda event, denormalized with its `LambdaFunctionScheduled` attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaEvent {
    pub event_id: i64,
    pub timestamp: OffsetDateTime,
    pub schedule_id: ScheduleId,
    pub name: String,
    pub positional_name: String,
    pub input: Option<String>,
    pub timeout: Option<Duration>,
    pub state: LambdaState,
}

impl LambdaEvent {
    pub fn from_history(event: &HistoryEvent, graph: &EventGraph<'_>) -> Result<Option<Self>> {
        let (scheduled_event_id, state) = match &event.attributes {
            EventAttributes::LambdaFunctionScheduled(a) => {
                return Ok(Some(Self::scheduled(event, a, LambdaState::Scheduled)));
            }
            EventAttributes::LambdaFunctionStarted(a) => (a.scheduled_event_id, LambdaState::Started),
            EventAttributes::LambdaFunctionCompleted(a) => (
                a.scheduled_event_id,
                LambdaState::Completed {
                    result: a.result.clone(),
                },
            ),
            EventAttributes::LambdaFunctionFailed(a) => (
                a.scheduled_event_id,
                LambdaState::Failed {
                    reason: a.reason.clone(),
                    details: a.details.clone(),
                },
            ),
            EventAttributes::LambdaFunctionTimedOut(a) => (
                a.scheduled_event_id,
                LambdaState::TimedOut {
                    timeout_type: a.timeout_type.clone(),
                },
            ),
            EventAttributes::StartLambdaFunctionFailed(a) => (
                a.scheduled_event_id,
                LambdaState::StartFailed {
                    cause: a.cause.clone(),
                    message: a.message.clone(),
                },
            ),
            EventAttributes::ScheduleLambdaFunctionFailed(f) => {
                return Ok(Some(Self {
                    event_id: event.event_id,
                    timestamp: event.timestamp,
                    schedule_id: ScheduleId::raw(&f.id),
                    name: text(&f.name),
                    positional_name: String::new(),
                    input: None,
                    timeout: None,
                    state: LambdaState::SchedulingFailed {
                        cause: f.cause.clone(),
                    },
                }));
            }
            _ => return Ok(None),
        };

        let scheduled = originating(
            graph,
            event.event_id,
            scheduled_event_id,
            "LambdaFunctionScheduled",
            |attributes| match attributes {
                EventAttributes::LambdaFunctionScheduled(a) => Some(a),
                _ => None,
            },
        )?;
        Ok(Some(Self::scheduled(event, scheduled, state)))
    }

    fn scheduled(event: &HistoryEvent, scheduled: &LambdaFunctionScheduled, state: LambdaState) -> Self {
        let data = ScheduleData::from_control(scheduled.control.as_deref());
        Self {
            event_id: event.event_id,
            timestamp: event.timestamp,
            schedule_id: ScheduleId::raw(&scheduled.id),
            name: scheduled.name.clone(),
            positional_name: data.positional_name,
            input: scheduled.input.clone(),
            timeout: scheduled.start_to_close_timeout,
            state,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self.state {
            LambdaState::Scheduled => EventType::Scheduled,
            LambdaState::Started => EventType::Started,
            LambdaState::Completed { .. } => EventType::Completed,
            LambdaState::Failed { .. } => EventType::Failed,
            LambdaState::TimedOut { .. } => EventType::TimedOut,
            LambdaState::SchedulingFailed { .. } => EventType::SchedulingFailed,
            LambdaState::StartFailed { .. } => EventType::StartFailed,
        }
    }

    pub fn result(&self) -> Option<&str> {
        match &self.state {
            LambdaState::Completed { result } => result.as_deref(),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.state {
            LambdaState::Failed { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match &self.state {
            LambdaState::Failed { details, .. } => details.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn default_action(&self, item: &Identity) -> WorkflowAction {
        match &self.state {
            LambdaState::Completed { .. } => WorkflowAction::continue_from(item.clone()),
            LambdaState::Failed { reason, details } => {
                WorkflowAction::fail_workflow(text(reason), text(details))
            }
            LambdaState::TimedOut { timeout_type } => {
                WorkflowAction::fail_workflow("LAMBDA_TIMEDOUT", timeout_type.clone())
            }
            LambdaState::SchedulingFailed { cause } => {
                WorkflowAction::fail_workflow("LAMBDA_SCHEDULING_FAILED", cause.clone())
            }
            LambdaState::StartFailed { cause, message } => WorkflowAction::fail_workflow(
                "LAMBDA_START_FAILED",
                message.clone().unwrap_or_else(|| cause.clone()),
            ),
            LambdaState::Scheduled | LambdaState::Started => WorkflowAction::ignore(),
        }
    }
}
