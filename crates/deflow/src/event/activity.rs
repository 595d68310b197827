use time::OffsetDateTime;

use super::{EventType, originating, text};
use crate::action::WorkflowAction;
use crate::error::Result;
use crate::history::{ActivityTaskScheduled, EventAttributes, EventGraph, HistoryEvent, ItemFailure};
use crate::identity::{Identity, ScheduleData, ScheduleId};

/// Where an activity is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityState {
    Scheduled,
    Started { worker: Option<String> },
    Completed { result: Option<String> },
    Failed { reason: Option<String>, details: Option<String> },
    TimedOut { timeout_type: String, details: Option<String> },
    Cancelled { details: Option<String> },
    CancelRequested,
    SchedulingFailed { cause: String },
    CancellationFailed { cause: String },
}

/// An activity event, denormalized with its `ActivityTaskScheduled` attributes.
///
/// Rejected decisions (`SchedulingFailed`, `CancellationFailed`) and cancel
/// requests have no scheduled counterpart; for those only the schedule id is
/// known and `input` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEvent {
    pub event_id: i64,
    pub timestamp: OffsetDateTime,
    pub schedule_id: ScheduleId,
    pub name: String,
    pub version: String,
    pub positional_name: String,
    pub input: Option<String>,
    pub state: ActivityState,
}

impl ActivityEvent {
    pub fn from_history(event: &HistoryEvent, graph: &EventGraph<'_>) -> Result<Option<Self>> {
        let (scheduled_event_id, state) = match &event.attributes {
            EventAttributes::ActivityTaskScheduled(a) => {
                return Ok(Some(Self::scheduled(event, a, ActivityState::Scheduled)));
            }
            EventAttributes::ActivityTaskStarted(a) => (
                a.scheduled_event_id,
                ActivityState::Started {
                    worker: a.identity.clone(),
                },
            ),
            EventAttributes::ActivityTaskCompleted(a) => (
                a.scheduled_event_id,
                ActivityState::Completed {
                    result: a.result.clone(),
                },
            ),
            EventAttributes::ActivityTaskFailed(a) => (
                a.scheduled_event_id,
                ActivityState::Failed {
                    reason: a.reason.clone(),
                    details: a.details.clone(),
                },
            ),
            EventAttributes::ActivityTaskTimedOut(a) => (
                a.scheduled_event_id,
                ActivityState::TimedOut {
                    timeout_type: a.timeout_type.clone(),
                    details: a.details.clone(),
                },
            ),
            EventAttributes::ActivityTaskCanceled(a) => (
                a.scheduled_event_id,
                ActivityState::Cancelled {
                    details: a.details.clone(),
                },
            ),
            EventAttributes::ActivityTaskCancelRequested(a) => {
                let failure = ItemFailure {
                    id: a.activity_id.clone(),
                    ..ItemFailure::default()
                };
                return Ok(Some(Self::unscheduled(event, &failure, ActivityState::CancelRequested)));
            }
            EventAttributes::ScheduleActivityTaskFailed(f) => {
                let state = ActivityState::SchedulingFailed {
                    cause: f.cause.clone(),
                };
                return Ok(Some(Self::unscheduled(event, f, state)));
            }
            EventAttributes::RequestCancelActivityTaskFailed(f) => {
                let state = ActivityState::CancellationFailed {
                    cause: f.cause.clone(),
                };
                return Ok(Some(Self::unscheduled(event, f, state)));
            }
            _ => return Ok(None),
        };

        let scheduled = originating(
            graph,
            event.event_id,
            scheduled_event_id,
            "ActivityTaskScheduled",
            |attributes| match attributes {
                EventAttributes::ActivityTaskScheduled(a) => Some(a),
                _ => None,
            },
        )?;
        Ok(Some(Self::scheduled(event, scheduled, state)))
    }

    fn scheduled(event: &HistoryEvent, scheduled: &ActivityTaskScheduled, state: ActivityState) -> Self {
        let data = ScheduleData::from_control(scheduled.control.as_deref());
        Self {
            event_id: event.event_id,
            timestamp: event.timestamp,
            schedule_id: ScheduleId::raw(&scheduled.activity_id),
            name: scheduled.activity_type.name.clone(),
            version: scheduled.activity_type.version.clone(),
            positional_name: data.positional_name,
            input: scheduled.input.clone(),
            state,
        }
    }

    fn unscheduled(event: &HistoryEvent, failure: &ItemFailure, state: ActivityState) -> Self {
        Self {
            event_id: event.event_id,
            timestamp: event.timestamp,
            schedule_id: ScheduleId::raw(&failure.id),
            name: text(&failure.name),
            version: text(&failure.version),
            positional_name: String::new(),
            input: None,
            state,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self.state {
            ActivityState::Scheduled => EventType::Scheduled,
            ActivityState::Started { .. } => EventType::Started,
            ActivityState::Completed { .. } => EventType::Completed,
            ActivityState::Failed { .. } => EventType::Failed,
            ActivityState::TimedOut { .. } => EventType::TimedOut,
            ActivityState::Cancelled { .. } => EventType::Cancelled,
            ActivityState::CancelRequested => EventType::CancelRequested,
            ActivityState::SchedulingFailed { .. } => EventType::SchedulingFailed,
            ActivityState::CancellationFailed { .. } => EventType::CancellationFailed,
        }
    }

    pub fn result(&self) -> Option<&str> {
        match &self.state {
            ActivityState::Completed { result } => result.as_deref(),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.state {
            ActivityState::Failed { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match &self.state {
            ActivityState::Failed { details, .. }
            | ActivityState::TimedOut { details, .. }
            | ActivityState::Cancelled { details } => details.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn default_action(&self, item: &Identity) -> WorkflowAction {
        match &self.state {
            ActivityState::Completed { .. } => WorkflowAction::continue_from(item.clone()),
            ActivityState::Failed { reason, details } => {
                WorkflowAction::fail_workflow(text(reason), text(details))
            }
            ActivityState::TimedOut {
                timeout_type,
                details,
            } => WorkflowAction::fail_workflow(
                "ACTIVITY_TIMEDOUT",
                details.clone().unwrap_or_else(|| timeout_type.clone()),
            ),
            ActivityState::Cancelled { details } => WorkflowAction::cancel_workflow(text(details)),
            ActivityState::SchedulingFailed { cause } => {
                WorkflowAction::fail_workflow("ACTIVITY_SCHEDULING_FAILED", cause.clone())
            }
            ActivityState::CancellationFailed { cause } => {
                WorkflowAction::fail_workflow("ACTIVITY_CANCELLATION_FAILED", cause.clone())
            }
            ActivityState::Scheduled | ActivityState::Started { .. } | ActivityState::CancelRequested => {
                WorkflowAction::ignore()
            }
        }
    }
}
