//! Item-scoped events rebuilt from raw history every decision cycle.
//!
//! A terminal history event (e.g. `LambdaFunctionCompleted`) only carries a
//! back-reference to the event that scheduled it. Building a
//! [`WorkflowItemEvent`] resolves that reference so the value carries the
//! schedule id, item name and input of the operation it belongs to.
//!
//! Every event type has a default response, see [`WorkflowItemEvent::interpret`].

mod activity;
mod child_workflow;
mod lambda;
mod timer;
mod workflow;

use std::fmt;

use time::OffsetDateTime;
use tracing::debug;

use crate::action::WorkflowAction;
use crate::context::DecisionContext;
use crate::error::{Error, Result};
use crate::history::{EventAttributes, EventGraph, HistoryEvent};
use crate::identity::{Identity, ItemKind, ScheduleId, TimerKind};
use crate::item::ItemSpec;

pub use activity::{ActivityEvent, ActivityState};
pub use child_workflow::{ChildWorkflowEvent, ChildWorkflowState};
pub use lambda::{LambdaEvent, LambdaState};
pub use timer::{TimerEvent, TimerState};
pub use workflow::{
    WorkflowCancelRequestedEvent, WorkflowEvent, WorkflowSignaledEvent, WorkflowStartedEvent,
};

/// Position of an event in its item's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    Scheduled,
    Started,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
    CancelRequested,
    SchedulingFailed,
    StartFailed,
    CancellationFailed,
    Fired,
    Terminated,
}

impl EventType {
    /// In-flight events describe a pending external operation.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            EventType::Scheduled | EventType::Started | EventType::CancelRequested
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Scheduled => "scheduled",
            EventType::Started => "started",
            EventType::Completed => "completed",
            EventType::Failed => "failed",
            EventType::TimedOut => "timed_out",
            EventType::Cancelled => "cancelled",
            EventType::CancelRequested => "cancel_requested",
            EventType::SchedulingFailed => "scheduling_failed",
            EventType::StartFailed => "start_failed",
            EventType::CancellationFailed => "cancellation_failed",
            EventType::Fired => "fired",
            EventType::Terminated => "terminated",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event correlated to a workflow item.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowItemEvent {
    Activity(ActivityEvent),
    Timer(TimerEvent),
    Lambda(LambdaEvent),
    ChildWorkflow(ChildWorkflowEvent),
}

impl WorkflowItemEvent {
    /// Build the item event for `event`, if it is one.
    ///
    /// Returns `Ok(None)` for workflow-level events and for signal timers,
    /// which are not correlated to items. Fails with
    /// [`Error::IncompleteEventGraph`] when the originating event is missing
    /// from `graph`.
    pub fn from_history(event: &HistoryEvent, graph: &EventGraph<'_>) -> Result<Option<Self>> {
        if let Some(e) = ActivityEvent::from_history(event, graph)? {
            return Ok(Some(Self::Activity(e)));
        }
        if let Some(e) = TimerEvent::from_history(event, graph)? {
            if e.timer_kind == TimerKind::SignalTimer {
                return Ok(None);
            }
            return Ok(Some(Self::Timer(e)));
        }
        if let Some(e) = LambdaEvent::from_history(event, graph)? {
            return Ok(Some(Self::Lambda(e)));
        }
        Ok(ChildWorkflowEvent::from_history(event, graph)?.map(Self::ChildWorkflow))
    }

    pub fn event_id(&self) -> i64 {
        match self {
            Self::Activity(e) => e.event_id,
            Self::Timer(e) => e.event_id,
            Self::Lambda(e) => e.event_id,
            Self::ChildWorkflow(e) => e.event_id,
        }
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        match self {
            Self::Activity(e) => e.timestamp,
            Self::Timer(e) => e.timestamp,
            Self::Lambda(e) => e.timestamp,
            Self::ChildWorkflow(e) => e.timestamp,
        }
    }

    pub fn schedule_id(&self) -> &ScheduleId {
        match self {
            Self::Activity(e) => &e.schedule_id,
            Self::Timer(e) => &e.schedule_id,
            Self::Lambda(e) => &e.schedule_id,
            Self::ChildWorkflow(e) => &e.schedule_id,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Self::Activity(e) => e.event_type(),
            Self::Timer(e) => e.event_type(),
            Self::Lambda(e) => e.event_type(),
            Self::ChildWorkflow(e) => e.event_type(),
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Activity(_) => ItemKind::Activity,
            Self::Timer(_) => ItemKind::Timer,
            Self::Lambda(_) => ItemKind::Lambda,
            Self::ChildWorkflow(_) => ItemKind::ChildWorkflow,
        }
    }

    /// `true` while the underlying operation is still pending.
    pub fn is_active(&self) -> bool {
        self.event_type().is_active()
    }

    /// `true` for events of the implicit timer that delays a re-scheduling.
    pub fn is_reschedule_timer(&self) -> bool {
        matches!(self, Self::Timer(e) if e.timer_kind == TimerKind::Reschedule)
    }

    /// Fixed response to this event when no handler is configured.
    ///
    /// Completion continues the graph from `item`, cancellation cancels the
    /// workflow, and every failure fails the workflow with a reason code
    /// naming the failure.
    pub fn default_action(&self, item: &Identity) -> WorkflowAction {
        match self {
            Self::Activity(e) => e.default_action(item),
            Self::Timer(e) if e.timer_kind == TimerKind::Reschedule => match e.state {
                TimerState::Fired => WorkflowAction::schedule(item.clone()),
                TimerState::Cancelled => WorkflowAction::ignore(),
                _ => e.default_action(item),
            },
            Self::Timer(e) => e.default_action(item),
            Self::Lambda(e) => e.default_action(item),
            Self::ChildWorkflow(e) => e.default_action(item),
        }
    }

    /// Resolve this event to the action the workflow takes in response.
    ///
    /// The item's handler for this event type wins over the default action.
    /// Returns `Ok(None)` for cancellation failures of external workflows that
    /// are not items of this workflow.
    pub fn interpret(&self, ctx: DecisionContext<'_>) -> Result<Option<WorkflowAction>> {
        if self.is_active() {
            return Err(Error::NotSupported(format!(
                "{} event {} describes a pending operation and cannot be interpreted",
                self.event_type(),
                self.event_id()
            )));
        }

        let Some(item) = ctx.item_by_schedule_id(self.schedule_id()) else {
            if let Self::ChildWorkflow(e) = self {
                if matches!(e.state, ChildWorkflowState::CancellationFailed { .. }) {
                    debug!(
                        event_id = e.event_id,
                        workflow_id = %e.schedule_id,
                        "ignoring cancellation failure of a workflow outside this graph"
                    );
                    return Ok(None);
                }
            }
            return Err(Error::IncompatibleWorkflow(format!(
                "{} {} event {} (id {}) does not belong to any workflow item",
                self.kind(),
                self.event_type(),
                self.event_id(),
                self.schedule_id()
            )));
        };

        let identity = item.identity();
        let action = match (self, item.spec()) {
            (Self::Timer(e), _) if e.timer_kind == TimerKind::Reschedule => {
                self.default_action(identity)
            }
            (Self::Activity(e), ItemSpec::Activity(spec)) => match spec.handlers.get(e.event_type()) {
                Some(handler) => handler(e, &item)?,
                None => self.default_action(identity),
            },
            (Self::Timer(e), ItemSpec::Timer(spec)) => match spec.handlers.get(e.event_type()) {
                Some(handler) => handler(e, &item)?,
                None => self.default_action(identity),
            },
            (Self::Lambda(e), ItemSpec::Lambda(spec)) => match spec.handlers.get(e.event_type()) {
                Some(handler) => handler(e, &item)?,
                None => self.default_action(identity),
            },
            (Self::ChildWorkflow(e), ItemSpec::ChildWorkflow(spec)) => {
                match spec.handlers.get(e.event_type()) {
                    Some(handler) => handler(e, &item)?,
                    None => self.default_action(identity),
                }
            }
            _ => {
                return Err(Error::IncompatibleWorkflow(format!(
                    "{} event {} targets {}",
                    self.kind(),
                    self.event_id(),
                    identity
                )));
            }
        };

        Ok(Some(action.with_triggered_item(identity)))
    }
}

/// Resolve the event `reference_id` that `event_id` points back to.
pub(crate) fn originating<'a, T>(
    graph: &EventGraph<'a>,
    event_id: i64,
    reference_id: i64,
    expected: &'static str,
    pick: impl Fn(&'a EventAttributes) -> Option<&'a T>,
) -> Result<&'a T> {
    graph
        .get(reference_id)
        .and_then(|e| pick(&e.attributes))
        .ok_or_else(|| Error::incomplete_event_graph(event_id, expected, reference_id))
}

pub(crate) fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_event_types_are_active() {
        assert!(EventType::Scheduled.is_active());
        assert!(EventType::Started.is_active());
        assert!(EventType::CancelRequested.is_active());

        for terminal in [
            EventType::Completed,
            EventType::Failed,
            EventType::TimedOut,
            EventType::Cancelled,
            EventType::SchedulingFailed,
            EventType::StartFailed,
            EventType::CancellationFailed,
            EventType::Fired,
            EventType::Terminated,
        ] {
            assert!(!terminal.is_active(), "{terminal} should be terminal");
        }
    }
}
