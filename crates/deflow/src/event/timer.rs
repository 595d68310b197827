use std::time::Duration;

use time::OffsetDateTime;

use super::{EventType, originating};
use crate::action::WorkflowAction;
use crate::error::Result;
use crate::history::{EventAttributes, EventGraph, HistoryEvent, ItemFailure, TimerStarted};
use crate::identity::{Identity, ScheduleData, ScheduleId, TimerKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerState {
    Started,
    Fired,
    Cancelled,
    StartFailed { cause: String },
    CancellationFailed { cause: String },
}

/// A timer event, denormalized with its `TimerStarted` attributes.
///
/// `timer_kind` tells a configured timer item apart from the implicit
/// reschedule timer of another item, which shares that item's schedule id.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerEvent {
    pub event_id: i64,
    pub timestamp: OffsetDateTime,
    pub schedule_id: ScheduleId,
    pub name: String,
    pub timer_kind: TimerKind,
    pub delay: Duration,
    pub state: TimerState,
}

impl TimerEvent {
    pub fn from_history(event: &HistoryEvent, graph: &EventGraph<'_>) -> Result<Option<Self>> {
        let (started_event_id, state) = match &event.attributes {
            EventAttributes::TimerStarted(a) => {
                return Ok(Some(Self::started(event, a, TimerState::Started)));
            }
            EventAttributes::TimerFired(a) => (a.started_event_id, TimerState::Fired),
            EventAttributes::TimerCanceled(a) => (a.started_event_id, TimerState::Cancelled),
            EventAttributes::StartTimerFailed(f) => {
                let state = TimerState::StartFailed {
                    cause: f.cause.clone(),
                };
                return Ok(Some(Self::unstarted(event, f, state)));
            }
            EventAttributes::CancelTimerFailed(f) => {
                let state = TimerState::CancellationFailed {
                    cause: f.cause.clone(),
                };
                return Ok(Some(Self::unstarted(event, f, state)));
            }
            _ => return Ok(None),
        };

        let started = originating(
            graph,
            event.event_id,
            started_event_id,
            "TimerStarted",
            |attributes| match attributes {
                EventAttributes::TimerStarted(a) => Some(a),
                _ => None,
            },
        )?;
        Ok(Some(Self::started(event, started, state)))
    }

    fn started(event: &HistoryEvent, started: &TimerStarted, state: TimerState) -> Self {
        let data = ScheduleData::from_control(started.control.as_deref());
        Self {
            event_id: event.event_id,
            timestamp: event.timestamp,
            schedule_id: ScheduleId::raw(&started.timer_id),
            name: data.timer_name.unwrap_or_else(|| started.timer_id.clone()),
            timer_kind: data.timer_kind,
            delay: started.start_to_fire_timeout,
            state,
        }
    }

    fn unstarted(event: &HistoryEvent, failure: &ItemFailure, state: TimerState) -> Self {
        Self {
            event_id: event.event_id,
            timestamp: event.timestamp,
            schedule_id: ScheduleId::raw(&failure.id),
            name: failure.name.clone().unwrap_or_else(|| failure.id.clone()),
            timer_kind: TimerKind::WorkflowItem,
            delay: Duration::ZERO,
            state,
        }
    }

    /// Start and cancel failures, which carry only the timer id.
    pub fn is_unstarted(&self) -> bool {
        matches!(
            self.state,
            TimerState::StartFailed { .. } | TimerState::CancellationFailed { .. }
        )
    }

    pub fn event_type(&self) -> EventType {
        match self.state {
            TimerState::Started => EventType::Started,
            TimerState::Fired => EventType::Fired,
            TimerState::Cancelled => EventType::Cancelled,
            TimerState::StartFailed { .. } => EventType::StartFailed,
            TimerState::CancellationFailed { .. } => EventType::CancellationFailed,
        }
    }

    pub fn cause(&self) -> Option<&str> {
        match &self.state {
            TimerState::StartFailed { cause } | TimerState::CancellationFailed { cause } => {
                Some(cause.as_str())
            }
            _ => None,
        }
    }

    pub(crate) fn default_action(&self, item: &Identity) -> WorkflowAction {
        match &self.state {
            TimerState::Fired => WorkflowAction::continue_from(item.clone()),
            TimerState::Cancelled => WorkflowAction::cancel_workflow(""),
            TimerState::StartFailed { cause } => {
                WorkflowAction::fail_workflow("TIMER_START_FAILED", cause.clone())
            }
            TimerState::CancellationFailed { cause } => {
                WorkflowAction::fail_workflow("TIMER_CANCELLATION_FAILED", cause.clone())
            }
            TimerState::Started => WorkflowAction::ignore(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::TimerRef;

    fn event(event_id: i64, attributes: EventAttributes) -> HistoryEvent {
        HistoryEvent::new(event_id, OffsetDateTime::UNIX_EPOCH, attributes)
    }

    #[test]
    fn fired_event_reads_timer_kind_from_control() {
        let owner = Identity::activity("Transcode", "1.0", "").unwrap();
        let control = ScheduleData::for_timer(&owner, TimerKind::Reschedule)
            .to_control()
            .unwrap();
        let events = vec![
            event(
                4,
                EventAttributes::TimerStarted(TimerStarted {
                    timer_id: "abc".into(),
                    control: Some(control),
                    start_to_fire_timeout: Duration::from_secs(30),
                }),
            ),
            event(
                6,
                EventAttributes::TimerFired(TimerRef {
                    timer_id: "abc".into(),
                    started_event_id: 4,
                }),
            ),
        ];
        let graph = EventGraph::new(&events);
        let fired = TimerEvent::from_history(&events[1], &graph).unwrap().unwrap();

        assert_eq!(fired.timer_kind, TimerKind::Reschedule);
        assert_eq!(fired.name, "Transcode");
        assert_eq!(fired.delay, Duration::from_secs(30));
        assert_eq!(fired.event_type(), EventType::Fired);
    }

    #[test]
    fn timer_without_control_is_a_workflow_item() {
        let events = vec![event(
            4,
            EventAttributes::TimerStarted(TimerStarted {
                timer_id: "abc".into(),
                ..Default::default()
            }),
        )];
        let graph = EventGraph::new(&events);
        let started = TimerEvent::from_history(&events[0], &graph).unwrap().unwrap();

        assert_eq!(started.timer_kind, TimerKind::WorkflowItem);
        assert_eq!(started.name, "abc");
    }

    #[test]
    fn cancelled_without_started_fails() {
        let events = vec![event(
            6,
            EventAttributes::TimerCanceled(TimerRef {
                timer_id: "abc".into(),
                started_event_id: 4,
            }),
        )];
        let graph = EventGraph::new(&events);

        assert!(TimerEvent::from_history(&events[0], &graph).is_err());
    }

    #[test]
    fn start_failure_defaults_to_failing_the_workflow() {
        let events = vec![event(
            2,
            EventAttributes::StartTimerFailed(ItemFailure {
                id: "abc".into(),
                cause: "TIMER_ID_ALREADY_IN_USE".into(),
                ..Default::default()
            }),
        )];
        let graph = EventGraph::new(&events);
        let failed = TimerEvent::from_history(&events[0], &graph).unwrap().unwrap();
        let item = Identity::timer("Wait").unwrap();

        assert_eq!(failed.cause(), Some("TIMER_ID_ALREADY_IN_USE"));
        assert_eq!(
            failed.default_action(&item),
            WorkflowAction::fail_workflow("TIMER_START_FAILED", "TIMER_ID_ALREADY_IN_USE")
        );
    }
}
