//! Item-scoped views over one workflow run's history.

use std::collections::HashMap;

use tracing::debug;

use super::{EventAttributes, EventGraph, HistoryEvent, WorkflowExecution, WorkflowExecutionStarted};
use crate::error::{Error, Result};
use crate::event::{TimerEvent, TimerState, WorkflowEvent, WorkflowItemEvent, WorkflowStartedEvent};
use crate::identity::{ScheduleId, TimerKind};

/// Events of one item, split between the item's own operation and its
/// reschedule timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    schedule_id: ScheduleId,
    reschedule: bool,
}

/// The full history of one workflow run, indexed for the decider.
///
/// Built once per decision cycle. Every item event is parsed up front, so an
/// inconsistent history fails here rather than halfway through a cycle.
/// Per-item queries return events newest first.
#[derive(Debug, Clone)]
pub struct WorkflowHistoryEvents {
    execution: WorkflowExecution,
    /// All events, newest first.
    events: Vec<HistoryEvent>,
    /// Parsed item events, newest first.
    item_events: Vec<WorkflowItemEvent>,
    by_event_id: HashMap<i64, usize>,
    streams: HashMap<StreamKey, Vec<usize>>,
    /// Id of the most recent `DecisionTaskCompleted`, 0 when there is none.
    last_decision_completed: i64,
}

impl WorkflowHistoryEvents {
    /// Index `events`, given in any order.
    ///
    /// Fails with [`Error::IncompleteEventGraph`] when a terminal item event
    /// references an event that is not part of `events`.
    pub fn new(execution: WorkflowExecution, mut events: Vec<HistoryEvent>) -> Result<Self> {
        events.sort_by(|a, b| b.event_id.cmp(&a.event_id));

        let graph = EventGraph::new(&events);
        let mut item_events = Vec::new();
        for event in &events {
            if let Some(item_event) = WorkflowItemEvent::from_history(event, &graph)? {
                item_events.push(item_event);
            }
        }
        classify_timer_failures(&mut item_events);

        let mut by_event_id = HashMap::with_capacity(item_events.len());
        let mut streams: HashMap<StreamKey, Vec<usize>> = HashMap::new();
        for (index, event) in item_events.iter().enumerate() {
            by_event_id.insert(event.event_id(), index);
            let key = StreamKey {
                schedule_id: event.schedule_id().clone(),
                reschedule: event.is_reschedule_timer(),
            };
            streams.entry(key).or_default().push(index);
        }

        let last_decision_completed = events
            .iter()
            .find(|e| matches!(e.attributes, EventAttributes::DecisionTaskCompleted(_)))
            .map_or(0, |e| e.event_id);

        debug!(
            workflow_id = %execution.workflow_id,
            run_id = %execution.run_id,
            events = events.len(),
            item_events = item_events.len(),
            "indexed workflow history"
        );

        Ok(Self {
            execution,
            events,
            item_events,
            by_event_id,
            streams,
            last_decision_completed,
        })
    }

    pub fn execution(&self) -> &WorkflowExecution {
        &self.execution
    }

    pub fn workflow_id(&self) -> &str {
        &self.execution.workflow_id
    }

    pub fn run_id(&self) -> &str {
        &self.execution.run_id
    }

    /// All raw events, newest first.
    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }

    /// Events recorded since the last completed decision task, oldest first.
    ///
    /// These are the events a decision cycle responds to. With no completed
    /// decision task yet, that is the whole history.
    pub fn new_events(&self) -> impl Iterator<Item = &HistoryEvent> {
        self.events
            .iter()
            .rev()
            .filter(|e| e.event_id > self.last_decision_completed)
    }

    /// Attributes of the run's `WorkflowExecutionStarted` event.
    pub fn workflow_started(&self) -> Result<WorkflowStartedEvent> {
        self.events
            .iter()
            .rev()
            .find_map(|e| match WorkflowEvent::from_history(e) {
                Some(WorkflowEvent::Started(started)) => Some(started),
                _ => None,
            })
            .ok_or(Error::MissingWorkflowStarted)
    }

    pub(crate) fn started_attributes(&self) -> Option<&WorkflowExecutionStarted> {
        self.events.iter().rev().find_map(|e| match &e.attributes {
            EventAttributes::WorkflowExecutionStarted(a) => Some(a),
            _ => None,
        })
    }

    /// Input of the run, if the history has a started event carrying one.
    pub fn workflow_input(&self) -> Option<&str> {
        self.started_attributes().and_then(|a| a.input.as_deref())
    }

    /// The parsed item event recorded as `event_id`.
    pub fn item_event(&self, event_id: i64) -> Option<&WorkflowItemEvent> {
        self.by_event_id.get(&event_id).map(|&i| &self.item_events[i])
    }

    /// Events of the operation identified by `schedule_id`, newest first.
    pub fn item_events<'a>(
        &'a self,
        schedule_id: &ScheduleId,
    ) -> impl Iterator<Item = &'a WorkflowItemEvent> + use<'a> {
        self.stream(schedule_id, false)
    }

    /// Events of the reschedule timer owned by `schedule_id`, newest first.
    pub fn reschedule_events<'a>(
        &'a self,
        schedule_id: &ScheduleId,
    ) -> impl Iterator<Item = &'a WorkflowItemEvent> + use<'a> {
        self.stream(schedule_id, true)
    }

    fn stream<'a>(
        &'a self,
        schedule_id: &ScheduleId,
        reschedule: bool,
    ) -> impl Iterator<Item = &'a WorkflowItemEvent> + use<'a> {
        let key = StreamKey {
            schedule_id: schedule_id.clone(),
            reschedule,
        };
        self.streams
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&i| &self.item_events[i])
    }
}

/// Timer start and cancel failures carry no control data, so their timer kind
/// is recovered from older events sharing their id.
fn classify_timer_failures(item_events: &mut [WorkflowItemEvent]) {
    for i in 0..item_events.len() {
        let kind = match &item_events[i] {
            WorkflowItemEvent::Timer(e) if e.is_unstarted() => {
                timer_failure_kind(e, &item_events[i + 1..])
            }
            _ => continue,
        };
        if let WorkflowItemEvent::Timer(e) = &mut item_events[i] {
            e.timer_kind = kind;
        }
    }
}

/// `older` holds the events recorded before `failure`, newest first.
fn timer_failure_kind(failure: &TimerEvent, older: &[WorkflowItemEvent]) -> TimerKind {
    let same_id = || older.iter().filter(move |e| *e.schedule_id() == failure.schedule_id);

    if matches!(failure.state, TimerState::CancellationFailed { .. }) {
        let started = same_id().find_map(|e| match e {
            WorkflowItemEvent::Timer(t) if t.state == TimerState::Started => Some(t.timer_kind),
            _ => None,
        });
        if let Some(kind) = started {
            return kind;
        }
    }
    // Only a reschedule timer shares its id with an item of another kind.
    if same_id().any(|e| !matches!(e, WorkflowItemEvent::Timer(_))) {
        TimerKind::Reschedule
    } else {
        failure.timer_kind
    }
}
