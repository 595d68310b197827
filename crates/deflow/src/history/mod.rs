//! Raw workflow history as delivered by the orchestrating service.
//!
//! The transport layer owns polling and paging. This module only models the
//! events the decider consumes: one [`HistoryEvent`] per recorded event with a
//! monotonically increasing id and a typed attribute payload. Attribute structs
//! parse tolerantly, so fields the service omits fall back to their defaults.

mod reader;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use reader::WorkflowHistoryEvents;

/// Identifies a running workflow instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}

impl WorkflowExecution {
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }
}

/// Registered type of an activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityType {
    pub name: String,
    pub version: String,
}

/// Registered type of a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowType {
    pub name: String,
    pub version: String,
}

/// What happens to child workflows when their parent closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChildPolicy {
    Terminate,
    RequestCancel,
    Abandon,
}

impl ChildPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ChildPolicy::Terminate => "TERMINATE",
            ChildPolicy::RequestCancel => "REQUEST_CANCEL",
            ChildPolicy::Abandon => "ABANDON",
        }
    }
}

/// A single recorded history event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_id: i64,
    pub timestamp: OffsetDateTime,
    pub attributes: EventAttributes,
}

impl HistoryEvent {
    pub fn new(event_id: i64, timestamp: OffsetDateTime, attributes: EventAttributes) -> Self {
        Self {
            event_id,
            timestamp,
            attributes,
        }
    }

    /// The SWF event type name, e.g. `ActivityTaskCompleted`.
    pub fn event_type(&self) -> &'static str {
        self.attributes.name()
    }
}

/// Type-specific payload of a [`HistoryEvent`].
///
/// Event kinds the decider has no use for deserialize into [`EventAttributes::Other`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventAttributes {
    WorkflowExecutionStarted(WorkflowExecutionStarted),
    WorkflowExecutionCancelRequested(WorkflowExecutionCancelRequested),
    WorkflowExecutionSignaled(WorkflowExecutionSignaled),
    DecisionTaskCompleted(DecisionTaskCompleted),
    MarkerRecorded(MarkerRecorded),

    ActivityTaskScheduled(ActivityTaskScheduled),
    ActivityTaskStarted(TaskStarted),
    ActivityTaskCompleted(TaskResult),
    ActivityTaskFailed(TaskFailure),
    ActivityTaskTimedOut(TaskTimeout),
    ActivityTaskCanceled(TaskCanceled),
    ActivityTaskCancelRequested(ActivityTaskCancelRequested),
    ScheduleActivityTaskFailed(ItemFailure),
    RequestCancelActivityTaskFailed(ItemFailure),

    TimerStarted(TimerStarted),
    TimerFired(TimerRef),
    TimerCanceled(TimerRef),
    StartTimerFailed(ItemFailure),
    CancelTimerFailed(ItemFailure),

    LambdaFunctionScheduled(LambdaFunctionScheduled),
    LambdaFunctionStarted(TaskStarted),
    LambdaFunctionCompleted(TaskResult),
    LambdaFunctionFailed(TaskFailure),
    LambdaFunctionTimedOut(TaskTimeout),
    ScheduleLambdaFunctionFailed(ItemFailure),
    StartLambdaFunctionFailed(StartLambdaFunctionFailed),

    StartChildWorkflowExecutionInitiated(StartChildWorkflowExecutionInitiated),
    ChildWorkflowExecutionStarted(ChildWorkflowStarted),
    ChildWorkflowExecutionCompleted(ChildWorkflowClosed),
    ChildWorkflowExecutionFailed(ChildWorkflowClosed),
    ChildWorkflowExecutionTimedOut(ChildWorkflowClosed),
    ChildWorkflowExecutionCanceled(ChildWorkflowClosed),
    ChildWorkflowExecutionTerminated(ChildWorkflowClosed),
    StartChildWorkflowExecutionFailed(StartChildWorkflowExecutionFailed),
    RequestCancelExternalWorkflowExecutionInitiated(ExternalCancelInitiated),
    RequestCancelExternalWorkflowExecutionFailed(ExternalCancelFailed),

    #[serde(other)]
    Other,
}

impl EventAttributes {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WorkflowExecutionStarted(_) => "WorkflowExecutionStarted",
            Self::WorkflowExecutionCancelRequested(_) => "WorkflowExecutionCancelRequested",
            Self::WorkflowExecutionSignaled(_) => "WorkflowExecutionSignaled",
            Self::DecisionTaskCompleted(_) => "DecisionTaskCompleted",
            Self::MarkerRecorded(_) => "MarkerRecorded",
            Self::ActivityTaskScheduled(_) => "ActivityTaskScheduled",
            Self::ActivityTaskStarted(_) => "ActivityTaskStarted",
            Self::ActivityTaskCompleted(_) => "ActivityTaskCompleted",
            Self::ActivityTaskFailed(_) => "ActivityTaskFailed",
            Self::ActivityTaskTimedOut(_) => "ActivityTaskTimedOut",
            Self::ActivityTaskCanceled(_) => "ActivityTaskCanceled",
            Self::ActivityTaskCancelRequested(_) => "ActivityTaskCancelRequested",
            Self::ScheduleActivityTaskFailed(_) => "ScheduleActivityTaskFailed",
            Self::RequestCancelActivityTaskFailed(_) => "RequestCancelActivityTaskFailed",
            Self::TimerStarted(_) => "TimerStarted",
            Self::TimerFired(_) => "TimerFired",
            Self::TimerCanceled(_) => "TimerCanceled",
            Self::StartTimerFailed(_) => "StartTimerFailed",
            Self::CancelTimerFailed(_) => "CancelTimerFailed",
            Self::LambdaFunctionScheduled(_) => "LambdaFunctionScheduled",
            Self::LambdaFunctionStarted(_) => "LambdaFunctionStarted",
            Self::LambdaFunctionCompleted(_) => "LambdaFunctionCompleted",
            Self::LambdaFunctionFailed(_) => "LambdaFunctionFailed",
            Self::LambdaFunctionTimedOut(_) => "LambdaFunctionTimedOut",
            Self::ScheduleLambdaFunctionFailed(_) => "ScheduleLambdaFunctionFailed",
            Self::StartLambdaFunctionFailed(_) => "StartLambdaFunctionFailed",
            Self::StartChildWorkflowExecutionInitiated(_) => "StartChildWorkflowExecutionInitiated",
            Self::ChildWorkflowExecutionStarted(_) => "ChildWorkflowExecutionStarted",
            Self::ChildWorkflowExecutionCompleted(_) => "ChildWorkflowExecutionCompleted",
            Self::ChildWorkflowExecutionFailed(_) => "ChildWorkflowExecutionFailed",
            Self::ChildWorkflowExecutionTimedOut(_) => "ChildWorkflowExecutionTimedOut",
            Self::ChildWorkflowExecutionCanceled(_) => "ChildWorkflowExecutionCanceled",
            Self::ChildWorkflowExecutionTerminated(_) => "ChildWorkflowExecutionTerminated",
            Self::StartChildWorkflowExecutionFailed(_) => "StartChildWorkflowExecutionFailed",
            Self::RequestCancelExternalWorkflowExecutionInitiated(_) => {
                "RequestCancelExternalWorkflowExecutionInitiated"
            }
            Self::RequestCancelExternalWorkflowExecutionFailed(_) => {
                "RequestCancelExternalWorkflowExecutionFailed"
            }
            Self::Other => "Other",
        }
    }
}

// ============================================================================
// Workflow-level attributes
// ============================================================================

/// Execution properties of the current run, consumed by restart decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowExecutionStarted {
    pub workflow_type: WorkflowType,
    pub input: Option<String>,
    pub task_list: Option<String>,
    pub task_priority: Option<i32>,
    pub execution_start_to_close_timeout: Option<Duration>,
    pub task_start_to_close_timeout: Option<Duration>,
    pub child_policy: Option<ChildPolicy>,
    pub tag_list: Vec<String>,
    pub lambda_role: Option<String>,
    pub parent_workflow_execution: Option<WorkflowExecution>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowExecutionCancelRequested {
    pub cause: Option<String>,
    pub external_initiated_event_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowExecutionSignaled {
    pub signal_name: String,
    pub input: Option<String>,
    pub external_initiated_event_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionTaskCompleted {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub execution_context: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerRecorded {
    pub marker_name: String,
    pub details: Option<String>,
}

// ============================================================================
// Item attributes shared across item kinds
// ============================================================================

/// A task (activity or lambda) picked up by a worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskStarted {
    pub scheduled_event_id: i64,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskResult {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub result: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskFailure {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub reason: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskTimeout {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub timeout_type: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskCanceled {
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub details: Option<String>,
}

/// A decision the service rejected before any item event was recorded.
///
/// Carries only the item id, so correlation goes through the schedule id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemFailure {
    pub id: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub cause: String,
}

// ============================================================================
// Activity attributes
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityTaskScheduled {
    pub activity_type: ActivityType,
    pub activity_id: String,
    pub input: Option<String>,
    pub control: Option<String>,
    pub task_list: Option<String>,
    pub task_priority: Option<i32>,
    pub schedule_to_close_timeout: Option<Duration>,
    pub schedule_to_start_timeout: Option<Duration>,
    pub start_to_close_timeout: Option<Duration>,
    pub heartbeat_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityTaskCancelRequested {
    pub activity_id: String,
    pub decision_task_completed_event_id: i64,
}

// ============================================================================
// Timer attributes
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerStarted {
    pub timer_id: String,
    pub control: Option<String>,
    pub start_to_fire_timeout: Duration,
}

/// Reference from a timer outcome back to its `TimerStarted` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerRef {
    pub timer_id: String,
    pub started_event_id: i64,
}

// ============================================================================
// Lambda attributes
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LambdaFunctionScheduled {
    pub id: String,
    pub name: String,
    pub input: Option<String>,
    pub control: Option<String>,
    pub start_to_close_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartLambdaFunctionFailed {
    pub scheduled_event_id: i64,
    pub cause: String,
    pub message: Option<String>,
}

// ============================================================================
// Child workflow attributes
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartChildWorkflowExecutionInitiated {
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub input: Option<String>,
    pub control: Option<String>,
    pub task_list: Option<String>,
    pub task_priority: Option<i32>,
    pub child_policy: Option<ChildPolicy>,
    pub execution_start_to_close_timeout: Option<Duration>,
    pub task_start_to_close_timeout: Option<Duration>,
    pub tag_list: Vec<String>,
    pub lambda_role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildWorkflowStarted {
    pub initiated_event_id: i64,
    pub workflow_execution: WorkflowExecution,
}

/// Outcome of a child workflow. Which fields are set depends on the event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildWorkflowClosed {
    pub initiated_event_id: i64,
    pub started_event_id: i64,
    pub workflow_execution: WorkflowExecution,
    pub result: Option<String>,
    pub reason: Option<String>,
    pub details: Option<String>,
    pub timeout_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartChildWorkflowExecutionFailed {
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub initiated_event_id: i64,
    pub cause: String,
    pub control: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalCancelInitiated {
    pub workflow_id: String,
    pub run_id: Option<String>,
    pub control: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalCancelFailed {
    pub workflow_id: String,
    pub run_id: Option<String>,
    pub initiated_event_id: i64,
    pub cause: String,
    pub control: Option<String>,
}

/// Id lookup over a slice of history events.
///
/// Terminal item events only carry a back-reference to the event that
/// scheduled them; this is what resolves it.
#[derive(Debug, Clone, Default)]
pub struct EventGraph<'a> {
    by_id: HashMap<i64, &'a HistoryEvent>,
}

impl<'a> EventGraph<'a> {
    pub fn new(events: &'a [HistoryEvent]) -> Self {
        Self {
            by_id: events.iter().map(|e| (e.event_id, e)).collect(),
        }
    }

    pub fn get(&self, event_id: i64) -> Option<&'a HistoryEvent> {
        self.by_id.get(&event_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_event_types_parse_as_other() {
        let json = r#"{ "type": "WorkflowExecutionContinuedAsNew", "newExecutionRunId": "r2" }"#;
        let attributes: EventAttributes = serde_json::from_str(json).unwrap();

        assert_eq!(attributes, EventAttributes::Other);
        assert_eq!(attributes.name(), "Other");
    }

    #[test]
    fn attributes_tolerate_missing_fields() {
        let json = r#"{ "type": "ActivityTaskCompleted", "scheduled_event_id": 5 }"#;
        let attributes: EventAttributes = serde_json::from_str(json).unwrap();

        assert_eq!(
            attributes,
            EventAttributes::ActivityTaskCompleted(TaskResult {
                scheduled_event_id: 5,
                ..TaskResult::default()
            })
        );
    }

    #[test]
    fn event_graph_resolves_by_id() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let events = vec![
            HistoryEvent::new(1, now, EventAttributes::Other),
            HistoryEvent::new(4, now, EventAttributes::DecisionTaskCompleted(Default::default())),
        ];
        let graph = EventGraph::new(&events);

        assert_eq!(graph.get(4).map(HistoryEvent::event_type), Some("DecisionTaskCompleted"));
        assert!(graph.get(2).is_none());
    }
}
