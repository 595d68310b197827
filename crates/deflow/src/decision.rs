//! Decisions returned to the orchestrating service.
//!
//! A [`WorkflowDecision`] is the unit of output of a decision cycle. Values
//! compare structurally; [`WorkflowDecision::key`] identifies the decision's
//! target (item id, timer id, workflow) for de-duplication within a batch.
//! [`WorkflowDecision::to_wire`] produces the service's decision shape.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::history::ChildPolicy;
use crate::identity::{Identity, ScheduleData, ScheduleId, TimerKind};

/// Timeouts of an activity task. `None` uses the registered defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityTimeouts {
    pub schedule_to_close: Option<Duration>,
    pub schedule_to_start: Option<Duration>,
    pub start_to_close: Option<Duration>,
    pub heartbeat: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleActivityDecision {
    pub identity: Identity,
    pub schedule_id: ScheduleId,
    pub input: Option<String>,
    pub task_list: Option<String>,
    pub task_priority: Option<i32>,
    pub timeouts: ActivityTimeouts,
    pub control: ScheduleData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleTimerDecision {
    /// The timer item, or the item owning a reschedule timer.
    pub identity: Identity,
    pub schedule_id: ScheduleId,
    pub delay: Duration,
    pub control: ScheduleData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleLambdaDecision {
    pub identity: Identity,
    pub schedule_id: ScheduleId,
    pub input: Option<String>,
    pub timeout: Option<Duration>,
    pub control: ScheduleData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleChildWorkflowDecision {
    pub identity: Identity,
    /// Workflow id of the child; derived from the identity and the parent's run id.
    pub workflow_id: ScheduleId,
    pub input: Option<String>,
    pub task_list: Option<String>,
    pub task_priority: Option<i32>,
    pub child_policy: Option<ChildPolicy>,
    pub execution_timeout: Option<Duration>,
    pub task_timeout: Option<Duration>,
    pub tag_list: Vec<String>,
    pub lambda_role: Option<String>,
    pub control: ScheduleData,
}

/// Close the current run and start a new one of the same workflow type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestartWorkflowDecision {
    pub input: Option<String>,
    pub task_list: Option<String>,
    pub task_priority: Option<i32>,
    pub execution_timeout: Option<Duration>,
    pub task_timeout: Option<Duration>,
    pub child_policy: Option<ChildPolicy>,
    pub tag_list: Vec<String>,
    pub lambda_role: Option<String>,
    pub workflow_type_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalWorkflowDecision {
    pub workflow_id: String,
    pub run_id: Option<String>,
    pub signal_name: String,
    pub input: Option<String>,
}

/// A single instruction for the orchestrating service.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowDecision {
    ScheduleActivity(ScheduleActivityDecision),
    ScheduleTimer(ScheduleTimerDecision),
    ScheduleLambda(ScheduleLambdaDecision),
    ScheduleChildWorkflow(ScheduleChildWorkflowDecision),
    CancelActivity {
        identity: Identity,
        schedule_id: ScheduleId,
    },
    CancelTimer {
        identity: Identity,
        schedule_id: ScheduleId,
    },
    /// Request cancellation of a child workflow.
    CancelRequestWorkflow {
        identity: Identity,
        workflow_id: ScheduleId,
    },
    /// Complete the workflow.
    ///
    /// A `proposal` completion is produced when a branch runs out of children;
    /// it only survives batch compaction when nothing else remains to do.
    CompleteWorkflow {
        result: String,
        proposal: bool,
    },
    FailWorkflow {
        reason: String,
        details: String,
    },
    CancelWorkflow {
        details: String,
    },
    RestartWorkflow(RestartWorkflowDecision),
    SignalWorkflow(SignalWorkflowDecision),
    RecordMarker {
        name: String,
        details: Option<String>,
    },
}

impl WorkflowDecision {
    pub fn complete_workflow(result: impl Into<String>) -> Self {
        Self::CompleteWorkflow {
            result: result.into(),
            proposal: false,
        }
    }

    pub(crate) fn propose_completion(result: impl Into<String>) -> Self {
        Self::CompleteWorkflow {
            result: result.into(),
            proposal: true,
        }
    }

    /// This decision with a completion proposal turned into a plain completion.
    pub(crate) fn confirmed(self) -> Self {
        match self {
            Self::CompleteWorkflow { result, .. } => Self::complete_workflow(result),
            other => other,
        }
    }

    pub fn fail_workflow(reason: impl Into<String>, details: impl Into<String>) -> Self {
        Self::FailWorkflow {
            reason: reason.into(),
            details: details.into(),
        }
    }

    pub fn cancel_workflow(details: impl Into<String>) -> Self {
        Self::CancelWorkflow {
            details: details.into(),
        }
    }

    pub fn record_marker(name: impl Into<String>, details: Option<String>) -> Self {
        Self::RecordMarker {
            name: name.into(),
            details,
        }
    }

    /// Start the timer item `identity` after `delay`.
    pub fn schedule_timer(identity: &Identity, delay: Duration) -> Self {
        Self::ScheduleTimer(ScheduleTimerDecision {
            identity: identity.clone(),
            schedule_id: identity.schedule_id(""),
            delay,
            control: ScheduleData::for_timer(identity, TimerKind::WorkflowItem),
        })
    }

    /// Start the reschedule timer of `identity`, which re-schedules it once fired.
    pub fn schedule_reschedule_timer(identity: &Identity, run_id: &str, delay: Duration) -> Self {
        Self::ScheduleTimer(ScheduleTimerDecision {
            identity: identity.clone(),
            schedule_id: identity.schedule_id(run_id),
            delay,
            control: ScheduleData::for_timer(identity, TimerKind::Reschedule),
        })
    }

    /// SWF decision type name.
    pub fn decision_type(&self) -> &'static str {
        match self {
            Self::ScheduleActivity(_) => "ScheduleActivityTask",
            Self::ScheduleTimer(_) => "StartTimer",
            Self::ScheduleLambda(_) => "ScheduleLambdaFunction",
            Self::ScheduleChildWorkflow(_) => "StartChildWorkflowExecution",
            Self::CancelActivity { .. } => "RequestCancelActivityTask",
            Self::CancelTimer { .. } => "CancelTimer",
            Self::CancelRequestWorkflow { .. } => "RequestCancelExternalWorkflowExecution",
            Self::CompleteWorkflow { .. } => "CompleteWorkflowExecution",
            Self::FailWorkflow { .. } => "FailWorkflowExecution",
            Self::CancelWorkflow { .. } => "CancelWorkflowExecution",
            Self::RestartWorkflow(_) => "ContinueAsNewWorkflowExecution",
            Self::SignalWorkflow(_) => "SignalExternalWorkflowExecution",
            Self::RecordMarker { .. } => "RecordMarker",
        }
    }

    /// Target of the decision. Two decisions with equal keys are duplicates.
    pub fn key(&self) -> (&'static str, String) {
        let target = match self {
            Self::ScheduleActivity(d) => d.schedule_id.to_string(),
            Self::ScheduleTimer(d) => d.schedule_id.to_string(),
            Self::ScheduleLambda(d) => d.schedule_id.to_string(),
            Self::ScheduleChildWorkflow(d) => d.workflow_id.to_string(),
            Self::CancelActivity { schedule_id, .. } | Self::CancelTimer { schedule_id, .. } => {
                schedule_id.to_string()
            }
            Self::CancelRequestWorkflow { workflow_id, .. } => workflow_id.to_string(),
            Self::SignalWorkflow(d) => format!("{}/{}", d.workflow_id, d.signal_name),
            Self::RecordMarker { name, .. } => name.clone(),
            Self::CompleteWorkflow { .. }
            | Self::FailWorkflow { .. }
            | Self::CancelWorkflow { .. }
            | Self::RestartWorkflow(_) => String::new(),
        };
        (self.decision_type(), target)
    }

    /// The item this decision schedules, if it is a scheduling decision.
    pub fn scheduled_item(&self) -> Option<&Identity> {
        match self {
            Self::ScheduleActivity(d) => Some(&d.identity),
            Self::ScheduleTimer(d) => Some(&d.identity),
            Self::ScheduleLambda(d) => Some(&d.identity),
            Self::ScheduleChildWorkflow(d) => Some(&d.identity),
            _ => None,
        }
    }

    pub fn is_schedule(&self) -> bool {
        self.scheduled_item().is_some()
    }

    pub fn is_proposal(&self) -> bool {
        matches!(self, Self::CompleteWorkflow { proposal: true, .. })
    }

    /// Rank among decisions that close the workflow, lower wins.
    pub fn closing_priority(&self) -> Option<u8> {
        match self {
            Self::FailWorkflow { .. } => Some(0),
            Self::CancelWorkflow { .. } => Some(1),
            Self::RestartWorkflow(_) => Some(2),
            Self::CompleteWorkflow { .. } => Some(3),
            _ => None,
        }
    }

    /// Convert to the service's wire shape.
    pub fn to_wire(&self) -> Result<WireDecision> {
        let attributes = match self {
            Self::ScheduleActivity(d) => {
                let mut a = Map::new();
                a.insert(
                    "activityType".into(),
                    json!({ "name": d.identity.name(), "version": d.identity.version() }),
                );
                a.insert("activityId".into(), json!(d.schedule_id));
                a.insert("control".into(), json!(d.control.to_control()?));
                put(&mut a, "input", d.input.clone());
                put(&mut a, "taskList", d.task_list.as_ref().map(|t| json!({ "name": t })));
                put(&mut a, "taskPriority", d.task_priority.map(|p| p.to_string()));
                put(&mut a, "scheduleToCloseTimeout", seconds(d.timeouts.schedule_to_close));
                put(&mut a, "scheduleToStartTimeout", seconds(d.timeouts.schedule_to_start));
                put(&mut a, "startToCloseTimeout", seconds(d.timeouts.start_to_close));
                put(&mut a, "heartbeatTimeout", seconds(d.timeouts.heartbeat));
                Value::Object(a)
            }
            Self::ScheduleTimer(d) => json!({
                "timerId": d.schedule_id,
                "startToFireTimeout": d.delay.as_secs().to_string(),
                "control": d.control.to_control()?,
            }),
            Self::ScheduleLambda(d) => {
                let mut a = Map::new();
                a.insert("id".into(), json!(d.schedule_id));
                a.insert("name".into(), json!(d.identity.name()));
                a.insert("control".into(), json!(d.control.to_control()?));
                put(&mut a, "input", d.input.clone());
                put(&mut a, "startToCloseTimeout", seconds(d.timeout));
                Value::Object(a)
            }
            Self::ScheduleChildWorkflow(d) => {
                let mut a = Map::new();
                a.insert(
                    "workflowType".into(),
                    json!({ "name": d.identity.name(), "version": d.identity.version() }),
                );
                a.insert("workflowId".into(), json!(d.workflow_id));
                a.insert("control".into(), json!(d.control.to_control()?));
                put(&mut a, "input", d.input.clone());
                put(&mut a, "taskList", d.task_list.as_ref().map(|t| json!({ "name": t })));
                put(&mut a, "taskPriority", d.task_priority.map(|p| p.to_string()));
                put(&mut a, "childPolicy", d.child_policy.map(ChildPolicy::as_str));
                put(&mut a, "executionStartToCloseTimeout", seconds(d.execution_timeout));
                put(&mut a, "taskStartToCloseTimeout", seconds(d.task_timeout));
                put(&mut a, "lambdaRole", d.lambda_role.clone());
                if !d.tag_list.is_empty() {
                    a.insert("tagList".into(), json!(d.tag_list));
                }
                Value::Object(a)
            }
            Self::CancelActivity { schedule_id, .. } => json!({ "activityId": schedule_id }),
            Self::CancelTimer { schedule_id, .. } => json!({ "timerId": schedule_id }),
            Self::CancelRequestWorkflow { workflow_id, .. } => json!({ "workflowId": workflow_id }),
            Self::CompleteWorkflow { result, .. } => json!({ "result": result }),
            Self::FailWorkflow { reason, details } => json!({ "reason": reason, "details": details }),
            Self::CancelWorkflow { details } => json!({ "details": details }),
            Self::RestartWorkflow(d) => {
                let mut a = Map::new();
                put(&mut a, "input", d.input.clone());
                put(&mut a, "taskList", d.task_list.as_ref().map(|t| json!({ "name": t })));
                put(&mut a, "taskPriority", d.task_priority.map(|p| p.to_string()));
                put(&mut a, "executionStartToCloseTimeout", seconds(d.execution_timeout));
                put(&mut a, "taskStartToCloseTimeout", seconds(d.task_timeout));
                put(&mut a, "childPolicy", d.child_policy.map(ChildPolicy::as_str));
                put(&mut a, "lambdaRole", d.lambda_role.clone());
                put(&mut a, "workflowTypeVersion", d.workflow_type_version.clone());
                if !d.tag_list.is_empty() {
                    a.insert("tagList".into(), json!(d.tag_list));
                }
                Value::Object(a)
            }
            Self::SignalWorkflow(d) => {
                let mut a = Map::new();
                a.insert("workflowId".into(), json!(d.workflow_id));
                a.insert("signalName".into(), json!(d.signal_name));
                put(&mut a, "runId", d.run_id.clone());
                put(&mut a, "input", d.input.clone());
                Value::Object(a)
            }
            Self::RecordMarker { name, details } => {
                let mut a = Map::new();
                a.insert("markerName".into(), json!(name));
                put(&mut a, "details", details.clone());
                Value::Object(a)
            }
        };

        Ok(WireDecision {
            decision_type: self.decision_type().to_owned(),
            attributes,
        })
    }
}

/// A decision in the service's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDecision {
    pub decision_type: String,
    pub attributes: Value,
}

fn put<T: Serialize>(attributes: &mut Map<String, Value>, name: &str, value: Option<T>) {
    if let Some(value) = value {
        attributes.insert(name.to_owned(), json!(value));
    }
}

fn seconds(duration: Option<Duration>) -> Option<String> {
    duration.map(|d| d.as_secs().to_string())
}
