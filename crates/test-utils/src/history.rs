//! Synthetic workflow histories.
//!
//! Features:
//! - Event ids are assigned in recording order, starting at 1.
//! - Timestamps advance by one second per event.
//! - Outcome events reference the latest scheduling event of the same item,
//!   so tests only name the item, never event ids.
//!
//! # Example
//!
//! ```
//! use deflow::Identity;
//! use test_utils::HistoryBuilder;
//!
//! let download = Identity::activity("Download", "1.0", "").unwrap();
//! let history = HistoryBuilder::new("wf-1", "run-1")
//!     .started(None)
//!     .decision_completed()
//!     .activity_scheduled(&download)
//!     .activity_completed(&download, "ok")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(history.new_events().count(), 2);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use deflow::history::{
    ActivityTaskScheduled, ActivityType, ChildWorkflowClosed, ChildWorkflowStarted,
    DecisionTaskCompleted, EventAttributes, ItemFailure, LambdaFunctionScheduled, TaskCanceled,
    TaskFailure, TaskResult, TaskStarted, TaskTimeout, TimerRef, TimerStarted,
    StartChildWorkflowExecutionInitiated, WorkflowExecutionCancelRequested,
    WorkflowExecutionSignaled, WorkflowExecutionStarted, WorkflowType,
};
use deflow::{
    HistoryEvent, Identity, ScheduleData, ScheduleId, TimerKind, WorkflowExecution,
    WorkflowHistoryEvents,
};
use time::OffsetDateTime;

/// Scheduling and start event ids of one item's latest attempt.
#[derive(Debug, Clone, Copy, Default)]
struct Attempt {
    scheduled: i64,
    started: i64,
}

/// Records the history of one workflow run.
#[derive(Debug, Clone)]
pub struct HistoryBuilder {
    execution: WorkflowExecution,
    events: Vec<HistoryEvent>,
    last_event_id: i64,
    clock: OffsetDateTime,
    attempts: HashMap<(ScheduleId, bool), Attempt>,
}

impl HistoryBuilder {
    pub fn new(workflow_id: &str, run_id: &str) -> Self {
        Self {
            execution: WorkflowExecution::new(workflow_id, run_id),
            events: Vec::new(),
            last_event_id: 0,
            clock: OffsetDateTime::UNIX_EPOCH,
            attempts: HashMap::new(),
        }
    }

    /// Id the next recorded event receives.
    pub fn next_event_id(&self) -> i64 {
        self.last_event_id + 1
    }

    /// Record an arbitrary event.
    pub fn event(mut self, attributes: EventAttributes) -> Self {
        self.record(attributes);
        self
    }

    fn record(&mut self, attributes: EventAttributes) -> i64 {
        let event_id = self.next_event_id();
        self.last_event_id = event_id;
        self.clock += time::Duration::seconds(1);
        self.events.push(HistoryEvent::new(event_id, self.clock, attributes));
        event_id
    }

    fn schedule_id(&self, identity: &Identity) -> ScheduleId {
        identity.schedule_id(&self.execution.run_id)
    }

    fn attempt(&self, identity: &Identity, reschedule: bool) -> Attempt {
        self.attempts
            .get(&(self.schedule_id(identity), reschedule))
            .copied()
            .unwrap_or_default()
    }

    fn control(data: ScheduleData) -> Option<String> {
        Some(data.to_control().expect("control data serializes"))
    }

    // ========================================================================
    // Workflow events
    // ========================================================================

    pub fn started(self, input: Option<&str>) -> Self {
        self.started_with(WorkflowExecutionStarted {
            input: input.map(str::to_owned),
            ..WorkflowExecutionStarted::default()
        })
    }

    pub fn started_with(self, attributes: WorkflowExecutionStarted) -> Self {
        self.event(EventAttributes::WorkflowExecutionStarted(attributes))
    }

    /// Mark every event recorded so far as already decided on.
    pub fn decision_completed(self) -> Self {
        self.event(EventAttributes::DecisionTaskCompleted(DecisionTaskCompleted::default()))
    }

    pub fn signaled(self, name: &str, input: Option<&str>) -> Self {
        self.event(EventAttributes::WorkflowExecutionSignaled(WorkflowExecutionSignaled {
            signal_name: name.to_owned(),
            input: input.map(str::to_owned),
            external_initiated_event_id: None,
        }))
    }

    pub fn cancel_requested(self, cause: Option<&str>) -> Self {
        self.event(EventAttributes::WorkflowExecutionCancelRequested(
            WorkflowExecutionCancelRequested {
                cause: cause.map(str::to_owned),
                external_initiated_event_id: None,
            },
        ))
    }

    // ========================================================================
    // Activities
    // ========================================================================

    pub fn activity_scheduled(mut self, identity: &Identity) -> Self {
        let schedule_id = self.schedule_id(identity);
        let scheduled = self.record(EventAttributes::ActivityTaskScheduled(ActivityTaskScheduled {
            activity_type: ActivityType {
                name: identity.name().to_owned(),
                version: identity.version().unwrap_or_default().to_owned(),
            },
            activity_id: schedule_id.to_string(),
            control: Self::control(ScheduleData::for_item(identity)),
            ..ActivityTaskScheduled::default()
        }));
        self.attempts.insert(
            (schedule_id, false),
            Attempt {
                scheduled,
                started: 0,
            },
        );
        self
    }

    pub fn activity_started(mut self, identity: &Identity) -> Self {
        let scheduled = self.attempt(identity, false).scheduled;
        let started = self.record(EventAttributes::ActivityTaskStarted(TaskStarted {
            scheduled_event_id: scheduled,
            identity: Some("worker-1".to_owned()),
        }));
        let key = (self.schedule_id(identity), false);
        self.attempts.insert(key, Attempt { scheduled, started });
        self
    }

    pub fn activity_completed(mut self, identity: &Identity, result: &str) -> Self {
        let attempt = self.attempt(identity, false);
        self.record(EventAttributes::ActivityTaskCompleted(TaskResult {
            scheduled_event_id: attempt.scheduled,
            started_event_id: attempt.started,
            result: Some(result.to_owned()),
        }));
        self
    }

    pub fn activity_failed(mut self, identity: &Identity, reason: &str, details: &str) -> Self {
        let attempt = self.attempt(identity, false);
        self.record(EventAttributes::ActivityTaskFailed(TaskFailure {
            scheduled_event_id: attempt.scheduled,
            started_event_id: attempt.started,
            reason: Some(reason.to_owned()),
            details: Some(details.to_owned()),
        }));
        self
    }

    pub fn activity_timed_out(mut self, identity: &Identity, timeout_type: &str) -> Self {
        let attempt = self.attempt(identity, false);
        self.record(EventAttributes::ActivityTaskTimedOut(TaskTimeout {
            scheduled_event_id: attempt.scheduled,
            started_event_id: attempt.started,
            timeout_type: timeout_type.to_owned(),
            details: None,
        }));
        self
    }

    pub fn activity_cancelled(mut self, identity: &Identity) -> Self {
        let attempt = self.attempt(identity, false);
        self.record(EventAttributes::ActivityTaskCanceled(TaskCanceled {
            scheduled_event_id: attempt.scheduled,
            started_event_id: attempt.started,
            details: None,
        }));
        self
    }

    pub fn activity_scheduling_failed(self, identity: &Identity, cause: &str) -> Self {
        let id = self.schedule_id(identity).into_inner();
        self.event(EventAttributes::ScheduleActivityTaskFailed(ItemFailure {
            id,
            name: Some(identity.name().to_owned()),
            version: identity.version().map(str::to_owned),
            cause: cause.to_owned(),
        }))
    }

    // ========================================================================
    // Timers
    // ========================================================================

    pub fn timer_started(self, identity: &Identity, delay: Duration) -> Self {
        self.start_timer(identity, TimerKind::WorkflowItem, delay)
    }

    pub fn timer_fired(self, identity: &Identity) -> Self {
        self.finish_timer(identity, false, true)
    }

    pub fn timer_cancelled(self, identity: &Identity) -> Self {
        self.finish_timer(identity, false, false)
    }

    /// Start the reschedule timer owned by `identity`.
    pub fn reschedule_timer_started(self, identity: &Identity, delay: Duration) -> Self {
        self.start_timer(identity, TimerKind::Reschedule, delay)
    }

    pub fn reschedule_timer_fired(self, identity: &Identity) -> Self {
        self.finish_timer(identity, true, true)
    }

    pub fn reschedule_timer_cancelled(self, identity: &Identity) -> Self {
        self.finish_timer(identity, true, false)
    }

    /// Record that the reschedule timer owned by `identity` could not start.
    pub fn reschedule_timer_start_failed(self, identity: &Identity, cause: &str) -> Self {
        let failure = self.timer_failure(identity, cause);
        self.event(EventAttributes::StartTimerFailed(failure))
    }

    /// Record that cancelling the reschedule timer owned by `identity` failed.
    pub fn reschedule_timer_cancel_failed(self, identity: &Identity, cause: &str) -> Self {
        let failure = self.timer_failure(identity, cause);
        self.event(EventAttributes::CancelTimerFailed(failure))
    }

    fn timer_failure(&self, identity: &Identity, cause: &str) -> ItemFailure {
        ItemFailure {
            id: self.schedule_id(identity).into_inner(),
            cause: cause.to_owned(),
            ..ItemFailure::default()
        }
    }

    fn start_timer(mut self, identity: &Identity, kind: TimerKind, delay: Duration) -> Self {
        let schedule_id = self.schedule_id(identity);
        let started = self.record(EventAttributes::TimerStarted(TimerStarted {
            timer_id: schedule_id.to_string(),
            control: Self::control(ScheduleData::for_timer(identity, kind)),
            start_to_fire_timeout: delay,
        }));
        let reschedule = kind == TimerKind::Reschedule;
        self.attempts.insert(
            (schedule_id, reschedule),
            Attempt {
                scheduled: started,
                started,
            },
        );
        self
    }

    fn finish_timer(mut self, identity: &Identity, reschedule: bool, fired: bool) -> Self {
        let timer = TimerRef {
            timer_id: self.schedule_id(identity).into_inner(),
            started_event_id: self.attempt(identity, reschedule).started,
        };
        self.record(if fired {
            EventAttributes::TimerFired(timer)
        } else {
            EventAttributes::TimerCanceled(timer)
        });
        self
    }

    // ========================================================================
    // Lambdas
    // ========================================================================

    pub fn lambda_scheduled(mut self, identity: &Identity) -> Self {
        let schedule_id = self.schedule_id(identity);
        let scheduled = self.record(EventAttributes::LambdaFunctionScheduled(LambdaFunctionScheduled {
            id: schedule_id.to_string(),
            name: identity.name().to_owned(),
            control: Self::control(ScheduleData::for_item(identity)),
            ..LambdaFunctionScheduled::default()
        }));
        self.attempts.insert(
            (schedule_id, false),
            Attempt {
                scheduled,
                started: 0,
            },
        );
        self
    }

    pub fn lambda_completed(mut self, identity: &Identity, result: &str) -> Self {
        let attempt = self.attempt(identity, false);
        self.record(EventAttributes::LambdaFunctionCompleted(TaskResult {
            scheduled_event_id: attempt.scheduled,
            started_event_id: attempt.started,
            result: Some(result.to_owned()),
        }));
        self
    }

    pub fn lambda_failed(mut self, identity: &Identity, reason: &str, details: &str) -> Self {
        let attempt = self.attempt(identity, false);
        self.record(EventAttributes::LambdaFunctionFailed(TaskFailure {
            scheduled_event_id: attempt.scheduled,
            started_event_id: attempt.started,
            reason: Some(reason.to_owned()),
            details: Some(details.to_owned()),
        }));
        self
    }

    // ========================================================================
    // Child workflows
    // ========================================================================

    pub fn child_workflow_initiated(mut self, identity: &Identity) -> Self {
        let schedule_id = self.schedule_id(identity);
        let initiated = self.record(EventAttributes::StartChildWorkflowExecutionInitiated(
            StartChildWorkflowExecutionInitiated {
                workflow_id: schedule_id.to_string(),
                workflow_type: WorkflowType {
                    name: identity.name().to_owned(),
                    version: identity.version().unwrap_or_default().to_owned(),
                },
                control: Self::control(ScheduleData::for_item(identity)),
                ..StartChildWorkflowExecutionInitiated::default()
            },
        ));
        self.attempts.insert(
            (schedule_id, false),
            Attempt {
                scheduled: initiated,
                started: 0,
            },
        );
        self
    }

    pub fn child_workflow_started(mut self, identity: &Identity) -> Self {
        let initiated = self.attempt(identity, false).scheduled;
        let workflow_execution = self.child_execution(identity);
        let started = self.record(EventAttributes::ChildWorkflowExecutionStarted(ChildWorkflowStarted {
            initiated_event_id: initiated,
            workflow_execution,
        }));
        let key = (self.schedule_id(identity), false);
        self.attempts.insert(
            key,
            Attempt {
                scheduled: initiated,
                started,
            },
        );
        self
    }

    pub fn child_workflow_completed(mut self, identity: &Identity, result: &str) -> Self {
        let closed = ChildWorkflowClosed {
            result: Some(result.to_owned()),
            ..self.child_closed(identity)
        };
        self.record(EventAttributes::ChildWorkflowExecutionCompleted(closed));
        self
    }

    pub fn child_workflow_failed(mut self, identity: &Identity, reason: &str, details: &str) -> Self {
        let closed = ChildWorkflowClosed {
            reason: Some(reason.to_owned()),
            details: Some(details.to_owned()),
            ..self.child_closed(identity)
        };
        self.record(EventAttributes::ChildWorkflowExecutionFailed(closed));
        self
    }

    fn child_execution(&self, identity: &Identity) -> WorkflowExecution {
        WorkflowExecution::new(self.schedule_id(identity).into_inner(), "child-run")
    }

    fn child_closed(&self, identity: &Identity) -> ChildWorkflowClosed {
        let attempt = self.attempt(identity, false);
        ChildWorkflowClosed {
            initiated_event_id: attempt.scheduled,
            started_event_id: attempt.started,
            workflow_execution: self.child_execution(identity),
            ..ChildWorkflowClosed::default()
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// The raw events recorded so far, oldest first.
    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }

    /// Index the recorded events for a decision cycle.
    pub fn build(&self) -> deflow::Result<WorkflowHistoryEvents> {
        WorkflowHistoryEvents::new(self.execution.clone(), self.events.clone())
    }
}
