use std::time::Duration;

use super::{Handlers, ItemBuilder, ItemInput, ItemRef};
use crate::action::WorkflowAction;
use crate::decision::{ActivityTimeouts, ScheduleActivityDecision, WorkflowDecision};
use crate::error::Result;
use crate::event::{ActivityEvent, EventType};
use crate::identity::ScheduleData;

/// Configuration of an activity item.
#[derive(Clone, Default, Debug)]
pub struct ActivitySpec {
    input: ItemInput,
    task_list: Option<String>,
    task_priority: Option<i32>,
    timeouts: ActivityTimeouts,
    pub(crate) handlers: Handlers<ActivityEvent>,
}

impl ActivitySpec {
    pub(crate) fn schedule_decision(&self, item: &ItemRef<'_>) -> WorkflowDecision {
        let identity = item.identity();
        WorkflowDecision::ScheduleActivity(ScheduleActivityDecision {
            identity: identity.clone(),
            schedule_id: item.schedule_id(),
            input: item.input(&self.input),
            task_list: self.task_list.clone(),
            task_priority: self.task_priority,
            timeouts: self.timeouts.clone(),
            control: ScheduleData::for_item(identity),
        })
    }
}

impl ItemBuilder<ActivitySpec> {
    /// Compute the activity's input. Defaults to the workflow input.
    pub fn with_input<F>(mut self, input: F) -> Self
    where
        F: Fn(&ItemRef<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.spec.input.set(input);
        self
    }

    pub fn on_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.spec.task_list = Some(task_list.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.spec.task_priority = Some(priority);
        self
    }

    pub fn with_timeouts(mut self, timeouts: ActivityTimeouts) -> Self {
        self.spec.timeouts = timeouts;
        self
    }

    pub fn with_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeouts.start_to_close = Some(timeout);
        self
    }

    pub fn on_completion<F>(self, handler: F) -> Self
    where
        F: Fn(&ActivityEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::Completed, handler)
    }

    pub fn on_failure<F>(self, handler: F) -> Self
    where
        F: Fn(&ActivityEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::Failed, handler)
    }

    pub fn on_timeout<F>(self, handler: F) -> Self
    where
        F: Fn(&ActivityEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::TimedOut, handler)
    }

    pub fn on_cancelled<F>(self, handler: F) -> Self
    where
        F: Fn(&ActivityEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::Cancelled, handler)
    }

    pub fn on_scheduling_failed<F>(self, handler: F) -> Self
    where
        F: Fn(&ActivityEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::SchedulingFailed, handler)
    }

    pub fn on_cancellation_failed<F>(self, handler: F) -> Self
    where
        F: Fn(&ActivityEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::CancellationFailed, handler)
    }

    fn on<F>(mut self, event_type: EventType, handler: F) -> Self
    where
        F: Fn(&ActivityEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.spec.handlers.insert(event_type, handler);
        self
    }
}
