use std::time::Duration;

use super::{Handlers, ItemBuilder, ItemInput, ItemRef};
use crate::action::WorkflowAction;
use crate::decision::{ScheduleChildWorkflowDecision, WorkflowDecision};
use crate::error::Result;
use crate::event::{ChildWorkflowEvent, EventType};
use crate::history::ChildPolicy;
use crate::identity::ScheduleData;

/// Configuration of a child workflow item.
///
/// Unset options fall back to the defaults registered for the child's
/// workflow type.
#[derive(Clone, Default, Debug)]
pub struct ChildWorkflowSpec {
    input: ItemInput,
    task_list: Option<String>,
    task_priority: Option<i32>,
    child_policy: Option<ChildPolicy>,
    execution_timeout: Option<Duration>,
    task_timeout: Option<Duration>,
    tag_list: Vec<String>,
    lambda_role: Option<String>,
    pub(crate) handlers: Handlers<ChildWorkflowEvent>,
}

impl ChildWorkflowSpec {
    pub(crate) fn schedule_decision(&self, item: &ItemRef<'_>) -> WorkflowDecision {
        let identity = item.identity();
        WorkflowDecision::ScheduleChildWorkflow(ScheduleChildWorkflowDecision {
            identity: identity.clone(),
            workflow_id: item.schedule_id(),
            input: item.input(&self.input),
            task_list: self.task_list.clone(),
            task_priority: self.task_priority,
            child_policy: self.child_policy,
            execution_timeout: self.execution_timeout,
            task_timeout: self.task_timeout,
            tag_list: self.tag_list.clone(),
            lambda_role: self.lambda_role.clone(),
            control: ScheduleData::for_item(identity),
        })
    }
}

impl ItemBuilder<ChildWorkflowSpec> {
    /// Compute the child's input. Defaults to the workflow input.
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

    pub fn with_child_policy(mut self, policy: ChildPolicy) -> Self {
        self.spec.child_policy = Some(policy);
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.spec.execution_timeout = Some(timeout);
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.spec.task_timeout = Some(timeout);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.spec.tag_list.push(tag.into());
        self
    }

    pub fn with_lambda_role(mut self, role: impl Into<String>) -> Self {
        self.spec.lambda_role = Some(role.into());
        self
    }

    pub fn on_completion<F>(self, handler: F) -> Self
    where
        F: Fn(&ChildWorkflowEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::Completed, handler)
    }

    pub fn on_failure<F>(self, handler: F) -> Self
    where
        F: Fn(&ChildWorkflowEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::Failed, handler)
    }

    pub fn on_timeout<F>(self, handler: F) -> Self
    where
        F: Fn(&ChildWorkflowEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::TimedOut, handler)
    }

    pub fn on_cancelled<F>(self, handler: F) -> Self
    where
        F: Fn(&ChildWorkflowEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::Cancelled, handler)
    }

    pub fn on_terminated<F>(self, handler: F) -> Self
    where
        F: Fn(&ChildWorkflowEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::Terminated, handler)
    }

    pub fn on_start_failed<F>(self, handler: F) -> Self
    where
        F: Fn(&ChildWorkflowEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::StartFailed, handler)
    }

    pub fn on_cancellation_failed<F>(self, handler: F) -> Self
    where
        F: Fn(&ChildWorkflowEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::CancellationFailed, handler)
    }

    fn on<F>(mut self, event_type: EventType, handler: F) -> Self
    where
        F: Fn(&ChildWorkflowEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.spec.handlers.insert(event_type, handler);
        self
    }
}
