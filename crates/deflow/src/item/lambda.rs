use std::time::Duration;

use super::{Handlers, ItemBuilder, ItemInput, ItemRef};
use crate::action::WorkflowAction;
use crate::decision::{ScheduleLambdaDecision, WorkflowDecision};
use crate::error::Result;
use crate::event::{EventType, LambdaEvent};
use crate::identity::ScheduleData;

/// Configuration of a lambda function item.
#[derive(Clone, Default, Debug)]
pub struct LambdaSpec {
    input: ItemInput,
    timeout: Option<Duration>,
    pub(crate) handlers: Handlers<LambdaEvent>,
}

impl LambdaSpec {
    pub(crate) fn schedule_decision(&self, item: &ItemRef<'_>) -> WorkflowDecision {
        let identity = item.identity();
        WorkflowDecision::ScheduleLambda(ScheduleLambdaDecision {
            identity: identity.clone(),
            schedule_id: item.schedule_id(),
            input: item.input(&self.input),
            timeout: self.timeout,
            control: ScheduleData::for_item(identity),
        })
    }
}

impl ItemBuilder<LambdaSpec> {
    /// Compute the function's input. Defaults to the workflow input.
    pub fn with_input<F>(mut self, input: F) -> Self
    where
        F: Fn(&ItemRef<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.spec.input.set(input);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout = Some(timeout);
        self
    }

    pub fn on_completion<F>(self, handler: F) -> Self
    where
        F: Fn(&LambdaEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::Completed, handler)
    }

    pub fn on_failure<F>(self, handler: F) -> Self
    where
        F: Fn(&LambdaEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::Failed, handler)
    }

    pub fn on_timeout<F>(self, handler: F) -> Self
    where
        F: Fn(&LambdaEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::TimedOut, handler)
    }

    pub fn on_scheduling_failed<F>(self, handler: F) -> Self
    where
        F: Fn(&LambdaEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::SchedulingFailed, handler)
    }

    pub fn on_start_failed<F>(self, handler: F) -> Self
    where
        F: Fn(&LambdaEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on(EventType::StartFailed, handler)
    }

    fn on<F>(mut self, event_type: EventType, handler: F) -> Self
    where
        F: Fn(&LambdaEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.spec.handlers.insert(event_type, handler);
        self
    }
}
