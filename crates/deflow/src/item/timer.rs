use std::sync::Arc;
use std::time::Duration;

use super::{Handlers, ItemBuilder, ItemRef};
use crate::action::WorkflowAction;
use crate::decision::WorkflowDecision;
use crate::error::Result;
use crate::event::{EventType, TimerEvent};

type DelayFn = Arc<dyn Fn(&ItemRef<'_>) -> Duration + Send + Sync>;

/// Configuration of a timer item.
#[derive(Clone, Default)]
pub struct TimerSpec {
    fire_after: Duration,
    fire_after_fn: Option<DelayFn>,
    pub(crate) handlers: Handlers<TimerEvent>,
}

impl TimerSpec {
    pub(crate) fn schedule_decision(&self, item: &ItemRef<'_>) -> WorkflowDecision {
        let delay = match &self.fire_after_fn {
            Some(delay) => delay(item),
            None => self.fire_after,
        };
        WorkflowDecision::schedule_timer(item.identity(), delay)
    }
}

impl std::fmt::Debug for TimerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSpec")
            .field("fire_after", &self.fire_after)
            .field("computed", &self.fire_after_fn.is_some())
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl ItemBuilder<TimerSpec> {
    /// Fire after a fixed delay. Timers fire immediately by default.
    pub fn fire_after(mut self, delay: Duration) -> Self {
        self.spec.fire_after = delay;
        self.spec.fire_after_fn = None;
        self
    }

    /// Compute the delay when the timer is scheduled.
    pub fn fire_after_with<F>(mut self, delay: F) -> Self
    where
        F: Fn(&ItemRef<'_>) -> Duration + Send + Sync + 'static,
    {
        self.spec.fire_after_fn = Some(Arc::new(delay));
        self
    }

    pub fn on_fired<F>(mut self, handler: F) -> Self
    where
        F: Fn(&TimerEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.spec.handlers.insert(EventType::Fired, handler);
        self
    }

    pub fn on_cancelled<F>(mut self, handler: F) -> Self
    where
        F: Fn(&TimerEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.spec.handlers.insert(EventType::Cancelled, handler);
        self
    }

    pub fn on_start_failed<F>(mut self, handler: F) -> Self
    where
        F: Fn(&TimerEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.spec.handlers.insert(EventType::StartFailed, handler);
        self
    }

    pub fn on_cancellation_failed<F>(mut self, handler: F) -> Self
    where
        F: Fn(&TimerEvent, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.spec.handlers.insert(EventType::CancellationFailed, handler);
        self
    }
}
