//! Workflow definitions and their builder.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::action::WorkflowAction;
use crate::config::DeciderConfig;
use crate::context::DecisionContext;
use crate::decider;
use crate::decision::WorkflowDecision;
use crate::error::{Error, Result};
use crate::event::{WorkflowCancelRequestedEvent, WorkflowSignaledEvent, WorkflowStartedEvent};
use crate::history::WorkflowHistoryEvents;
use crate::identity::Identity;
use crate::item::{
    ActivitySpec, ChildWorkflowSpec, ItemBuilder, ItemGraph, ItemSpec, LambdaSpec, TimerSpec,
    WorkflowItem,
};

/// Handler of a workflow-level event.
pub type WorkflowHandler<E> =
    Arc<dyn Fn(&E, DecisionContext<'_>) -> Result<WorkflowAction> + Send + Sync>;

/// A workflow definition: the item graph plus workflow-level handlers.
///
/// Immutable once built. A single definition decides for any number of runs,
/// concurrently if needed; all per-run state comes from the history passed to
/// [`decide`](Self::decide).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use deflow::Workflow;
///
/// let workflow = Workflow::builder()
///     .activity("Download", "1.0", |a| a)
///     .timer("Cooldown", |t| t.after_activity("Download", "1.0").fire_after(Duration::from_secs(60)))
///     .activity("Transcode", "1.0", |a| a.after_timer("Cooldown").on_task_list("encoders"))
///     .build()
///     .unwrap();
///
/// assert_eq!(workflow.graph().items().len(), 3);
/// ```
pub struct Workflow {
    graph: ItemGraph,
    config: DeciderConfig,
    pub(crate) on_started: Option<WorkflowHandler<WorkflowStartedEvent>>,
    pub(crate) on_cancel_requested: Option<WorkflowHandler<WorkflowCancelRequestedEvent>>,
    pub(crate) on_signal: HashMap<String, WorkflowHandler<WorkflowSignaledEvent>>,
}

impl Workflow {
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::default()
    }

    pub fn graph(&self) -> &ItemGraph {
        &self.graph
    }

    pub fn config(&self) -> &DeciderConfig {
        &self.config
    }

    /// View `history` through this workflow.
    pub fn context<'a>(&'a self, history: &'a WorkflowHistoryEvents) -> DecisionContext<'a> {
        DecisionContext::new(self, history)
    }

    /// Decide the next batch of decisions for the run described by `history`.
    ///
    /// Deterministic: the same history always yields the same batch.
    pub fn decide(&self, history: &WorkflowHistoryEvents) -> Result<Vec<WorkflowDecision>> {
        decider::decide(self, history)
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("items", &self.graph.items().len())
            .field("config", &self.config)
            .field("signals", &self.on_signal.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Fluent construction of a [`Workflow`].
///
/// Each item is configured through a closure over its [`ItemBuilder`].
/// Invalid names and dependencies are reported by [`build`](Self::build);
/// the first error wins.
#[derive(Default)]
pub struct WorkflowBuilder {
    items: Vec<WorkflowItem>,
    config: DeciderConfig,
    on_started: Option<WorkflowHandler<WorkflowStartedEvent>>,
    on_cancel_requested: Option<WorkflowHandler<WorkflowCancelRequestedEvent>>,
    on_signal: HashMap<String, WorkflowHandler<WorkflowSignaledEvent>>,
    error: Option<Error>,
}

impl WorkflowBuilder {
    pub fn activity<F>(self, name: &str, version: &str, configure: F) -> Self
    where
        F: FnOnce(ItemBuilder<ActivitySpec>) -> ItemBuilder<ActivitySpec>,
    {
        self.activity_at(name, version, "", configure)
    }

    /// Add an activity scheduled under a positional name, so that the same
    /// activity type can appear several times in one workflow.
    pub fn activity_at<F>(self, name: &str, version: &str, positional_name: &str, configure: F) -> Self
    where
        F: FnOnce(ItemBuilder<ActivitySpec>) -> ItemBuilder<ActivitySpec>,
    {
        let item = Identity::activity(name, version, positional_name).and_then(|identity| {
            configure(ItemBuilder::new(identity, ActivitySpec::default())).build(ItemSpec::Activity)
        });
        self.push(item)
    }

    pub fn timer<F>(self, name: &str, configure: F) -> Self
    where
        F: FnOnce(ItemBuilder<TimerSpec>) -> ItemBuilder<TimerSpec>,
    {
        let item = Identity::timer(name).and_then(|identity| {
            configure(ItemBuilder::new(identity, TimerSpec::default())).build(ItemSpec::Timer)
        });
        self.push(item)
    }

    pub fn lambda<F>(self, name: &str, configure: F) -> Self
    where
        F: FnOnce(ItemBuilder<LambdaSpec>) -> ItemBuilder<LambdaSpec>,
    {
        self.lambda_at(name, "", configure)
    }

    pub fn lambda_at<F>(self, name: &str, positional_name: &str, configure: F) -> Self
    where
        F: FnOnce(ItemBuilder<LambdaSpec>) -> ItemBuilder<LambdaSpec>,
    {
        let item = Identity::lambda(name, positional_name).and_then(|identity| {
            configure(ItemBuilder::new(identity, LambdaSpec::default())).build(ItemSpec::Lambda)
        });
        self.push(item)
    }

    pub fn child_workflow<F>(self, name: &str, version: &str, configure: F) -> Self
    where
        F: FnOnce(ItemBuilder<ChildWorkflowSpec>) -> ItemBuilder<ChildWorkflowSpec>,
    {
        self.child_workflow_at(name, version, "", configure)
    }

    pub fn child_workflow_at<F>(
        self,
        name: &str,
        version: &str,
        positional_name: &str,
        configure: F,
    ) -> Self
    where
        F: FnOnce(ItemBuilder<ChildWorkflowSpec>) -> ItemBuilder<ChildWorkflowSpec>,
    {
        let item = Identity::child_workflow(name, version, positional_name).and_then(|identity| {
            configure(ItemBuilder::new(identity, ChildWorkflowSpec::default()))
                .build(ItemSpec::ChildWorkflow)
        });
        self.push(item)
    }

    pub fn config(mut self, config: DeciderConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default response to the run being started.
    pub fn on_start<F>(mut self, handler: F) -> Self
    where
        F: Fn(&WorkflowStartedEvent, DecisionContext<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on_started = Some(Arc::new(handler));
        self
    }

    /// Replace the default response to a cancellation request.
    pub fn on_cancellation_requested<F>(mut self, handler: F) -> Self
    where
        F: Fn(&WorkflowCancelRequestedEvent, DecisionContext<'_>) -> Result<WorkflowAction>
            + Send
            + Sync
            + 'static,
    {
        self.on_cancel_requested = Some(Arc::new(handler));
        self
    }

    /// Respond to the signal `name`. Other signals are ignored.
    pub fn on_signal<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&WorkflowSignaledEvent, DecisionContext<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.on_signal.insert(name.into(), Arc::new(handler));
        self
    }

    fn push(mut self, item: Result<WorkflowItem>) -> Self {
        match item {
            Ok(item) => self.items.push(item),
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    /// Validate the item graph and build the workflow.
    ///
    /// Fails with the first recorded configuration error, or with
    /// [`Error::DuplicateItem`], [`Error::UnknownParent`] or
    /// [`Error::CyclicDependency`] from graph validation.
    pub fn build(self) -> Result<Workflow> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Workflow {
            graph: ItemGraph::build(self.items)?,
            config: self.config,
            on_started: self.on_started,
            on_cancel_requested: self.on_cancel_requested,
            on_signal: self.on_signal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_reports_first_identity_error() {
        let err = Workflow::builder()
            .activity("", "1.0", |a| a)
            .timer("Wait", |t| t.after_activity("Missing", ""))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::InvalidArgument { argument: "name", .. }));
    }

    #[test]
    fn builder_errors_inside_items_are_deferred() {
        let err = Workflow::builder()
            .activity("A", "1.0", |a| a)
            .timer("Wait", |t| t.after_activity("A", " "))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::InvalidArgument { argument: "version", .. }));
    }

    #[test]
    fn graph_errors_surface_at_build() {
        let err = Workflow::builder()
            .activity("A", "1.0", |a| a.after_timer("Nope"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParent { .. }));

        let err = Workflow::builder()
            .lambda("L", |l| l.after_lambda("L"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::CyclicDependency(_)));
    }

    #[test]
    fn items_keep_declaration_order() {
        let workflow = Workflow::builder()
            .lambda("First", |l| l)
            .activity_at("Copy", "1.0", "left", |a| a.after_lambda("First"))
            .activity_at("Copy", "1.0", "right", |a| a.after_lambda("First"))
            .build()
            .unwrap();

        let names: Vec<_> = workflow
            .graph()
            .items()
            .iter()
            .map(|item| item.identity().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["lambda 'First'", "activity 'Copy' v1.0 [left]", "activity 'Copy' v1.0 [right]"]
        );
    }
}
