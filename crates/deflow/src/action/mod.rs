//! Actions: how the workflow responds to an event.
//!
//! Interpreting an event yields a [`WorkflowAction`], either the event's
//! default or one returned by a user handler. Actions are plain values; they
//! only touch history when [`WorkflowAction::decisions`] resolves them against
//! a [`DecisionContext`]. Actions compose with `+`, which concatenates their
//! decisions.
//!
//! ```ignore
//! builder.activity("Charge", "1.0", |a| {
//!     a.on_failure(|_, item| Ok(item.reschedule().after(Duration::from_secs(30)).up_to(Limit::count(3)).into()))
//! })
//! ```

mod jump;
mod restart;
mod retry;
mod schedule;
mod trigger;

use std::collections::HashSet;
use std::ops::Add;

use tracing::trace;

use crate::context::DecisionContext;
use crate::decision::{SignalWorkflowDecision, WorkflowDecision};
use crate::error::{Error, Result};
use crate::identity::Identity;

pub use jump::{JumpAction, JumpBuilder};
pub use restart::RestartAction;
pub use retry::Backoff;
pub use schedule::{Limit, ScheduleItemAction};
pub use trigger::{ContinueAction, IgnoreAction, TriggerAction};

/// A set of items, as queried by [`WorkflowAction::can_schedule_any`].
pub type ItemSet<'a> = HashSet<&'a Identity>;

/// Per-resolution guard against re-entering the scheduling of an item from
/// the same origin.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    in_progress: HashSet<(Identity, Identity)>,
}

impl Scope {
    /// Returns `false` when `from -> to` is already being resolved.
    pub(crate) fn enter(&mut self, from: &Identity, to: &Identity) -> bool {
        self.in_progress.insert((from.clone(), to.clone()))
    }

    pub(crate) fn exit(&mut self, from: &Identity, to: &Identity) {
        self.in_progress.remove(&(from.clone(), to.clone()));
    }
}

/// The response to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowAction {
    /// Do nothing, or let the branch go inactive.
    Ignore(IgnoreAction),
    /// Schedule the children of a completed item whose joins are ready.
    Continue(ContinueAction),
    /// Schedule the startup items.
    Start,
    /// Advance the graph past an item that will not complete normally.
    Trigger(TriggerAction),
    /// Schedule an item in the branch, ignoring its `when` gate.
    Jump(JumpAction),
    /// Schedule an item again, possibly after a delay or up to a limit.
    Schedule(ScheduleItemAction),
    /// Cancel items, or their pending reschedule timers.
    Cancel(Vec<Identity>),
    /// Continue the workflow as a new run.
    Restart(RestartAction),
    /// Fixed decisions.
    Decisions(Vec<WorkflowDecision>),
    /// Several actions; their decisions are concatenated in order.
    Composite(Vec<WorkflowAction>),
}

impl WorkflowAction {
    /// Continue the graph from `item`, which just completed.
    pub fn continue_from(item: Identity) -> Self {
        Self::Continue(ContinueAction {
            completed: Some(item),
        })
    }

    /// Continue the graph from whichever item this action responds to.
    pub fn continue_workflow() -> Self {
        Self::Continue(ContinueAction::default())
    }

    /// Produce no decisions.
    pub fn ignore() -> Self {
        Self::Ignore(IgnoreAction::default())
    }

    /// Produce no decisions for this item but treat its branch as inactive,
    /// so that joins waiting on it may proceed.
    pub fn ignore_branch() -> Self {
        Self::Ignore(IgnoreAction::default().mark_branch_inactive())
    }

    /// Advance the graph past the item this action responds to.
    pub fn trigger() -> Self {
        Self::Trigger(TriggerAction::default())
    }

    pub fn schedule(item: Identity) -> Self {
        Self::Schedule(ScheduleItemAction::new(item))
    }

    pub fn cancel(items: impl IntoIterator<Item = Identity>) -> Self {
        Self::Cancel(items.into_iter().collect())
    }

    pub fn fail_workflow(reason: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Decisions(vec![WorkflowDecision::fail_workflow(reason, details)])
    }

    pub fn cancel_workflow(details: impl Into<String>) -> Self {
        Self::Decisions(vec![WorkflowDecision::cancel_workflow(details)])
    }

    pub fn complete_workflow(result: impl Into<String>) -> Self {
        Self::Decisions(vec![WorkflowDecision::complete_workflow(result)])
    }

    /// Restart with the current run's properties; see [`RestartAction`] to override them.
    pub fn restart_workflow() -> Self {
        Self::Restart(RestartAction::default())
    }

    pub fn record_marker(name: impl Into<String>, details: Option<String>) -> Self {
        Self::Decisions(vec![WorkflowDecision::record_marker(name, details)])
    }

    pub fn signal_workflow(
        workflow_id: impl Into<String>,
        run_id: Option<String>,
        signal_name: impl Into<String>,
        input: Option<String>,
    ) -> Self {
        Self::Decisions(vec![WorkflowDecision::SignalWorkflow(SignalWorkflowDecision {
            workflow_id: workflow_id.into(),
            run_id,
            signal_name: signal_name.into(),
            input,
        })])
    }

    /// Resolve this action to the decisions it stands for.
    pub fn decisions(&self, ctx: DecisionContext<'_>) -> Result<Vec<WorkflowDecision>> {
        self.resolve(ctx, &mut Scope::default())
    }

    pub(crate) fn resolve(
        &self,
        ctx: DecisionContext<'_>,
        scope: &mut Scope,
    ) -> Result<Vec<WorkflowDecision>> {
        trace!(action = self.name(), "resolving action");
        match self {
            Self::Ignore(a) => a.resolve(ctx, scope),
            Self::Continue(a) => a.resolve(ctx, scope),
            Self::Start => trigger::start(ctx, scope),
            Self::Trigger(a) => a.resolve(ctx, scope),
            Self::Jump(a) => a.resolve(ctx, scope),
            Self::Schedule(a) => a.resolve(ctx, scope),
            Self::Cancel(items) => {
                let mut decisions = Vec::new();
                for identity in items {
                    decisions.extend(ctx.item(identity)?.cancel_decisions()?);
                }
                Ok(decisions)
            }
            Self::Restart(a) => a.resolve(ctx),
            Self::Decisions(decisions) => Ok(decisions.clone()),
            Self::Composite(actions) => {
                let mut decisions = Vec::new();
                for action in actions {
                    decisions.extend(action.resolve(ctx, scope)?);
                }
                Ok(decisions)
            }
        }
    }

    /// `true` for actions that move the graph forward.
    pub fn ready_to_schedule_children(&self) -> bool {
        match self {
            Self::Continue(_) | Self::Start => true,
            Self::Composite(actions) => actions.iter().any(Self::ready_to_schedule_children),
            _ => false,
        }
    }

    /// `true` if resolving this action may schedule one of `items`.
    ///
    /// Decided from the action's structure and the graph, without resolving
    /// the action, so it is safe to call while a join is being evaluated.
    pub fn can_schedule_any(&self, ctx: DecisionContext<'_>, items: &ItemSet<'_>) -> bool {
        match self {
            Self::Ignore(a) => a.can_schedule_any(ctx, items),
            Self::Continue(a) => a.can_schedule_any(ctx, items),
            Self::Start => ctx
                .workflow()
                .graph()
                .startup_items()
                .any(|item| items.contains(item.identity())),
            Self::Trigger(a) => a.can_schedule_any(ctx, items),
            Self::Jump(a) => a.can_schedule_any(ctx, items),
            Self::Schedule(a) => a.can_schedule_any(ctx, items),
            Self::Cancel(_) | Self::Restart(_) => false,
            Self::Decisions(decisions) => decisions
                .iter()
                .filter_map(WorkflowDecision::scheduled_item)
                .any(|item| items.contains(item)),
            Self::Composite(actions) => actions.iter().any(|a| a.can_schedule_any(ctx, items)),
        }
    }

    /// Bind `item` as the item this action responds to, where not already set.
    pub fn with_triggered_item(self, item: &Identity) -> Self {
        match self {
            Self::Ignore(a) => Self::Ignore(a.with_triggered_item(item)),
            Self::Continue(ContinueAction { completed }) => Self::Continue(ContinueAction {
                completed: completed.or_else(|| Some(item.clone())),
            }),
            Self::Trigger(a) => Self::Trigger(a.with_triggered_item(item)),
            Self::Jump(a) => Self::Jump(a.with_triggered_item(item)),
            Self::Composite(actions) => Self::Composite(
                actions
                    .into_iter()
                    .map(|a| a.with_triggered_item(item))
                    .collect(),
            ),
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Ignore(_) => "ignore",
            Self::Continue(_) => "continue",
            Self::Start => "start",
            Self::Trigger(_) => "trigger",
            Self::Jump(_) => "jump",
            Self::Schedule(_) => "schedule",
            Self::Cancel(_) => "cancel",
            Self::Restart(_) => "restart",
            Self::Decisions(_) => "decisions",
            Self::Composite(_) => "composite",
        }
    }
}

impl Add for WorkflowAction {
    type Output = WorkflowAction;

    fn add(self, rhs: WorkflowAction) -> WorkflowAction {
        let mut actions = Vec::new();
        for action in [self, rhs] {
            match action {
                Self::Composite(inner) => actions.extend(inner),
                other => actions.push(other),
            }
        }
        Self::Composite(actions)
    }
}

impl From<WorkflowDecision> for WorkflowAction {
    fn from(decision: WorkflowDecision) -> Self {
        Self::Decisions(vec![decision])
    }
}

/// The item an action responds to, required by graph-advancing actions.
fn triggered<'i>(item: &'i Option<Identity>, action: &'static str) -> Result<&'i Identity> {
    item.as_ref().ok_or_else(|| {
        Error::NotSupported(format!(
            "{action} action is not bound to an item; return it from an item handler"
        ))
    })
}
