//! Workflow items: the nodes of the dependency graph.
//!
//! A [`WorkflowItem`] is defined once, when the workflow is built, and holds
//! only configuration: its identity, its parents and the callbacks supplied
//! through an [`ItemBuilder`]. Everything that depends on history goes through
//! an [`ItemRef`], which pairs an item with the [`DecisionContext`] of the
//! current cycle. Items themselves are never mutated after build, so one
//! workflow definition can serve any number of concurrent decision cycles.

mod activity;
mod child_workflow;
mod graph;
mod lambda;
mod timer;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::action::{JumpBuilder, Scope, ScheduleItemAction, WorkflowAction};
use crate::context::DecisionContext;
use crate::decision::WorkflowDecision;
use crate::error::{Error, Result};
use crate::event::{EventType, WorkflowItemEvent};
use crate::identity::{Identity, ItemKind, ScheduleId};

pub use activity::ActivitySpec;
pub use child_workflow::ChildWorkflowSpec;
pub use graph::ItemGraph;
pub use lambda::LambdaSpec;
pub use timer::TimerSpec;

/// Gate evaluated before an item is scheduled.
pub type WhenFn = Arc<dyn Fn(&ItemRef<'_>) -> bool + Send + Sync>;

/// Callback producing an action for an item, e.g. the false branch of a gate.
pub type ActionFn = Arc<dyn Fn(&ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync>;

/// Callback producing the input of a scheduling decision.
pub type InputFn = Arc<dyn Fn(&ItemRef<'_>) -> Option<String> + Send + Sync>;

/// Input source of a scheduling decision; the workflow input unless set.
#[derive(Clone, Default)]
pub(crate) struct ItemInput(Option<InputFn>);

impl ItemInput {
    pub(crate) fn set<F>(&mut self, input: F)
    where
        F: Fn(&ItemRef<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.0 = Some(Arc::new(input));
    }
}

impl fmt::Debug for ItemInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "custom" } else { "workflow input" })
    }
}

/// Per-event-type handler overriding the default action.
pub type Handler<E> = Arc<dyn Fn(&E, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync>;

/// Handlers of one item, keyed by the event type they respond to.
pub struct Handlers<E> {
    map: HashMap<EventType, Handler<E>>,
}

impl<E> Handlers<E> {
    pub fn get(&self, event_type: EventType) -> Option<&Handler<E>> {
        self.map.get(&event_type)
    }

    pub(crate) fn insert<F>(&mut self, event_type: EventType, handler: F)
    where
        F: Fn(&E, &ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.map.insert(event_type, Arc::new(handler));
    }
}

impl<E> Default for Handlers<E> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
        }
    }
}

impl<E> Clone for Handlers<E> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

impl<E> fmt::Debug for Handlers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.map.keys()).finish()
    }
}

/// Kind-specific configuration of an item.
#[derive(Clone, Debug)]
pub enum ItemSpec {
    Activity(ActivitySpec),
    Timer(TimerSpec),
    Lambda(LambdaSpec),
    ChildWorkflow(ChildWorkflowSpec),
}

/// A node of the workflow graph.
#[derive(Clone)]
pub struct WorkflowItem {
    identity: Identity,
    parents: Vec<Identity>,
    when: Option<WhenFn>,
    when_false: Option<ActionFn>,
    spec: ItemSpec,
}

impl WorkflowItem {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Identities this item waits for, in declaration order.
    pub fn parent_identities(&self) -> &[Identity] {
        &self.parents
    }

    pub fn spec(&self) -> &ItemSpec {
        &self.spec
    }

    pub fn is_startup(&self) -> bool {
        self.parents.is_empty()
    }
}

impl fmt::Debug for WorkflowItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowItem")
            .field("identity", &self.identity)
            .field("parents", &self.parents)
            .field("has_when", &self.when.is_some())
            .field("spec", &self.spec)
            .finish()
    }
}

// ============================================================================
// ItemRef: an item within one decision cycle
// ============================================================================

/// An item seen through the history of the current decision cycle.
#[derive(Clone, Copy)]
pub struct ItemRef<'a> {
    item: &'a WorkflowItem,
    ctx: DecisionContext<'a>,
}

impl<'a> ItemRef<'a> {
    pub(crate) fn new(item: &'a WorkflowItem, ctx: DecisionContext<'a>) -> Self {
        Self { item, ctx }
    }

    pub fn identity(&self) -> &'a Identity {
        &self.item.identity
    }

    pub fn item(&self) -> &'a WorkflowItem {
        self.item
    }

    pub fn spec(&self) -> &'a ItemSpec {
        &self.item.spec
    }

    pub fn context(&self) -> DecisionContext<'a> {
        self.ctx
    }

    /// Wire-level id of this item in the current run.
    pub fn schedule_id(&self) -> ScheduleId {
        self.item.identity.schedule_id(self.ctx.history().run_id())
    }

    /// `true` for items without parents, which the workflow starts with.
    pub fn is_startup(&self) -> bool {
        self.item.is_startup()
    }

    pub fn parents(&self) -> impl Iterator<Item = ItemRef<'a>> + use<'a> {
        let ctx = self.ctx;
        ctx.workflow()
            .graph()
            .parents(&self.item.identity)
            .map(move |item| ItemRef::new(item, ctx))
    }

    pub fn children(&self) -> impl Iterator<Item = ItemRef<'a>> + use<'a> {
        let ctx = self.ctx;
        ctx.workflow()
            .graph()
            .children(&self.item.identity)
            .map(move |item| ItemRef::new(item, ctx))
    }

    /// This item's events, newest first, optionally merged with the events of
    /// its reschedule timer.
    pub fn all_events(&self, include_reschedule: bool) -> Vec<&'a WorkflowItemEvent> {
        let history = self.ctx.history();
        let schedule_id = self.schedule_id();
        let mut events: Vec<_> = history.item_events(&schedule_id).collect();
        if include_reschedule {
            events.extend(history.reschedule_events(&schedule_id));
            events.sort_by(|a, b| b.event_id().cmp(&a.event_id()));
        }
        events
    }

    /// The newest event of this item; event ids order events totally.
    pub fn last_event(&self, include_reschedule: bool) -> Option<&'a WorkflowItemEvent> {
        let history = self.ctx.history();
        let schedule_id = self.schedule_id();
        let own = history.item_events(&schedule_id).next();
        if !include_reschedule {
            return own;
        }
        let timer = history.reschedule_events(&schedule_id).next();
        match (own, timer) {
            (Some(o), Some(t)) => Some(if t.event_id() > o.event_id() { t } else { o }),
            (o, t) => o.or(t),
        }
    }

    /// `true` while this item or its reschedule timer is in flight.
    pub fn is_active(&self) -> bool {
        self.last_event(true).is_some_and(WorkflowItemEvent::is_active)
    }

    /// Evaluate the item's gate; items without one are always schedulable.
    pub fn when(&self) -> bool {
        self.item.when.as_ref().is_none_or(|when| when(self))
    }

    /// Input for a scheduling decision: the configured input, or the
    /// workflow's own input.
    pub(crate) fn input(&self, input: &ItemInput) -> Option<String> {
        match &input.0 {
            Some(input) => input(self),
            None => self.ctx.history().workflow_input().map(str::to_owned),
        }
    }

    /// Decisions scheduling this item, subject to its gate.
    ///
    /// When the gate is closed the false-branch action runs instead. Without
    /// one, startup items do nothing and other items let the graph advance
    /// past them as if their branch had gone inactive.
    pub fn schedule_decisions(&self) -> Result<Vec<WorkflowDecision>> {
        self.schedule_decisions_in(&mut Scope::default())
    }

    pub(crate) fn schedule_decisions_in(&self, scope: &mut Scope) -> Result<Vec<WorkflowDecision>> {
        if self.when() {
            return Ok(self.schedule_decisions_by_ignoring_when());
        }
        let action = match &self.item.when_false {
            Some(on_false) => on_false(self)?,
            None if self.is_startup() => WorkflowAction::ignore(),
            None => WorkflowAction::trigger(),
        };
        action
            .with_triggered_item(self.identity())
            .resolve(self.ctx, scope)
    }

    /// The scheduling decision for this item, ignoring its gate.
    pub fn schedule_decisions_by_ignoring_when(&self) -> Vec<WorkflowDecision> {
        let decision = match &self.item.spec {
            ItemSpec::Activity(spec) => spec.schedule_decision(self),
            ItemSpec::Timer(spec) => spec.schedule_decision(self),
            ItemSpec::Lambda(spec) => spec.schedule_decision(self),
            ItemSpec::ChildWorkflow(spec) => spec.schedule_decision(self),
        };
        vec![decision]
    }

    /// Schedule this item again once `delay` has passed.
    ///
    /// Starts the item's reschedule timer; when it fires, the item is
    /// scheduled again. A timer item is simply restarted with the new delay.
    pub fn reschedule_decisions(&self, delay: Duration) -> Vec<WorkflowDecision> {
        let identity = self.identity();
        match identity.kind() {
            ItemKind::Timer => vec![WorkflowDecision::schedule_timer(identity, delay)],
            _ => vec![WorkflowDecision::schedule_reschedule_timer(
                identity,
                self.ctx.history().run_id(),
                delay,
            )],
        }
    }

    /// Cancel whichever of this item or its reschedule timer produced the
    /// newest event.
    ///
    /// Fails with [`Error::NotSupported`] for lambdas, which cannot be cancelled.
    pub fn cancel_decisions(&self) -> Result<Vec<WorkflowDecision>> {
        let identity = self.identity().clone();
        let schedule_id = self.schedule_id();
        let own = self.last_event(false);
        let timer = self.ctx.history().reschedule_events(&schedule_id).next();
        let timer_pending = match (own, timer) {
            (Some(o), Some(t)) => t.is_active() && t.event_id() > o.event_id(),
            (None, Some(t)) => t.is_active(),
            _ => false,
        };
        if timer_pending {
            return Ok(vec![WorkflowDecision::CancelTimer {
                identity,
                schedule_id,
            }]);
        }

        let decision = match identity.kind() {
            ItemKind::Activity => WorkflowDecision::CancelActivity {
                identity,
                schedule_id,
            },
            ItemKind::Timer => WorkflowDecision::CancelTimer {
                identity,
                schedule_id,
            },
            ItemKind::ChildWorkflow => WorkflowDecision::CancelRequestWorkflow {
                identity,
                workflow_id: schedule_id,
            },
            ItemKind::Lambda => {
                return Err(Error::NotSupported(format!(
                    "{identity} cannot be cancelled"
                )));
            }
        };
        Ok(vec![decision])
    }

    /// Join readiness: `true` iff every parent branch other than the one
    /// through `except` is inactive.
    ///
    /// A branch is active while its item is in flight, while the response to
    /// its last event would schedule something on that branch again, or, for
    /// an item that never ran, while one of its own parents is still active
    /// or about to schedule it.
    pub fn are_all_parent_branches_inactive(&self, except: &Identity) -> Result<bool> {
        let mut visited = HashSet::new();
        for parent in self.parents() {
            if parent.identity() == except {
                continue;
            }
            if parent.is_branch_active(&mut visited)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn is_branch_active(&self, visited: &mut HashSet<&'a Identity>) -> Result<bool> {
        if !visited.insert(self.identity()) {
            return Ok(false);
        }

        if let Some(event) = self.last_event(true) {
            if event.is_active() {
                return Ok(true);
            }
            let Some(action) = event.interpret(self.ctx)? else {
                return Ok(false);
            };
            let mut branch = self.ctx.workflow().graph().ancestors(self.identity());
            branch.insert(self.identity());
            return Ok(action.can_schedule_any(self.ctx, &branch));
        }

        if self.is_startup() {
            return Ok(false);
        }

        let own: HashSet<&Identity> = HashSet::from([self.identity()]);
        for parent in self.parents() {
            if parent.is_branch_active(visited)? {
                return Ok(true);
            }
            let Some(event) = parent.last_event(true) else {
                continue;
            };
            if event.is_active() {
                continue;
            }
            if let Some(action) = event.interpret(self.ctx)? {
                if action.can_schedule_any(self.ctx, &own) && self.when() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Start building a jump from this item.
    pub fn jump(&self) -> JumpBuilder<'a> {
        JumpBuilder::new(*self)
    }

    /// Start building a re-scheduling of this item.
    pub fn reschedule(&self) -> ScheduleItemAction {
        ScheduleItemAction::new(self.identity().clone())
    }
}

impl fmt::Debug for ItemRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ItemRef").field(&self.item.identity).finish()
    }
}

// ============================================================================
// ItemBuilder
// ============================================================================

/// Fluent configuration of one item.
///
/// Identity errors from `after_*` calls are recorded and reported by
/// [`WorkflowBuilder::build`](crate::WorkflowBuilder::build).
pub struct ItemBuilder<S> {
    identity: Identity,
    parents: Vec<Identity>,
    when: Option<WhenFn>,
    when_false: Option<ActionFn>,
    spec: S,
    error: Option<Error>,
}

impl<S> ItemBuilder<S> {
    pub(crate) fn new(identity: Identity, spec: S) -> Self {
        Self {
            identity,
            parents: Vec::new(),
            when: None,
            when_false: None,
            spec,
            error: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Wait for `parent` before scheduling this item.
    pub fn after(mut self, parent: Identity) -> Self {
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
        self
    }

    pub fn after_activity(self, name: &str, version: &str) -> Self {
        self.after_result(Identity::activity(name, version, ""))
    }

    pub fn after_activity_at(self, name: &str, version: &str, positional_name: &str) -> Self {
        self.after_result(Identity::activity(name, version, positional_name))
    }

    pub fn after_timer(self, name: &str) -> Self {
        self.after_result(Identity::timer(name))
    }

    pub fn after_lambda(self, name: &str) -> Self {
        self.after_result(Identity::lambda(name, ""))
    }

    pub fn after_lambda_at(self, name: &str, positional_name: &str) -> Self {
        self.after_result(Identity::lambda(name, positional_name))
    }

    pub fn after_child_workflow(self, name: &str, version: &str) -> Self {
        self.after_result(Identity::child_workflow(name, version, ""))
    }

    /// Only schedule this item while `when` holds.
    pub fn when<F>(mut self, when: F) -> Self
    where
        F: Fn(&ItemRef<'_>) -> bool + Send + Sync + 'static,
    {
        self.when = Some(Arc::new(when));
        self
    }

    /// Action to take instead of scheduling when the `when` gate is closed.
    pub fn on_false<F>(mut self, on_false: F) -> Self
    where
        F: Fn(&ItemRef<'_>) -> Result<WorkflowAction> + Send + Sync + 'static,
    {
        self.when_false = Some(Arc::new(on_false));
        self
    }

    fn after_result(mut self, parent: Result<Identity>) -> Self {
        match parent {
            Ok(parent) => self.after(parent),
            Err(err) => {
                self.error.get_or_insert(err);
                self
            }
        }
    }

    pub(crate) fn build(self, spec: impl FnOnce(S) -> ItemSpec) -> Result<WorkflowItem> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(WorkflowItem {
            identity: self.identity,
            parents: self.parents,
            when: self.when,
            when_false: self.when_false,
            spec: spec(self.spec),
        })
    }
}
