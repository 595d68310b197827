//! Graph advancement: starting, continuing past completed items and
//! triggering joins past items that will not complete normally.
//!
//! After an item settles, each of its child branches is walked down to the
//! first join point (an item with several parents). The join point is
//! scheduled once every parent branch other than the one the walk arrived
//! through has gone inactive. Everything is recomputed from history, so
//! running the walk again over the same history yields the same decisions.

use tracing::debug;

use super::{ItemSet, Scope, WorkflowAction, triggered};
use crate::context::DecisionContext;
use crate::decision::WorkflowDecision;
use crate::error::Result;
use crate::identity::Identity;
use crate::item::{ItemGraph, ItemRef, WorkflowItem};

/// Schedule every startup item, or complete a workflow that has none.
pub(super) fn start(ctx: DecisionContext<'_>, scope: &mut Scope) -> Result<Vec<WorkflowDecision>> {
    let startup: Vec<ItemRef<'_>> = ctx.items().filter(ItemRef::is_startup).collect();
    if startup.is_empty() {
        return Ok(vec![WorkflowDecision::complete_workflow(
            ctx.config().empty_workflow_result.clone(),
        )]);
    }

    let mut decisions = Vec::new();
    for item in startup {
        decisions.extend(item.schedule_decisions_in(scope)?);
    }
    Ok(decisions)
}

// ============================================================================
// Continue
// ============================================================================

/// Schedule the children of a completed item whose other parent branches
/// are inactive. Proposes completion when the item has no children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContinueAction {
    pub(crate) completed: Option<Identity>,
}

impl ContinueAction {
    pub fn completed(&self) -> Option<&Identity> {
        self.completed.as_ref()
    }

    pub(super) fn resolve(
        &self,
        ctx: DecisionContext<'_>,
        scope: &mut Scope,
    ) -> Result<Vec<WorkflowDecision>> {
        let completed = triggered(&self.completed, "continue")?;
        let item = ctx.item(completed)?;
        let children: Vec<ItemRef<'_>> = item.children().collect();
        if children.is_empty() {
            return Ok(vec![WorkflowDecision::propose_completion(
                ctx.config().completion_result.clone(),
            )]);
        }

        let mut decisions = Vec::new();
        for child in children {
            decisions.extend(schedule_join(scope, completed, child, completed, false)?);
        }
        Ok(decisions)
    }

    pub(super) fn can_schedule_any(&self, ctx: DecisionContext<'_>, items: &ItemSet<'_>) -> bool {
        self.completed.as_ref().is_some_and(|completed| {
            ctx.workflow()
                .graph()
                .children(completed)
                .any(|child| items.contains(child.identity()))
        })
    }
}

// ============================================================================
// Trigger
// ============================================================================

/// Advance the graph past `triggered`, whose branch has gone inactive
/// without completing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerAction {
    triggered: Option<Identity>,
    jump_target: Option<Identity>,
}

impl TriggerAction {
    pub(crate) fn new(triggered: Option<Identity>, jump_target: Option<Identity>) -> Self {
        Self {
            triggered,
            jump_target,
        }
    }

    pub fn triggered(&self) -> Option<&Identity> {
        self.triggered.as_ref()
    }

    pub(crate) fn with_triggered_item(mut self, item: &Identity) -> Self {
        self.triggered.get_or_insert_with(|| item.clone());
        self
    }

    pub(super) fn resolve(
        &self,
        ctx: DecisionContext<'_>,
        scope: &mut Scope,
    ) -> Result<Vec<WorkflowDecision>> {
        let source = triggered(&self.triggered, "trigger")?;
        ctx.item(source)?;
        let graph = ctx.workflow().graph();

        let candidates = candidates(graph, source, self.jump_target.as_ref());
        if candidates.is_empty() {
            debug!(item = %source, "no join point downstream");
            return Ok(vec![WorkflowDecision::propose_completion(
                ctx.config().completion_result.clone(),
            )]);
        }

        let mut decisions = Vec::new();
        for (joint, arrival) in candidates {
            let is_jump_target = self.jump_target.as_ref() == Some(joint);
            let item = ctx.item(joint)?;
            decisions.extend(schedule_join(scope, source, item, arrival, is_jump_target)?);
        }
        Ok(decisions)
    }

    pub(super) fn can_schedule_any(&self, ctx: DecisionContext<'_>, items: &ItemSet<'_>) -> bool {
        let Some(source) = &self.triggered else {
            return false;
        };
        candidates(ctx.workflow().graph(), source, self.jump_target.as_ref())
            .into_iter()
            .any(|(joint, _)| items.contains(joint))
    }
}

/// Per child branch of `source`: the jump target if the branch contains it,
/// otherwise the branch's nearest join points. Each paired with the parent
/// it is entered through.
fn candidates<'g>(
    graph: &'g ItemGraph,
    source: &Identity,
    jump_target: Option<&Identity>,
) -> Vec<(&'g Identity, &'g Identity)> {
    let mut found: Vec<(&'g Identity, &'g Identity)> = Vec::new();
    let mut push = |candidate: (&'g Identity, &'g Identity)| {
        if found.iter().all(|(j, _)| *j != candidate.0) {
            found.push(candidate);
        }
    };

    let reachable = graph.descendants(source);
    let target = jump_target.and_then(|t| graph.get(t)).map(WorkflowItem::identity);
    for child in graph.children(source) {
        let child = child.identity();
        if let Some(target) = target {
            if child == target || graph.descendants(child).contains(target) {
                let arrival = graph
                    .parents(target)
                    .map(WorkflowItem::identity)
                    .find(|p| *p == source || reachable.contains(p));
                if let Some(arrival) = arrival {
                    push((target, arrival));
                }
                continue;
            }
        }
        for joint in graph.branch_joints(child, source) {
            push(joint);
        }
    }
    found
}

/// Schedule `item` if it is idle and every parent branch other than the one
/// through `arrival` is inactive.
fn schedule_join(
    scope: &mut Scope,
    source: &Identity,
    item: ItemRef<'_>,
    arrival: &Identity,
    ignore_when: bool,
) -> Result<Vec<WorkflowDecision>> {
    let identity = item.identity();
    if item.is_active() {
        debug!(item = %identity, "already in flight");
        return Ok(Vec::new());
    }
    if !item.are_all_parent_branches_inactive(arrival)? {
        debug!(item = %identity, from = %source, "waiting for other parent branches");
        return Ok(Vec::new());
    }
    if !scope.enter(source, identity) {
        return Ok(Vec::new());
    }
    let decisions = if ignore_when {
        Ok(item.schedule_decisions_by_ignoring_when())
    } else {
        item.schedule_decisions_in(scope)
    };
    scope.exit(source, identity);
    decisions
}

// ============================================================================
// Ignore
// ============================================================================

/// No decisions, optionally letting the branch go inactive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IgnoreAction {
    triggered: Option<Identity>,
    branch_inactive: bool,
    on_inactive: Option<Box<WorkflowAction>>,
}

impl IgnoreAction {
    /// Treat the branch as inactive and trigger joins downstream.
    pub fn mark_branch_inactive(mut self) -> Self {
        self.branch_inactive = true;
        self
    }

    /// Treat the branch as inactive and run `action` instead of the trigger.
    pub fn on_branch_inactive(mut self, action: WorkflowAction) -> Self {
        self.branch_inactive = true;
        self.on_inactive = Some(Box::new(action));
        self
    }

    pub(crate) fn with_triggered_item(mut self, item: &Identity) -> Self {
        self.triggered.get_or_insert_with(|| item.clone());
        self.on_inactive = self
            .on_inactive
            .map(|action| Box::new(action.with_triggered_item(item)));
        self
    }

    fn inactive_action(&self) -> Option<WorkflowAction> {
        if !self.branch_inactive {
            return None;
        }
        Some(match &self.on_inactive {
            Some(action) => (**action).clone(),
            None => WorkflowAction::Trigger(TriggerAction::new(self.triggered.clone(), None)),
        })
    }

    pub(super) fn resolve(
        &self,
        ctx: DecisionContext<'_>,
        scope: &mut Scope,
    ) -> Result<Vec<WorkflowDecision>> {
        match self.inactive_action() {
            Some(action) => action.resolve(ctx, scope),
            None => Ok(Vec::new()),
        }
    }

    pub(super) fn can_schedule_any(&self, ctx: DecisionContext<'_>, items: &ItemSet<'_>) -> bool {
        self.inactive_action()
            .is_some_and(|action| action.can_schedule_any(ctx, items))
    }
}

impl From<IgnoreAction> for WorkflowAction {
    fn from(action: IgnoreAction) -> Self {
        WorkflowAction::Ignore(action)
    }
}
