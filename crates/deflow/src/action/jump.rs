use std::time::Duration;

use super::trigger::TriggerAction;
use super::{ItemSet, Scope, WorkflowAction};
use crate::context::DecisionContext;
use crate::decision::WorkflowDecision;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::item::ItemRef;

/// Builds a jump from one item to another item of the same branch.
///
/// Obtained from [`ItemRef::jump`]. The target must be the source itself, an
/// ancestor or a descendant of it; anything else fails with
/// [`Error::OutOfBranchJump`].
#[derive(Debug, Clone, Copy)]
pub struct JumpBuilder<'a> {
    from: ItemRef<'a>,
}

impl<'a> JumpBuilder<'a> {
    pub(crate) fn new(from: ItemRef<'a>) -> Self {
        Self { from }
    }

    pub fn to_activity(self, name: &str, version: &str) -> Result<JumpAction> {
        self.to(Identity::activity(name, version, "")?)
    }

    pub fn to_activity_at(self, name: &str, version: &str, positional_name: &str) -> Result<JumpAction> {
        self.to(Identity::activity(name, version, positional_name)?)
    }

    pub fn to_timer(self, name: &str) -> Result<JumpAction> {
        self.to(Identity::timer(name)?)
    }

    pub fn to_lambda(self, name: &str) -> Result<JumpAction> {
        self.to(Identity::lambda(name, "")?)
    }

    pub fn to_lambda_at(self, name: &str, positional_name: &str) -> Result<JumpAction> {
        self.to(Identity::lambda(name, positional_name)?)
    }

    pub fn to_child_workflow(self, name: &str, version: &str) -> Result<JumpAction> {
        self.to(Identity::child_workflow(name, version, "")?)
    }

    /// Jump to `target`.
    pub fn to(self, target: Identity) -> Result<JumpAction> {
        let source = self.from.identity();
        let graph = self.from.context().workflow().graph();
        if !graph.contains(&target) {
            return Err(Error::UnknownItem(target));
        }
        let in_branch = target == *source
            || graph.ancestors(source).contains(&target)
            || graph.descendants(source).contains(&target);
        if !in_branch {
            return Err(Error::OutOfBranchJump {
                jump_from: source.clone(),
                jump_to: target,
            });
        }
        Ok(JumpAction {
            target,
            triggered_by: Some(source.clone()),
            after: None,
            trigger: true,
        })
    }
}

/// Schedule `target` regardless of its `when` gate.
///
/// For a forward jump, the source's downstream joins are probed as well so
/// that joins waiting on the skipped items keep advancing, unless
/// [`without_trigger`](Self::without_trigger) is set. Backward jumps re-run
/// part of the branch and never probe.
#[derive(Debug, Clone, PartialEq)]
pub struct JumpAction {
    target: Identity,
    triggered_by: Option<Identity>,
    after: Option<Duration>,
    trigger: bool,
}

impl JumpAction {
    pub fn target(&self) -> &Identity {
        &self.target
    }

    /// Schedule the target once `delay` has passed.
    pub fn after(mut self, delay: Duration) -> Self {
        self.after = Some(delay);
        self
    }

    pub fn without_trigger(mut self) -> Self {
        self.trigger = false;
        self
    }

    pub(crate) fn with_triggered_item(mut self, item: &Identity) -> Self {
        self.triggered_by.get_or_insert_with(|| item.clone());
        self
    }

    pub(super) fn resolve(
        &self,
        ctx: DecisionContext<'_>,
        scope: &mut Scope,
    ) -> Result<Vec<WorkflowDecision>> {
        let target = ctx.item(&self.target)?;
        let mut decisions = match self.after {
            Some(delay) => target.reschedule_decisions(delay),
            None => target.schedule_decisions_by_ignoring_when(),
        };
        if let Some(trigger) = self.trigger_action(ctx) {
            decisions.extend(trigger.resolve(ctx, scope)?);
        }
        Ok(decisions)
    }

    pub(super) fn can_schedule_any(&self, ctx: DecisionContext<'_>, items: &ItemSet<'_>) -> bool {
        items.contains(&self.target)
            || self
                .trigger_action(ctx)
                .is_some_and(|trigger| trigger.can_schedule_any(ctx, items))
    }

    fn trigger_action(&self, ctx: DecisionContext<'_>) -> Option<TriggerAction> {
        if !self.trigger {
            return None;
        }
        let source = self.triggered_by.as_ref()?;
        let backward =
            *source == self.target || ctx.workflow().graph().ancestors(source).contains(&self.target);
        if backward {
            return None;
        }
        Some(TriggerAction::new(Some(source.clone()), Some(self.target.clone())))
    }
}

impl From<JumpAction> for WorkflowAction {
    fn from(action: JumpAction) -> Self {
        WorkflowAction::Jump(action)
    }
}
