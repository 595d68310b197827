use std::time::Duration;

use tracing::debug;

use super::{Backoff, ItemSet, Scope, WorkflowAction};
use crate::context::DecisionContext;
use crate::decision::WorkflowDecision;
use crate::error::Result;
use crate::event::WorkflowItemEvent;
use crate::identity::Identity;
use crate::item::ItemRef;

/// Upper bound on how often an item is re-scheduled in response to the
/// same kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    max: u32,
}

impl Limit {
    pub fn count(max: u32) -> Self {
        Self { max }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// `true` once `recurrences` goes past the limit.
    pub fn is_exceeded(&self, recurrences: u32) -> bool {
        recurrences > self.max
    }
}

/// Schedule an item (again).
///
/// Plain scheduling applies the item's `when` gate. With
/// [`after`](Self::after) or [`after_backoff`](Self::after_backoff) the
/// item's reschedule timer is started instead. With [`up_to`](Self::up_to),
/// once the type of the item's last event has recurred more often than the
/// limit, the item's default action for that event is taken instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleItemAction {
    item: Identity,
    after: Option<Duration>,
    backoff: Option<Backoff>,
    limit: Option<Limit>,
}

impl ScheduleItemAction {
    pub fn new(item: Identity) -> Self {
        Self {
            item,
            after: None,
            backoff: None,
            limit: None,
        }
    }

    pub fn item(&self) -> &Identity {
        &self.item
    }

    /// Re-schedule after a fixed delay.
    pub fn after(mut self, delay: Duration) -> Self {
        self.after = Some(delay);
        self.backoff = None;
        self
    }

    /// Re-schedule after a delay growing with each recurrence.
    pub fn after_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self.after = None;
        self
    }

    pub fn up_to(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(super) fn resolve(
        &self,
        ctx: DecisionContext<'_>,
        scope: &mut Scope,
    ) -> Result<Vec<WorkflowDecision>> {
        let item = ctx.item(&self.item)?;
        let recurrences = recurrences(&item);
        if let Some(last) = self.exhausted(&item, recurrences) {
            debug!(
                item = %self.item,
                event_type = %last.event_type(),
                recurrences,
                "re-scheduling limit reached"
            );
            return last
                .default_action(item.identity())
                .with_triggered_item(item.identity())
                .resolve(ctx, scope);
        }

        match (self.backoff, self.after) {
            (Some(backoff), _) => Ok(item.reschedule_decisions(backoff.delay_for(recurrences.max(1)))),
            (None, Some(delay)) => Ok(item.reschedule_decisions(delay)),
            (None, None) => item.schedule_decisions_in(scope),
        }
    }

    pub(super) fn can_schedule_any(&self, ctx: DecisionContext<'_>, items: &ItemSet<'_>) -> bool {
        let Ok(item) = ctx.item(&self.item) else {
            return false;
        };
        match self.exhausted(&item, recurrences(&item)) {
            Some(last) => last
                .default_action(item.identity())
                .with_triggered_item(item.identity())
                .can_schedule_any(ctx, items),
            None => items.contains(&self.item),
        }
    }

    /// The item's last event, when the limit has been exceeded.
    fn exhausted<'a>(&self, item: &ItemRef<'a>, recurrences: u32) -> Option<&'a WorkflowItemEvent> {
        let limit = self.limit?;
        if !limit.is_exceeded(recurrences) {
            return None;
        }
        item.last_event(false)
    }
}

/// How often the type of the item's last event occurs in its history.
fn recurrences(item: &ItemRef<'_>) -> u32 {
    let Some(last) = item.last_event(false) else {
        return 0;
    };
    let count = item
        .all_events(false)
        .into_iter()
        .filter(|e| e.event_type() == last.event_type())
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

impl From<ScheduleItemAction> for WorkflowAction {
    fn from(action: ScheduleItemAction) -> Self {
        WorkflowAction::Schedule(action)
    }
}
