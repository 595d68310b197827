//! Workflow decision cycle.

use tracing::{debug, info};

use crate::action::Scope;
use crate::context::DecisionContext;
use crate::decision::WorkflowDecision;
use crate::error::Result;
use crate::event::WorkflowEvent;
use crate::history::WorkflowHistoryEvents;
use crate::workflow::Workflow;

/// Run one decision cycle.
///
/// This function:
/// 1. Walks the events recorded since the last completed decision task, oldest first
/// 2. Interprets each workflow event and each settled item event into an action
/// 3. Resolves every action against the full history
/// 4. Compacts the collected decisions into one consistent batch
///
/// In-flight item events (scheduled, started) are skipped: they await their
/// outcome and are only consulted as state. Configuration and history
/// consistency errors abort the cycle; no partial batch is returned.
pub(crate) fn decide(
    workflow: &Workflow,
    history: &WorkflowHistoryEvents,
) -> Result<Vec<WorkflowDecision>> {
    let ctx = DecisionContext::new(workflow, history);
    let mut scope = Scope::default();
    let mut decisions = Vec::new();
    let mut new_events = 0usize;

    for event in history.new_events() {
        new_events += 1;
        if let Some(workflow_event) = WorkflowEvent::from_history(event) {
            let action = workflow_event.interpret(ctx)?;
            debug!(event_id = event.event_id, event = event.event_type(), ?action, "interpreted workflow event");
            decisions.extend(action.resolve(ctx, &mut scope)?);
            continue;
        }

        let Some(item_event) = history.item_event(event.event_id) else {
            continue;
        };
        if item_event.is_active() {
            continue;
        }
        let Some(action) = item_event.interpret(ctx)? else {
            continue;
        };
        debug!(
            event_id = event.event_id,
            event = event.event_type(),
            schedule_id = %item_event.schedule_id(),
            ?action,
            "interpreted item event"
        );
        decisions.extend(action.resolve(ctx, &mut scope)?);
    }

    let batch = compact(ctx, decisions);
    if workflow.config().log_decisions {
        for decision in &batch {
            debug!(decision = decision.decision_type(), target = %decision.key().1, "decided");
        }
    }
    info!(
        workflow_id = %history.workflow_id(),
        run_id = %history.run_id(),
        new_events,
        decisions = batch.len(),
        "decision cycle complete"
    );
    Ok(batch)
}

/// Reduce the decisions of one cycle to a batch the service accepts.
///
/// - Decisions with the same target are de-duplicated, first one wins, except
///   that a real decision replaces a completion proposal.
/// - Completion proposals survive only when nothing else is decided and no
///   item is in flight.
/// - When the workflow is closed (failed, cancelled, restarted, completed),
///   scheduling decisions are dropped and only the highest-priority closing
///   decision is kept, after the remaining non-closing decisions.
pub(crate) fn compact(
    ctx: DecisionContext<'_>,
    decisions: Vec<WorkflowDecision>,
) -> Vec<WorkflowDecision> {
    let mut unique: Vec<WorkflowDecision> = Vec::with_capacity(decisions.len());
    for decision in decisions {
        let key = decision.key();
        match unique.iter_mut().find(|d| d.key() == key) {
            Some(existing) if existing.is_proposal() && !decision.is_proposal() => {
                *existing = decision;
            }
            Some(_) => debug!(decision = key.0, target = %key.1, "dropped duplicate decision"),
            None => unique.push(decision),
        }
    }

    let has_other = unique.iter().any(|d| !d.is_proposal());
    if has_other || ctx.has_active_items() {
        unique.retain(|d| {
            let keep = !d.is_proposal();
            if !keep {
                debug!("dropped completion proposal, workflow still has work");
            }
            keep
        });
    }

    let closing = unique
        .iter()
        .filter_map(|d| d.closing_priority().map(|priority| (priority, d)))
        .min_by_key(|(priority, _)| *priority)
        .map(|(_, d)| d.clone());
    let Some(closing) = closing else {
        return unique;
    };

    let mut batch: Vec<WorkflowDecision> = unique
        .into_iter()
        .filter(|d| {
            let keep = !d.is_schedule() && d.closing_priority().is_none();
            if !keep && *d != closing {
                debug!(decision = d.decision_type(), "dropped decision superseded by workflow closing");
            }
            keep
        })
        .collect();
    batch.push(closing.confirmed());
    batch
}
