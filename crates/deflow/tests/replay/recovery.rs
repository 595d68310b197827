//! Re-scheduling, cancellation and batch compaction.

use std::time::Duration;

use deflow::{Backoff, EventType, Limit, Workflow, WorkflowAction, WorkflowDecision};
use test_utils::HistoryBuilder;

use crate::support::helpers::{activity, assert_decision_types, init_test_tracing, scheduled};

/// `Charge` retries failures through `on_failure`.
fn billing<F>(on_failure: F) -> Workflow
where
    F: Fn(&deflow::event::ActivityEvent, &deflow::ItemRef<'_>) -> deflow::Result<WorkflowAction>
        + Send
        + Sync
        + 'static,
{
    Workflow::builder()
        .activity("Charge", "1.0", |a| a.on_failure(on_failure))
        .on_signal("abort", |_, ctx| {
            Ok(WorkflowAction::cancel([ctx.activity("Charge", "1.0")?.identity().clone()]))
        })
        .build()
        .unwrap()
}

/// History with `failures` consecutive failed attempts of `Charge`.
fn charge_failed(failures: usize) -> HistoryBuilder {
    let charge = activity("Charge");
    let mut history = HistoryBuilder::new("wf-1", "run-1").started(None);
    for _ in 0..failures {
        history = history
            .decision_completed()
            .activity_scheduled(&charge)
            .activity_failed(&charge, "card_declined", "insufficient funds");
    }
    history
}

// ============================================================================
// Limits
// ============================================================================

#[test]
fn retry_within_limit_schedules_again() {
    init_test_tracing();
    let workflow = billing(|_, item| Ok(item.reschedule().up_to(Limit::count(2)).into()));
    let history = charge_failed(2).build().unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(scheduled(&decisions), vec![&activity("Charge")]);
}

#[test]
fn retry_past_limit_takes_default_action() {
    init_test_tracing();
    let workflow = billing(|_, item| Ok(item.reschedule().up_to(Limit::count(2)).into()));
    let history = charge_failed(3).build().unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::fail_workflow("card_declined", "insufficient funds")]
    );
}

// ============================================================================
// Delayed re-scheduling
// ============================================================================

#[test]
fn delayed_retry_starts_reschedule_timer() {
    init_test_tracing();
    let workflow = billing(|_, item| Ok(item.reschedule().after(Duration::from_secs(30)).into()));
    let history = charge_failed(1).build().unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::schedule_reschedule_timer(
            &activity("Charge"),
            "run-1",
            Duration::from_secs(30)
        )]
    );
}

#[test]
fn backoff_grows_with_recurrences() {
    init_test_tracing();
    let workflow = billing(|_, item| {
        Ok(item
            .reschedule()
            .after_backoff(Backoff::new(Duration::from_secs(10), Duration::from_secs(60)))
            .into())
    });
    let history = charge_failed(3).build().unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::schedule_reschedule_timer(
            &activity("Charge"),
            "run-1",
            Duration::from_secs(40)
        )]
    );
}

#[test]
fn fired_reschedule_timer_schedules_item_again() {
    init_test_tracing();
    let charge = activity("Charge");
    let workflow = billing(|_, item| Ok(item.reschedule().after(Duration::from_secs(30)).into()));
    let history = charge_failed(1)
        .decision_completed()
        .reschedule_timer_started(&charge, Duration::from_secs(30))
        .reschedule_timer_fired(&charge)
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_decision_types(&decisions, &["ScheduleActivityTask"]);
    assert_eq!(scheduled(&decisions), vec![&charge]);
}

#[test]
fn pending_reschedule_timer_keeps_workflow_open() {
    init_test_tracing();
    let charge = activity("Charge");
    let workflow = billing(|_, item| Ok(item.reschedule().after(Duration::from_secs(30)).into()));
    let history = charge_failed(1)
        .decision_completed()
        .reschedule_timer_started(&charge, Duration::from_secs(30))
        .build()
        .unwrap();

    let statuses = workflow.item_statuses(&history);

    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].is_active);
    assert_eq!(statuses[0].event_count, 2);
    assert!(workflow.decide(&history).unwrap().is_empty());
}

#[test]
fn reschedule_timer_start_failure_fails_workflow() {
    init_test_tracing();
    let charge = activity("Charge");
    let workflow = billing(|_, item| Ok(item.reschedule().after(Duration::from_secs(30)).into()));
    let history = charge_failed(1)
        .decision_completed()
        .reschedule_timer_start_failed(&charge, "OPEN_TIMERS_LIMIT_EXCEEDED")
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::fail_workflow("TIMER_START_FAILED", "OPEN_TIMERS_LIMIT_EXCEEDED")]
    );
    let statuses = workflow.item_statuses(&history);
    assert_eq!(statuses[0].last_event, Some(EventType::StartFailed));
    assert!(!statuses[0].is_active);
    assert_eq!(statuses[0].event_count, 2);
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn cancel_targets_pending_reschedule_timer() {
    init_test_tracing();
    let charge = activity("Charge");
    let workflow = billing(|_, item| Ok(item.reschedule().after(Duration::from_secs(30)).into()));
    let history = charge_failed(1)
        .decision_completed()
        .reschedule_timer_started(&charge, Duration::from_secs(30))
        .signaled("abort", None)
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::CancelTimer {
            identity: charge.clone(),
            schedule_id: charge.schedule_id("run-1"),
        }]
    );
}

#[test]
fn cancel_targets_running_activity() {
    init_test_tracing();
    let charge = activity("Charge");
    let workflow = billing(|_, _| Ok(WorkflowAction::ignore()));
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .activity_scheduled(&charge)
        .activity_started(&charge)
        .signaled("abort", None)
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::CancelActivity {
            identity: charge.clone(),
            schedule_id: charge.schedule_id("run-1"),
        }]
    );
}

#[test]
fn reschedule_timer_cancel_failure_fails_workflow() {
    init_test_tracing();
    let charge = activity("Charge");
    let workflow = billing(|_, item| Ok(item.reschedule().after(Duration::from_secs(30)).into()));
    let history = charge_failed(1)
        .decision_completed()
        .reschedule_timer_started(&charge, Duration::from_secs(30))
        .signaled("abort", None)
        .decision_completed()
        .reschedule_timer_cancel_failed(&charge, "TIMER_ID_UNKNOWN")
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::fail_workflow("TIMER_CANCELLATION_FAILED", "TIMER_ID_UNKNOWN")]
    );
}

// ============================================================================
// Compaction
// ============================================================================

/// Two independent startup branches; `Ledger` leads to `Report`.
fn two_branches() -> Workflow {
    Workflow::builder()
        .activity("Ledger", "1.0", |a| a)
        .activity("Audit", "1.0", |a| {
            a.on_failure(|event, _| {
                Ok(WorkflowAction::record_marker("audit-failed", event.details().map(str::to_owned))
                    + WorkflowAction::fail_workflow("AUDIT", "audit failed"))
            })
        })
        .activity("Report", "1.0", |a| a.after_activity("Ledger", "1.0"))
        .build()
        .unwrap()
}

#[test]
fn closing_decision_supersedes_scheduling() {
    init_test_tracing();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .activity_scheduled(&activity("Ledger"))
        .activity_scheduled(&activity("Audit"))
        .activity_completed(&activity("Ledger"), "ok")
        .activity_failed(&activity("Audit"), "mismatch", "row 12")
        .build()
        .unwrap();

    let decisions = two_branches().decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![
            WorkflowDecision::record_marker("audit-failed", Some("row 12".into())),
            WorkflowDecision::fail_workflow("AUDIT", "audit failed"),
        ]
    );
}

#[test]
fn completion_waits_for_other_branches() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .activity("Ledger", "1.0", |a| a)
        .activity("Audit", "1.0", |a| a)
        .build()
        .unwrap();
    let partial = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .activity_scheduled(&activity("Ledger"))
        .activity_scheduled(&activity("Audit"))
        .activity_completed(&activity("Ledger"), "ok");

    let decisions = workflow.decide(&partial.build().unwrap()).unwrap();
    assert!(decisions.is_empty(), "unexpected decisions: {decisions:?}");

    let done = partial
        .decision_completed()
        .activity_completed(&activity("Audit"), "ok")
        .build()
        .unwrap();
    let decisions = workflow.decide(&done).unwrap();
    assert_eq!(decisions, vec![WorkflowDecision::complete_workflow("Workflow is completed.")]);
}

#[test]
fn failure_outranks_cancellation() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .activity("Ledger", "1.0", |a| a)
        .build()
        .unwrap();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .activity_scheduled(&activity("Ledger"))
        .cancel_requested(None)
        .activity_failed(&activity("Ledger"), "timeout", "upstream")
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(decisions, vec![WorkflowDecision::fail_workflow("timeout", "upstream")]);
}
