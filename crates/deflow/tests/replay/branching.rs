//! Fan-out, joins, gates and jumps.

use deflow::{Error, Workflow, WorkflowAction, WorkflowDecision};
use test_utils::HistoryBuilder;

use crate::support::helpers::{activity, assert_decision_types, init_test_tracing, lambda, scheduled};
use crate::support::workflows::{chain, chain_with, media_pipeline};

/// History of the media pipeline up to both branches being scheduled.
fn pipeline_fanned_out() -> HistoryBuilder {
    HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .activity_scheduled(&activity("Download"))
        .activity_completed(&activity("Download"), "ok")
        .decision_completed()
        .activity_scheduled(&activity("Transcode"))
        .lambda_scheduled(&lambda("Thumbnail"))
}

// ============================================================================
// Fan-out and joins
// ============================================================================

#[test]
fn completion_schedules_every_child_branch() {
    init_test_tracing();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .activity_scheduled(&activity("Download"))
        .activity_completed(&activity("Download"), "ok")
        .build()
        .unwrap();

    let decisions = media_pipeline().decide(&history).unwrap();

    assert_decision_types(&decisions, &["ScheduleActivityTask", "ScheduleLambdaFunction"]);
    assert_eq!(scheduled(&decisions), vec![&activity("Transcode"), &lambda("Thumbnail")]);
}

#[test]
fn join_waits_while_a_sibling_is_in_flight() {
    init_test_tracing();
    let history = pipeline_fanned_out()
        .activity_completed(&activity("Transcode"), "ok")
        .build()
        .unwrap();

    let decisions = media_pipeline().decide(&history).unwrap();

    assert!(decisions.is_empty(), "unexpected decisions: {decisions:?}");
}

#[test]
fn join_proceeds_once_every_parent_settled() {
    init_test_tracing();
    let history = pipeline_fanned_out()
        .lambda_completed(&lambda("Thumbnail"), "thumb.png")
        .decision_completed()
        .activity_completed(&activity("Transcode"), "ok")
        .build()
        .unwrap();

    let decisions = media_pipeline().decide(&history).unwrap();

    assert_eq!(scheduled(&decisions), vec![&activity("Publish")]);
}

#[test]
fn join_is_scheduled_once_when_parents_settle_together() {
    init_test_tracing();
    let history = pipeline_fanned_out()
        .lambda_completed(&lambda("Thumbnail"), "thumb.png")
        .activity_completed(&activity("Transcode"), "ok")
        .build()
        .unwrap();

    let decisions = media_pipeline().decide(&history).unwrap();

    assert_eq!(scheduled(&decisions), vec![&activity("Publish")]);
}

#[test]
fn retriggered_parent_does_not_reschedule_pending_join() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .activity("Download", "1.0", |a| a)
        .activity("Transcode", "1.0", |a| a.after_activity("Download", "1.0"))
        .lambda("Thumbnail", |l| l.after_activity("Download", "1.0"))
        .activity("Publish", "1.0", |a| {
            a.after_activity("Transcode", "1.0").after_lambda("Thumbnail")
        })
        .on_signal("retry-transcode", |_, ctx| {
            Ok(WorkflowAction::continue_from(ctx.activity("Transcode", "1.0")?.identity().clone()))
        })
        .build()
        .unwrap();
    let joined = pipeline_fanned_out()
        .lambda_completed(&lambda("Thumbnail"), "thumb.png")
        .activity_completed(&activity("Transcode"), "ok");

    let first = workflow.decide(&joined.build().unwrap()).unwrap();
    assert_eq!(scheduled(&first), vec![&activity("Publish")]);

    let retriggered = joined
        .decision_completed()
        .activity_scheduled(&activity("Publish"))
        .signaled("retry-transcode", None)
        .build()
        .unwrap();
    let decisions = workflow.decide(&retriggered).unwrap();

    assert!(decisions.is_empty(), "unexpected decisions: {decisions:?}");
}

#[test]
fn ignored_failure_lets_join_proceed() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .activity("Download", "1.0", |a| a)
        .activity("Transcode", "1.0", |a| {
            a.after_activity("Download", "1.0")
                .on_failure(|_, _| Ok(WorkflowAction::ignore_branch()))
        })
        .lambda("Thumbnail", |l| l.after_activity("Download", "1.0"))
        .activity("Publish", "1.0", |a| {
            a.after_activity("Transcode", "1.0").after_lambda("Thumbnail")
        })
        .build()
        .unwrap();
    let history = pipeline_fanned_out()
        .lambda_completed(&lambda("Thumbnail"), "thumb.png")
        .decision_completed()
        .activity_failed(&activity("Transcode"), "codec", "unsupported profile")
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(scheduled(&decisions), vec![&activity("Publish")]);
}

#[test]
fn plain_ignore_keeps_the_workflow_open() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .activity("Download", "1.0", |a| {
            a.on_failure(|_, _| Ok(WorkflowAction::ignore()))
        })
        .build()
        .unwrap();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .activity_scheduled(&activity("Download"))
        .activity_failed(&activity("Download"), "io", "disk full")
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert!(decisions.is_empty());
}

// ============================================================================
// Gates
// ============================================================================

/// `Source` fans out to a gated `Review` and to `Encode`; both feed `Ship`.
fn gated_workflow() -> Workflow {
    Workflow::builder()
        .activity("Source", "1.0", |a| a)
        .activity("Review", "1.0", |a| {
            a.after_activity("Source", "1.0")
                .when(|item| item.context().workflow_input() == Some("manual"))
        })
        .activity("Encode", "1.0", |a| a.after_activity("Source", "1.0"))
        .activity("Ship", "1.0", |a| {
            a.after_activity("Review", "1.0").after_activity("Encode", "1.0")
        })
        .build()
        .unwrap()
}

#[test]
fn closed_gate_skips_item_but_join_waits_for_sibling() {
    init_test_tracing();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(Some("auto"))
        .decision_completed()
        .activity_scheduled(&activity("Source"))
        .activity_completed(&activity("Source"), "ok")
        .build()
        .unwrap();

    let decisions = gated_workflow().decide(&history).unwrap();

    assert_eq!(scheduled(&decisions), vec![&activity("Encode")]);
}

#[test]
fn closed_gate_does_not_block_the_join() {
    init_test_tracing();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(Some("auto"))
        .decision_completed()
        .activity_scheduled(&activity("Source"))
        .activity_completed(&activity("Source"), "ok")
        .decision_completed()
        .activity_scheduled(&activity("Encode"))
        .activity_completed(&activity("Encode"), "ok")
        .build()
        .unwrap();

    let decisions = gated_workflow().decide(&history).unwrap();

    assert_eq!(scheduled(&decisions), vec![&activity("Ship")]);
}

#[test]
fn open_gate_schedules_item() {
    init_test_tracing();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(Some("manual"))
        .decision_completed()
        .activity_scheduled(&activity("Source"))
        .activity_completed(&activity("Source"), "ok")
        .build()
        .unwrap();

    let decisions = gated_workflow().decide(&history).unwrap();

    assert_eq!(scheduled(&decisions), vec![&activity("Review"), &activity("Encode")]);
}

#[test]
fn closed_gate_runs_false_branch_action() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .activity("Source", "1.0", |a| {
            a.when(|_| false).on_false(|_| {
                Ok(WorkflowAction::fail_workflow("GATE_CLOSED", "source disabled"))
            })
        })
        .build()
        .unwrap();
    let history = HistoryBuilder::new("wf-1", "run-1").started(None).build().unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::fail_workflow("GATE_CLOSED", "source disabled")]
    );
}

// ============================================================================
// Jumps
// ============================================================================

#[test]
fn forward_jump_skips_intermediate_items() {
    init_test_tracing();
    let workflow = chain_with(|a| {
        a.on_completion(|_, item| Ok(item.jump().to_activity("Store", "1.0")?.into()))
    });
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .activity_scheduled(&activity("Fetch"))
        .activity_completed(&activity("Fetch"), "ok")
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(scheduled(&decisions), vec![&activity("Store")]);
}

#[test]
fn backward_jump_reruns_branch() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .activity("Fetch", "1.0", |a| a)
        .activity("Parse", "1.0", |a| {
            a.after_activity("Fetch", "1.0")
                .on_failure(|_, item| Ok(item.jump().to_activity("Fetch", "1.0")?.into()))
        })
        .build()
        .unwrap();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .activity_scheduled(&activity("Fetch"))
        .activity_completed(&activity("Fetch"), "ok")
        .decision_completed()
        .activity_scheduled(&activity("Parse"))
        .activity_failed(&activity("Parse"), "stale", "source changed")
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(scheduled(&decisions), vec![&activity("Fetch")]);
}

#[test]
fn jump_out_of_branch_is_rejected() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .activity("Download", "1.0", |a| a)
        .activity("Transcode", "1.0", |a| {
            a.after_activity("Download", "1.0")
                .on_failure(|_, item| Ok(item.jump().to_lambda("Thumbnail")?.into()))
        })
        .lambda("Thumbnail", |l| l.after_activity("Download", "1.0"))
        .build()
        .unwrap();
    let history = pipeline_fanned_out()
        .activity_failed(&activity("Transcode"), "codec", "unsupported profile")
        .build()
        .unwrap();

    let err = workflow.decide(&history).unwrap_err();

    assert!(matches!(
        err,
        Error::OutOfBranchJump { jump_from, jump_to }
            if jump_from == activity("Transcode") && jump_to == lambda("Thumbnail")
    ));
}

#[test]
fn chain_advances_one_item_per_completion() {
    init_test_tracing();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .activity_scheduled(&activity("Fetch"))
        .activity_completed(&activity("Fetch"), "ok")
        .build()
        .unwrap();

    let decisions = chain().decide(&history).unwrap();

    assert_eq!(scheduled(&decisions), vec![&activity("Parse")]);
}
