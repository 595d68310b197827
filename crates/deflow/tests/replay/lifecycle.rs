//! Starting, completing, failing and closing workflow runs.

use std::time::Duration;

use deflow::decision::RestartWorkflowDecision;
use deflow::history::{ChildPolicy, WorkflowExecutionStarted};
use deflow::{Error, RestartAction, Workflow, WorkflowAction, WorkflowDecision};
use test_utils::HistoryBuilder;

use crate::support::helpers::{
    activity, assert_decision_types, child_workflow, init_test_tracing, lambda, scheduled, timer,
};
use crate::support::workflows::{lambda_then_timer, media_pipeline};

// ============================================================================
// Start
// ============================================================================

#[test]
fn start_schedules_startup_items_with_workflow_input() {
    init_test_tracing();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(Some("s3://bucket/in.mov"))
        .build()
        .unwrap();

    let decisions = media_pipeline().decide(&history).unwrap();

    assert_decision_types(&decisions, &["ScheduleActivityTask"]);
    let WorkflowDecision::ScheduleActivity(schedule) = &decisions[0] else {
        unreachable!();
    };
    assert_eq!(schedule.identity, activity("Download"));
    assert_eq!(schedule.schedule_id, activity("Download").schedule_id("run-1"));
    assert_eq!(schedule.input.as_deref(), Some("s3://bucket/in.mov"));
}

#[test]
fn empty_workflow_completes_on_start() {
    init_test_tracing();
    let workflow = Workflow::builder().build().unwrap();
    let history = HistoryBuilder::new("wf-1", "run-1").started(None).build().unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::complete_workflow(
            "Workflow is completed because no schedulable item was found."
        )]
    );
}

#[test]
fn start_handler_replaces_scheduling() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .activity("Download", "1.0", |a| a)
        .on_start(|started, _| {
            Ok(match started.input() {
                Some(_) => WorkflowAction::Start,
                None => WorkflowAction::fail_workflow("MISSING_INPUT", "no source given"),
            })
        })
        .build()
        .unwrap();
    let history = HistoryBuilder::new("wf-1", "run-1").started(None).build().unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::fail_workflow("MISSING_INPUT", "no source given")]
    );
}

// ============================================================================
// Completion and failure
// ============================================================================

#[test]
fn completed_lambda_starts_timer() {
    init_test_tracing();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .lambda_scheduled(&lambda("Probe"))
        .lambda_completed(&lambda("Probe"), "{\"frames\":240}")
        .build()
        .unwrap();

    let decisions = lambda_then_timer().decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::schedule_timer(&timer("Settle"), Duration::ZERO)]
    );
}

#[test]
fn last_item_completion_completes_workflow() {
    init_test_tracing();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .lambda_scheduled(&lambda("Probe"))
        .lambda_completed(&lambda("Probe"), "ok")
        .decision_completed()
        .timer_started(&timer("Settle"), Duration::ZERO)
        .timer_fired(&timer("Settle"))
        .build()
        .unwrap();

    let decisions = lambda_then_timer().decide(&history).unwrap();

    assert_eq!(decisions, vec![WorkflowDecision::complete_workflow("Workflow is completed.")]);
}

#[test]
fn lambda_failure_fails_workflow() {
    init_test_tracing();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .lambda_scheduled(&lambda("Probe"))
        .lambda_failed(&lambda("Probe"), "r", "d")
        .build()
        .unwrap();

    let decisions = lambda_then_timer().decide(&history).unwrap();

    assert_eq!(decisions, vec![WorkflowDecision::fail_workflow("r", "d")]);
}

#[test]
fn in_flight_events_produce_no_decisions() {
    init_test_tracing();
    let download = activity("Download");
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .activity_scheduled(&download)
        .activity_started(&download)
        .build()
        .unwrap();

    let decisions = media_pipeline().decide(&history).unwrap();

    assert!(decisions.is_empty());
}

#[test]
fn completion_handler_overrides_default() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .lambda("Probe", |l| {
            l.on_completion(|event, _| {
                Ok(match event.result() {
                    Some("skip") => WorkflowAction::complete_workflow("nothing to do"),
                    _ => WorkflowAction::continue_workflow(),
                })
            })
        })
        .timer("Settle", |t| t.after_lambda("Probe"))
        .build()
        .unwrap();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .lambda_scheduled(&lambda("Probe"))
        .lambda_completed(&lambda("Probe"), "skip")
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(decisions, vec![WorkflowDecision::complete_workflow("nothing to do")]);
    assert!(scheduled(&decisions).is_empty());
}

#[test]
fn child_workflow_ids_are_scoped_to_the_run() -> anyhow::Result<()> {
    init_test_tracing();
    let workflow = Workflow::builder()
        .child_workflow("Encode", "1.0", |c| c.with_tag("batch"))
        .activity("Notify", "1.0", |a| a.after_child_workflow("Encode", "1.0"))
        .build()?;

    let started = HistoryBuilder::new("wf-1", "run-1").started(None).build()?;
    let decisions = workflow.decide(&started)?;
    assert_decision_types(&decisions, &["StartChildWorkflowExecution"]);
    let WorkflowDecision::ScheduleChildWorkflow(start) = &decisions[0] else {
        anyhow::bail!("expected a child workflow start, got {decisions:?}");
    };
    assert_eq!(start.workflow_id, child_workflow("Encode").schedule_id("run-1"));
    assert_ne!(start.workflow_id, child_workflow("Encode").schedule_id("run-2"));
    assert_eq!(start.tag_list, vec!["batch".to_string()]);

    let encode = child_workflow("Encode");
    let completed = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .child_workflow_initiated(&encode)
        .child_workflow_started(&encode)
        .child_workflow_completed(&encode, "done")
        .build()?;
    let decisions = workflow.decide(&completed)?;
    assert_eq!(scheduled(&decisions), vec![&activity("Notify")]);
    Ok(())
}

// ============================================================================
// Workflow-level events
// ============================================================================

#[test]
fn cancel_request_cancels_workflow() {
    init_test_tracing();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .cancel_requested(Some("operator abort"))
        .build()
        .unwrap();

    let decisions = media_pipeline().decide(&history).unwrap();

    assert_eq!(decisions, vec![WorkflowDecision::cancel_workflow("operator abort")]);
}

#[test]
fn signals_reach_their_handler_and_others_are_ignored() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .activity("Download", "1.0", |a| a)
        .on_signal("pause", |signal, _| {
            Ok(WorkflowAction::record_marker("paused", signal.input.clone()))
        })
        .build()
        .unwrap();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .signaled("pause", Some("maintenance"))
        .signaled("resume", None)
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::record_marker("paused", Some("maintenance".into()))]
    );
}

#[test]
fn restart_carries_over_unset_properties() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .activity("Download", "1.0", |a| a)
        .on_signal("restart", |_, _| {
            Ok(RestartAction::default().with_input("resume-from=42").into())
        })
        .build()
        .unwrap();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started_with(WorkflowExecutionStarted {
            input: Some("resume-from=0".into()),
            task_list: Some("media".into()),
            task_priority: Some(5),
            execution_start_to_close_timeout: Some(Duration::from_secs(3600)),
            child_policy: Some(ChildPolicy::Terminate),
            tag_list: vec!["nightly".into()],
            ..WorkflowExecutionStarted::default()
        })
        .decision_completed()
        .signaled("restart", None)
        .build()
        .unwrap();

    let decisions = workflow.decide(&history).unwrap();

    assert_eq!(
        decisions,
        vec![WorkflowDecision::RestartWorkflow(RestartWorkflowDecision {
            input: Some("resume-from=42".into()),
            task_list: Some("media".into()),
            task_priority: Some(5),
            execution_timeout: Some(Duration::from_secs(3600)),
            task_timeout: None,
            child_policy: Some(ChildPolicy::Terminate),
            tag_list: vec!["nightly".into()],
            lambda_role: None,
            workflow_type_version: None,
        })]
    );
}

#[test]
fn restart_without_started_event_fails() {
    init_test_tracing();
    let workflow = Workflow::builder()
        .activity("Download", "1.0", |a| a)
        .on_signal("restart", |_, _| Ok(WorkflowAction::restart_workflow()))
        .build()
        .unwrap();
    let history = HistoryBuilder::new("wf-1", "run-1")
        .signaled("restart", None)
        .build()
        .unwrap();

    let err = workflow.decide(&history).unwrap_err();

    assert!(matches!(err, Error::MissingWorkflowStarted));
}

#[test]
fn unknown_item_events_are_incompatible() {
    init_test_tracing();
    let stranger = activity("Stranger");
    let history = HistoryBuilder::new("wf-1", "run-1")
        .started(None)
        .decision_completed()
        .activity_scheduled(&stranger)
        .activity_completed(&stranger, "ok")
        .build()
        .unwrap();

    let err = media_pipeline().decide(&history).unwrap_err();

    assert!(matches!(err, Error::IncompatibleWorkflow(_)));
}
