//! Property-based checks of decision cycles.

use deflow::{Workflow, WorkflowAction, WorkflowDecision};
use proptest::prelude::*;
use test_utils::HistoryBuilder;

use crate::support::helpers::activity;

// ============================================================================
// Strategies
// ============================================================================

/// Number of independent startup activities, and which of them completed.
fn arb_parallel_run() -> impl Strategy<Value = (usize, Vec<bool>)> {
    (1usize..6).prop_flat_map(|n| (Just(n), prop::collection::vec(any::<bool>(), n)))
}

fn arb_marker_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop::string::string_regex("[a-z]{1,8}").unwrap(), 1..6)
}

fn parallel_workflow(n: usize) -> Workflow {
    (0..n)
        .fold(Workflow::builder(), |builder, i| {
            builder.activity(&format!("Task{i}"), "1.0", |a| a)
        })
        .build()
        .unwrap()
}

fn parallel_history(completed: &[bool]) -> HistoryBuilder {
    let mut history = HistoryBuilder::new("wf-prop", "run-prop").started(None).decision_completed();
    for i in 0..completed.len() {
        history = history.activity_scheduled(&activity(&format!("Task{i}")));
    }
    for (i, done) in completed.iter().enumerate() {
        if *done {
            history = history.activity_completed(&activity(&format!("Task{i}")), "ok");
        }
    }
    history
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: deciding twice over the same history yields the same batch.
    #[test]
    fn prop_decide_is_deterministic((n, completed) in arb_parallel_run()) {
        let workflow = parallel_workflow(n);
        let history = parallel_history(&completed).build().unwrap();

        let first = workflow.decide(&history).unwrap();
        let second = workflow.decide(&history).unwrap();

        prop_assert_eq!(first, second);
    }

    /// Property: the workflow completes exactly when no branch is left in flight.
    #[test]
    fn prop_completion_only_when_all_branches_settled((n, completed) in arb_parallel_run()) {
        let workflow = parallel_workflow(n);
        let history = parallel_history(&completed).build().unwrap();

        let decisions = workflow.decide(&history).unwrap();

        if completed.iter().all(|done| *done) {
            prop_assert_eq!(
                decisions,
                vec![WorkflowDecision::complete_workflow("Workflow is completed.")]
            );
        } else {
            prop_assert!(decisions.is_empty(), "unexpected decisions: {:?}", decisions);
        }
    }

    /// Property: composed actions resolve to the concatenation of their parts,
    /// whatever the grouping.
    #[test]
    fn prop_composition_concatenates(names in arb_marker_names()) {
        let workflow = parallel_workflow(1);
        let history = parallel_history(&[false]).build().unwrap();
        let ctx = workflow.context(&history);

        let actions: Vec<WorkflowAction> = names
            .iter()
            .map(|name| WorkflowAction::record_marker(name.clone(), None))
            .collect();
        let left = actions.iter().cloned().reduce(|a, b| a + b).unwrap();
        let right = actions.iter().cloned().rev().reduce(|b, a| a + b).unwrap();

        let expected: Vec<WorkflowDecision> = names
            .iter()
            .map(|name| WorkflowDecision::record_marker(name.clone(), None))
            .collect();
        prop_assert_eq!(left.decisions(ctx).unwrap(), expected.clone());
        prop_assert_eq!(right.decisions(ctx).unwrap(), expected);
    }
}
