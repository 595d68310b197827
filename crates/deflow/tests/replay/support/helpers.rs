use deflow::{Identity, WorkflowDecision};

/// Initialize tracing for tests. Safe to call multiple times.
///
/// The `try_init()` call is idempotent; subsequent calls are no-ops if a
/// global subscriber is already set.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("deflow=debug")
        .with_test_writer()
        .try_init();
}

pub fn activity(name: &str) -> Identity {
    Identity::activity(name, "1.0", "").unwrap()
}

pub fn timer(name: &str) -> Identity {
    Identity::timer(name).unwrap()
}

pub fn lambda(name: &str) -> Identity {
    Identity::lambda(name, "").unwrap()
}

pub fn child_workflow(name: &str) -> Identity {
    Identity::child_workflow(name, "1.0", "").unwrap()
}

/// Assert that decisions match the expected SWF decision types in order.
pub fn assert_decision_types(decisions: &[WorkflowDecision], expected: &[&str]) {
    let actual: Vec<&str> = decisions.iter().map(WorkflowDecision::decision_type).collect();
    assert_eq!(actual, expected, "decision types mismatch: {decisions:#?}");
}

/// Items scheduled by a batch, in order.
pub fn scheduled(decisions: &[WorkflowDecision]) -> Vec<&Identity> {
    decisions
        .iter()
        .filter_map(WorkflowDecision::scheduled_item)
        .collect()
}
