use std::time::Duration;

use super::WorkflowAction;
use crate::context::DecisionContext;
use crate::decision::{RestartWorkflowDecision, WorkflowDecision};
use crate::error::Result;
use crate::history::ChildPolicy;

/// Close this run and continue as a new run of the same workflow type.
///
/// Every property left unset is carried over from the current run's
/// `WorkflowExecutionStarted` event.
///
/// # Example
///
/// ```
/// use deflow::{RestartAction, WorkflowAction};
///
/// let action: WorkflowAction = RestartAction::default()
///     .with_input("resume-from=42")
///     .with_tag("restarted")
///     .into();
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestartAction {
    overrides: RestartWorkflowDecision,
}

impl RestartAction {
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.overrides.input = Some(input.into());
        self
    }

    pub fn on_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.overrides.task_list = Some(task_list.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.overrides.task_priority = Some(priority);
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.overrides.execution_timeout = Some(timeout);
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.overrides.task_timeout = Some(timeout);
        self
    }

    pub fn with_child_policy(mut self, policy: ChildPolicy) -> Self {
        self.overrides.child_policy = Some(policy);
        self
    }

    /// Add a tag. Any tag replaces the carried-over tag list.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.overrides.tag_list.push(tag.into());
        self
    }

    pub fn with_lambda_role(mut self, role: impl Into<String>) -> Self {
        self.overrides.lambda_role = Some(role.into());
        self
    }

    /// Continue as a different version of the workflow type.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.overrides.workflow_type_version = Some(version.into());
        self
    }

    /// Fails with [`Error::MissingWorkflowStarted`](crate::Error::MissingWorkflowStarted)
    /// when the history has no started event to carry properties over from.
    pub(super) fn resolve(&self, ctx: DecisionContext<'_>) -> Result<Vec<WorkflowDecision>> {
        let started = ctx.history().workflow_started()?.attributes;
        let o = &self.overrides;
        let decision = RestartWorkflowDecision {
            input: o.input.clone().or(started.input),
            task_list: o.task_list.clone().or(started.task_list),
            task_priority: o.task_priority.or(started.task_priority),
            execution_timeout: o.execution_timeout.or(started.execution_start_to_close_timeout),
            task_timeout: o.task_timeout.or(started.task_start_to_close_timeout),
            child_policy: o.child_policy.or(started.child_policy),
            tag_list: if o.tag_list.is_empty() {
                started.tag_list
            } else {
                o.tag_list.clone()
            },
            lambda_role: o.lambda_role.clone().or(started.lambda_role),
            workflow_type_version: o.workflow_type_version.clone(),
        };
        Ok(vec![WorkflowDecision::RestartWorkflow(decision)])
    }
}

impl From<RestartAction> for WorkflowAction {
    fn from(action: RestartAction) -> Self {
        WorkflowAction::Restart(action)
    }
}
