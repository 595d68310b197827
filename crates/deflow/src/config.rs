//! Decider configuration.

/// Workflow-wide settings of the decider.
///
/// # Example
///
/// ```
/// use deflow::DeciderConfig;
///
/// let config = DeciderConfig {
///     completion_result: "all branches done".into(),
///     ..Default::default()
/// };
/// assert!(config.log_decisions);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeciderConfig {
    /// Result of the completion proposed once the graph runs out of items.
    ///
    /// Default: `"Workflow is completed."`.
    pub completion_result: String,

    /// Result used when a workflow without startup items is started.
    ///
    /// Default: `"Workflow is completed because no schedulable item was found."`.
    pub empty_workflow_result: String,

    /// Emit one `debug` line per decision of every cycle.
    ///
    /// Default: `true`.
    pub log_decisions: bool,
}

impl Default for DeciderConfig {
    fn default() -> Self {
        Self {
            completion_result: "Workflow is completed.".into(),
            empty_workflow_result: "Workflow is completed because no schedulable item was found."
                .into(),
            log_decisions: true,
        }
    }
}
