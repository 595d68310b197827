//! The read-only view a decision cycle works against.

use std::fmt;

use crate::config::DeciderConfig;
use crate::error::{Error, Result};
use crate::history::WorkflowHistoryEvents;
use crate::identity::{Identity, ScheduleId};
use crate::item::ItemRef;
use crate::workflow::Workflow;

/// A workflow definition paired with the history of one run.
///
/// Cheap to copy; handlers receive it (directly or through an
/// [`ItemRef`]) to inspect other items while deciding.
#[derive(Clone, Copy)]
pub struct DecisionContext<'a> {
    workflow: &'a Workflow,
    history: &'a WorkflowHistoryEvents,
}

impl<'a> DecisionContext<'a> {
    pub fn new(workflow: &'a Workflow, history: &'a WorkflowHistoryEvents) -> Self {
        Self { workflow, history }
    }

    pub fn workflow(&self) -> &'a Workflow {
        self.workflow
    }

    pub fn history(&self) -> &'a WorkflowHistoryEvents {
        self.history
    }

    pub fn config(&self) -> &'a DeciderConfig {
        self.workflow.config()
    }

    pub fn run_id(&self) -> &'a str {
        self.history.run_id()
    }

    pub fn workflow_input(&self) -> Option<&'a str> {
        self.history.workflow_input()
    }

    /// The item `identity`, failing with [`Error::UnknownItem`] when it is
    /// not part of the workflow.
    pub fn item(&self, identity: &Identity) -> Result<ItemRef<'a>> {
        self.workflow
            .graph()
            .get(identity)
            .map(|item| ItemRef::new(item, *self))
            .ok_or_else(|| Error::UnknownItem(identity.clone()))
    }

    pub fn activity(&self, name: &str, version: &str) -> Result<ItemRef<'a>> {
        self.item(&Identity::activity(name, version, "")?)
    }

    pub fn timer(&self, name: &str) -> Result<ItemRef<'a>> {
        self.item(&Identity::timer(name)?)
    }

    pub fn lambda(&self, name: &str) -> Result<ItemRef<'a>> {
        self.item(&Identity::lambda(name, "")?)
    }

    pub fn child_workflow(&self, name: &str, version: &str) -> Result<ItemRef<'a>> {
        self.item(&Identity::child_workflow(name, version, "")?)
    }

    /// All items in declaration order.
    pub fn items(&self) -> impl Iterator<Item = ItemRef<'a>> + use<'a> {
        let ctx = *self;
        self.workflow
            .graph()
            .items()
            .iter()
            .map(move |item| ItemRef::new(item, ctx))
    }

    /// The item an event with `schedule_id` belongs to.
    pub fn item_by_schedule_id(&self, schedule_id: &ScheduleId) -> Option<ItemRef<'a>> {
        self.workflow
            .graph()
            .by_schedule_id(schedule_id, self.history.run_id())
            .map(|item| ItemRef::new(item, *self))
    }

    /// `true` while any item or reschedule timer is in flight.
    pub fn has_active_items(&self) -> bool {
        self.items().any(|item| item.is_active())
    }
}

impl fmt::Debug for DecisionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionContext")
            .field("workflow_id", &self.history.workflow_id())
            .field("run_id", &self.history.run_id())
            .finish()
    }
}
