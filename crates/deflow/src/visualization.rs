//! Graph and status views of a workflow, for debugging and dashboards.
//!
//! [`Workflow::graph_definition`] exposes the static item graph, renderable
//! as Mermaid or Graphviz DOT. [`Workflow::item_statuses`] reports where each
//! item stands in one run's history.
//!
//! # Example
//!
//! ```
//! use deflow::Workflow;
//!
//! let workflow = Workflow::builder()
//!     .activity("Download", "1.0", |a| a)
//!     .lambda("Thumbnail", |l| l.after_activity("Download", "1.0"))
//!     .build()
//!     .unwrap();
//!
//! let mermaid = workflow.graph_definition().to_mermaid();
//! assert!(mermaid.starts_with("flowchart TD"));
//! assert!(mermaid.contains("n0 --> n1"));
//! ```

use time::OffsetDateTime;

use crate::event::EventType;
use crate::history::WorkflowHistoryEvents;
use crate::identity::{Identity, ItemKind};
use crate::workflow::Workflow;

/// Static graph definition for visualization tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphDefinition {
    /// All items, in declaration order.
    pub nodes: Vec<NodeDefinition>,

    /// Parent to child edges, as indexes into `nodes`.
    pub edges: Vec<(usize, usize)>,
}

/// An item in the graph definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDefinition {
    pub identity: Identity,

    /// Whether the item is scheduled when the workflow starts.
    pub is_startup: bool,

    /// Whether the item waits for several parents.
    pub is_joint: bool,
}

impl NodeDefinition {
    fn label(&self) -> String {
        let identity = &self.identity;
        let mut label = identity.name().to_string();
        if let Some(version) = identity.version() {
            label.push_str(&format!(" v{version}"));
        }
        if !identity.positional_name().is_empty() {
            label.push_str(&format!(" [{}]", identity.positional_name()));
        }
        label.replace('"', "'")
    }
}

impl GraphDefinition {
    /// Generate a Mermaid flowchart.
    ///
    /// # Example Output
    ///
    /// ```text
    /// flowchart TD
    ///     n0["Download v1.0"]
    ///     n1(["Cooldown"])
    ///     n2{{"Merge v1.0"}}
    ///     n0 --> n1
    ///     n1 --> n2
    /// ```
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec!["flowchart TD".to_string()];

        for (i, node) in self.nodes.iter().enumerate() {
            let label = node.label();
            let shape = match node.identity.kind() {
                ItemKind::Activity => format!("[\"{label}\"]"),
                ItemKind::Timer => format!("([\"{label}\"])"),
                ItemKind::Lambda => format!(">\"{label}\"]"),
                ItemKind::ChildWorkflow => format!("[[\"{label}\"]]"),
            };
            lines.push(format!("    n{i}{shape}"));
        }

        for (from, to) in &self.edges {
            lines.push(format!("    n{from} --> n{to}"));
        }

        lines.join("\n")
    }

    /// Generate a DOT graph for Graphviz.
    ///
    /// # Example Output
    ///
    /// ```text
    /// digraph workflow {
    ///     rankdir=TB;
    ///     node [shape=box];
    ///
    ///     n0 [label="Download v1.0", penwidth=2];
    ///     n1 [label="Cooldown", shape=ellipse];
    ///
    ///     n0 -> n1;
    /// }
    /// ```
    pub fn to_dot(&self) -> String {
        let mut lines = vec![
            "digraph workflow {".to_string(),
            "    rankdir=TB;".to_string(),
            "    node [shape=box];".to_string(),
            "".to_string(),
        ];

        for (i, node) in self.nodes.iter().enumerate() {
            let mut attributes = vec![format!("label=\"{}\"", node.label())];
            match node.identity.kind() {
                ItemKind::Timer => attributes.push("shape=ellipse".to_string()),
                ItemKind::Lambda => attributes.push("shape=parallelogram".to_string()),
                ItemKind::ChildWorkflow => attributes.push("shape=box3d".to_string()),
                ItemKind::Activity => {}
            }
            if node.is_startup {
                attributes.push("penwidth=2".to_string());
            }
            if node.is_joint {
                attributes.push("style=dashed".to_string());
            }
            lines.push(format!("    n{i} [{}];", attributes.join(", ")));
        }

        if !self.edges.is_empty() {
            lines.push("".to_string());
        }
        for (from, to) in &self.edges {
            lines.push(format!("    n{from} -> n{to};"));
        }

        lines.push("}".to_string());
        lines.join("\n")
    }
}

/// Where an item stands in one run's history.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemStatus {
    pub identity: Identity,

    /// Type of the newest event, including reschedule timer events.
    pub last_event: Option<EventType>,

    /// When the newest event was recorded.
    pub last_event_at: Option<OffsetDateTime>,

    /// Whether the item or its reschedule timer is in flight.
    pub is_active: bool,

    /// How many events the item has, excluding its reschedule timer.
    pub event_count: usize,
}

impl Workflow {
    /// The static item graph.
    pub fn graph_definition(&self) -> GraphDefinition {
        let items = self.graph().items();
        let index_of = |identity: &Identity| items.iter().position(|item| item.identity() == identity);

        let nodes = items
            .iter()
            .map(|item| NodeDefinition {
                identity: item.identity().clone(),
                is_startup: item.is_startup(),
                is_joint: item.parent_identities().len() > 1,
            })
            .collect();

        let edges = items
            .iter()
            .enumerate()
            .flat_map(|(child, item)| {
                item.parent_identities()
                    .iter()
                    .filter_map(move |parent| index_of(parent).map(|parent| (parent, child)))
            })
            .collect();

        GraphDefinition { nodes, edges }
    }

    /// Status of every item in the run described by `history`.
    pub fn item_statuses(&self, history: &WorkflowHistoryEvents) -> Vec<ItemStatus> {
        self.context(history)
            .items()
            .map(|item| {
                let last = item.last_event(true);
                ItemStatus {
                    identity: item.identity().clone(),
                    last_event: last.map(|e| e.event_type()),
                    last_event_at: last.map(|e| e.timestamp()),
                    is_active: last.is_some_and(|e| e.is_active()),
                    event_count: item.all_events(false).len(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow() -> Workflow {
        Workflow::builder()
            .activity("Download", "1.0", |a| a)
            .timer("Cooldown", |t| t.after_activity("Download", "1.0"))
            .lambda("Probe", |l| l.after_activity("Download", "1.0"))
            .activity("Merge", "1.0", |a| a.after_timer("Cooldown").after_lambda("Probe"))
            .build()
            .unwrap()
    }

    #[test]
    fn graph_definition_lists_nodes_and_edges() {
        let definition = workflow().graph_definition();

        assert_eq!(definition.nodes.len(), 4);
        assert!(definition.nodes[0].is_startup);
        assert!(definition.nodes[3].is_joint);
        assert_eq!(definition.edges, vec![(0, 1), (0, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn mermaid_output() {
        let mermaid = workflow().graph_definition().to_mermaid();

        assert!(mermaid.starts_with("flowchart TD"));
        assert!(mermaid.contains("n0[\"Download v1.0\"]"));
        assert!(mermaid.contains("n1([\"Cooldown\"])"));
        assert!(mermaid.contains("n2>\"Probe\"]"));
        assert!(mermaid.contains("n2 --> n3"));
    }

    #[test]
    fn dot_output() {
        let dot = workflow().graph_definition().to_dot();

        assert!(dot.starts_with("digraph workflow {"));
        assert!(dot.contains("n0 [label=\"Download v1.0\", penwidth=2];"));
        assert!(dot.contains("n3 [label=\"Merge v1.0\", style=dashed];"));
        assert!(dot.contains("n1 -> n3;"));
        assert!(dot.ends_with("}"));
    }
}
