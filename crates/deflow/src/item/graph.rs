//! The validated dependency graph of a workflow.

use std::collections::{HashMap, HashSet, VecDeque};

use super::WorkflowItem;
use crate::error::{Error, Result};
use crate::identity::{Identity, ItemKind, ScheduleId};

/// Items of one workflow with their parent/child adjacency.
///
/// Built once per workflow definition. Construction rejects duplicate
/// identities, parents that are not items of the workflow and cycles, so
/// every traversal below terminates.
#[derive(Debug, Clone)]
pub struct ItemGraph {
    items: Vec<WorkflowItem>,
    index: HashMap<Identity, usize>,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    /// Items whose schedule id does not depend on the run id.
    by_schedule_id: HashMap<ScheduleId, usize>,
}

impl ItemGraph {
    pub fn build(items: Vec<WorkflowItem>) -> Result<Self> {
        let mut index = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if index.insert(item.identity().clone(), i).is_some() {
                return Err(Error::DuplicateItem(item.identity().clone()));
            }
        }

        let mut parents = vec![Vec::new(); items.len()];
        let mut children = vec![Vec::new(); items.len()];
        for (i, item) in items.iter().enumerate() {
            for parent in item.parent_identities() {
                let Some(&p) = index.get(parent) else {
                    return Err(Error::UnknownParent {
                        item: item.identity().clone(),
                        parent: parent.clone(),
                    });
                };
                parents[i].push(p);
                children[p].push(i);
            }
        }

        let by_schedule_id = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.identity().kind() != ItemKind::ChildWorkflow)
            .map(|(i, item)| (item.identity().schedule_id(""), i))
            .collect();

        let graph = Self {
            items,
            index,
            parents,
            children,
            by_schedule_id,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Depth-first search for a back edge.
    fn check_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            OnStack,
            Done,
        }

        let mut marks = vec![Mark::New; self.items.len()];
        for root in 0..self.items.len() {
            if marks[root] != Mark::New {
                continue;
            }
            let mut stack = vec![(root, 0usize)];
            marks[root] = Mark::OnStack;
            while let Some((node, next)) = stack.pop() {
                let Some(&child) = self.children[node].get(next) else {
                    marks[node] = Mark::Done;
                    continue;
                };
                stack.push((node, next + 1));
                match marks[child] {
                    Mark::OnStack => {
                        return Err(Error::CyclicDependency(self.items[child].identity().clone()));
                    }
                    Mark::New => {
                        marks[child] = Mark::OnStack;
                        stack.push((child, 0));
                    }
                    Mark::Done => {}
                }
            }
        }
        Ok(())
    }

    /// Items in declaration order.
    pub fn items(&self) -> &[WorkflowItem] {
        &self.items
    }

    pub fn get(&self, identity: &Identity) -> Option<&WorkflowItem> {
        self.index.get(identity).map(|&i| &self.items[i])
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.index.contains_key(identity)
    }

    /// The item scheduled under `schedule_id` in the run `run_id`.
    pub fn by_schedule_id(&self, schedule_id: &ScheduleId, run_id: &str) -> Option<&WorkflowItem> {
        if let Some(&i) = self.by_schedule_id.get(schedule_id) {
            return Some(&self.items[i]);
        }
        self.items.iter().find(|item| {
            item.identity().kind() == ItemKind::ChildWorkflow
                && item.identity().schedule_id(run_id) == *schedule_id
        })
    }

    pub fn parents<'a>(&'a self, identity: &Identity) -> impl Iterator<Item = &'a WorkflowItem> + use<'a> {
        self.adjacent(identity, &self.parents)
    }

    pub fn children<'a>(&'a self, identity: &Identity) -> impl Iterator<Item = &'a WorkflowItem> + use<'a> {
        self.adjacent(identity, &self.children)
    }

    fn adjacent<'a>(
        &'a self,
        identity: &Identity,
        edges: &'a [Vec<usize>],
    ) -> impl Iterator<Item = &'a WorkflowItem> + use<'a> {
        self.index
            .get(identity)
            .map(|&i| edges[i].as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&i| &self.items[i])
    }

    /// Items without parents.
    pub fn startup_items(&self) -> impl Iterator<Item = &WorkflowItem> {
        self.items.iter().filter(|item| item.is_startup())
    }

    /// Every item `identity` transitively depends on.
    pub fn ancestors(&self, identity: &Identity) -> HashSet<&Identity> {
        self.reachable(identity, &self.parents)
    }

    /// Every item transitively depending on `identity`.
    pub fn descendants(&self, identity: &Identity) -> HashSet<&Identity> {
        self.reachable(identity, &self.children)
    }

    fn reachable(&self, identity: &Identity, edges: &[Vec<usize>]) -> HashSet<&Identity> {
        let mut seen = HashSet::new();
        let Some(&start) = self.index.get(identity) else {
            return seen;
        };
        let mut queue: VecDeque<usize> = edges[start].iter().copied().collect();
        while let Some(i) = queue.pop_front() {
            if seen.insert(self.items[i].identity()) {
                queue.extend(edges[i].iter().copied());
            }
        }
        seen
    }

    /// Join points reachable from `identity` along single-parent paths.
    ///
    /// Walks down every child branch of `identity`, passing through items with
    /// exactly one parent, and stops at the first item with several parents.
    /// Each joint is returned once, paired with the parent it was reached
    /// through.
    pub fn nearest_joints(&self, identity: &Identity) -> Vec<(&Identity, &Identity)> {
        let mut joints: Vec<(&Identity, &Identity)> = Vec::new();
        for child in self.children(identity) {
            for joint in self.branch_joints(child.identity(), identity) {
                if joints.iter().all(|(j, _)| *j != joint.0) {
                    joints.push(joint);
                }
            }
        }
        joints
    }

    /// Join points of the branch starting at `child`, entered from `via`.
    pub fn branch_joints(&self, child: &Identity, via: &Identity) -> Vec<(&Identity, &Identity)> {
        let (Some(&start), Some(&via)) = (self.index.get(child), self.index.get(via)) else {
            return Vec::new();
        };
        let mut joints: Vec<(&Identity, &Identity)> = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([(start, via)]);
        while let Some((node, arrival)) = queue.pop_front() {
            if self.parents[node].len() > 1 {
                let joint = self.items[node].identity();
                if joints.iter().all(|(j, _)| *j != joint) {
                    joints.push((joint, self.items[arrival].identity()));
                }
                continue;
            }
            if seen.insert(node) {
                queue.extend(self.children[node].iter().map(|&c| (c, node)));
            }
        }
        joints
    }
}
