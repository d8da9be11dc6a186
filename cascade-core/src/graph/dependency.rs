//! Dependency Graph Storage
//!
//! The arena that owns every node of a runtime and the edges between them.
//!
//! # Algorithm
//!
//! Change propagation is "push-pull":
//!
//! 1. When a cell changes, its direct dependents are marked `Dirty`.
//! 2. Memos among them push `MaybeDirty` to their own dependents, recursively.
//! 3. Every effect that just left the `Clean` state is handed to the
//!    scheduler.
//! 4. When a `MaybeDirty` node is later processed, the runtime pulls its memo
//!    dependencies up to date and only re-runs the node if one of them
//!    actually changed.
//!
//! The graph itself never runs user code; it only moves flags and edges.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use super::node::{DirtyState, Lane, Node, NodeId, NodeKind};

/// Serializable view of a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: NodeKind,
    pub state: DirtyState,
    pub dependencies: Vec<NodeId>,
    pub dependents: Vec<NodeId>,
    pub owner: Option<NodeId>,
    pub cleanups: usize,
}

/// Serializable view of a whole runtime graph, ordered by creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
}

impl GraphSnapshot {
    pub fn node(&self, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// All nodes of a runtime, indexed by ID.
#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    nodes: HashMap<NodeId, Node>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a node, registering it with its owner.
    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        let id = node.id;
        if let Some(owner) = node.owner.and_then(|owner| self.nodes.get_mut(&owner)) {
            owner.owned.push(id);
        }
        self.nodes.insert(id, node);
        id
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// IDs of all live nodes in creation order.
    pub(crate) fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Replace the dependency set of `dependent` with `dependencies`.
    ///
    /// Disposed nodes and self-reads are skipped, and nothing happens if
    /// `dependent` itself was disposed. Callers must have removed
    /// the previous edges with [`unsubscribe_all`](Self::unsubscribe_all).
    pub(crate) fn subscribe<I>(&mut self, dependent: NodeId, dependencies: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        if !self.nodes.contains_key(&dependent) {
            return;
        }

        let mut installed = smallvec::SmallVec::new();
        for dependency in dependencies {
            if dependency == dependent {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&dependency) {
                node.dependents.insert(dependent);
                installed.push(dependency);
            }
        }

        if let Some(node) = self.nodes.get_mut(&dependent) {
            node.dependencies = installed;
        }
    }

    /// Remove every edge from `dependent` to the nodes it read.
    pub(crate) fn unsubscribe_all(&mut self, dependent: NodeId) {
        let dependencies = match self.nodes.get_mut(&dependent) {
            Some(node) => std::mem::take(&mut node.dependencies),
            None => return,
        };

        for dependency in dependencies {
            if let Some(node) = self.nodes.get_mut(&dependency) {
                // shift_remove keeps the remaining subscribers in order.
                node.dependents.shift_remove(&dependent);
            }
        }
    }

    /// The source itself plus every memo reachable from it through memo
    /// edges. These are the values that become stale when `source` changes.
    pub(crate) fn affected_by(&self, source: NodeId) -> Vec<NodeId> {
        let mut affected = vec![source];
        let mut visited = HashSet::from([source]);
        let mut queue = VecDeque::from([source]);

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for &dependent in &node.dependents {
                let is_memo = self
                    .nodes
                    .get(&dependent)
                    .is_some_and(|n| n.kind == NodeKind::Memo);
                if is_memo && visited.insert(dependent) {
                    affected.push(dependent);
                    queue.push_back(dependent);
                }
            }
        }

        affected
    }

    /// Record that `source` changed at `epoch` and propagate dirty flags.
    ///
    /// Returns the effects that left the `Clean` state, which the caller must
    /// enqueue. Effects that were already dirty are queued already.
    pub(crate) fn mark_changed(&mut self, source: NodeId, epoch: u64) -> Vec<(NodeId, Lane)> {
        let mut newly_dirty = Vec::new();

        match self.nodes.get_mut(&source) {
            Some(node) => node.changed_at = epoch,
            None => return newly_dirty,
        }

        let mut visited = HashSet::from([source]);
        let mut stack = vec![(source, DirtyState::Dirty)];

        while let Some((current, status)) = stack.pop() {
            let dependents: Vec<NodeId> = match self.nodes.get(&current) {
                Some(node) => node.dependents.iter().copied().collect(),
                None => continue,
            };

            for id in dependents {
                let Some(node) = self.nodes.get_mut(&id) else {
                    continue;
                };

                let was_clean = node.is_clean();
                if status == DirtyState::Dirty {
                    node.state = DirtyState::Dirty;
                } else if was_clean {
                    node.state = DirtyState::MaybeDirty;
                }

                match node.kind {
                    NodeKind::Memo => {
                        if visited.insert(id) {
                            stack.push((id, DirtyState::MaybeDirty));
                        }
                    }
                    NodeKind::Effect(lane) if was_clean => newly_dirty.push((id, lane)),
                    _ => {}
                }
            }
        }

        newly_dirty
    }

    /// Remove a node and every edge involving it.
    ///
    /// Owned nodes are not touched; the runtime disposes them first.
    pub(crate) fn detach(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;

        for dependency in &node.dependencies {
            if let Some(dep) = self.nodes.get_mut(dependency) {
                dep.dependents.shift_remove(&id);
            }
        }

        for dependent in &node.dependents {
            if let Some(dependent) = self.nodes.get_mut(dependent) {
                dependent.dependencies.retain(|dep| *dep != id);
            }
        }

        if let Some(owner) = node.owner.and_then(|owner| self.nodes.get_mut(&owner)) {
            owner.owned.retain(|owned| *owned != id);
        }

        Some(node)
    }

    pub(crate) fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .ids()
            .into_iter()
            .filter_map(|id| self.nodes.get(&id))
            .map(|node| NodeSnapshot {
                id: node.id,
                kind: node.kind,
                state: node.state,
                dependencies: node.dependencies.to_vec(),
                dependents: node.dependents.iter().copied().collect(),
                owner: node.owner,
                cleanups: node.cleanups.len(),
            })
            .collect();

        GraphSnapshot { nodes }
    }
}
