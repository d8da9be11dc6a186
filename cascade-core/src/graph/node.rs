//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use serde::Serialize;
use smallvec::SmallVec;

use crate::reactive::Computation;

/// Unique identifier for a node in the dependency graph.
///
/// IDs increase monotonically, so ordering by ID is ordering by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Timing lane of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Runs synchronously, before the write that triggered it returns.
    Render,

    /// Runs once after the current batch of writes completes.
    Deferred,
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// An ownership boundary. Owns other nodes and cleanups, never runs.
    Scope,

    /// A reactive cell (signal). These are the roots of the graph.
    /// They have no dependencies, only dependents.
    Source,

    /// A derived node (memo). These have dependencies and may have dependents.
    /// They cache their computed value.
    Memo,

    /// An effect node. These are leaves of the graph.
    Effect(Lane),
}

impl NodeKind {
    pub fn is_computation(&self) -> bool {
        matches!(self, NodeKind::Memo | NodeKind::Effect(_))
    }

    pub fn lane(&self) -> Option<Lane> {
        match self {
            NodeKind::Effect(lane) => Some(*lane),
            _ => None,
        }
    }
}

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyState {
    /// The node's value is up-to-date.
    Clean,

    /// The node might need to recompute. One of its upstream memos was
    /// invalidated, but we have not yet verified that its value changed.
    MaybeDirty,

    /// The node definitely needs to recompute. A direct dependency changed.
    Dirty,
}

pub(crate) type Cleanup = Box<dyn FnOnce()>;

/// A node in the dependency graph.
pub(crate) struct Node {
    /// Unique identifier for this node.
    pub(crate) id: NodeId,

    /// What kind of node this is.
    pub(crate) kind: NodeKind,

    /// Current dirty state.
    pub(crate) state: DirtyState,

    /// Nodes this node read during its most recent run, in read order.
    pub(crate) dependencies: SmallVec<[NodeId; 4]>,

    /// Nodes that read this node, in subscription order.
    pub(crate) dependents: IndexSet<NodeId>,

    /// Epoch at which the observable value last changed.
    pub(crate) changed_at: u64,

    /// Epoch at which this node was last run or verified clean.
    pub(crate) verified_at: u64,

    /// The scope or computation that created this node.
    pub(crate) owner: Option<NodeId>,

    /// Nodes created while this node was the active owner.
    pub(crate) owned: Vec<NodeId>,

    /// Cleanups in registration order.
    pub(crate) cleanups: Vec<Cleanup>,

    /// Context values provided on this owner, keyed by type.
    pub(crate) contexts: HashMap<TypeId, Rc<dyn Any>>,

    /// The body to run for memos and effects.
    pub(crate) computation: Option<Rc<dyn Computation>>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, owner: Option<NodeId>) -> Self {
        let state = if kind.is_computation() {
            DirtyState::Dirty
        } else {
            DirtyState::Clean
        };

        Self {
            id: NodeId::next(),
            kind,
            state,
            dependencies: SmallVec::new(),
            dependents: IndexSet::new(),
            changed_at: 0,
            verified_at: 0,
            owner,
            owned: Vec::new(),
            cleanups: Vec::new(),
            contexts: HashMap::new(),
            computation: None,
        }
    }

    pub(crate) fn with_computation(mut self, computation: Rc<dyn Computation>) -> Self {
        self.computation = Some(computation);
        self
    }

    pub(crate) fn is_clean(&self) -> bool {
        self.state == DirtyState::Clean
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("owner", &self.owner)
            .field("owned", &self.owned)
            .field("cleanups", &self.cleanups.len())
            .finish()
    }
}
