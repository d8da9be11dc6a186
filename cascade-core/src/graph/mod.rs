//! Dependency Graph
//!
//! This module implements the computational dependency graph that tracks
//! relationships between reactive values and computations.
//!
//! # Overview
//!
//! The dependency graph is a directed graph where:
//!
//! - Nodes represent reactive values (signals), computations (memos, effects)
//!   or ownership scopes
//! - Edges represent dependencies: if A read B during its last run, there is
//!   an edge from B to A
//!
//! When a signal changes, we traverse the graph to find all affected nodes
//! and mark them as dirty. The scheduler then decides when dirty effects run.
//!
//! # Design Decisions
//!
//! 1. We use a centralized arena rather than reference-counted links because:
//!    - A disposed node disappears from every subscriber set at once, so a
//!      cell can never keep a dead computation alive
//!    - It gives every node a stable, ordered ID for scheduling
//!    - It makes the whole graph cheap to inspect and snapshot
//!
//! 2. The graph is indexed by node ID for O(1) lookups.
//!
//! 3. We maintain both forward (dependencies) and reverse (dependents) edges
//!    to enable efficient traversal in both directions.

mod dependency;
mod node;
mod scheduler;

pub use dependency::{GraphSnapshot, NodeSnapshot};
pub use node::{DirtyState, Lane, NodeId, NodeKind};

pub(crate) use dependency::DependencyGraph;
pub(crate) use node::{Cleanup, Node};
pub(crate) use scheduler::Scheduler;
