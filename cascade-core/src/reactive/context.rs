//! Tracking Context
//!
//! The tracking context records which computation is currently running and
//! which nodes it has read so far. This enables automatic dependency
//! tracking: when a signal is read, it is added to the reads of the
//! innermost running computation.
//!
//! # Implementation
//!
//! Each runtime owns a stack of frames. When a memo or effect starts running
//! we push a frame; when it finishes, the frame is popped and its reads
//! become the computation's new dependency set.
//!
//! This design supports nested computations (e.g., a memo that is refreshed
//! while an effect reads it, or a render effect triggered from inside
//! another effect).

use std::cell::{Cell, RefCell};

use indexmap::IndexSet;

use crate::graph::{NodeId, NodeKind};

/// A running computation and the nodes it has read so far.
#[derive(Debug)]
struct Frame {
    node: NodeId,
    kind: NodeKind,
    /// Reads in first-read order, deduplicated.
    reads: IndexSet<NodeId>,
    /// Set while inside `untrack`.
    untracked: bool,
}

/// Per-runtime stack of running computations.
#[derive(Debug, Default)]
pub(crate) struct Tracker {
    frames: RefCell<Vec<Frame>>,
}

impl Tracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start tracking reads for `node`.
    ///
    /// The returned guard pops the frame when dropped, so the stack stays
    /// balanced even if the computation panics.
    pub(crate) fn enter(&self, node: NodeId, kind: NodeKind) -> FrameGuard<'_> {
        self.frames.borrow_mut().push(Frame {
            node,
            kind,
            reads: IndexSet::new(),
            untracked: false,
        });

        FrameGuard {
            tracker: self,
            node,
            finished: false,
        }
    }

    fn pop(&self, node: NodeId) -> IndexSet<NodeId> {
        let popped = self.frames.borrow_mut().pop();
        match popped {
            Some(frame) => {
                // Frames are strictly nested; a mismatch is a runtime bug.
                debug_assert_eq!(
                    frame.node, node,
                    "tracking frame mismatch: expected {node}, got {}",
                    frame.node
                );
                frame.reads
            }
            None => IndexSet::new(),
        }
    }

    /// Record a read of `source` in the innermost frame.
    pub(crate) fn track(&self, source: NodeId) {
        let mut frames = self.frames.borrow_mut();
        if let Some(frame) = frames.last_mut() {
            if !frame.untracked && frame.node != source {
                frame.reads.insert(source);
            }
        }
    }

    /// Run `f` with tracking disabled for the innermost frame.
    pub(crate) fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = self.set_untracked(true);
        let _restore = UntrackGuard {
            tracker: self,
            previous,
        };
        f()
    }

    fn set_untracked(&self, untracked: bool) -> Option<bool> {
        self.frames
            .borrow_mut()
            .last_mut()
            .map(|frame| std::mem::replace(&mut frame.untracked, untracked))
    }

    /// True while any computation is running and reads are being recorded.
    pub(crate) fn is_tracking(&self) -> bool {
        self.frames
            .borrow()
            .last()
            .is_some_and(|frame| !frame.untracked)
    }

    pub(crate) fn is_running(&self, node: NodeId) -> bool {
        self.frames.borrow().iter().any(|frame| frame.node == node)
    }

    /// The innermost running computation.
    pub(crate) fn current(&self) -> Option<(NodeId, NodeKind)> {
        self.frames
            .borrow()
            .last()
            .map(|frame| (frame.node, frame.kind))
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// The outermost running computation that has already read one of
    /// `nodes` during its current run.
    pub(crate) fn reader_of(&self, nodes: &[NodeId]) -> Option<NodeId> {
        self.frames
            .borrow()
            .iter()
            .find(|frame| nodes.iter().any(|node| frame.reads.contains(node)))
            .map(|frame| frame.node)
    }
}

/// Pops a tracking frame on drop.
pub(crate) struct FrameGuard<'a> {
    tracker: &'a Tracker,
    node: NodeId,
    finished: bool,
}

impl FrameGuard<'_> {
    /// Pop the frame and return the reads it collected.
    pub(crate) fn finish(mut self) -> IndexSet<NodeId> {
        self.finished = true;
        self.tracker.pop(self.node)
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.tracker.pop(self.node);
        }
    }
}

struct UntrackGuard<'a> {
    tracker: &'a Tracker,
    previous: Option<bool>,
}

impl Drop for UntrackGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous {
            self.tracker.set_untracked(previous);
        }
    }
}
