//! Update Scheduler
//!
//! The scheduler holds the effects waiting to run, one queue per lane, and
//! the batch/flush state that decides when those queues are drained.
//!
//! # Ordering
//!
//! Both queues are ordered sets keyed by [`NodeId`], so:
//!
//! - effects run in creation order within a lane, and
//! - an effect queued twice before it runs is only run once (coalescing).

use std::collections::BTreeSet;

use super::node::{Lane, NodeId};

#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    render: BTreeSet<NodeId>,
    deferred: BTreeSet<NodeId>,
    batch_depth: u32,
    flushing: bool,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue an effect. Returns false if it was already queued.
    pub(crate) fn enqueue(&mut self, id: NodeId, lane: Lane) -> bool {
        match lane {
            Lane::Render => self.render.insert(id),
            Lane::Deferred => self.deferred.insert(id),
        }
    }

    /// Next render effect in creation order.
    pub(crate) fn pop_render(&mut self) -> Option<NodeId> {
        self.render.pop_first()
    }

    /// Take every deferred effect queued so far.
    pub(crate) fn take_deferred(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.deferred).into_iter().collect()
    }

    #[cfg(test)]
    pub(crate) fn has_render(&self) -> bool {
        !self.render.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn is_idle(&self) -> bool {
        self.render.is_empty() && self.deferred.is_empty()
    }

    /// Forget a disposed node.
    pub(crate) fn remove(&mut self, id: NodeId) {
        self.render.remove(&id);
        self.deferred.remove(&id);
    }

    /// Drop everything queued, returning what was dropped.
    pub(crate) fn clear(&mut self) -> Vec<NodeId> {
        let mut dropped: Vec<NodeId> = std::mem::take(&mut self.render).into_iter().collect();
        dropped.extend(std::mem::take(&mut self.deferred));
        dropped
    }

    pub(crate) fn enter_batch(&mut self) -> u32 {
        self.batch_depth += 1;
        self.batch_depth
    }

    pub(crate) fn exit_batch(&mut self) -> u32 {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        self.batch_depth
    }

    pub(crate) fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    pub(crate) fn is_flushing(&self) -> bool {
        self.flushing
    }

    /// Set the flushing flag, returning the previous value.
    pub(crate) fn set_flushing(&mut self, flushing: bool) -> bool {
        std::mem::replace(&mut self.flushing, flushing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_queue_pops_in_creation_order() {
        let mut scheduler = Scheduler::new();
        let first = NodeId::next();
        let second = NodeId::next();
        let third = NodeId::next();

        scheduler.enqueue(third, Lane::Render);
        scheduler.enqueue(first, Lane::Render);
        scheduler.enqueue(second, Lane::Render);

        assert_eq!(scheduler.pop_render(), Some(first));
        assert_eq!(scheduler.pop_render(), Some(second));
        assert_eq!(scheduler.pop_render(), Some(third));
        assert_eq!(scheduler.pop_render(), None);
    }

    #[test]
    fn deferred_queue_coalesces() {
        let mut scheduler = Scheduler::new();
        let effect = NodeId::next();

        assert!(scheduler.enqueue(effect, Lane::Deferred));
        assert!(!scheduler.enqueue(effect, Lane::Deferred));
        assert!(!scheduler.enqueue(effect, Lane::Deferred));

        assert_eq!(scheduler.take_deferred(), vec![effect]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn remove_forgets_both_lanes() {
        let mut scheduler = Scheduler::new();
        let a = NodeId::next();
        let b = NodeId::next();
        scheduler.enqueue(a, Lane::Render);
        scheduler.enqueue(b, Lane::Deferred);

        scheduler.remove(a);
        scheduler.remove(b);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn clear_returns_dropped_effects() {
        let mut scheduler = Scheduler::new();
        let a = NodeId::next();
        let b = NodeId::next();
        scheduler.enqueue(a, Lane::Render);
        scheduler.enqueue(b, Lane::Deferred);

        assert_eq!(scheduler.clear(), vec![a, b]);
        assert!(!scheduler.has_render());
    }

    #[test]
    fn nested_batches_track_depth() {
        let mut scheduler = Scheduler::new();
        assert!(!scheduler.is_batching());

        assert_eq!(scheduler.enter_batch(), 1);
        assert_eq!(scheduler.enter_batch(), 2);
        assert_eq!(scheduler.exit_batch(), 1);
        assert!(scheduler.is_batching());
        assert_eq!(scheduler.exit_batch(), 0);
        assert_eq!(scheduler.exit_batch(), 0);
        assert!(!scheduler.is_batching());
    }
}
