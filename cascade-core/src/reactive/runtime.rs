//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the dependency graph, the scheduler and the tracking
//! context, and drives propagation when signals change.
//!
//! # How It Works
//!
//! 1. When a signal, memo, effect or scope is created, it registers a node
//!    with the runtime. The node is owned by whatever is currently running
//!    (or the active scope).
//!
//! 2. When a memo or effect reads a signal, the tracker records the read in
//!    the frame of the running computation.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Marks direct dependents dirty and memo-reachable nodes maybe-dirty
//!    b. Queues the effects that just became dirty on their lane
//!    c. Runs render effects right away, then flushes deferred effects once
//!       the outermost batch is over
//!    d. Memos are lazy: they recompute on next access
//!
//! # Threading
//!
//! A runtime is single-threaded (`!Send`). Handles hold a [`WeakRuntime`],
//! so dropping the last [`Runtime`] tears the graph down even while handles
//! are still around.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::config::{ConfigError, RuntimeConfig};
use crate::error::{panic_message, ReactiveError, Result, RunError};
use crate::graph::{
    Cleanup, DependencyGraph, DirtyState, GraphSnapshot, Lane, Node, NodeId, NodeKind, Scheduler,
};

use super::context::Tracker;

/// Errors kept for [`Runtime::take_errors`]; older entries are dropped first.
const MAX_RECORDED_ERRORS: usize = 256;

/// The body of a memo or effect, as stored in the graph.
pub(crate) trait Computation {
    /// Run once with tracking active. Returns true if the observable value
    /// changed.
    fn run(&self, rt: &Runtime) -> bool;

    /// Called when a run fails.
    fn fail(&self, _error: &ReactiveError) {}
}

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    graph: RefCell<DependencyGraph>,
    scheduler: RefCell<Scheduler>,
    tracker: Tracker,
    owner: Cell<Option<NodeId>>,
    root: NodeId,
    epoch: Cell<u64>,
    errors: RefCell<Vec<ReactiveError>>,
}

/// Handle to a reactive runtime.
///
/// Cloning is cheap and every clone refers to the same graph.
///
/// # Example
///
/// ```rust
/// use cascade_core::reactive::{Effect, Runtime, Signal};
///
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 0);
///
/// let seen = count.clone();
/// let effect = Effect::new(&rt, move |_| {
///     let _ = seen.get();
/// });
///
/// count.set(5).unwrap();
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Non-owning reference to a [`Runtime`], held by every handle.
#[derive(Clone, Default)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }

    /// Upgrade or fail with [`ReactiveError::RuntimeDropped`].
    pub(crate) fn runtime(&self) -> Result<Runtime> {
        self.upgrade().ok_or(ReactiveError::RuntimeDropped)
    }
}

impl fmt::Debug for WeakRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRuntime")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::build(RuntimeConfig::default())
    }

    /// Create a runtime with a validated configuration.
    pub fn with_config(config: RuntimeConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RuntimeConfig) -> Self {
        let mut graph = DependencyGraph::new();
        let root = graph.insert(Node::new(NodeKind::Scope, None));
        tracing::debug!(root = %root, ?config, "runtime created");

        Self {
            inner: Rc::new(RuntimeInner {
                config,
                graph: RefCell::new(graph),
                scheduler: RefCell::new(Scheduler::new()),
                tracker: Tracker::new(),
                owner: Cell::new(Some(root)),
                root,
                epoch: Cell::new(1),
                errors: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// True if both handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Batching and tracking
    // ------------------------------------------------------------------

    /// Run `f` with the deferred lane held back until the outermost batch
    /// ends. Render effects still run as soon as they are triggered.
    ///
    /// Returns `f`'s result, or the error of the flush that ended the batch.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        self.inner.scheduler.borrow_mut().enter_batch();
        let guard = BatchGuard { inner: &self.inner };
        let result = f();
        drop(guard);

        let settle = {
            let scheduler = self.inner.scheduler.borrow();
            !scheduler.is_batching() && !scheduler.is_flushing()
        };
        if settle {
            self.flush()?;
        }
        Ok(result)
    }

    /// Run `f` without recording reads in the running computation.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.tracker.untracked(f)
    }

    pub fn is_batching(&self) -> bool {
        self.inner.scheduler.borrow().is_batching()
    }

    /// True while a computation is running and reads are being recorded.
    pub fn is_tracking(&self) -> bool {
        self.inner.tracker.is_tracking()
    }

    /// Run queued effects until the graph settles.
    ///
    /// Each pass drains the render lane and then runs every deferred effect
    /// queued so far. Effects re-triggered during a pass run in the next one.
    /// A no-op if a flush is already in progress further up the stack.
    pub fn flush(&self) -> Result<()> {
        if self.inner.scheduler.borrow().is_flushing() {
            return Ok(());
        }
        let _flushing = FlushGuard::enter(&self.inner);
        let span = tracing::debug_span!("flush");
        let _entered = span.enter();

        let limit = self.inner.config.max_flush_iterations;
        let mut passes = 0u32;

        loop {
            self.run_render_lane();

            let batch = self.inner.scheduler.borrow_mut().take_deferred();
            if batch.is_empty() {
                break;
            }

            passes += 1;
            if passes > limit {
                let mut abandoned = batch;
                abandoned.extend(self.inner.scheduler.borrow_mut().clear());
                self.inner.abandon(&abandoned);

                let err = ReactiveError::MaxFlushIterations { limit };
                tracing::warn!(limit, abandoned = abandoned.len(), "flush aborted");
                self.inner.record(err.clone());
                return Err(err);
            }

            tracing::trace!(pass = passes, effects = batch.len(), "deferred pass");
            for id in batch {
                self.update_effect(id);
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Ownership
    // ------------------------------------------------------------------

    /// The node that will own nodes created right now.
    pub fn owner(&self) -> Option<NodeId> {
        self.inner.owner.get()
    }

    /// Register a cleanup on the current owner.
    ///
    /// Inside a computation, it runs before the next run and on disposal.
    /// Inside [`Scope::run`](super::Scope::run), it runs when the scope is
    /// disposed. With no live owner the cleanup is dropped without running.
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) {
        let owner = self.inner.owner.get();
        if !self.inner.add_cleanup(owner, Box::new(cleanup)) {
            tracing::warn!("cleanup registered without a live owner will never run");
        }
    }

    /// Attach a value to the current owner, visible to everything it owns.
    pub fn provide_context<T: 'static>(&self, value: T) {
        let owner = self.inner.owner.get();
        let mut graph = self.inner.graph.borrow_mut();
        match owner.and_then(|owner| graph.get_mut(owner)) {
            Some(node) => {
                node.contexts.insert(TypeId::of::<T>(), Rc::new(value));
            }
            None => tracing::warn!("context provided without a live owner"),
        }
    }

    /// Look up the nearest value of type `T` along the owner chain.
    pub fn use_context<T: Clone + 'static>(&self) -> Option<T> {
        let graph = self.inner.graph.borrow();
        let mut current = self.inner.owner.get();

        while let Some(id) = current {
            let node = graph.get(id)?;
            if let Some(value) = node.contexts.get(&TypeId::of::<T>()) {
                return (**value).downcast_ref::<T>().cloned();
            }
            current = node.owner;
        }
        None
    }

    /// Dispose every node, running all outstanding cleanups once.
    pub fn dispose(&self) {
        self.inner.teardown();
    }

    // ------------------------------------------------------------------
    // Errors and inspection
    // ------------------------------------------------------------------

    /// Drain the failures recorded since the last call.
    pub fn take_errors(&self) -> Vec<ReactiveError> {
        std::mem::take(&mut *self.inner.errors.borrow_mut())
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.inner.graph.borrow().snapshot()
    }

    /// Nodes `id` read during its most recent run.
    pub fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        self.inner
            .graph
            .borrow()
            .get(id)
            .map(|node| node.dependencies.to_vec())
            .unwrap_or_default()
    }

    /// Nodes that read `id` during their most recent run.
    pub fn dependents(&self, id: NodeId) -> Vec<NodeId> {
        self.inner
            .graph
            .borrow()
            .get(id)
            .map(|node| node.dependents.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn state_of(&self, id: NodeId) -> Option<DirtyState> {
        self.inner.graph.borrow().get(id).map(|node| node.state)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.graph.borrow().contains(id)
    }

    /// Number of live nodes, including the root scope.
    pub fn node_count(&self) -> usize {
        self.inner.graph.borrow().len()
    }

    // ------------------------------------------------------------------
    // Crate-internal plumbing used by the handles
    // ------------------------------------------------------------------

    /// Insert a node owned by the current owner.
    pub(crate) fn create_node(
        &self,
        kind: NodeKind,
        computation: Option<Rc<dyn Computation>>,
    ) -> NodeId {
        let mut graph = self.inner.graph.borrow_mut();
        let owner = self.inner.owner.get().filter(|owner| graph.contains(*owner));
        let mut node = Node::new(kind, owner);
        if let Some(computation) = computation {
            node = node.with_computation(computation);
        }
        graph.insert(node)
    }

    /// Make `owner` the owner of nodes created until the guard drops.
    pub(crate) fn enter_owner(&self, owner: Option<NodeId>) -> OwnerGuard<'_> {
        let previous = self.inner.owner.replace(owner);
        OwnerGuard {
            inner: &self.inner,
            previous,
        }
    }

    pub(crate) fn add_cleanup(&self, owner: NodeId, cleanup: Cleanup) -> Result<()> {
        if self.inner.add_cleanup(Some(owner), cleanup) {
            Ok(())
        } else {
            Err(ReactiveError::Disposed(owner))
        }
    }

    /// Record a read of `id` in the running computation.
    pub(crate) fn track(&self, id: NodeId) {
        self.inner.tracker.track(id);
    }

    pub(crate) fn ensure_live(&self, id: NodeId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(ReactiveError::Disposed(id))
        }
    }

    /// Check that `cell` may be written right now.
    pub(crate) fn prepare_write(&self, cell: NodeId) -> Result<()> {
        self.ensure_live(cell)?;

        if let Some((memo, NodeKind::Memo)) = self.inner.tracker.current() {
            return Err(self.reject(ReactiveError::WriteInsideMemo { memo, cell }));
        }

        if self.inner.tracker.depth() > 0 {
            let affected = self.inner.graph.borrow().affected_by(cell);
            if let Some(computation) = self.inner.tracker.reader_of(&affected) {
                return Err(self.reject(ReactiveError::Cycle { cell, computation }));
            }
        }

        Ok(())
    }

    /// Propagate a change of `cell` whose new value is already stored.
    pub(crate) fn commit_write(&self, cell: NodeId) -> Result<()> {
        let epoch = self.inner.bump_epoch();
        let newly_dirty = self.inner.graph.borrow_mut().mark_changed(cell, epoch);
        {
            let mut scheduler = self.inner.scheduler.borrow_mut();
            for (effect, lane) in newly_dirty {
                scheduler.enqueue(effect, lane);
            }
        }
        self.propagate()
    }

    fn propagate(&self) -> Result<()> {
        let hold = {
            let scheduler = self.inner.scheduler.borrow();
            scheduler.is_batching() || scheduler.is_flushing()
        };
        if hold {
            self.run_render_lane();
            Ok(())
        } else {
            self.flush()
        }
    }

    /// Schedule the first run of a freshly created effect.
    pub(crate) fn start_effect(&self, id: NodeId, lane: Lane) {
        let hold = {
            let scheduler = self.inner.scheduler.borrow();
            scheduler.is_batching() || scheduler.is_flushing()
        };

        match (lane, hold) {
            (Lane::Deferred, true) => {
                self.inner.scheduler.borrow_mut().enqueue(id, lane);
            }
            (Lane::Render, true) => self.update_effect(id),
            (_, false) => {
                if let Err(err) = self.batch(|| self.update_effect(id)) {
                    tracing::debug!(node = %id, error = %err, "initial run left the graph unsettled");
                }
            }
        }
    }

    /// Bring a memo up to date, running it if one of its inputs changed.
    pub(crate) fn refresh(&self, id: NodeId) -> std::result::Result<(), RunError> {
        let state = match self.inner.graph.borrow().get(id) {
            Some(node) => node.state,
            None => return Ok(()),
        };

        match state {
            DirtyState::Clean => Ok(()),
            DirtyState::MaybeDirty if !self.dependencies_changed(id) => {
                self.inner.mark_verified(id);
                Ok(())
            }
            _ => self.run_node(id).map(|_| ()),
        }
    }

    /// Dispose a node and everything it owns.
    pub(crate) fn dispose_node(&self, id: NodeId) {
        if let Err(err) = self.batch(|| self.inner.dispose_node(id)) {
            tracing::debug!(node = %id, error = %err, "disposal left the graph unsettled");
        }
    }

    // ------------------------------------------------------------------
    // Running computations
    // ------------------------------------------------------------------

    fn run_render_lane(&self) {
        loop {
            let next = self.inner.scheduler.borrow_mut().pop_render();
            let Some(id) = next else {
                break;
            };
            self.update_effect(id);
        }
    }

    fn update_effect(&self, id: NodeId) {
        let state = match self.inner.graph.borrow().get(id) {
            Some(node) => node.state,
            None => return,
        };

        let needs_run = match state {
            DirtyState::Clean => false,
            DirtyState::Dirty => true,
            DirtyState::MaybeDirty => self.dependencies_changed(id),
        };

        if !needs_run {
            self.inner.mark_verified(id);
            return;
        }

        if let Err(err) = self.run_node(id) {
            // Settle the effect so that later changes can queue it again.
            self.inner.mark_verified(id);
            self.report_failure(id, err);
        }
    }

    /// Pull memo dependencies up to date and check whether any of them
    /// changed since `id` last ran.
    fn dependencies_changed(&self, id: NodeId) -> bool {
        let (dependencies, verified_at) = match self.inner.graph.borrow().get(id) {
            Some(node) => (node.dependencies.clone(), node.verified_at),
            None => return false,
        };

        for dependency in dependencies {
            let is_memo = self
                .inner
                .graph
                .borrow()
                .get(dependency)
                .is_some_and(|node| node.kind == NodeKind::Memo);

            if is_memo {
                if let Err(err) = self.refresh(dependency) {
                    self.report_failure(dependency, err);
                    return true;
                }
            }

            let changed_at = self
                .inner
                .graph
                .borrow()
                .get(dependency)
                .map_or(0, |node| node.changed_at);
            if changed_at > verified_at {
                return true;
            }
        }

        false
    }

    /// Run a computation with tracking active and install the reads it made.
    ///
    /// The previous run's owned nodes and cleanups are disposed first. A panic
    /// is caught so that the tracking frame, the owner and the dependency set
    /// are restored before it is reported.
    fn run_node(&self, id: NodeId) -> std::result::Result<bool, RunError> {
        if self.inner.tracker.is_running(id) {
            return Err(ReactiveError::Cycle {
                cell: id,
                computation: id,
            }
            .into());
        }

        let limit = self.inner.config.max_run_depth;
        if self.inner.tracker.depth() >= limit {
            return Err(ReactiveError::RunDepthExceeded { node: id, limit }.into());
        }

        let (kind, computation) = {
            let graph = self.inner.graph.borrow();
            match graph.get(id) {
                Some(Node {
                    kind,
                    computation: Some(computation),
                    ..
                }) => (*kind, Rc::clone(computation)),
                _ => return Ok(false),
            }
        };

        self.inner.reset_owned(id);
        let previous = {
            let mut graph = self.inner.graph.borrow_mut();
            let previous = graph
                .get(id)
                .map(|node| node.dependencies.clone())
                .unwrap_or_default();
            graph.unsubscribe_all(id);
            previous
        };

        tracing::trace!(node = %id, lane = ?kind.lane(), "running computation");
        let (outcome, reads) = {
            let _owner = self.enter_owner(Some(id));
            let frame = self.inner.tracker.enter(id, kind);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| computation.run(self)));
            (outcome, frame.finish())
        };

        // A failed run also keeps its previous dependencies.
        let mut reads = reads;
        if outcome.is_err() {
            reads.extend(previous);
        }

        let mut graph = self.inner.graph.borrow_mut();
        graph.subscribe(id, reads);

        let Some(node) = graph.get_mut(id) else {
            // Disposed by its own body.
            return outcome.map_err(|payload| RunError::Panicked { node: id, payload });
        };

        match outcome {
            Ok(changed) => {
                if changed {
                    node.changed_at = self.inner.bump_epoch();
                }
                node.state = DirtyState::Clean;
                node.verified_at = self.inner.epoch.get();
                Ok(changed)
            }
            Err(payload) => {
                // A failed memo has no valid value; retry on the next read.
                node.state = if kind == NodeKind::Memo {
                    DirtyState::Dirty
                } else {
                    DirtyState::Clean
                };
                node.verified_at = self.inner.epoch.get();
                Err(RunError::Panicked { node: id, payload })
            }
        }
    }

    fn report_failure(&self, id: NodeId, err: RunError) {
        let err = err.into_reactive();
        match &err {
            ReactiveError::ComputationPanicked { .. } => {
                tracing::error!(node = %id, error = %err, "computation failed");
            }
            _ => tracing::warn!(node = %id, error = %err, "computation aborted"),
        }

        let computation = self
            .inner
            .graph
            .borrow()
            .get(id)
            .and_then(|node| node.computation.clone());
        if let Some(computation) = computation {
            computation.fail(&err);
        }
        self.inner.record(err);
    }

    fn reject(&self, err: ReactiveError) -> ReactiveError {
        tracing::warn!(error = %err, "write rejected");
        self.inner.record(err.clone());
        err
    }

    /// Record a failure that has no caller to return it to.
    pub(crate) fn record_error(&self, err: ReactiveError) {
        self.inner.record(err);
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("nodes", &self.node_count())
            .field("epoch", &self.inner.epoch.get())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl RuntimeInner {
    fn bump_epoch(&self) -> u64 {
        let next = self.epoch.get() + 1;
        self.epoch.set(next);
        next
    }

    fn mark_verified(&self, id: NodeId) {
        if let Some(node) = self.graph.borrow_mut().get_mut(id) {
            node.state = DirtyState::Clean;
            node.verified_at = self.epoch.get();
        }
    }

    fn record(&self, err: ReactiveError) {
        let mut errors = self.errors.borrow_mut();
        if errors.len() >= MAX_RECORDED_ERRORS {
            errors.remove(0);
        }
        errors.push(err);
    }

    fn add_cleanup(&self, owner: Option<NodeId>, cleanup: Cleanup) -> bool {
        let mut graph = self.graph.borrow_mut();
        match owner.and_then(|owner| graph.get_mut(owner)) {
            Some(node) => {
                node.cleanups.push(cleanup);
                true
            }
            None => false,
        }
    }

    /// Effects dropped by an aborted flush are considered settled.
    fn abandon(&self, ids: &[NodeId]) {
        let mut graph = self.graph.borrow_mut();
        for id in ids {
            if let Some(node) = graph.get_mut(*id) {
                node.state = DirtyState::Clean;
            }
        }
    }

    /// Take a node's owned nodes, cleanups and contexts without holding the
    /// graph borrow while they are dropped or run.
    fn take_owned(&self, id: NodeId) -> Option<(Vec<NodeId>, Vec<Cleanup>, Vec<Rc<dyn Any>>)> {
        let mut graph = self.graph.borrow_mut();
        let node = graph.get_mut(id)?;
        let owned = std::mem::take(&mut node.owned);
        let cleanups = std::mem::take(&mut node.cleanups);
        let contexts = node.contexts.drain().map(|(_, value)| value).collect();
        Some((owned, cleanups, contexts))
    }

    /// Prepare a computation for its next run.
    fn reset_owned(&self, id: NodeId) {
        let Some((owned, cleanups, contexts)) = self.take_owned(id) else {
            return;
        };
        for child in owned.into_iter().rev() {
            self.dispose_node(child);
        }
        self.run_cleanups(id, cleanups);
        drop(contexts);
    }

    fn dispose_node(&self, id: NodeId) {
        let Some((owned, cleanups, contexts)) = self.take_owned(id) else {
            return;
        };
        for child in owned.into_iter().rev() {
            self.dispose_node(child);
        }
        self.run_cleanups(id, cleanups);
        drop(contexts);

        let detached = self.graph.borrow_mut().detach(id);
        self.scheduler.borrow_mut().remove(id);
        if let Some(node) = &detached {
            tracing::trace!(node = %id, kind = ?node.kind, "disposed");
        }
        drop(detached);
    }

    fn run_cleanups(&self, id: NodeId, cleanups: Vec<Cleanup>) {
        for cleanup in cleanups.into_iter().rev() {
            let result = self
                .tracker
                .untracked(|| panic::catch_unwind(AssertUnwindSafe(cleanup)));

            if let Err(payload) = result {
                let err = ReactiveError::CleanupPanicked {
                    node: id,
                    message: panic_message(payload.as_ref()),
                };
                tracing::error!(node = %id, error = %err, "cleanup panicked");
                self.record(err);
            }
        }
    }

    fn teardown(&self) {
        let span = tracing::debug_span!("teardown", nodes = self.graph.borrow().len());
        let _entered = span.enter();

        self.dispose_node(self.root);
        let remaining = self.graph.borrow().ids();
        for id in remaining.into_iter().rev() {
            self.dispose_node(id);
        }
        self.scheduler.borrow_mut().clear();
    }
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

struct BatchGuard<'a> {
    inner: &'a RuntimeInner,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.inner.scheduler.borrow_mut().exit_batch();
    }
}

struct FlushGuard<'a> {
    inner: &'a RuntimeInner,
    previous: bool,
}

impl<'a> FlushGuard<'a> {
    fn enter(inner: &'a RuntimeInner) -> Self {
        let previous = inner.scheduler.borrow_mut().set_flushing(true);
        Self { inner, previous }
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.inner.scheduler.borrow_mut().set_flushing(self.previous);
    }
}

/// Restores the previous owner on drop.
pub(crate) struct OwnerGuard<'a> {
    inner: &'a RuntimeInner,
    previous: Option<NodeId>,
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        self.inner.owner.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Memo, Scope, Signal};

    #[test]
    fn runtime_starts_with_root_scope() {
        let rt = Runtime::new();
        assert_eq!(rt.node_count(), 1);
        assert!(rt.owner().is_some());
        assert!(!rt.is_batching());
        assert!(!rt.is_tracking());
    }

    #[test]
    fn runtime_rejects_invalid_config() {
        let config = RuntimeConfig {
            max_flush_iterations: 0,
            ..RuntimeConfig::default()
        };
        assert!(Runtime::with_config(config).is_err());
    }

    #[test]
    fn batch_defers_effects_until_the_end() {
        let rt = Runtime::new();
        let a = Signal::new(&rt, 1);
        let b = Signal::new(&rt, 2);

        let (ra, rb) = (a.clone(), b.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let _effect = Effect::new(&rt, move |_| {
            log.borrow_mut().push(ra.get() + rb.get());
        });

        rt.batch(|| {
            a.set(10).unwrap();
            b.set(20).unwrap();
            assert_eq!(seen.borrow().len(), 1);
        })
        .unwrap();

        assert_eq!(*seen.borrow(), vec![3, 30]);
    }

    #[test]
    fn batch_returns_the_closure_result() {
        let rt = Runtime::new();
        assert_eq!(rt.batch(|| 42).unwrap(), 42);
        assert!(!rt.is_batching());
    }

    #[test]
    fn untrack_does_not_subscribe() {
        let rt = Runtime::new();
        let tracked = Signal::new(&rt, 0);
        let ignored = Signal::new(&rt, 0);

        let (t, i) = (tracked.clone(), ignored.clone());
        let effect = Effect::new(&rt, move |rt| {
            let _ = t.get();
            let _ = rt.untrack(|| i.get());
        });

        assert_eq!(rt.dependencies(effect.id()), vec![tracked.id()]);

        ignored.set(1).unwrap();
        assert_eq!(effect.run_count(), 1);

        tracked.set(1).unwrap();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn cleanups_run_in_reverse_before_rerun() {
        let rt = Runtime::new();
        let trigger = Signal::new(&rt, 0);
        let order = Rc::new(RefCell::new(Vec::new()));

        let (t, log) = (trigger.clone(), order.clone());
        let _effect = Effect::new(&rt, move |rt| {
            let _ = t.get();
            let first = log.clone();
            let second = log.clone();
            rt.on_cleanup(move || first.borrow_mut().push("first"));
            rt.on_cleanup(move || second.borrow_mut().push("second"));
        });

        assert!(order.borrow().is_empty());
        trigger.set(1).unwrap();
        assert_eq!(*order.borrow(), vec!["second", "first"]);
    }

    #[test]
    fn panicking_cleanup_does_not_stop_the_others() {
        let rt = Runtime::new();
        let ran = Rc::new(Cell::new(false));
        let scope = Scope::new(&rt);

        let flag = ran.clone();
        scope.run(|rt| {
            rt.on_cleanup(move || flag.set(true));
            rt.on_cleanup(|| panic!("cleanup failure"));
        })
        .unwrap();
        scope.dispose();

        assert!(ran.get());
        let errors = rt.take_errors();
        assert!(matches!(
            errors.as_slice(),
            [ReactiveError::CleanupPanicked { message, .. }] if message == "cleanup failure"
        ));
    }

    #[test]
    fn context_is_visible_to_owned_nodes() {
        let rt = Runtime::new();
        let scope = Scope::new(&rt);
        let found = Rc::new(RefCell::new(None));

        let slot = found.clone();
        scope.run(|rt| {
            rt.provide_context(String::from("theme:dark"));
            let _effect = Effect::new_render(rt, move |rt| {
                *slot.borrow_mut() = rt.use_context::<String>();
            });
        })
        .unwrap();

        assert_eq!(found.borrow().as_deref(), Some("theme:dark"));
        assert_eq!(rt.use_context::<String>(), None);
    }

    #[test]
    fn rerun_disposes_nodes_created_by_the_previous_run() {
        let rt = Runtime::new();
        let trigger = Signal::new(&rt, 0);

        let t = trigger.clone();
        let _effect = Effect::new(&rt, move |rt| {
            let _ = t.get();
            let _inner = Signal::new(rt, "scratch");
        });

        let before = rt.node_count();
        trigger.set(1).unwrap();
        trigger.set(2).unwrap();
        assert_eq!(rt.node_count(), before);
    }

    #[test]
    fn dispose_runs_outstanding_cleanups_once() {
        let rt = Runtime::new();
        let count = Rc::new(Cell::new(0));

        let c = count.clone();
        let _effect = Effect::new(&rt, move |rt| {
            let c = c.clone();
            rt.on_cleanup(move || c.set(c.get() + 1));
        });

        rt.dispose();
        rt.dispose();
        assert_eq!(count.get(), 1);
        assert_eq!(rt.node_count(), 0);
    }

    #[test]
    fn dropping_the_runtime_runs_cleanups() {
        let count = Rc::new(Cell::new(0));
        {
            let rt = Runtime::new();
            let c = count.clone();
            let scope = Scope::new(&rt);
            scope.on_cleanup(move || c.set(c.get() + 1)).unwrap();
        }
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn snapshot_lists_edges() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 2);
        let s = source.clone();
        let doubled = Memo::new(&rt, move || s.get() * 2);
        assert_eq!(doubled.get(), 4);

        let snapshot = rt.snapshot();
        let memo = snapshot.node(doubled.id()).unwrap();
        assert_eq!(memo.kind, NodeKind::Memo);
        assert_eq!(memo.dependencies, vec![source.id()]);
        assert_eq!(rt.dependents(source.id()), vec![doubled.id()]);
        assert_eq!(rt.state_of(doubled.id()), Some(DirtyState::Clean));
    }

    #[test]
    fn flush_is_idempotent_when_idle() {
        let rt = Runtime::new();
        rt.flush().unwrap();
        rt.flush().unwrap();
        assert!(rt.take_errors().is_empty());
    }
}
