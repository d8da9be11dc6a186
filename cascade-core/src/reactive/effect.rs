//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function to establish initial
//!    dependencies (or, inside a batch, is queued to do so).
//!
//! 2. When any dependency changes, the effect is scheduled on its lane.
//!
//! 3. Before re-running, the effect disposes what its previous run created,
//!    runs its cleanups and clears its old dependencies; it tracks new ones
//!    during execution.
//!
//! # Lanes
//!
//! - Render effects ([`Effect::new_render`]) run synchronously, before the
//!   write that triggered them returns.
//! - Deferred effects ([`Effect::new`]) run once after the current batch of
//!   writes completes, however many of their dependencies changed.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.
//!
//! # Cleanup
//!
//! Effects register cleanups with [`Runtime::on_cleanup`]. They run before
//! the effect re-runs and when the effect is disposed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::ReactiveError;
use crate::graph::{Lane, NodeId, NodeKind};

use super::runtime::{Computation, Runtime, WeakRuntime};

type EffectFn = Box<dyn FnMut(&Runtime)>;

struct EffectInner {
    body: RefCell<EffectFn>,
    runs: Cell<usize>,
    last_error: RefCell<Option<ReactiveError>>,
}

impl Computation for EffectInner {
    fn run(&self, rt: &Runtime) -> bool {
        self.runs.set(self.runs.get() + 1);
        self.last_error.borrow_mut().take();
        (self.body.borrow_mut())(rt);
        false
    }

    fn fail(&self, error: &ReactiveError) {
        *self.last_error.borrow_mut() = Some(error.clone());
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// Dropping the handle does not stop the effect; it lives until its owner
/// is disposed or [`dispose`](Effect::dispose) is called.
///
/// # Example
///
/// ```rust
/// use cascade_core::reactive::{Effect, Runtime, Signal};
///
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 0);
///
/// let c = count.clone();
/// Effect::new(&rt, move |_| {
///     println!("Count is: {}", c.get());
/// });
///
/// count.set(5).unwrap(); // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Effect {
    id: NodeId,
    lane: Lane,
    runtime: WeakRuntime,
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a deferred-lane effect.
    pub fn new(rt: &Runtime, body: impl FnMut(&Runtime) + 'static) -> Self {
        Self::create(rt, Lane::Deferred, Box::new(body))
    }

    /// Create a render-lane effect.
    pub fn new_render(rt: &Runtime, body: impl FnMut(&Runtime) + 'static) -> Self {
        Self::create(rt, Lane::Render, Box::new(body))
    }

    fn create(rt: &Runtime, lane: Lane, body: EffectFn) -> Self {
        let inner = Rc::new(EffectInner {
            body: RefCell::new(body),
            runs: Cell::new(0),
            last_error: RefCell::new(None),
        });
        let computation: Rc<dyn Computation> = inner.clone();
        let id = rt.create_node(NodeKind::Effect(lane), Some(computation));
        tracing::trace!(node = %id, ?lane, "effect created");

        rt.start_effect(id, lane);

        Self {
            id,
            lane,
            runtime: rt.downgrade(),
            inner,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// Number of times the body has started running.
    pub fn run_count(&self) -> usize {
        self.inner.runs.get()
    }

    /// Number of nodes read during the latest run.
    pub fn dependency_count(&self) -> usize {
        self.runtime
            .upgrade()
            .map_or(0, |rt| rt.dependencies(self.id).len())
    }

    /// Failure of the latest run, if it failed.
    pub fn last_error(&self) -> Option<ReactiveError> {
        self.inner.last_error.borrow().clone()
    }

    /// Stop the effect, running its cleanups.
    pub fn dispose(&self) {
        if let Some(rt) = self.runtime.upgrade() {
            rt.dispose_node(self.id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.runtime
            .upgrade()
            .map_or(true, |rt| !rt.contains(self.id))
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("lane", &self.lane)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
