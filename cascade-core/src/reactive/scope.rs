//! Ownership Scopes
//!
//! A scope groups nodes so they can be disposed together. Everything created
//! inside [`Scope::run`] is owned by the scope: disposing it disposes those
//! nodes (newest first) and then runs the scope's own cleanups in reverse
//! registration order.
//!
//! Scopes nest. A scope created inside another scope, or inside a running
//! computation, is disposed with it unless it was created
//! [`detached`](Scope::detached).

use std::fmt;

use crate::error::Result;
use crate::graph::{NodeId, NodeKind};

use super::runtime::{Runtime, WeakRuntime};

/// Handle to an ownership scope.
///
/// # Example
///
/// ```rust
/// use cascade_core::reactive::{Effect, Runtime, Scope, Signal};
///
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 0);
/// let scope = Scope::new(&rt);
///
/// let effect = scope
///     .run(|rt| {
///         let c = count.clone();
///         Effect::new(rt, move |_| {
///             let _ = c.get();
///         })
///     })
///     .unwrap();
///
/// scope.dispose();
/// assert!(effect.is_disposed());
/// ```
#[derive(Clone)]
pub struct Scope {
    id: NodeId,
    runtime: WeakRuntime,
}

impl Scope {
    /// Create a scope owned by the current owner.
    pub fn new(rt: &Runtime) -> Self {
        let id = rt.create_node(NodeKind::Scope, None);
        Self {
            id,
            runtime: rt.downgrade(),
        }
    }

    /// Create a scope with no owner. It lives until disposed explicitly or
    /// until the runtime is torn down.
    pub fn detached(rt: &Runtime) -> Self {
        let id = {
            let _owner = rt.enter_owner(None);
            rt.create_node(NodeKind::Scope, None)
        };
        Self {
            id,
            runtime: rt.downgrade(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Run `f` with this scope as the owner of every node it creates.
    pub fn run<R>(&self, f: impl FnOnce(&Runtime) -> R) -> Result<R> {
        let rt = self.runtime.runtime()?;
        rt.ensure_live(self.id)?;

        let _owner = rt.enter_owner(Some(self.id));
        Ok(f(&rt))
    }

    /// Register a cleanup that runs when the scope is disposed.
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) -> Result<()> {
        let rt = self.runtime.runtime()?;
        rt.add_cleanup(self.id, Box::new(cleanup))
    }

    /// Dispose owned nodes and run cleanups. Idempotent.
    pub fn dispose(&self) {
        if let Some(rt) = self.runtime.upgrade() {
            tracing::debug!(scope = %self.id, "disposing scope");
            rt.dispose_node(self.id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.runtime
            .upgrade()
            .map_or(true, |rt| !rt.contains(self.id))
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
