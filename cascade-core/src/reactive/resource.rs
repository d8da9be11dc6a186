//! Async Resources
//!
//! A Resource tracks the outcome of an asynchronous fetch as reactive state.
//!
//! # State Machine
//!
//! ```text
//! unresolved ──fetch──> pending ──ok──> ready
//!                          │              │
//!                          └──err──> errored
//!                                         │
//!     ready / errored ──fetch──> refreshing ──ok/err──> ready / errored
//! ```
//!
//! # How Resources Work
//!
//! 1. A render-lane driver effect reads the source closure. Whenever what it
//!    reads changes and it yields `Some(source)`, a new fetch starts.
//!
//! 2. Each fetch gets a generation number. Only the result of the newest
//!    generation is applied; results of superseded fetches are dropped when
//!    they arrive (last write wins).
//!
//! 3. A result is applied in one batch, so deferred effects see the value,
//!    error and state change together.
//!
//! Fetch futures are spawned with [`tokio::task::spawn_local`], so resources
//! must be created and refetched inside a [`tokio::task::LocalSet`]. Outside
//! one, no fetch starts and the resource stays in its current state; the
//! failure is recorded on the runtime and returned by `refetch`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;

use serde::Serialize;

use crate::error::{ReactiveError, Result};

use super::effect::Effect;
use super::equality::never_equals;
use super::runtime::{Runtime, WeakRuntime};
use super::signal::Signal;

/// Where a resource is in its fetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// No fetch has started yet.
    Unresolved,
    /// First fetch in flight.
    Pending,
    Ready,
    /// A later fetch is in flight; the previous value is still available.
    Refreshing,
    Errored,
}

impl ResourceState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ResourceState::Pending | ResourceState::Refreshing)
    }
}

type LocalFuture<T, E> = Pin<Box<dyn Future<Output = std::result::Result<T, E>>>>;
type Fetcher<S, T, E> = Rc<dyn Fn(S) -> LocalFuture<T, E>>;

struct ResourceInner<S: 'static, T: 'static, E: 'static> {
    runtime: WeakRuntime,
    fetcher: Fetcher<S, T, E>,
    state: Signal<ResourceState>,
    value: Signal<Option<T>>,
    latest: Signal<Option<T>>,
    error: Signal<Option<E>>,
    generation: Cell<u64>,
    last_source: RefCell<Option<S>>,
    fetches: Cell<usize>,
}

impl<S, T, E> ResourceInner<S, T, E>
where
    S: Clone + 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Start a fetch for `source`.
    ///
    /// A rejected state transition or a missing `LocalSet` starts nothing:
    /// generation, fetch count and state keep their values. The source is
    /// remembered either way so that [`Resource::refetch`] can retry it.
    fn start_fetch(self: &Rc<Self>, source: S) -> Result<()> {
        let rt = self.runtime.runtime()?;
        rt.ensure_live(self.state.id())?;
        *self.last_source.borrow_mut() = Some(source.clone());

        let current = self.state.get_untracked();
        let next = match current {
            ResourceState::Unresolved | ResourceState::Pending => ResourceState::Pending,
            ResourceState::Ready | ResourceState::Refreshing | ResourceState::Errored => {
                ResourceState::Refreshing
            }
        };
        if next != current {
            rt.prepare_write(self.state.id())?;
        }

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(self.not_spawned(&rt));
        }

        let generation = self.generation.get() + 1;
        let future = (self.fetcher)(source);
        let inner = Rc::clone(self);
        let task = async move {
            let outcome = future.await;
            inner.settle(generation, outcome);
        };
        // spawn_local panics when no LocalSet is running on this thread.
        if panic::catch_unwind(AssertUnwindSafe(|| tokio::task::spawn_local(task))).is_err() {
            return Err(self.not_spawned(&rt));
        }

        self.generation.set(generation);
        self.fetches.set(self.fetches.get() + 1);
        tracing::debug!(generation, "resource fetch started");
        self.state.set(next)
    }

    fn not_spawned(&self, rt: &Runtime) -> ReactiveError {
        let err = ReactiveError::NoLocalSet {
            node: self.state.id(),
        };
        tracing::warn!(error = %err, "resource fetch not started");
        rt.record_error(err.clone());
        err
    }

    fn settle(&self, generation: u64, outcome: std::result::Result<T, E>) {
        let current = self.generation.get();
        if current != generation {
            tracing::debug!(generation, current, "discarding stale resource result");
            return;
        }
        let Some(rt) = self.runtime.upgrade() else {
            return;
        };

        let applied = rt.batch(|| match outcome {
            Ok(value) => self.apply_value(value),
            Err(error) => self.apply_error(error),
        });
        if let Err(err) = applied.and_then(|result| result) {
            tracing::debug!(generation, error = %err, "resource result not applied");
        }
    }

    fn apply_value(&self, value: T) -> Result<()> {
        self.value.set(Some(value.clone()))?;
        self.latest.set(Some(value))?;
        self.error.set(None)?;
        self.state.set(ResourceState::Ready)
    }

    fn apply_error(&self, error: E) -> Result<()> {
        self.value.set(None)?;
        self.error.set(Some(error))?;
        self.state.set(ResourceState::Errored)
    }
}

/// Reactive view of an async fetch driven by a source.
///
/// `S` is the source value passed to the fetcher, `T` the resolved value and
/// `E` the rejection.
pub struct Resource<S: 'static, T: 'static, E: 'static> {
    inner: Rc<ResourceInner<S, T, E>>,
    driver: Effect,
}

impl<S, T, E> Resource<S, T, E>
where
    S: Clone + 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Create a resource that fetches whenever `source` yields a new value.
    ///
    /// `source` is tracked like an effect body; returning `None` means
    /// "not ready" and starts no fetch.
    pub fn new<Src, F, Fut>(rt: &Runtime, source: Src, fetcher: F) -> Self
    where
        Src: Fn() -> Option<S> + 'static,
        F: Fn(S) -> Fut + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + 'static,
    {
        let fetcher: Fetcher<S, T, E> =
            Rc::new(move |source: S| -> LocalFuture<T, E> { Box::pin(fetcher(source)) });

        let inner = Rc::new(ResourceInner {
            runtime: rt.downgrade(),
            fetcher,
            state: Signal::new(rt, ResourceState::Unresolved),
            value: Signal::new_with_equals(rt, None, Rc::new(never_equals::<Option<T>>)),
            latest: Signal::new_with_equals(rt, None, Rc::new(never_equals::<Option<T>>)),
            error: Signal::new_with_equals(rt, None, Rc::new(never_equals::<Option<E>>)),
            generation: Cell::new(0),
            last_source: RefCell::new(None),
            fetches: Cell::new(0),
        });

        let driven = Rc::clone(&inner);
        let driver = Effect::new_render(rt, move |rt| {
            if let Some(source) = source() {
                // Failures are already recorded on the runtime.
                if let Err(err) = rt.untrack(|| driven.start_fetch(source)) {
                    tracing::debug!(error = %err, "resource fetch skipped");
                }
            }
        });

        Self { inner, driver }
    }

    /// Current value; `None` until resolved and after an error.
    pub fn value(&self) -> Option<T> {
        self.inner.value.get()
    }

    /// Last successfully resolved value, kept while refreshing or errored.
    pub fn latest(&self) -> Option<T> {
        self.inner.latest.get()
    }

    pub fn error(&self) -> Option<E> {
        self.inner.error.get()
    }

    pub fn state(&self) -> ResourceState {
        self.inner.state.get()
    }

    pub fn loading(&self) -> bool {
        self.state().is_loading()
    }

    /// Number of fetches started.
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.get()
    }

    /// Overwrite the value and mark the resource ready without fetching.
    ///
    /// A fetch already in flight is not canceled; if it resolves later its
    /// result replaces the mutated value.
    pub fn mutate(&self, value: T) -> Result<()> {
        let rt = self.inner.runtime.runtime()?;
        rt.batch(|| self.inner.apply_value(value))?
    }

    /// Like [`mutate`](Self::mutate), computing the value from the current one.
    pub fn mutate_with(&self, f: impl FnOnce(Option<&T>) -> T) -> Result<()> {
        let next = self.inner.value.with_untracked(|current| f(current.as_ref()));
        self.mutate(next)
    }

    /// Fetch again with the last source value.
    ///
    /// Does nothing if the source has never produced a value. Fails with
    /// [`ReactiveError::NoLocalSet`] outside a `LocalSet`, or with `Cycle`
    /// when called from a computation that read this resource's state.
    pub fn refetch(&self) -> Result<()> {
        self.inner.runtime.runtime()?;
        let source = self.inner.last_source.borrow().clone();
        match source {
            Some(source) => self.inner.start_fetch(source),
            None => {
                tracing::debug!("refetch skipped: no source value yet");
                Ok(())
            }
        }
    }

    /// Stop tracking the source and drop any in-flight result.
    pub fn dispose(&self) {
        self.inner.generation.set(self.inner.generation.get() + 1);
        self.driver.dispose();
        self.inner.state.dispose();
        self.inner.value.dispose();
        self.inner.latest.dispose();
        self.inner.error.dispose();
    }
}

impl<T, E> Resource<(), T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// A resource that fetches once on creation and again on
    /// [`refetch`](Self::refetch).
    pub fn new_unsourced<F, Fut>(rt: &Runtime, fetcher: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + 'static,
    {
        Self::new(rt, || Some(()), move |()| fetcher())
    }
}

impl<S: 'static, T: 'static, E: 'static> Clone for Resource<S, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            driver: self.driver.clone(),
        }
    }
}

impl<S: 'static, T: 'static, E: 'static> fmt::Debug for Resource<S, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("state", &self.inner.state.get_untracked())
            .field("generation", &self.inner.generation.get())
            .field("fetches", &self.inner.fetches.get())
            .finish()
    }
}
