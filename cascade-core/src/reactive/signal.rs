//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a running memo or effect, the read is
//!    recorded and the computation becomes a subscriber.
//!
//! 2. When a signal's value changes, every subscriber is marked dirty.
//!
//! 3. Dirty effects are scheduled on their lane; dirty memos wait until they
//!    are read.
//!
//! # Memory Layout
//!
//! The value lives in the handle, behind an `Rc`. The runtime only stores a
//! graph node with the signal's edges, so subscriber sets never own a value
//! and a disposed computation is never kept alive by a signal.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeKind};

use super::equality::{default_equals, EqualsFn};
use super::runtime::{Runtime, WeakRuntime};

/// Read access shared by signals, read-only views and memos.
pub trait Readable<T: 'static> {
    fn id(&self) -> NodeId;

    /// Borrow the value, subscribing the running computation.
    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R;

    /// Borrow the value without subscribing.
    fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R;

    fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.with_untracked(T::clone)
    }
}

struct SignalInner<T> {
    id: NodeId,
    runtime: WeakRuntime,
    value: RefCell<T>,
    equals: EqualsFn<T>,
}

/// A reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust
/// use cascade_core::reactive::{Runtime, Signal};
///
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 0);
///
/// count.set(5).unwrap();
/// count.update(|n| n + 1).unwrap();
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a signal compared with `PartialEq`.
    pub fn new(rt: &Runtime, value: T) -> Self
    where
        T: PartialEq,
    {
        Self::new_with_equals(rt, value, default_equals())
    }

    /// Create a signal with a custom equality function.
    pub fn new_with_equals(rt: &Runtime, value: T, equals: EqualsFn<T>) -> Self {
        let id = rt.create_node(NodeKind::Source, None);
        Self {
            inner: Rc::new(SignalInner {
                id,
                runtime: rt.downgrade(),
                value: RefCell::new(value),
                equals,
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value, subscribing the running computation.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, subscribing the running computation.
    ///
    /// The value stays borrowed while `f` runs; writing this signal from
    /// inside `f` fails with [`ReactiveError::ValueBorrowed`].
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        if let Some(rt) = self.inner.runtime.upgrade() {
            rt.track(self.inner.id);
        }
        f(&self.inner.value.borrow())
    }

    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store a new value and notify subscribers.
    ///
    /// Equal values (per the equality function) are a no-op. Fails if the
    /// signal was disposed, if the write happens inside a memo or would
    /// re-enter a computation that already read this signal, or if the value
    /// is currently borrowed by [`with`](Self::with).
    pub fn set(&self, value: T) -> Result<()> {
        let rt = self.inner.runtime.runtime()?;
        rt.prepare_write(self.inner.id)?;

        {
            let Ok(mut current) = self.inner.value.try_borrow_mut() else {
                return Err(ReactiveError::ValueBorrowed {
                    cell: self.inner.id,
                });
            };
            if (self.inner.equals)(&current, &value) {
                return Ok(());
            }
            *current = value;
        }

        rt.commit_write(self.inner.id)
    }

    /// Set the value computed from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<()> {
        let next = f(&self.inner.value.borrow());
        self.set(next)
    }

    /// Read-only view sharing this signal's value and node.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            signal: self.clone(),
        }
    }

    /// Number of computations that read this signal in their latest run.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .runtime
            .upgrade()
            .map_or(0, |rt| rt.dependents(self.inner.id).len())
    }

    /// Remove the signal from the graph. The value stays readable, writes fail.
    pub fn dispose(&self) {
        if let Some(rt) = self.inner.runtime.upgrade() {
            rt.dispose_node(self.inner.id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner
            .runtime
            .upgrade()
            .map_or(true, |rt| !rt.contains(self.inner.id))
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl<T: 'static> Readable<T> for Signal<T> {
    fn id(&self) -> NodeId {
        self.inner.id
    }

    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Signal::with(self, f)
    }

    fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Signal::with_untracked(self, f)
    }
}

/// Read-only view of a [`Signal`].
pub struct ReadSignal<T: 'static> {
    signal: Signal<T>,
}

impl<T: 'static> ReadSignal<T> {
    pub fn id(&self) -> NodeId {
        self.signal.id()
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.signal.get()
    }

    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.signal.get_untracked()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }
}

impl<T: 'static> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T: Debug + 'static> Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.signal).finish()
    }
}

impl<T: 'static> Readable<T> for ReadSignal<T> {
    fn id(&self) -> NodeId {
        self.signal.id()
    }

    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with_untracked(f)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
