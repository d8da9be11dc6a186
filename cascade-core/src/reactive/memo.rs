//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a dependency changes, the memo is marked dirty (or maybe-dirty if
//!    the change came through another memo).
//!
//! 4. On next access, a maybe-dirty memo first refreshes the memos it read.
//!    If none of them changed, it is marked clean without running.
//!
//! 5. If the recomputed value equals the cached one, the memo does not count
//!    as changed and its dependents are left alone.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay dirty (no wasted work)

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::panic;
use std::rc::Rc;

use crate::error::{ReactiveError, Result, RunError};
use crate::graph::{DirtyState, NodeId, NodeKind};

use super::equality::{default_equals, EqualsFn};
use super::runtime::{Computation, Runtime, WeakRuntime};
use super::signal::Readable;

struct MemoInner<T> {
    compute: Box<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    equals: EqualsFn<T>,
}

impl<T: 'static> Computation for MemoInner<T> {
    fn run(&self, _rt: &Runtime) -> bool {
        let next = (self.compute)();
        let mut slot = self.value.borrow_mut();
        match slot.as_ref() {
            Some(previous) if (self.equals)(previous, &next) => false,
            _ => {
                *slot = Some(next);
                true
            }
        }
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust
/// use cascade_core::reactive::{Memo, Runtime, Signal};
///
/// let rt = Runtime::new();
/// let count = Signal::new(&rt, 2);
///
/// let c = count.clone();
/// let squared = Memo::new(&rt, move || c.get() * c.get());
/// assert_eq!(squared.get(), 4);
///
/// count.set(3).unwrap();
/// assert_eq!(squared.get(), 9);
/// ```
pub struct Memo<T: 'static> {
    id: NodeId,
    runtime: WeakRuntime,
    inner: Rc<MemoInner<T>>,
}

impl<T: 'static> Memo<T> {
    /// Create a memo compared with `PartialEq`.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new(rt: &Runtime, compute: impl Fn() -> T + 'static) -> Self
    where
        T: PartialEq,
    {
        Self::new_with_equals(rt, compute, default_equals())
    }

    pub fn new_with_equals(
        rt: &Runtime,
        compute: impl Fn() -> T + 'static,
        equals: EqualsFn<T>,
    ) -> Self {
        let inner = Rc::new(MemoInner {
            compute: Box::new(compute),
            value: RefCell::new(None),
            equals,
        });
        let computation: Rc<dyn Computation> = inner.clone();
        let id = rt.create_node(NodeKind::Memo, Some(computation));

        Self {
            id,
            runtime: rt.downgrade(),
            inner,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the computation, and panics if the memo
    /// cannot be read at all (see [`try_get`](Self::try_get)).
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Like [`get`](Self::get), but failures are returned instead of raised.
    pub fn try_get(&self) -> Result<T>
    where
        T: Clone,
    {
        self.try_with(T::clone)
    }

    /// Borrow the current value, recomputing if necessary.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        match self.read(f) {
            Ok(result) => result,
            Err(RunError::Panicked { payload, .. }) => panic::resume_unwind(payload),
            Err(RunError::Reactive(err)) => panic!("memo {} could not be read: {err}", self.id),
        }
    }

    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.read(f).map_err(RunError::into_reactive)
    }

    /// Current value without subscribing the running computation.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        match self.runtime.upgrade() {
            Some(rt) => rt.untrack(|| self.get()),
            None => self.get(),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&T) -> R) -> std::result::Result<R, RunError> {
        let rt = self.runtime.runtime()?;

        // A disposed memo keeps serving its last value.
        if rt.contains(self.id) {
            rt.refresh(self.id)?;
            rt.track(self.id);
        }

        let value = self.inner.value.borrow();
        match value.as_ref() {
            Some(value) => Ok(f(value)),
            None => Err(ReactiveError::Disposed(self.id).into()),
        }
    }

    /// Dirty state, or `None` once disposed.
    pub fn state(&self) -> Option<DirtyState> {
        self.runtime.upgrade().and_then(|rt| rt.state_of(self.id))
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    pub fn dependent_count(&self) -> usize {
        self.runtime
            .upgrade()
            .map_or(0, |rt| rt.dependents(self.id).len())
    }

    pub fn dispose(&self) {
        if let Some(rt) = self.runtime.upgrade() {
            rt.dispose_node(self.id);
        }
    }
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            runtime: self.runtime.clone(),
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

impl<T: 'static> Readable<T> for Memo<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Memo::with(self, f)
    }

    fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        match self.runtime.upgrade() {
            Some(rt) => rt.untrack(|| Memo::with(self, f)),
            None => Memo::with(self, f),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Signal};
    use std::cell::Cell;
    use std::panic::AssertUnwindSafe;

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn memo_computes_on_first_access() {
        let rt = Runtime::new();
        let (calls, seen) = counter();

        let memo = Memo::new(&rt, move || {
            calls.set(calls.get() + 1);
            42
        });

        // Not computed yet
        assert!(!memo.has_value());
        assert_eq!(seen.get(), 0);

        assert_eq!(memo.get(), 42);
        assert_eq!(seen.get(), 1);
        assert!(memo.has_value());
    }

    #[test]
    fn memo_caches_value_when_clean() {
        let rt = Runtime::new();
        let (calls, seen) = counter();

        let memo = Memo::new(&rt, move || {
            calls.set(calls.get() + 1);
            42
        });

        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn memo_recomputes_after_dependency_changes() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0);
        let (calls, seen) = counter();

        let s = source.clone();
        let memo = Memo::new(&rt, move || {
            calls.set(calls.get() + 1);
            s.get()
        });

        assert_eq!(memo.get(), 0);
        source.set(5).unwrap();

        // Lazy: nothing runs until the next read.
        assert_eq!(seen.get(), 1);
        assert_eq!(memo.state(), Some(DirtyState::Dirty));

        assert_eq!(memo.get(), 5);
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn memo_state_transitions() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 1);
        let s = source.clone();
        let memo = Memo::new(&rt, move || s.get());

        assert_eq!(memo.state(), Some(DirtyState::Dirty));
        memo.get();
        assert_eq!(memo.state(), Some(DirtyState::Clean));

        source.set(2).unwrap();
        assert_eq!(memo.state(), Some(DirtyState::Dirty));
        memo.get();
        assert_eq!(memo.state(), Some(DirtyState::Clean));
    }

    #[test]
    fn unchanged_memo_does_not_rerun_dependents() {
        let rt = Runtime::new();
        let number = Signal::new(&rt, 1);

        let n = number.clone();
        let parity = Memo::new(&rt, move || n.get() % 2);

        let p = parity.clone();
        let effect = Effect::new(&rt, move |_| {
            let _ = p.get();
        });
        assert_eq!(effect.run_count(), 1);

        number.set(3).unwrap();
        assert_eq!(effect.run_count(), 1);
        assert_eq!(rt.state_of(effect.id()), Some(DirtyState::Clean));

        number.set(4).unwrap();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn diamond_runs_effect_once_with_consistent_values() {
        let rt = Runtime::new();
        let a = Signal::new(&rt, 1);

        let (a1, a2) = (a.clone(), a.clone());
        let doubled = Memo::new(&rt, move || a1.get() * 2);
        let plus_one = Memo::new(&rt, move || a2.get() + 1);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let (d, p, log) = (doubled.clone(), plus_one.clone(), seen.clone());
        let _effect = Effect::new(&rt, move |_| {
            log.borrow_mut().push((d.get(), p.get()));
        });

        a.set(2).unwrap();
        assert_eq!(*seen.borrow(), vec![(2, 2), (4, 3)]);
    }

    #[test]
    fn memo_chain_propagates() {
        let rt = Runtime::new();
        let base = Signal::new(&rt, 1);

        let b = base.clone();
        let first = Memo::new(&rt, move || b.get() + 1);
        let f = first.clone();
        let second = Memo::new(&rt, move || f.get() * 10);

        assert_eq!(second.get(), 20);
        base.set(4).unwrap();
        assert_eq!(second.get(), 50);
        assert_eq!(rt.dependencies(second.id()), vec![first.id()]);
    }

    #[test]
    fn memo_panic_is_reraised_and_recovers() {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 1);

        let s = source.clone();
        let checked = Memo::new(&rt, move || {
            let value = s.get();
            if value < 0 {
                panic!("negative input");
            }
            value
        });

        assert_eq!(checked.get(), 1);
        source.set(-1).unwrap();

        let caught = panic::catch_unwind(AssertUnwindSafe(|| checked.get()));
        assert!(caught.is_err());
        assert_eq!(
            checked.try_get(),
            Err(ReactiveError::ComputationPanicked {
                node: checked.id(),
                message: "negative input".into(),
            })
        );

        // The read before the panic is still a dependency.
        assert_eq!(rt.dependencies(checked.id()), vec![source.id()]);
        source.set(3).unwrap();
        assert_eq!(checked.get(), 3);
    }

    #[test]
    fn writing_inside_memo_is_rejected() {
        let rt = Runtime::new();
        let target = Signal::new(&rt, 0);

        let t = target.clone();
        let memo = Memo::new(&rt, move || t.set(1).is_err());

        assert!(memo.get());
        assert_eq!(target.get(), 0);
        assert!(matches!(
            rt.take_errors().as_slice(),
            [ReactiveError::WriteInsideMemo { memo: m, .. }] if *m == memo.id()
        ));
    }

    #[test]
    fn self_referencing_memo_reports_a_cycle() {
        let rt = Runtime::new();
        let slot: Rc<RefCell<Option<Memo<i32>>>> = Rc::new(RefCell::new(None));

        let inner = slot.clone();
        let memo = Memo::new(&rt, move || {
            let me = inner.borrow().clone();
            me.map_or(0, |me| me.try_get().unwrap_or(-1) + 1)
        });
        *slot.borrow_mut() = Some(memo.clone());

        assert_eq!(memo.get(), 0);
    }

    #[test]
    fn disposed_memo_keeps_last_value() {
        let rt = Runtime::new();
        let memo = Memo::new(&rt, || String::from("cached"));
        assert_eq!(memo.get(), "cached");

        memo.dispose();
        assert_eq!(memo.state(), None);
        assert_eq!(memo.get(), "cached");
    }

    #[test]
    fn never_read_disposed_memo_fails() {
        let rt = Runtime::new();
        let memo = Memo::new(&rt, || 1);
        memo.dispose();
        assert_eq!(memo.try_get(), Err(ReactiveError::Disposed(memo.id())));
    }

    #[test]
    fn memo_clone_shares_state() {
        let rt = Runtime::new();
        let memo1 = Memo::new(&rt, || 42);
        assert_eq!(memo1.get(), 42);

        let memo2 = memo1.clone();
        assert_eq!(memo1.id(), memo2.id());
        assert!(memo2.has_value());
        assert_eq!(memo2.get(), 42);
    }
}
