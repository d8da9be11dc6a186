//! Reactive Primitives
//!
//! This module implements the reactive system: signals, memos, effects,
//! async resources and stores, all owned by a [`Runtime`].
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. Reading it inside a memo or
//! effect registers that computation as a dependent. Writing a value the
//! signal's equality function considers unchanged notifies nobody.
//!
//! ## Memos
//!
//! A Memo is a lazily computed, cached derived value. It re-evaluates only
//! when read after one of its dependencies actually changed, and dependents
//! of a memo that recomputes to an equal value are not re-run.
//!
//! ## Effects
//!
//! An Effect runs side effects whenever its dependencies change. Effects run
//! in one of two lanes:
//!
//! - render effects run as soon as a write has propagated, even inside a batch
//! - deferred effects run once the outermost batch or write completes
//!
//! ## Resources and Stores
//!
//! A [`Resource`] exposes an async fetch as signals. A [`Store`] holds a JSON
//! document with one signal per leaf, addressed by [`Path`].
//!
//! # Implementation Notes
//!
//! Dependencies are tracked automatically: while a computation runs, every
//! signal or memo it reads is recorded in the runtime's tracking stack, and
//! the recorded set replaces the computation's edges when it finishes.
//!
//! Propagation is push-pull. A write pushes dirty marks downstream; memos
//! pull fresh values on read and only report a change when their value is
//! different.

mod context;
mod effect;
pub mod equality;
mod memo;
mod path;
mod resource;
mod runtime;
mod scope;
mod signal;
mod store;

pub use effect::Effect;
pub use equality::{equals, nan_equals, never_equals, EqualsFn};
pub use memo::Memo;
pub use path::{Path, APPEND};
pub use resource::{Resource, ResourceState};
pub use runtime::{Runtime, WeakRuntime};
pub use scope::Scope;
pub use signal::{ReadSignal, Readable, Signal};
pub use store::Store;

pub(crate) use runtime::Computation;
