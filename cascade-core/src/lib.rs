//! Cascade Core
//!
//! This crate provides a fine-grained reactive runtime. It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - A two-lane scheduler (render and deferred effects)
//! - Async resources driven by reactive sources
//! - JSON stores with per-leaf change tracking
//! - Ownership scopes, cleanups and context
//!
//! Everything lives in a single-threaded [`Runtime`](reactive::Runtime).
//! Handles hold a weak reference to it, so dropping the last runtime handle
//! disposes every node and runs every pending cleanup.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: The runtime and the primitives built on it
//! - `graph`: Dependency graph, node states and the effect scheduler
//! - `config`: Runtime limits, loadable from JSON
//! - `error`: Error types shared by every module
//!
//! # Example
//!
//! ```rust
//! use cascade_core::reactive::{Effect, Memo, Runtime, Signal};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let rt = Runtime::new();
//!
//! // Create a signal
//! let count = Signal::new(&rt, 1);
//!
//! // Create a derived value
//! let c = count.clone();
//! let doubled = Memo::new(&rt, move || c.get() * 2);
//!
//! // Create an effect
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let (log, d) = (seen.clone(), doubled.clone());
//! let _effect = Effect::new(&rt, move |_| log.borrow_mut().push(d.get()));
//!
//! // Update the signal; the effect runs once the write has propagated
//! count.set(5).unwrap();
//! assert_eq!(*seen.borrow(), vec![2, 10]);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::{ConfigError, RuntimeConfig};
pub use error::{ReactiveError, Result};
