//! Error types for the reactive runtime.

use std::any::Any;

use thiserror::Error;

use crate::graph::NodeId;

pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Errors surfaced by reactive operations.
///
/// Structural errors (`Cycle`, `Disposed`, ...) are returned to the caller
/// whose action caused them. Failures inside computations are recorded on the
/// runtime and can be drained with [`Runtime::take_errors`].
///
/// [`Runtime::take_errors`]: crate::reactive::Runtime::take_errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    /// The node was disposed together with its owner.
    #[error("node {0} has been disposed")]
    Disposed(NodeId),

    /// The runtime that created this handle no longer exists.
    #[error("the reactive runtime has been dropped")]
    RuntimeDropped,

    /// Memos must be pure; writing a cell from inside one is rejected.
    #[error("memo {memo} attempted to write cell {cell}")]
    WriteInsideMemo { memo: NodeId, cell: NodeId },

    /// A write would re-enter a computation that already read the written
    /// value (directly or through a memo) during its current run.
    #[error("write to {cell} re-enters running computation {computation}")]
    Cycle { cell: NodeId, computation: NodeId },

    /// The signal's value is borrowed by a `with` closure further up the
    /// stack.
    #[error("cell {cell} is borrowed and cannot be written until the borrow ends")]
    ValueBorrowed { cell: NodeId },

    /// Too many nested synchronous runs.
    #[error("computation {node} exceeded the maximum run depth of {limit}")]
    RunDepthExceeded { node: NodeId, limit: usize },

    /// Deferred effects kept re-triggering each other.
    #[error("flush aborted after {limit} passes; effects keep re-triggering each other")]
    MaxFlushIterations { limit: u32 },

    #[error("computation {node} panicked: {message}")]
    ComputationPanicked { node: NodeId, message: String },

    #[error("cleanup registered on {node} panicked: {message}")]
    CleanupPanicked { node: NodeId, message: String },

    /// Resource fetches are spawned onto a `tokio::task::LocalSet`, and none
    /// is running on this thread.
    #[error("resource {node} cannot fetch outside a tokio LocalSet")]
    NoLocalSet { node: NodeId },

    /// No value lives at this store path.
    #[error("no value at path {path}")]
    PathNotFound { path: String },

    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The path walks through a leaf value.
    #[error("value at {path} is not an object or array")]
    NotAContainer { path: String },
}

/// Failure of a single computation run.
///
/// Panics keep their payload so that a memo read can re-raise the original
/// panic to its caller once bookkeeping has been restored.
pub(crate) enum RunError {
    Reactive(ReactiveError),
    Panicked {
        node: NodeId,
        payload: Box<dyn Any + Send>,
    },
}

impl RunError {
    pub(crate) fn into_reactive(self) -> ReactiveError {
        match self {
            RunError::Reactive(err) => err,
            RunError::Panicked { node, payload } => ReactiveError::ComputationPanicked {
                node,
                message: panic_message(payload.as_ref()),
            },
        }
    }
}

impl From<ReactiveError> for RunError {
    fn from(err: ReactiveError) -> Self {
        RunError::Reactive(err)
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
