//! Error types for the bounded queue and its coordinator
//!
//! Queue errors are surfaced synchronously to the caller of the failing
//! operation. There is no retry logic: the queue performs no I/O that can
//! transiently fail.

/// Errors returned by [`BoundedQueue`](crate::queue::BoundedQueue) operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The queue was constructed with a capacity of zero
    #[error("Queue capacity must be positive, got {0}")]
    InvalidCapacity(usize),
    /// An item was offered after completion had been signaled
    #[error("Cannot add to a queue after adding has been completed")]
    AddingCompleted,
    /// Non-blocking add found no free slot
    #[error("Queue is full")]
    Full,
    /// A suspended operation was released by cancellation
    #[error("Queue operation cancelled")]
    Cancelled,
}

/// Errors returned by the [`CompletionCoordinator`](crate::coordinator::CompletionCoordinator)
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Invalid coordinator configuration: {0}")]
    InvalidConfig(String),
    #[error("Expected {expected} {role}, got {actual}")]
    UnitCountMismatch {
        role: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Worker unit panicked: {0}")]
    UnitPanicked(String),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
