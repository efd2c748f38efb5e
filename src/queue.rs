//! Bounded blocking queue with a one-shot completion protocol
//!
//! All queue state (storage, counters, completion flag) lives behind a single
//! mutex. Two `Notify` handles carry the "room available" and "item available"
//! signals. Every suspension point registers for its wake signal *before*
//! checking its predicate under the lock, then re-checks after each wake, so a
//! notification can neither be lost nor wake a caller into an invalid state.

use crate::error::{QueueError, QueueResult};
use crate::metrics::{MetricsSnapshot, QueueMetrics};
use async_stream::stream;
use futures_util::stream::BoxStream;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// State guarded by the queue mutex
struct QueueState<T> {
    items: VecDeque<T>,
    completed: bool,
    produced: u64,
    consumed: u64,
}

struct Shared<T> {
    state: Mutex<QueueState<T>>,
    capacity: usize,
    not_full: Notify,
    not_empty: Notify,
    cancel: CancellationToken,
    metrics: QueueMetrics,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        // No code path panics while holding the guard, so a poisoned lock
        // still holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Capacity-bounded multi-producer multi-consumer queue.
///
/// Cloning the handle shares the same queue. Adders suspend while the queue is
/// full, withdrawers suspend while it is empty. Once [`complete_adding`] has
/// been called no item is accepted any more, and withdrawers receive
/// `Ok(None)` as soon as the remaining items have been drained.
///
/// [`complete_adding`]: BoundedQueue::complete_adding
pub struct BoundedQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> BoundedQueue<T>
where
    T: Send + 'static,
{
    /// Create a new queue holding at most `capacity` items
    pub fn bounded(capacity: usize) -> QueueResult<Self> {
        Self::with_cancellation(capacity, CancellationToken::new())
    }

    /// Create a new queue whose suspended operations are released when
    /// `cancel` is triggered
    pub fn with_cancellation(capacity: usize, cancel: CancellationToken) -> QueueResult<Self> {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity(capacity));
        }

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    items: VecDeque::with_capacity(capacity),
                    completed: false,
                    produced: 0,
                    consumed: 0,
                }),
                capacity,
                not_full: Notify::new(),
                not_empty: Notify::new(),
                cancel,
                metrics: QueueMetrics::new(),
            }),
        })
    }

    /// Add an item at the tail, suspending while the queue is full.
    ///
    /// Fails with [`QueueError::AddingCompleted`] if completion was signaled
    /// before the call or while the caller was waiting for room, and with
    /// [`QueueError::Cancelled`] if the queue's token fires. On failure the
    /// queue is left untouched and the item is dropped.
    pub async fn add(&self, item: T) -> QueueResult<()> {
        let shared = &*self.shared;

        loop {
            let notified = shared.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if shared.cancel.is_cancelled() {
                shared.metrics.record_cancellation();
                return Err(QueueError::Cancelled);
            }

            {
                let mut state = shared.lock();
                if state.completed {
                    shared.metrics.record_rejected_add();
                    return Err(QueueError::AddingCompleted);
                }
                if state.items.len() < shared.capacity {
                    state.items.push_back(item);
                    state.produced += 1;
                    shared.metrics.record_len(state.items.len());
                    drop(state);
                    shared.not_empty.notify_one();
                    return Ok(());
                }
            }

            shared.metrics.record_add_wait();
            log::trace!("Queue full ({}), adder waiting", shared.capacity);

            tokio::select! {
                _ = &mut notified => {}
                _ = shared.cancel.cancelled() => {
                    shared.metrics.record_cancellation();
                    return Err(QueueError::Cancelled);
                }
            }
        }
    }

    /// Add an item without suspending
    pub fn try_add(&self, item: T) -> QueueResult<()> {
        let shared = &*self.shared;
        let mut state = shared.lock();

        if state.completed {
            shared.metrics.record_rejected_add();
            return Err(QueueError::AddingCompleted);
        }
        if state.items.len() >= shared.capacity {
            return Err(QueueError::Full);
        }

        state.items.push_back(item);
        state.produced += 1;
        shared.metrics.record_len(state.items.len());
        drop(state);
        shared.not_empty.notify_one();
        Ok(())
    }

    /// Signal that no more items will be added.
    ///
    /// Returns `true` for the call that performed the transition and `false`
    /// for every later call. Wakes every suspended withdrawer and every
    /// suspended adder so they can observe the terminal state.
    pub fn complete_adding(&self) -> bool {
        let shared = &*self.shared;
        {
            let mut state = shared.lock();
            if state.completed {
                return false;
            }
            state.completed = true;
        }

        log::debug!("Queue adding completed");
        shared.not_empty.notify_waiters();
        shared.not_full.notify_waiters();
        true
    }

    /// Remove the head item, suspending while the queue is empty.
    ///
    /// Returns `Ok(None)` once the queue is both empty and completed. Fails
    /// with [`QueueError::Cancelled`] if the queue's token fires.
    pub async fn try_withdraw(&self) -> QueueResult<Option<T>> {
        let shared = &*self.shared;

        loop {
            let notified = shared.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if shared.cancel.is_cancelled() {
                shared.metrics.record_cancellation();
                return Err(QueueError::Cancelled);
            }

            {
                let mut state = shared.lock();
                if let Some(item) = state.items.pop_front() {
                    state.consumed += 1;
                    shared.metrics.record_len(state.items.len());
                    drop(state);
                    shared.not_full.notify_one();
                    return Ok(Some(item));
                }
                if state.completed {
                    return Ok(None);
                }
            }

            shared.metrics.record_withdraw_wait();
            log::trace!("Queue empty, withdrawer waiting");

            tokio::select! {
                _ = &mut notified => {}
                _ = shared.cancel.cancelled() => {
                    shared.metrics.record_cancellation();
                    return Err(QueueError::Cancelled);
                }
            }
        }
    }

    /// Remove the head item if one is available right now
    pub fn try_withdraw_now(&self) -> Option<T> {
        let shared = &*self.shared;
        let mut state = shared.lock();

        let item = state.items.pop_front()?;
        state.consumed += 1;
        shared.metrics.record_len(state.items.len());
        drop(state);
        shared.not_full.notify_one();
        Some(item)
    }

    /// Stream of withdrawn items, ending when the queue is drained and
    /// completed or when the queue is cancelled
    pub fn consuming_stream(&self) -> BoxStream<'static, T> {
        let queue = self.clone();

        let stream = stream! {
            while let Ok(Some(item)) = queue.try_withdraw().await {
                yield item;
            }
        };

        Box::pin(stream)
    }

    /// Remove and return every queued item
    pub fn drain(&self) -> Vec<T> {
        let shared = &*self.shared;
        let items: Vec<T> = {
            let mut state = shared.lock();
            let items: Vec<T> = state.items.drain(..).collect();
            state.consumed += items.len() as u64;
            shared.metrics.record_len(0);
            items
        };

        if !items.is_empty() {
            shared.not_full.notify_waiters();
        }
        items
    }

    /// Current number of queued items, read under the lock
    pub fn len(&self) -> usize {
        self.shared.lock().items.len()
    }

    /// Last length recorded by the advisory counters, read without locking
    pub fn len_fast(&self) -> usize {
        self.shared.metrics.current_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn is_completed(&self) -> bool {
        self.shared.lock().completed
    }

    /// Token observed by every suspension point of this queue
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Release every suspended adder and withdrawer with
    /// [`QueueError::Cancelled`]
    pub fn cancel(&self) {
        log::debug!("Queue cancelled");
        self.shared.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Free slots at this instant
    pub fn available_capacity(&self) -> usize {
        self.shared.capacity.saturating_sub(self.len())
    }

    /// Check if the queue fill ratio has reached `threshold` (0.0 to 1.0)
    pub fn is_nearly_full(&self, threshold: f64) -> bool {
        (self.len() as f64 / self.shared.capacity as f64) >= threshold
    }

    /// Consistent snapshot of length and lifetime counters
    pub fn stats(&self) -> QueueStats {
        let state = self.shared.lock();
        let length = state.items.len();

        QueueStats {
            length,
            capacity: self.shared.capacity,
            utilization: length as f64 / self.shared.capacity as f64,
            produced: state.produced,
            consumed: state.consumed,
            is_completed: state.completed,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

/// Queue statistics for monitoring and debugging
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStats {
    pub length: usize,
    pub capacity: usize,
    pub utilization: f64, // 0.0 to 1.0
    pub produced: u64,
    pub consumed: u64,
    pub is_completed: bool,
}

impl fmt::Display for QueueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queue({}/{}, {:.1}%, produced {}, consumed {}{})",
            self.length,
            self.capacity,
            self.utilization * 100.0,
            self.produced,
            self.consumed,
            if self.is_completed { ", completed" } else { "" }
        )
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.shared.capacity)
            .field("length", &state.items.len())
            .field("completed", &state.completed)
            .field("cancelled", &self.shared.cancel.is_cancelled())
            .finish()
    }
}
