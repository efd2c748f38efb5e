//! Producer unit: submits a fixed number of items to the queue

use crate::error::QueueResult;
use crate::queue::BoundedQueue;
use crate::work::ItemSource;
use std::fmt;
use std::marker::PhantomData;

/// Outcome of a producer that submitted all of its items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerReport {
    pub id: usize,
    pub produced: usize,
}

/// Generates `item_count` items from its source and adds them to the queue in
/// order. A producer never completes the queue; that is left to whoever knows
/// every producer has finished.
pub struct Producer<T, S> {
    id: usize,
    item_count: usize,
    queue: BoundedQueue<T>,
    source: S,
    _item: PhantomData<fn() -> T>,
}

impl<T, S> Producer<T, S>
where
    T: Send + fmt::Debug + 'static,
    S: ItemSource<T>,
{
    pub fn new(id: usize, queue: BoundedQueue<T>, source: S, item_count: usize) -> Self {
        Self {
            id,
            item_count,
            queue,
            source,
            _item: PhantomData,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Name used as the log target for this unit
    pub fn name(&self) -> String {
        format!("Producer-{}", self.id)
    }

    /// Submit every item, suspending on a full queue.
    ///
    /// The first queue error aborts the unit; items already added stay queued.
    pub async fn run(mut self) -> QueueResult<ProducerReport> {
        let name = self.name();

        for index in 0..self.item_count {
            let item = self.source.next_item(index).await;
            // The item moves into the queue, so render it first
            let shown = log::log_enabled!(target: name.as_str(), log::Level::Debug)
                .then(|| format!("{:?}", item));

            if let Err(e) = self.queue.add(item).await {
                log::warn!(target: name.as_str(), "Stopped after {} items: {}", index, e);
                return Err(e);
            }

            log::debug!(
                target: name.as_str(),
                "Produced: {} (Queue: {}/{})",
                shown.unwrap_or_default(),
                self.queue.len_fast(),
                self.queue.capacity()
            );
        }

        log::info!(target: name.as_str(), "Finished producing {} items", self.item_count);

        Ok(ProducerReport {
            id: self.id,
            produced: self.item_count,
        })
    }
}
