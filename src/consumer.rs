//! Consumer unit: withdraws items until the queue is drained and completed

use crate::error::QueueResult;
use crate::queue::BoundedQueue;
use crate::work::ItemSink;
use std::fmt;
use std::marker::PhantomData;

/// Outcome of a consumer that observed the end of the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerReport {
    pub id: usize,
    pub consumed: usize,
}

/// Races other consumers for items and hands each one to its sink
pub struct Consumer<T, K> {
    id: usize,
    queue: BoundedQueue<T>,
    sink: K,
    _item: PhantomData<fn(T)>,
}

impl<T, K> Consumer<T, K>
where
    T: Send + fmt::Debug + 'static,
    K: ItemSink<T>,
{
    pub fn new(id: usize, queue: BoundedQueue<T>, sink: K) -> Self {
        Self {
            id,
            queue,
            sink,
            _item: PhantomData,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Name used as the log target for this unit
    pub fn name(&self) -> String {
        format!("Consumer-{}", self.id)
    }

    /// Withdraw and handle items until end of stream.
    ///
    /// Items are handed to the sink outside the queue lock, so a slow sink
    /// only delays this consumer.
    pub async fn run(mut self) -> QueueResult<ConsumerReport> {
        let name = self.name();
        let mut consumed = 0;

        loop {
            match self.queue.try_withdraw().await {
                Ok(Some(item)) => {
                    consumed += 1;
                    log::debug!(
                        target: name.as_str(),
                        "Consumed: {:?} (Queue: {}/{})",
                        item,
                        self.queue.len_fast(),
                        self.queue.capacity()
                    );
                    self.sink.handle(item).await;
                }
                Ok(None) => {
                    log::info!(target: name.as_str(), "No more items, exiting after {}", consumed);
                    break;
                }
                Err(e) => {
                    log::warn!(target: name.as_str(), "Stopped after {} items: {}", consumed, e);
                    return Err(e);
                }
            }
        }

        Ok(ConsumerReport { id: self.id, consumed })
    }
}
