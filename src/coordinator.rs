//! Lifecycle orchestration for producer and consumer units
//!
//! The coordinator walks a run through four phases:
//!
//! ```text
//! Running ──all producers joined──▶ Completing ──complete_adding()──▶ Draining ──all consumers joined──▶ Done
//! ```
//!
//! Completion is signaled exactly once and only after every producer has
//! terminated. Consumers are joined only after that, so each of them
//! eventually observes an empty, completed queue and exits.

use crate::config::CoordinatorConfig;
use crate::consumer::{Consumer, ConsumerReport};
use crate::error::{CoordinatorError, CoordinatorResult, QueueResult};
use crate::producer::{Producer, ProducerReport};
use crate::queue::BoundedQueue;
use crate::work::{ItemSink, ItemSource};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Phase of a coordinated run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CoordinatorPhase {
    /// Not started yet
    Idle,
    /// Producers and consumers are running
    Running,
    /// Every producer has terminated; completion is being signaled
    Completing,
    /// Completion signaled; consumers are draining the queue
    Draining,
    /// Every consumer has terminated
    Done,
}

/// Which kind of unit failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitRole {
    Producer,
    Consumer,
}

impl fmt::Display for UnitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitRole::Producer => write!(f, "Producer"),
            UnitRole::Consumer => write!(f, "Consumer"),
        }
    }
}

/// A unit that ended with an error or a panic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub role: UnitRole,
    /// Unit id, unknown when the task panicked
    pub id: Option<usize>,
    pub reason: String,
}

/// Outcome of a coordinated run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub producers: Vec<ProducerReport>,
    pub consumers: Vec<ConsumerReport>,
    pub failures: Vec<UnitFailure>,
    /// Items the queue accepted
    pub produced: u64,
    /// Items the queue handed out
    pub consumed: u64,
    /// Items still queued after every unit finished
    pub remaining: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    /// True when every unit finished without error and the queue drained
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.remaining == 0 && self.produced == self.consumed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run {}: produced {}, consumed {}, remaining {}, failures {}, took {:?}",
            self.run_id,
            self.produced,
            self.consumed,
            self.remaining,
            self.failures.len(),
            self.elapsed
        )
    }
}

/// Starts producer and consumer groups around one bounded queue and drives
/// the completion protocol
pub struct CompletionCoordinator {
    config: CoordinatorConfig,
    cancel: CancellationToken,
    phase: watch::Sender<CoordinatorPhase>,
}

impl CompletionCoordinator {
    pub fn new(config: CoordinatorConfig) -> CoordinatorResult<Self> {
        config.validate()?;
        let (phase, _) = watch::channel(CoordinatorPhase::Idle);

        Ok(Self {
            config,
            cancel: CancellationToken::new(),
            phase,
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn phase(&self) -> CoordinatorPhase {
        *self.phase.borrow()
    }

    /// Receiver notified on every phase transition
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorPhase> {
        self.phase.subscribe()
    }

    /// Token that releases every blocked unit when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Release every blocked producer and consumer. The run still completes
    /// the queue and joins every unit before returning.
    pub fn shutdown(&self) {
        log::warn!("Coordinator shutdown requested");
        self.cancel.cancel();
    }

    /// Create a queue sized by the configuration and run every unit on it
    pub async fn run<T, S, K>(&self, sources: Vec<S>, sinks: Vec<K>) -> CoordinatorResult<RunSummary>
    where
        T: Send + fmt::Debug + 'static,
        S: ItemSource<T> + 'static,
        K: ItemSink<T> + 'static,
    {
        let queue = BoundedQueue::with_cancellation(self.config.capacity, self.cancel.child_token())?;
        self.run_with_queue(queue, sources, sinks).await
    }

    /// Run one producer per source and one consumer per sink on `queue`.
    ///
    /// `sources` and `sinks` must match the configured group sizes.
    pub async fn run_with_queue<T, S, K>(
        &self,
        queue: BoundedQueue<T>,
        sources: Vec<S>,
        sinks: Vec<K>,
    ) -> CoordinatorResult<RunSummary>
    where
        T: Send + fmt::Debug + 'static,
        S: ItemSource<T> + 'static,
        K: ItemSink<T> + 'static,
    {
        check_count("producers", self.config.producers, sources.len())?;
        check_count("consumers", self.config.consumers, sinks.len())?;

        let run_id = Uuid::new_v4();
        let start = Instant::now();
        log::info!(
            "Run {} starting: {} producers x {} items, {} consumers, capacity {}",
            run_id,
            self.config.producers,
            self.config.items_per_producer,
            self.config.consumers,
            queue.capacity()
        );

        // Forward coordinator shutdown to a queue that carries its own token
        let cancel_forwarder = {
            let cancel = self.cancel.clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                queue.cancel();
            })
        };

        self.phase.send_replace(CoordinatorPhase::Running);

        let mut producer_set: JoinSet<(usize, QueueResult<ProducerReport>)> = JoinSet::new();
        for (index, source) in sources.into_iter().enumerate() {
            let id = index + 1;
            let producer = Producer::new(id, queue.clone(), source, self.config.items_per_producer);
            producer_set.spawn(async move { (id, producer.run().await) });
        }

        let mut consumer_set: JoinSet<(usize, QueueResult<ConsumerReport>)> = JoinSet::new();
        for (index, sink) in sinks.into_iter().enumerate() {
            let id = index + 1;
            let consumer = Consumer::new(id, queue.clone(), sink);
            consumer_set.spawn(async move { (id, consumer.run().await) });
        }

        let mut failures = Vec::new();
        let mut producers = Vec::with_capacity(self.config.producers);
        let mut consumers = Vec::with_capacity(self.config.consumers);

        // Watch consumers while producers run: if every consumer is gone
        // nothing drains the queue, and producers blocked on it must be
        // released instead of waiting forever.
        while !producer_set.is_empty() {
            tokio::select! {
                Some(joined) = producer_set.join_next() => {
                    record(UnitRole::Producer, joined, &mut producers, &mut failures);
                }
                Some(joined) = consumer_set.join_next(), if !consumer_set.is_empty() => {
                    record(UnitRole::Consumer, joined, &mut consumers, &mut failures);
                    if consumer_set.is_empty() {
                        log::error!("Every consumer stopped before adding completed, releasing producers");
                        queue.cancel();
                    }
                }
                else => break,
            }
        }

        self.phase.send_replace(CoordinatorPhase::Completing);
        if queue.complete_adding() {
            log::info!("All producers finished, adding completed");
        } else {
            log::warn!("Queue was already completed before all producers finished");
        }

        self.phase.send_replace(CoordinatorPhase::Draining);

        while let Some(joined) = consumer_set.join_next().await {
            record(UnitRole::Consumer, joined, &mut consumers, &mut failures);
        }

        cancel_forwarder.abort();
        self.phase.send_replace(CoordinatorPhase::Done);

        producers.sort_by_key(|r| r.id);
        consumers.sort_by_key(|r| r.id);

        let stats = queue.stats();
        let summary = RunSummary {
            run_id,
            producers,
            consumers,
            failures,
            produced: stats.produced,
            consumed: stats.consumed,
            remaining: stats.length,
            elapsed: start.elapsed(),
        };

        if summary.is_clean() {
            log::info!("{}", summary);
        } else {
            log::warn!("{}", summary);
        }

        Ok(summary)
    }
}

fn check_count(role: &'static str, expected: usize, actual: usize) -> CoordinatorResult<()> {
    if expected != actual {
        return Err(CoordinatorError::UnitCountMismatch {
            role,
            expected,
            actual,
        });
    }
    Ok(())
}

fn record<R>(
    role: UnitRole,
    joined: Result<(usize, QueueResult<R>), JoinError>,
    reports: &mut Vec<R>,
    failures: &mut Vec<UnitFailure>,
) {
    match joined {
        Ok((_, Ok(report))) => reports.push(report),
        Ok((id, Err(e))) => failures.push(unit_failed(role, Some(id), e)),
        Err(e) => failures.push(unit_panicked(role, e)),
    }
}

fn unit_failed(role: UnitRole, id: Option<usize>, error: impl fmt::Display) -> UnitFailure {
    log::error!("{} {:?} failed: {}", role, id, error);
    UnitFailure {
        role,
        id,
        reason: error.to_string(),
    }
}

fn unit_panicked(role: UnitRole, error: JoinError) -> UnitFailure {
    let reason = CoordinatorError::UnitPanicked(error.to_string());
    unit_failed(role, None, reason)
}
