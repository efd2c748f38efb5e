//! # bounded-relay
//!
//! Coordinates independent producer and consumer tasks around one
//! capacity-bounded queue. Items are never lost or duplicated, each
//! producer's items keep their relative order, and consumers exit cleanly once
//! production has finished and the queue has drained.
//!
//! ```no_run
//! use bounded_relay::{CompletionCoordinator, CoordinatorConfig};
//!
//! # async fn demo() -> Result<(), bounded_relay::error::CoordinatorError> {
//! let config = CoordinatorConfig::new().capacity(10).producers(3).consumers(2);
//! let coordinator = CompletionCoordinator::new(config)?;
//!
//! let sources: Vec<_> = (0..3usize)
//!     .map(|p| move |i: usize| async move { p * 1000 + i })
//!     .collect();
//! let sinks: Vec<_> = (0..2)
//!     .map(|_| |item: usize| async move { println!("got {}", item) })
//!     .collect();
//!
//! let summary = coordinator.run(sources, sinks).await?;
//! assert!(summary.is_clean());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod producer;
pub mod queue;
pub mod work;

pub use config::CoordinatorConfig;
pub use consumer::{Consumer, ConsumerReport};
pub use coordinator::{CompletionCoordinator, CoordinatorPhase, RunSummary, UnitFailure, UnitRole};
pub use error::{CoordinatorError, CoordinatorResult, QueueError, QueueResult};
pub use producer::{Producer, ProducerReport};
pub use queue::{BoundedQueue, QueueStats};
pub use work::{ItemSink, ItemSource};
