//! Console demo: fast producers, slow consumers, one bounded queue.
//!
//! Usage: `producer_consumer_demo [config.json]`
//!
//! The optional JSON file may set any of the `CoordinatorConfig` fields plus
//! the simulated work delays, e.g.
//! `{"capacity": 5, "producers": 4, "consumer_delay_ms": [100, 200]}`.
//! Press Ctrl-C to cancel a run early.

use bounded_relay::{CompletionCoordinator, CoordinatorConfig};
use chrono::Local;
use colored::{Color, Colorize};
use log::{Level, LevelFilter, Log, Metadata, Record};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::error::Error;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

/// Demo settings layered over the coordinator configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct DemoConfig {
    #[serde(flatten)]
    coordinator: CoordinatorConfig,
    /// Simulated production time range, in milliseconds
    producer_delay_ms: (u64, u64),
    /// Simulated processing time range, in milliseconds
    consumer_delay_ms: (u64, u64),
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            producer_delay_ms: (50, 100),
            consumer_delay_ms: (200, 500),
        }
    }
}

impl DemoConfig {
    fn load(path: Option<String>) -> Result<Self, Box<dyn Error>> {
        let config: Self = match path {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.coordinator.validate()?;
        Ok(config)
    }
}

/// Timestamped, colored log lines keyed by the unit that emitted them
struct ConsoleLogger {
    out: Mutex<std::io::Stdout>,
}

impl ConsoleLogger {
    fn color_for(record: &Record) -> Color {
        match record.level() {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Cyan,
            _ if record.target().starts_with("Producer") => Color::Green,
            _ if record.target().starts_with("Consumer") => Color::Magenta,
            _ => Color::White,
        }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let source = record.target().rsplit("::").next().unwrap_or_default();
        let line = format!(
            "[{}] [{:<12}] {}",
            Local::now().format("%H:%M:%S%.3f"),
            source,
            record.args()
        );

        // Serialize whole lines so units never interleave mid-line
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(out, "{}", line.color(Self::color_for(record)));
    }

    fn flush(&self) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let _ = out.flush();
    }
}

fn random_delay(rng: &mut StdRng, (low, high): (u64, u64)) -> Duration {
    if high > low {
        Duration::from_millis(rng.gen_range(low..high))
    } else {
        Duration::from_millis(low)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let logger = Box::new(ConsoleLogger {
        out: Mutex::new(std::io::stdout()),
    });
    log::set_boxed_logger(logger)?;
    log::set_max_level(LevelFilter::Debug);

    let config = DemoConfig::load(std::env::args().nth(1))?;
    let run = &config.coordinator;

    println!("{}", "=== Producer-Consumer Demo ===".bold());
    println!("Configuration:");
    println!("  Producers: {}", run.producers);
    println!("  Consumers: {}", run.consumers);
    println!("  Items per Producer: {}", run.items_per_producer);
    println!("  Max Queue Size: {}", run.capacity);
    println!("  Total Items to Produce: {}\n", run.total_items());

    let coordinator = CompletionCoordinator::new(run.clone())?;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling run");
            cancel.cancel();
        }
    });

    let producer_delay = config.producer_delay_ms;
    let sources: Vec<_> = (1..=run.producers as u64)
        .map(|id| {
            // Seeded per producer so each one emits a different sequence
            let mut rng = StdRng::seed_from_u64(id * 1000);
            move |_index: usize| {
                let number: u32 = rng.gen_range(1..1000);
                let delay = random_delay(&mut rng, producer_delay);
                async move {
                    tokio::time::sleep(delay).await;
                    number
                }
            }
        })
        .collect();

    let consumer_delay = config.consumer_delay_ms;
    let sinks: Vec<_> = (1..=run.consumers as u64)
        .map(|id| {
            let mut rng = StdRng::seed_from_u64(id * 7919);
            move |_number: u32| {
                let delay = random_delay(&mut rng, consumer_delay);
                async move {
                    tokio::time::sleep(delay).await;
                }
            }
        })
        .collect();

    let summary = coordinator.run(sources, sinks).await?;

    println!("\n{}", "=== Final Statistics ===".bold());
    println!("Run: {}", summary.run_id);
    println!("Total Produced: {}", summary.produced);
    println!("Total Consumed: {}", summary.consumed);
    println!("Queue Size: {}", summary.remaining);
    println!("Elapsed: {:.2?}", summary.elapsed);
    for report in &summary.consumers {
        println!("  Consumer-{} handled {} items", report.id, report.consumed);
    }

    if summary.is_clean() {
        println!("\n{}", "All units completed successfully!".green());
    } else {
        for failure in &summary.failures {
            println!(
                "{}",
                format!("{} {:?} failed: {}", failure.role, failure.id, failure.reason).red()
            );
        }
    }

    Ok(())
}
