//! Configuration for a coordinated producer/consumer run

use crate::error::{CoordinatorError, CoordinatorResult};
use serde::{Deserialize, Serialize};

/// Shape of a run: queue capacity and the size of each worker group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Maximum number of items the queue holds at once
    pub capacity: usize,
    /// Number of producer units
    pub producers: usize,
    /// Number of consumer units
    pub consumers: usize,
    /// Items each producer submits before finishing
    pub items_per_producer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            producers: 3,
            consumers: 2,
            items_per_producer: 20,
        }
    }
}

impl CoordinatorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the number of producer units
    pub fn producers(mut self, producers: usize) -> Self {
        self.producers = producers;
        self
    }

    /// Set the number of consumer units
    pub fn consumers(mut self, consumers: usize) -> Self {
        self.consumers = consumers;
        self
    }

    /// Set how many items each producer submits
    pub fn items_per_producer(mut self, items: usize) -> Self {
        self.items_per_producer = items;
        self
    }

    /// Items the whole run is expected to move through the queue
    pub fn total_items(&self) -> usize {
        self.producers * self.items_per_producer
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> CoordinatorResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CoordinatorError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a run that can terminate
    pub fn validate(&self) -> CoordinatorResult<()> {
        if self.capacity == 0 {
            return Err(CoordinatorError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }
        // Without consumers, producers block forever once the queue fills.
        if self.consumers == 0 && self.total_items() > self.capacity {
            return Err(CoordinatorError::InvalidConfig(format!(
                "{} items cannot fit in capacity {} without consumers",
                self.total_items(),
                self.capacity
            )));
        }
        Ok(())
    }
}
