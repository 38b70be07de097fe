//! Tunable parameters for a simulation run

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::types::CELL_SIZE;

/// Rejected configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("grid size must be at least 1")]
    EmptyGrid,
    #[error("{0} duration must be at least one tick")]
    ZeroDuration(&'static str),
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// Simulation parameters. `Default` matches the reference 3x3 city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Intersections per row and per column
    pub grid_size: usize,
    /// Ticks a pair stays green
    pub green_duration: u32,
    /// Ticks a pair stays yellow
    pub yellow_duration: u32,
    /// A spawn is attempted every this many ticks
    pub spawn_interval: u64,
    /// Maximum number of live vehicles
    pub spawn_cap: usize,
    /// A wait-time sample is recorded every this many ticks
    pub history_interval: u64,
    /// Number of wait-time samples kept
    pub history_capacity: usize,
    /// Number of event log entries kept
    pub log_capacity: usize,
    /// Tick period at 1x speed
    pub base_tick_interval: Duration,
    /// Deadline for an explanation request before falling back
    pub explanation_timeout: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            grid_size: 3,
            green_duration: 20,
            yellow_duration: 5,
            spawn_interval: 50,
            spawn_cap: 50,
            history_interval: 10,
            history_capacity: 50,
            log_capacity: 100,
            base_tick_interval: Duration::from_millis(100),
            explanation_timeout: Duration::from_secs(5),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size == 0 {
            return Err(ConfigError::EmptyGrid);
        }
        if self.green_duration == 0 {
            return Err(ConfigError::ZeroDuration("green"));
        }
        if self.yellow_duration == 0 {
            return Err(ConfigError::ZeroDuration("yellow"));
        }
        if self.spawn_interval == 0 {
            return Err(ConfigError::ZeroValue("spawn interval"));
        }
        if self.spawn_cap == 0 {
            return Err(ConfigError::ZeroValue("spawn cap"));
        }
        if self.history_interval == 0 {
            return Err(ConfigError::ZeroValue("history interval"));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroValue("history capacity"));
        }
        if self.log_capacity == 0 {
            return Err(ConfigError::ZeroValue("log capacity"));
        }
        if self.base_tick_interval.is_zero() {
            return Err(ConfigError::ZeroValue("base tick interval"));
        }
        Ok(())
    }

    /// Extent of the world along either axis
    pub fn world_size(&self) -> f32 {
        self.grid_size as f32 * CELL_SIZE
    }

    pub fn intersection_count(&self) -> usize {
        self.grid_size * self.grid_size
    }
}
