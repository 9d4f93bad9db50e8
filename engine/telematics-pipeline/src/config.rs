//! # Configuration Management
//!
//! Configuration structures for the telematics pipeline.

use crate::error::{PipelineError, Result};
use crate::{
    DEFAULT_PRODUCER_INTERVAL_MS, DEFAULT_QUEUE_CAPACITY, DEFAULT_WINDOW_CAPACITY,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-vehicle window configuration
    pub window: WindowConfig,
    /// Ingestion queue configuration
    pub queue: QueueConfig,
    /// Synthetic producer configuration
    pub producer: ProducerConfig,
    /// Range checks applied on ingest
    pub validation: ValidationConfig,
    /// Health derivation thresholds
    pub health: HealthThresholds,
    /// Idle vehicle retention
    pub retention: RetentionConfig,
    /// Shutdown behaviour
    pub shutdown: ShutdownConfig,
}

/// Window configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Readings kept per vehicle (one minute at 1 Hz by default)
    pub capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { capacity: DEFAULT_WINDOW_CAPACITY }
    }
}

/// Ingestion queue configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of buffered items
    pub capacity: usize,
    /// What `submit` does when the queue is full
    pub backpressure: BackpressurePolicy,
    /// Upper bound on a blocking enqueue; `None` waits until space frees up
    pub enqueue_timeout_ms: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            backpressure: BackpressurePolicy::Block,
            enqueue_timeout_ms: None,
        }
    }
}

impl QueueConfig {
    pub fn enqueue_timeout(&self) -> Option<Duration> {
        self.enqueue_timeout_ms.map(Duration::from_millis)
    }
}

/// Backpressure handling when the queue is full
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Wait for the processor to free a slot (preserves all data)
    Block,
    /// Reject immediately with `QueueFull`
    FailFast,
}

/// Synthetic producer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProducerConfig {
    /// Number of producer tasks started by the pipeline
    pub count: usize,
    /// Interval between readings in milliseconds
    pub interval_ms: u64,
    /// Longest a producer waits on a full queue before counting backpressure
    pub enqueue_timeout_ms: u64,
    /// Inclusive range of generated vehicle ids
    pub vehicle_id_min: u32,
    pub vehicle_id_max: u32,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            count: 1,
            interval_ms: DEFAULT_PRODUCER_INTERVAL_MS,
            enqueue_timeout_ms: 1000,
            vehicle_id_min: 1000,
            vehicle_id_max: 9999,
        }
    }
}

impl ProducerConfig {
    /// Tick period, never shorter than 1 ms
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}

/// Inclusive value limits checked when a reading is ingested
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub speed_min: f64,
    pub speed_max: f64,
    pub fuel_level_min: f64,
    pub fuel_level_max: f64,
    pub engine_temp_min: f64,
    pub engine_temp_max: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            speed_min: 0.0,
            speed_max: 250.0,
            fuel_level_min: 0.0,
            fuel_level_max: 100.0,
            engine_temp_min: 50.0,
            engine_temp_max: 150.0,
        }
    }
}

/// Thresholds used to derive a vehicle's health status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthThresholds {
    /// Engine temperature strictly above this raises `HighEngineTemp`
    pub engine_temp_warning: f64,
    /// Fuel level strictly below this raises `LowFuel`
    pub fuel_level_warning: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self { engine_temp_warning: 100.0, fuel_level_warning: 10.0 }
    }
}

/// Idle vehicle retention
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    /// Drop a vehicle's window after this long without a reading; `None` keeps it forever
    pub vehicle_ttl_secs: Option<u64>,
    /// How often the processor sweeps for idle vehicles
    pub sweep_interval_ms: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { vehicle_ttl_secs: None, sweep_interval_ms: 10_000 }
    }
}

impl RetentionConfig {
    pub fn vehicle_ttl(&self) -> Option<Duration> {
        self.vehicle_ttl_secs.map(Duration::from_secs)
    }

    /// Sweep period, never shorter than 1 ms
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

/// Shutdown behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Maximum time to wait for tasks to finish draining
    pub shutdown_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { shutdown_timeout_ms: 5000 }
    }
}

impl ShutdownConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.window.capacity == 0 {
            return Err(PipelineError::config("window.capacity must be greater than zero"));
        }
        if self.queue.capacity == 0 {
            return Err(PipelineError::config("queue.capacity must be greater than zero"));
        }
        if self.producer.interval_ms == 0 {
            return Err(PipelineError::config("producer.interval_ms must be greater than zero"));
        }
        if self.producer.vehicle_id_min > self.producer.vehicle_id_max {
            return Err(PipelineError::config(format!(
                "producer vehicle id range is empty: {}..={}",
                self.producer.vehicle_id_min, self.producer.vehicle_id_max
            )));
        }
        if self.retention.sweep_interval_ms == 0 {
            return Err(PipelineError::config(
                "retention.sweep_interval_ms must be greater than zero",
            ));
        }

        let v = &self.validation;
        for (name, min, max) in [
            ("speed", v.speed_min, v.speed_max),
            ("fuel_level", v.fuel_level_min, v.fuel_level_max),
            ("engine_temp", v.engine_temp_min, v.engine_temp_max),
        ] {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(PipelineError::config(format!(
                    "validation range for {name} is invalid: [{min}, {max}]"
                )));
            }
        }

        if !self.health.engine_temp_warning.is_finite()
            || !self.health.fuel_level_warning.is_finite()
        {
            return Err(PipelineError::config("health thresholds must be finite"));
        }

        Ok(())
    }
}
