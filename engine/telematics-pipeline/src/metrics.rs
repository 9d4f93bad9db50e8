// Metrics collection for the telematics pipeline

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters shared by the producer, processor and gateway
#[derive(Debug)]
pub struct PipelineMetricsCollector {
    // Ingress
    pub readings_produced: AtomicCounter,
    pub readings_enqueued: AtomicCounter,
    pub backpressure_events: AtomicCounter,

    // Processing
    pub readings_processed: AtomicCounter,
    pub decode_errors: AtomicCounter,
    pub readings_evicted: AtomicCounter,
    pub queue_depth: AtomicGauge,

    // Store
    pub vehicles_tracked: AtomicGauge,
    pub vehicles_expired: AtomicCounter,

    // Queries
    pub health_queries: AtomicCounter,
    pub performance_queries: AtomicCounter,

    pub uptime_start: Instant,
}

impl PipelineMetricsCollector {
    pub fn new() -> Self {
        Self {
            readings_produced: AtomicCounter::new(),
            readings_enqueued: AtomicCounter::new(),
            backpressure_events: AtomicCounter::new(),
            readings_processed: AtomicCounter::new(),
            decode_errors: AtomicCounter::new(),
            readings_evicted: AtomicCounter::new(),
            queue_depth: AtomicGauge::new(),
            vehicles_tracked: AtomicGauge::new(),
            vehicles_expired: AtomicCounter::new(),
            health_queries: AtomicCounter::new(),
            performance_queries: AtomicCounter::new(),
            uptime_start: Instant::now(),
        }
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.uptime_start.elapsed()
    }

    /// Point-in-time copy of every counter
    pub fn get_metrics(&self) -> PipelineMetrics {
        PipelineMetrics {
            readings_produced: self.readings_produced.get(),
            readings_enqueued: self.readings_enqueued.get(),
            backpressure_events: self.backpressure_events.get(),
            readings_processed: self.readings_processed.get(),
            decode_errors: self.decode_errors.get(),
            readings_evicted: self.readings_evicted.get(),
            queue_depth: self.queue_depth.get(),
            vehicles_tracked: self.vehicles_tracked.get(),
            vehicles_expired: self.vehicles_expired.get(),
            health_queries: self.health_queries.get(),
            performance_queries: self.performance_queries.get(),
            uptime_seconds: self.uptime().as_secs(),
        }
    }
}

impl Default for PipelineMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe atomic counter
#[derive(Debug)]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self { value: AtomicU64::new(0) }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe atomic gauge
#[derive(Debug)]
pub struct AtomicGauge {
    value: AtomicU64,
}

impl AtomicGauge {
    pub fn new() -> Self {
        Self { value: AtomicU64::new(0) }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for AtomicGauge {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub readings_produced: u64,
    pub readings_enqueued: u64,
    pub backpressure_events: u64,
    pub readings_processed: u64,
    pub decode_errors: u64,
    pub readings_evicted: u64,
    pub queue_depth: u64,
    pub vehicles_tracked: u64,
    pub vehicles_expired: u64,
    pub health_queries: u64,
    pub performance_queries: u64,
    pub uptime_seconds: u64,
}

impl PipelineMetrics {
    /// Total gateway calls served
    pub fn api_calls(&self) -> u64 {
        self.health_queries + self.performance_queries
    }
}
