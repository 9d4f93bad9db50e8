//! # Stream Processor
//!
//! The single consumer of the ingestion queue and the only writer of the vehicle
//! store. Each dequeued envelope is decoded, range-checked and appended to its
//! vehicle's window. Rejected items are counted and dropped; nothing short of a
//! closed queue stops the loop.

use crate::config::{RetentionConfig, ValidationConfig};
use crate::metrics::PipelineMetricsCollector;
use crate::queue::QueueReceiver;
use crate::reading::Envelope;
use crate::store::VehicleStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;

/// Outcome of handling one queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Appended,
    Rejected,
}

/// Totals reported when the processor stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorStats {
    pub processed: u64,
    pub rejected: u64,
    pub vehicles_expired: u64,
}

pub struct StreamProcessor {
    store: Arc<VehicleStore>,
    limits: ValidationConfig,
    retention: RetentionConfig,
    metrics: Arc<PipelineMetricsCollector>,
    stats: ProcessorStats,
}

impl StreamProcessor {
    pub fn new(
        store: Arc<VehicleStore>,
        limits: ValidationConfig,
        retention: RetentionConfig,
        metrics: Arc<PipelineMetricsCollector>,
    ) -> Self {
        Self { store, limits, retention, metrics, stats: ProcessorStats::default() }
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    /// Decode, validate and append one item
    pub fn process(&mut self, envelope: Envelope) -> ProcessOutcome {
        let reading = match envelope.into_reading(&self.limits) {
            Ok(reading) => reading,
            Err(err) => {
                self.stats.rejected += 1;
                self.metrics.decode_errors.inc();
                tracing::warn!("Discarding reading: {}", err);
                return ProcessOutcome::Rejected;
            }
        };

        let outcome = self.store.append(reading, Instant::now());
        self.stats.processed += 1;
        self.metrics.readings_processed.inc();

        if outcome.created {
            self.metrics.vehicles_tracked.set(self.store.vehicle_count() as u64);
            tracing::debug!(vehicle_id = reading.vehicle_id, "Tracking new vehicle");
        }
        if outcome.evicted.is_some() {
            self.metrics.readings_evicted.inc();
        }

        ProcessOutcome::Appended
    }

    /// Drop vehicles idle longer than the retention TTL; returns how many were removed
    pub fn expire_idle(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.retention.vehicle_ttl() else {
            return 0;
        };

        let removed = self.store.remove_idle(ttl, now);
        if !removed.is_empty() {
            self.stats.vehicles_expired += removed.len() as u64;
            self.metrics.vehicles_expired.add(removed.len() as u64);
            self.metrics.vehicles_tracked.set(self.store.vehicle_count() as u64);
            tracing::info!(count = removed.len(), "Expired idle vehicles");
        }
        removed.len()
    }

    /// Consume the queue until it is closed and drained
    pub async fn run(mut self, mut receiver: QueueReceiver) -> ProcessorStats {
        tracing::info!("Stream processor started");

        let mut sweep = tokio::time::interval(self.retention.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let retention_enabled = self.retention.vehicle_ttl().is_some();

        loop {
            tokio::select! {
                item = receiver.dequeue() => match item {
                    Ok(envelope) => {
                        self.process(envelope);
                        self.metrics.queue_depth.set(receiver.len() as u64);
                    }
                    Err(err) => {
                        tracing::debug!("Stream processor input ended: {}", err);
                        break;
                    }
                },
                _ = sweep.tick(), if retention_enabled => {
                    self.expire_idle(Instant::now());
                }
            }
        }

        tracing::info!(
            processed = self.stats.processed,
            rejected = self.stats.rejected,
            vehicles = self.store.vehicle_count(),
            "Stream processor stopped"
        );
        self.stats
    }
}
