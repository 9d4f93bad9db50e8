//! # Producer
//!
//! Emits one reading per tick into the ingestion queue. The reading itself comes
//! from a `ReadingSource`; `SyntheticSource` generates uniformly random readings
//! for demos and load tests.

use crate::config::ProducerConfig;
use crate::error::QueueError;
use crate::metrics::PipelineMetricsCollector;
use crate::queue::IngestionQueue;
use crate::reading::{Envelope, Reading, VehicleId};
use crate::shutdown::ShutdownListener;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Anything that can produce the next reading on demand
pub trait ReadingSource: Send {
    fn next_reading(&mut self) -> Reading;
}

/// Random readings for a fleet of vehicle ids
#[derive(Debug)]
pub struct SyntheticSource {
    rng: StdRng,
    vehicle_id_min: VehicleId,
    vehicle_id_max: VehicleId,
}

impl SyntheticSource {
    pub fn new(config: &ProducerConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic source for tests and replays
    pub fn seeded(config: &ProducerConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &ProducerConfig, rng: StdRng) -> Self {
        let vehicle_id_min = config.vehicle_id_min.min(config.vehicle_id_max);
        let vehicle_id_max = config.vehicle_id_max.max(config.vehicle_id_min);
        Self { rng, vehicle_id_min, vehicle_id_max }
    }
}

impl ReadingSource for SyntheticSource {
    fn next_reading(&mut self) -> Reading {
        Reading {
            vehicle_id: self.rng.gen_range(self.vehicle_id_min..=self.vehicle_id_max),
            speed: self.rng.gen_range(0.0..120.0),
            fuel_level: self.rng.gen_range(0.0..100.0),
            engine_temp: self.rng.gen_range(50.0..120.0),
            timestamp: Utc::now(),
        }
    }
}

/// Per-producer totals returned when the producer stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerStats {
    pub produced: u64,
    pub enqueued: u64,
    pub backpressure: u64,
}

/// Fixed-cadence producer feeding the ingestion queue
pub struct Producer {
    id: usize,
    interval: Duration,
    enqueue_timeout: Duration,
    source: Box<dyn ReadingSource>,
    queue: Arc<IngestionQueue>,
    metrics: Arc<PipelineMetricsCollector>,
}

impl Producer {
    pub fn new(
        id: usize,
        config: &ProducerConfig,
        source: Box<dyn ReadingSource>,
        queue: Arc<IngestionQueue>,
        metrics: Arc<PipelineMetricsCollector>,
    ) -> Self {
        Self {
            id,
            interval: config.interval(),
            enqueue_timeout: config.enqueue_timeout(),
            source,
            queue,
            metrics,
        }
    }

    /// Produce one reading and enqueue it, waiting at most the configured timeout.
    ///
    /// `QueueError::Full` is counted as backpressure; only `QueueError::Closed`
    /// is returned to the caller.
    pub async fn produce_once(&mut self, stats: &mut ProducerStats) -> Result<(), QueueError> {
        let reading = self.source.next_reading();
        stats.produced += 1;
        self.metrics.readings_produced.inc();

        match self.queue.enqueue_timeout(Envelope::Reading(reading), self.enqueue_timeout).await {
            Ok(()) => {
                stats.enqueued += 1;
                self.metrics.readings_enqueued.inc();
                self.metrics.queue_depth.set(self.queue.len() as u64);
                Ok(())
            }
            Err(QueueError::Full) => {
                stats.backpressure += 1;
                self.metrics.backpressure_events.inc();
                tracing::warn!(
                    producer = self.id,
                    vehicle_id = reading.vehicle_id,
                    "Ingestion queue full, reading not enqueued"
                );
                Ok(())
            }
            Err(QueueError::Closed) => Err(QueueError::Closed),
        }
    }

    /// Run until shutdown is signalled or the queue closes
    pub async fn run(mut self, mut shutdown: ShutdownListener) -> ProducerStats {
        let mut stats = ProducerStats::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(producer = self.id, interval_ms = self.interval.as_millis() as u64, "Producer started");

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    if self.produce_once(&mut stats).await.is_err() {
                        tracing::info!(producer = self.id, "Ingestion queue closed, producer exiting");
                        break;
                    }
                }
            }
        }

        tracing::info!(
            producer = self.id,
            produced = stats.produced,
            enqueued = stats.enqueued,
            backpressure = stats.backpressure,
            "Producer stopped"
        );
        stats
    }
}
