//! Pipeline assembly: wires queue, producers, processor, store and gateway together
//! and owns their task lifecycle.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, QueueError, Result};
use crate::gateway::{PerformanceSummary, QueryGateway, VehicleHealth};
use crate::metrics::{PipelineMetrics, PipelineMetricsCollector};
use crate::processor::{ProcessorStats, StreamProcessor};
use crate::producer::{Producer, ProducerStats, ReadingSource, SyntheticSource};
use crate::queue::IngestionQueue;
use crate::reading::{Envelope, Reading, VehicleId};
use crate::shutdown::ShutdownManager;
use crate::store::VehicleStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The assembled telematics pipeline
pub struct TelematicsPipeline {
    config: PipelineConfig,
    queue: Arc<IngestionQueue>,
    store: Arc<VehicleStore>,
    gateway: QueryGateway,
    metrics: Arc<PipelineMetricsCollector>,
    shutdown_manager: ShutdownManager,
    processor_handle: Mutex<Option<JoinHandle<ProcessorStats>>>,
    producer_handles: Mutex<Vec<JoinHandle<ProducerStats>>>,
}

/// Totals gathered while shutting the pipeline down
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Summed over every producer that stopped in time
    pub producers: ProducerStats,
    /// `None` if the processor never started or did not stop in time
    pub processor: Option<ProcessorStats>,
    pub metrics: PipelineMetrics,
}

impl TelematicsPipeline {
    /// Build a pipeline from a validated configuration. No tasks are started yet.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(PipelineMetricsCollector::new());
        let queue = Arc::new(IngestionQueue::new(&config.queue));
        let store = Arc::new(VehicleStore::new(config.window.capacity));
        let gateway = QueryGateway::new(store.clone(), config.health.clone(), metrics.clone());
        let shutdown_manager = ShutdownManager::new(config.shutdown.clone());

        Ok(Self {
            config,
            queue,
            store,
            gateway,
            metrics,
            shutdown_manager,
            processor_handle: Mutex::new(None),
            producer_handles: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Spawn the stream processor. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let receiver = self
            .queue
            .take_receiver()
            .ok_or_else(|| PipelineError::invalid_operation("pipeline already started"))?;

        let processor = StreamProcessor::new(
            self.store.clone(),
            self.config.validation.clone(),
            self.config.retention.clone(),
            self.metrics.clone(),
        );
        *self.processor_handle.lock() = Some(tokio::spawn(processor.run(receiver)));

        tracing::info!(
            window_capacity = self.config.window.capacity,
            queue_capacity = self.queue.capacity(),
            backpressure = ?self.queue.policy(),
            "Telematics pipeline started"
        );
        Ok(())
    }

    /// Spawn a producer task that pulls readings from `source`
    pub fn spawn_producer(&self, source: Box<dyn ReadingSource>) -> Result<()> {
        if self.shutdown_manager.is_shutdown_requested() || self.queue.is_closed() {
            return Err(QueueError::Closed.into());
        }

        let mut handles = self.producer_handles.lock();
        let producer = Producer::new(
            handles.len(),
            &self.config.producer,
            source,
            self.queue.clone(),
            self.metrics.clone(),
        );
        handles.push(tokio::spawn(producer.run(self.shutdown_manager.subscribe())));
        Ok(())
    }

    /// Spawn `producer.count` synthetic producers
    pub fn start_synthetic_producers(&self) -> Result<usize> {
        let count = self.config.producer.count;
        for _ in 0..count {
            self.spawn_producer(Box::new(SyntheticSource::new(&self.config.producer)))?;
        }
        Ok(count)
    }

    /// Enqueue one reading under the configured backpressure policy
    pub async fn submit(&self, reading: Reading) -> Result<()> {
        self.record_enqueue(self.queue.enqueue(Envelope::Reading(reading)).await)
    }

    /// Enqueue one reading without waiting, whatever the policy
    pub fn try_submit(&self, reading: Reading) -> Result<()> {
        self.record_enqueue(self.queue.try_enqueue(Envelope::Reading(reading)))
    }

    /// Enqueue a JSON-encoded reading; decoding happens in the processor
    pub async fn submit_encoded(&self, payload: &str) -> Result<()> {
        self.record_enqueue(self.queue.enqueue(Envelope::Encoded(payload.to_owned())).await)
    }

    fn record_enqueue(&self, result: std::result::Result<(), QueueError>) -> Result<()> {
        match result {
            Ok(()) => {
                self.metrics.readings_enqueued.inc();
                Ok(())
            }
            Err(QueueError::Full) => {
                self.metrics.backpressure_events.inc();
                Err(QueueError::Full.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn get_health(&self, vehicle_id: VehicleId) -> Option<VehicleHealth> {
        self.gateway.get_health(vehicle_id)
    }

    pub fn get_performance(&self, vehicle_id: VehicleId) -> Option<PerformanceSummary> {
        self.gateway.get_performance(vehicle_id)
    }

    /// Shareable query handle for callers on other threads
    pub fn gateway(&self) -> QueryGateway {
        self.gateway.clone()
    }

    pub fn store(&self) -> Arc<VehicleStore> {
        self.store.clone()
    }

    pub fn metrics(&self) -> PipelineMetrics {
        self.metrics.queue_depth.set(self.queue.len() as u64);
        self.metrics.vehicles_tracked.set(self.store.vehicle_count() as u64);
        self.metrics.get_metrics()
    }

    /// Stop producers, close the queue and wait for the processor to drain it
    pub async fn shutdown(&self) -> ShutdownReport {
        tracing::info!("Shutting down telematics pipeline");
        let timeout = self.shutdown_manager.get_shutdown_timeout();

        // Signal producers to stop
        self.shutdown_manager.initiate_shutdown();

        // Wait for producers and collect their totals
        let producer_handles: Vec<_> = self.producer_handles.lock().drain(..).collect();
        let mut producers = ProducerStats::default();
        for handle in producer_handles {
            if let Some(stats) = join_with_timeout("producer", handle, timeout).await {
                producers.produced += stats.produced;
                producers.enqueued += stats.enqueued;
                producers.backpressure += stats.backpressure;
            }
        }

        // Close the queue so the processor exits once it has drained
        self.queue.close();

        let processor_handle = self.processor_handle.lock().take();
        let processor = match processor_handle {
            Some(handle) => join_with_timeout("stream processor", handle, timeout).await,
            None => None,
        };

        // Mark shutdown as complete
        self.shutdown_manager.complete_shutdown();
        let report = ShutdownReport { producers, processor, metrics: self.metrics() };
        tracing::info!(
            processed = report.metrics.readings_processed,
            decode_errors = report.metrics.decode_errors,
            backpressure = report.metrics.backpressure_events,
            "Telematics pipeline shutdown complete"
        );
        report
    }
}

async fn join_with_timeout<T>(
    name: &str,
    mut handle: JoinHandle<T>,
    timeout: Duration,
) -> Option<T> {
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::error!("{} task failed: {}", name, e);
            None
        }
        Err(_) => {
            tracing::warn!("{} did not stop within {:?}, aborting", name, timeout);
            handle.abort();
            None
        }
    }
}
