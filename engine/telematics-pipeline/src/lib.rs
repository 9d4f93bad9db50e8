//! # Telematics Pipeline
//!
//! In-process vehicle telemetry ingestion. Producers push timestamped readings into
//! a bounded queue; a single stream processor drains it into a fixed-size window per
//! vehicle; a query gateway derives health and performance summaries from those
//! windows for any number of concurrent callers.
//!
//! ```text
//! Producer(s) ──► IngestionQueue ──► StreamProcessor ──► VehicleStore ◄── QueryGateway
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod pipeline;
pub mod processor;
pub mod producer;
pub mod queue;
pub mod reading;
pub mod shutdown;
pub mod store;
pub mod window;

#[cfg(test)]
mod tests;

pub use config::{BackpressurePolicy, HealthThresholds, PipelineConfig};
pub use error::{PipelineError, QueueError, Result, ValidationError};
pub use gateway::{HealthStatus, PerformanceSummary, QueryGateway, VehicleHealth};
pub use metrics::{PipelineMetrics, PipelineMetricsCollector};
pub use pipeline::{ShutdownReport, TelematicsPipeline};
pub use processor::{ProcessorStats, StreamProcessor};
pub use producer::{Producer, ProducerStats, ReadingSource, SyntheticSource};
pub use queue::{IngestionQueue, QueueReceiver};
pub use reading::{Envelope, Reading, VehicleId};
pub use store::{VehicleStore, WindowSnapshot};
pub use window::Window;

/// Current version of the pipeline crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Readings kept per vehicle (one minute at 1 Hz)
pub const DEFAULT_WINDOW_CAPACITY: usize = 60;

/// Items the ingestion queue buffers before applying backpressure
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Producer cadence (1 Hz)
pub const DEFAULT_PRODUCER_INTERVAL_MS: u64 = 1000;

/// Build and start a pipeline: the processor plus `producer.count` synthetic producers
pub fn init_pipeline(config: PipelineConfig) -> Result<TelematicsPipeline> {
    tracing::info!("Initializing telematics pipeline with config: {:?}", config);

    let pipeline = TelematicsPipeline::new(config)?;
    pipeline.start()?;
    let producers = pipeline.start_synthetic_producers()?;
    tracing::info!("Started {} synthetic producer(s)", producers);

    Ok(pipeline)
}
