//! Service state: owns the running pipeline and its periodic reporter

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use telematics_pipeline::{init_pipeline, ShutdownReport, TelematicsPipeline};

/// Running service components
pub struct ServiceState {
    /// Service configuration
    pub config: ServiceConfig,

    /// Pipeline instance (processor and producers already running)
    pub pipeline: Arc<TelematicsPipeline>,

    reporter_stop: watch::Sender<bool>,
}

impl ServiceState {
    /// Build and start the pipeline. Must be called inside a tokio runtime.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        info!("Initializing telematics pipeline...");
        let pipeline = init_pipeline(config.pipeline.clone())
            .context("Failed to start telematics pipeline")?;
        let (reporter_stop, _) = watch::channel(false);

        Ok(Self { config, pipeline: Arc::new(pipeline), reporter_stop })
    }

    /// Spawn the task that logs pipeline metrics and sample queries on an interval
    pub fn start_reporter(&self) -> JoinHandle<()> {
        let pipeline = self.pipeline.clone();
        let settings = self.config.service.clone();
        let mut stop = self.reporter_stop.subscribe();

        tokio::spawn(async move {
            // First tick fires immediately; skip it
            let mut ticker = tokio::time::interval(settings.report_interval());
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = stop.wait_for(|stopped| *stopped) => break,
                    _ = ticker.tick() => report(&pipeline, settings.report_sample_vehicles),
                }
            }
        })
    }

    /// Stop the reporter, then drain and stop the pipeline
    pub async fn shutdown(&self, reporter: JoinHandle<()>) -> ShutdownReport {
        // Stop the reporter
        self.reporter_stop.send_replace(true);
        if let Err(e) = reporter.await {
            warn!("Reporter task failed: {}", e);
        }

        // Drain and stop the pipeline
        self.pipeline.shutdown().await
    }
}

fn report(pipeline: &TelematicsPipeline, sample_vehicles: usize) {
    let metrics = pipeline.metrics();
    info!(
        produced = metrics.readings_produced,
        processed = metrics.readings_processed,
        decode_errors = metrics.decode_errors,
        backpressure = metrics.backpressure_events,
        queue_depth = metrics.queue_depth,
        vehicles = metrics.vehicles_tracked,
        api_calls = metrics.api_calls(),
        "Pipeline metrics"
    );

    // Sample a few tracked vehicles
    for vehicle_id in pipeline.store().vehicle_ids().into_iter().take(sample_vehicles) {
        let health = pipeline.get_health(vehicle_id);
        let performance = pipeline.get_performance(vehicle_id);
        let (Some(health), Some(performance)) = (health, performance) else {
            continue;
        };

        if health.status.is_warning() {
            warn!(
                vehicle_id,
                status = %health.status,
                last_updated = %health.last_updated,
                average_speed = performance.average_speed,
                samples = performance.sample_count,
                "Vehicle summary"
            );
        } else {
            info!(
                vehicle_id,
                status = %health.status,
                last_updated = %health.last_updated,
                average_speed = performance.average_speed,
                samples = performance.sample_count,
                "Vehicle summary"
            );
        }
    }
}
