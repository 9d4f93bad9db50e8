//! # Query Gateway
//!
//! Read-only façade over the vehicle store. Each call copies what it needs out of
//! one vehicle's window under that window's read lock and derives the result
//! afterwards, so callers never hold a lock while computing and never see a window
//! mid-append.

use crate::config::HealthThresholds;
use crate::metrics::PipelineMetricsCollector;
use crate::reading::{Reading, VehicleId};
use crate::store::VehicleStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Health derived from a vehicle's latest reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Good,
    HighEngineTemp,
    LowFuel,
}

impl HealthStatus {
    /// Classify a reading. High engine temperature outranks low fuel.
    pub fn classify(reading: &Reading, thresholds: &HealthThresholds) -> Self {
        if reading.engine_temp > thresholds.engine_temp_warning {
            HealthStatus::HighEngineTemp
        } else if reading.fuel_level < thresholds.fuel_level_warning {
            HealthStatus::LowFuel
        } else {
            HealthStatus::Good
        }
    }

    pub fn is_warning(&self) -> bool {
        !matches!(self, HealthStatus::Good)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Good => write!(f, "Good"),
            HealthStatus::HighEngineTemp => write!(f, "Warning: High Engine Temperature"),
            HealthStatus::LowFuel => write!(f, "Warning: Low Fuel"),
        }
    }
}

/// Result of a health query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleHealth {
    pub vehicle_id: VehicleId,
    pub status: HealthStatus,
    /// Timestamp of the reading the status was derived from
    pub last_updated: DateTime<Utc>,
}

/// Result of a performance query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub vehicle_id: VehicleId,
    pub average_speed: f64,
    pub sample_count: usize,
}

/// Stateless query façade; cheap to clone and share across threads
#[derive(Debug, Clone)]
pub struct QueryGateway {
    store: Arc<VehicleStore>,
    thresholds: HealthThresholds,
    metrics: Arc<PipelineMetricsCollector>,
}

impl QueryGateway {
    pub fn new(
        store: Arc<VehicleStore>,
        thresholds: HealthThresholds,
        metrics: Arc<PipelineMetricsCollector>,
    ) -> Self {
        Self { store, thresholds, metrics }
    }

    /// Health of a vehicle, or `None` if it has never reported
    pub fn get_health(&self, vehicle_id: VehicleId) -> Option<VehicleHealth> {
        self.metrics.health_queries.inc();

        let latest = self.store.latest(vehicle_id)?;
        Some(VehicleHealth {
            vehicle_id,
            status: HealthStatus::classify(&latest, &self.thresholds),
            last_updated: latest.timestamp,
        })
    }

    /// Average speed over the current window, or `None` if the vehicle has never reported
    pub fn get_performance(&self, vehicle_id: VehicleId) -> Option<PerformanceSummary> {
        self.metrics.performance_queries.inc();

        let snapshot = self.store.snapshot(vehicle_id)?;
        let average_speed = snapshot.average_speed()?;
        Some(PerformanceSummary { vehicle_id, average_speed, sample_count: snapshot.len() })
    }
}
