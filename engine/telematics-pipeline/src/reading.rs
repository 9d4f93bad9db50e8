//! Telemetry reading model and ingest-time validation

use crate::config::ValidationConfig;
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Vehicle identifier
pub type VehicleId = u32;

/// One timestamped telemetry sample from a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub vehicle_id: VehicleId,
    /// km/h
    pub speed: f64,
    /// Percent of tank capacity
    pub fuel_level: f64,
    /// Degrees Celsius
    pub engine_temp: f64,
    /// Serialized as RFC 3339; decoded from RFC 3339 or epoch seconds
    #[serde(deserialize_with = "timestamp_format::deserialize")]
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(
        vehicle_id: VehicleId,
        speed: f64,
        fuel_level: f64,
        engine_temp: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { vehicle_id, speed, fuel_level, engine_temp, timestamp }
    }

    /// Decode a JSON-encoded reading
    pub fn decode(payload: &str) -> Result<Self, ValidationError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Encode as JSON, the shape external producers put on the queue
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Range-check every measured field against `limits`
    pub fn validate(&self, limits: &ValidationConfig) -> Result<(), ValidationError> {
        check_field("speed", self.speed, limits.speed_min, limits.speed_max)?;
        check_field("fuel_level", self.fuel_level, limits.fuel_level_min, limits.fuel_level_max)?;
        check_field(
            "engine_temp",
            self.engine_temp,
            limits.engine_temp_min,
            limits.engine_temp_max,
        )?;
        Ok(())
    }
}

fn check_field(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite { field });
    }
    if value < min || value > max {
        return Err(ValidationError::OutOfRange { field, value, min, max });
    }
    Ok(())
}

mod timestamp_format {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Rfc3339(String),
        EpochSeconds(f64),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Rfc3339(text) => DateTime::parse_from_rfc3339(&text)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(D::Error::custom),
            RawTimestamp::EpochSeconds(secs) => from_epoch_seconds(secs).ok_or_else(|| {
                D::Error::custom(format!("epoch timestamp out of range: {secs}"))
            }),
        }
    }

    /// Whole seconds plus rounded nanoseconds; `None` outside chrono's range
    pub(super) fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
        // Beyond this f64 cannot hold sub-second precision and chrono rejects it anyway.
        if !secs.is_finite() || secs.abs() >= 1e15 {
            return None;
        }

        let mut whole = secs.floor() as i64;
        let mut nanos = ((secs - secs.floor()) * 1e9).round() as u32;
        if nanos >= 1_000_000_000 {
            whole += 1;
            nanos = 0;
        }
        Utc.timestamp_opt(whole, nanos).single()
    }
}

/// Item carried by the ingestion queue
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Already-typed reading from an in-process producer
    Reading(Reading),
    /// JSON payload still to be decoded by the processor
    Encoded(String),
}

impl Envelope {
    /// Decode and validate into a reading the processor can append
    pub fn into_reading(self, limits: &ValidationConfig) -> Result<Reading, ValidationError> {
        let reading = match self {
            Envelope::Reading(reading) => reading,
            Envelope::Encoded(payload) => Reading::decode(&payload)?,
        };
        reading.validate(limits)?;
        Ok(reading)
    }
}

impl From<Reading> for Envelope {
    fn from(reading: Reading) -> Self {
        Envelope::Reading(reading)
    }
}
