//! Service configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use telematics_pipeline::PipelineConfig;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "TELEMATICS_CONFIG";

/// Prefix for per-key environment overrides, e.g. `TELEMATICS_PIPELINE__QUEUE__CAPACITY`
pub const ENV_PREFIX: &str = "TELEMATICS";

/// Main service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Pipeline configuration
    pub pipeline: PipelineConfig,

    /// Service-level settings
    pub service: ServiceSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// How often pipeline metrics are logged, in seconds
    pub report_interval_secs: u64,

    /// How many tracked vehicles are sampled in each report
    pub report_sample_vehicles: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self { report_interval_secs: 5, report_sample_vehicles: 3 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl ServiceSettings {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

/// Load configuration from the optional file named by `TELEMATICS_CONFIG`, then
/// environment overrides
pub fn load_config() -> Result<ServiceConfig> {
    let file = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
    load_config_from(file.as_deref())
}

/// Load configuration from `file` (if given) layered under environment overrides
pub fn load_config_from(file: Option<&Path>) -> Result<ServiceConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = file {
        tracing::debug!("Loading configuration from file: {:?}", path);
        builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config: ServiceConfig = builder
        .build()
        .context("Failed to read configuration sources")?
        .try_deserialize()
        .context("Failed to deserialize service configuration")?;

    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
pub fn validate_config(config: &ServiceConfig) -> Result<()> {
    config.pipeline.validate().context("Invalid pipeline configuration")?;

    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow::anyhow!("Invalid log level: {}", config.logging.level)),
    }

    match config.logging.format.as_str() {
        "json" | "pretty" => {}
        _ => return Err(anyhow::anyhow!("Invalid log format: {}", config.logging.format)),
    }

    if config.service.report_interval_secs == 0 {
        return Err(anyhow::anyhow!("report_interval_secs must be greater than zero"));
    }

    Ok(())
}
