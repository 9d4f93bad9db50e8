//! Error types for the telematics pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by the pipeline's public operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Reading was rejected before reaching a window
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Ingestion queue refused the item
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline was started twice or used after shutdown
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl PipelineError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// True when the caller may retry after backing off
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::Queue(QueueError::Full))
    }
}

/// Queue-level failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Queue is at capacity (fail-fast policy, or a blocking enqueue timed out)
    #[error("ingestion queue is full")]
    Full,

    /// Queue has been shut down; terminal
    #[error("ingestion queue is closed")]
    Closed,
}

/// Reasons a reading is discarded by the processor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },

    #[error("{field}={value} outside [{min}, {max}]")]
    OutOfRange { field: &'static str, value: f64, min: f64, max: f64 },
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        ValidationError::Malformed(err.to_string())
    }
}
