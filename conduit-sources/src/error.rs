//! Error types for conduit-sources

use conduit_core::DecodeError;
use rdkafka::error::KafkaError;
use thiserror::Error;

/// Errors that can occur when working with sources
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// An IO error occurred
    #[error("IO error: {0}")]
    Io(String),

    /// The Kafka client failed
    #[error("Kafka error: {0}")]
    Kafka(String),
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<KafkaError> for SourceError {
    fn from(err: KafkaError) -> Self {
        Self::Kafka(err.to_string())
    }
}

impl From<SourceError> for DecodeError {
    fn from(err: SourceError) -> Self {
        Self::Source(err.to_string())
    }
}

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;
