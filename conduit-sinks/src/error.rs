//! Error types for conduit-sinks

use conduit_core::CallableError;
use rdkafka::error::KafkaError;
use thiserror::Error;

/// Errors that can occur when working with sinks
#[derive(Error, Debug, Clone)]
pub enum SinkError {
    /// An IO error occurred
    #[error("IO error: {0}")]
    Io(String),

    /// A record could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A queue error occurred
    #[error("Queue error: {0}")]
    Queue(String),

    /// The partition key of a record could not be computed
    #[error("Partition key error: {0}")]
    PartitionKey(String),
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<KafkaError> for SinkError {
    fn from(err: KafkaError) -> Self {
        Self::Queue(err.to_string())
    }
}

impl From<CallableError> for SinkError {
    fn from(err: CallableError) -> Self {
        Self::PartitionKey(err.to_string())
    }
}

/// Result type for sink operations
pub type Result<T> = std::result::Result<T, SinkError>;
