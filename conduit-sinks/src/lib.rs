//! Conduit Sinks
//!
//! This crate provides ready-made stream and archival sinks that can be
//! plugged into a `conduit-core` batch processor.

#![warn(missing_docs)]

pub mod error;
pub mod file;
pub mod kafka;
pub mod memory;
pub mod types;

pub use error::SinkError;
pub use file::FileArchivalSink;
pub use kafka::KafkaStreamSink;
pub use memory::{MemoryArchivalSink, MemoryStreamSink, SentBatch};
pub use types::{FileSinkConfig, QueueSinkConfig};
