//! Conduit Sources
//!
//! This crate provides record batch decoders and batch sources that feed a
//! `conduit-core` stream driver.

#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod kafka;
pub mod replay;

pub use envelope::{decode_payload, StreamEventDecoder};
pub use error::SourceError;
pub use kafka::{KafkaBatchSource, KafkaConfig};
pub use replay::ReplaySource;
