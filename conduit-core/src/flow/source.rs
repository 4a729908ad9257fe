use super::record::Record;
use super::types::FlowFuture;
use crate::error::DecodeError;
use flume::{Receiver, Sender};

/// An ordered batch of decoded records read from one source partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBatch {
    pub records: Vec<Record>,
    pub partition_id: String,
}

impl DecodedBatch {
    #[must_use]
    pub fn new(records: Vec<Record>, partition_id: impl Into<String>) -> Self {
        Self {
            records,
            partition_id: partition_id.into(),
        }
    }
}

/// Turns a raw input event into a decoded batch.
pub trait RecordBatchDecoder: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<DecodedBatch, DecodeError>;
}

/// Outcome of a batch reported back to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchAck {
    /// The batch is done with, offsets may be committed.
    Committed { partition_id: String, records: usize },
    /// The batch must be read again.
    Rejected { partition_id: String, reason: String },
}

pub struct SourceOutput {
    pub receiver: Receiver<Result<DecodedBatch, DecodeError>>,
    pub feedback: Sender<BatchAck>,
}

pub trait BatchSource: Send + Sync {
    fn stream(&self) -> FlowFuture<'_, SourceOutput, DecodeError>;
}
