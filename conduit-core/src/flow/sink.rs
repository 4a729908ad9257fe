use super::callable::PartitionKey;
use super::context::ProcessingContext;
use super::record::Record;
use super::types::FlowFuture;
use crate::error::BoxError;
use std::fmt;

pub type SinkFuture<'a> = FlowFuture<'a, SinkStatus, BoxError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Stream,
    Archival,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Archival => write!(f, "archival"),
        }
    }
}

/// Response of a sink write. Codes in the 2xx range are successes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkStatus {
    pub code: u16,
    pub body: String,
}

impl SinkStatus {
    #[must_use]
    pub fn new(code: u16, body: impl Into<String>) -> Self {
        Self {
            code,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn ok() -> Self {
        Self::new(200, "")
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }
}

/// A partitioned, ordered destination. When no partition key is given the
/// sink applies its own default partitioning.
pub trait StreamSink: Send + Sync {
    fn send<'a>(
        &'a self,
        records: &'a [Record],
        target: &'a str,
        partition_key: Option<&'a dyn PartitionKey>,
        context: &'a ProcessingContext,
    ) -> SinkFuture<'a>;
}

/// A durable destination used for persistence and analytics.
pub trait ArchivalSink: Send + Sync {
    fn send<'a>(&'a self, records: &'a [Record], target: &'a str) -> SinkFuture<'a>;
}
