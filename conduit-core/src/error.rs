//! Error types for the conduit engine.

use crate::flow::record::Record;
use crate::flow::sink::SinkKind;
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error used at the seams with user code and external clients.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error raised by a user-supplied filter, mapper, batch mapper or partition key.
#[derive(Error, Debug)]
pub enum CallableError {
    /// A failure attributable to a single record. Isolated by the engine.
    #[error("{kind}: {source}")]
    Record {
        kind: String,
        #[source]
        source: BoxError,
    },

    /// A programming error in user code. Aborts the whole invocation.
    #[error("critical error: {0}")]
    Critical(String),
}

impl CallableError {
    /// Creates a per-record failure of the given kind.
    pub fn record<E>(kind: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Record {
            kind: kind.into(),
            source: source.into(),
        }
    }

    /// Creates a per-record failure carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::record("RecordError", message.into())
    }

    /// Creates the fatal sentinel.
    pub fn critical(message: impl Into<String>) -> Self {
        Self::Critical(message.into())
    }

    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(self, Self::Critical(_))
    }

    /// The error kind recorded in the `_error` annotation.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Record { kind, .. } => kind,
            Self::Critical(_) => "Critical",
        }
    }

    /// The error message without its kind prefix.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Record { source, .. } => source.to_string(),
            Self::Critical(message) => message.clone(),
        }
    }
}

impl From<serde_json::Error> for CallableError {
    fn from(err: serde_json::Error) -> Self {
        Self::record("JsonError", err)
    }
}

/// A single record that failed in one of the pipelines.
#[derive(Debug, Clone)]
pub struct EventError {
    /// Position of the record in the batch the error refers to. Once the
    /// batch processor returns, this is always the raw input index.
    pub index: usize,
    /// The record at the time of failure, annotated with `_error`.
    pub record: Record,
    /// The raw record as it was received, when it could be correlated.
    pub original: Option<Record>,
    pub error: Arc<CallableError>,
    pub trace: Arc<Backtrace>,
}

impl EventError {
    pub(crate) fn new(index: usize, record: Record, error: CallableError) -> Self {
        Self {
            index,
            record,
            original: None,
            error: Arc::new(error),
            trace: Arc::new(Backtrace::capture()),
        }
    }

    /// Re-targets the error at an index of the raw input batch.
    #[must_use]
    pub(crate) fn remap(mut self, index: usize, original: Option<Record>) -> Self {
        self.index = index;
        self.original = original;
        self
    }
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "record #{} failed: {}", self.index, self.error)
    }
}

/// Aggregate of every per-record failure of one invocation, sorted by raw index.
#[derive(Error, Debug, Clone)]
#[error("{} record(s) failed to be processed", .errors.len())]
pub struct ProcessingError {
    pub errors: Vec<EventError>,
}

impl ProcessingError {
    #[must_use]
    pub fn new(mut errors: Vec<EventError>) -> Self {
        errors.sort_by_key(|err| err.index);
        Self { errors }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Raw input indices of the failed records, ascending.
    #[must_use]
    pub fn indices(&self) -> Vec<usize> {
        self.errors.iter().map(|err| err.index).collect()
    }
}

/// Errors raised while delivering records to a sink.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("{sink} sink rejected {records} record(s) for '{target}' with status {status}: {body}")]
    Rejected {
        sink: SinkKind,
        target: String,
        records: usize,
        status: u16,
        body: String,
    },

    #[error("{sink} sink failed to send to '{target}': {source}")]
    Transport {
        sink: SinkKind,
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("no {sink} sink configured for target '{target}'")]
    Unconfigured { sink: SinkKind, target: String },

    #[error("archival pass for '{target}' failed: {source}")]
    Archival {
        target: String,
        #[source]
        source: CallableError,
    },
}

/// Error returned by a batch invocation.
///
/// Every variant except [`ProcessError::Processing`] is fatal: the invocation
/// stopped before (or during) delivery.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("critical error in pipeline '{pipeline}': {reason}")]
    Critical { pipeline: String, reason: String },

    #[error("batch mapper of pipeline '{pipeline}' failed: {source}")]
    BatchMapper {
        pipeline: String,
        #[source]
        source: CallableError,
    },

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

impl ProcessError {
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Processing(_))
    }

    /// The per-record failures, when the run completed with partial success.
    #[must_use]
    pub const fn failures(&self) -> Option<&ProcessingError> {
        match self {
            Self::Processing(failures) => Some(failures),
            _ => None,
        }
    }
}

/// Errors raised while decoding a raw input event into a record batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Envelope(String),

    #[error("record #{index} has an undecodable payload: {reason}")]
    Payload { index: usize, reason: String },

    #[error("source error: {0}")]
    Source(String),
}

/// Errors raised while resolving configuration into runnable pipelines.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown {kind} '{name}'")]
    UnknownCallable { kind: &'static str, name: String },

    #[error("pipeline '{pipeline}' sends to a stream but no stream sink is configured")]
    NoStreamSink { pipeline: String },

    #[error("pipeline '{pipeline}' archives records but no archival sink is configured")]
    NoArchivalSink { pipeline: String },

    #[error("the input pipeline cannot send to a stream, only archive raw records")]
    InputStream,

    #[error("quarantine pipeline has no target stream")]
    NoQuarantineStream,

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors that stop a [`StreamDriver`](crate::composer::StreamDriver).
#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Source(#[from] DecodeError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}
