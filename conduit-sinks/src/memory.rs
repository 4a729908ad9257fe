//! In-memory sinks that keep every write for inspection

use conduit_core::{
    ArchivalSink, PartitionKey, ProcessingContext, Record, SinkFuture, SinkStatus, StreamSink,
};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// One write received by a memory sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SentBatch {
    /// Stream or archive target the records were sent to
    pub target: String,
    /// The records, in send order
    pub records: Vec<Record>,
    /// Partition key of each record, when the stream pipeline defines one
    pub keys: Vec<Option<String>>,
}

/// Shared, cloneable store of writes.
#[derive(Debug, Clone, Default)]
struct Store(Arc<Mutex<Vec<SentBatch>>>);

impl Store {
    fn push(&self, batch: SentBatch) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch);
    }

    fn batches(&self) -> Vec<SentBatch> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A stream sink that keeps every write in memory.
///
/// Clones share the same store, so a clone handed to the processor can be
/// inspected through the original.
#[derive(Debug, Clone, Default)]
pub struct MemoryStreamSink {
    store: Store,
}

impl MemoryStreamSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write received so far.
    #[must_use]
    pub fn batches(&self) -> Vec<SentBatch> {
        self.store.batches()
    }

    /// Every record sent to `target`, across writes.
    #[must_use]
    pub fn records(&self, target: &str) -> Vec<Record> {
        records_for(&self.store, target)
    }
}

impl StreamSink for MemoryStreamSink {
    fn send<'a>(
        &'a self,
        records: &'a [Record],
        target: &'a str,
        partition_key: Option<&'a dyn PartitionKey>,
        context: &'a ProcessingContext,
    ) -> SinkFuture<'a> {
        Box::pin(async move {
            let keys = records
                .iter()
                .map(|record| {
                    partition_key
                        .map(|key| key.partition_key(record, context))
                        .transpose()
                })
                .collect::<Result<Vec<_>, _>>()?;
            debug!("Keeping {} records for stream '{target}'", records.len());
            self.store.push(SentBatch {
                target: target.to_string(),
                records: records.to_vec(),
                keys,
            });
            Ok(SinkStatus::ok())
        })
    }
}

/// An archival sink that keeps every write in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchivalSink {
    store: Store,
}

impl MemoryArchivalSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write received so far.
    #[must_use]
    pub fn batches(&self) -> Vec<SentBatch> {
        self.store.batches()
    }

    /// Every record archived to `target`, across writes.
    #[must_use]
    pub fn records(&self, target: &str) -> Vec<Record> {
        records_for(&self.store, target)
    }
}

impl ArchivalSink for MemoryArchivalSink {
    fn send<'a>(&'a self, records: &'a [Record], target: &'a str) -> SinkFuture<'a> {
        Box::pin(async move {
            debug!("Keeping {} records for archive '{target}'", records.len());
            self.store.push(SentBatch {
                target: target.to_string(),
                records: records.to_vec(),
                keys: Vec::new(),
            });
            Ok(SinkStatus::ok())
        })
    }
}

fn records_for(store: &Store, target: &str) -> Vec<Record> {
    store
        .batches()
        .into_iter()
        .filter(|batch| batch.target == target)
        .flat_map(|batch| batch.records)
        .collect()
}
