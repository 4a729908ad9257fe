//! Replays raw events through a decoder

use conduit_core::{
    BatchAck, BatchSource, DecodeError, FlowFuture, RecordBatchDecoder, SourceOutput,
};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// A source that decodes a fixed list of raw events, one batch per event.
///
/// Acknowledgements are kept and can be read back with [`ReplaySource::acks`].
pub struct ReplaySource<D> {
    decoder: D,
    events: Vec<Vec<u8>>,
    acks: Arc<Mutex<Vec<BatchAck>>>,
}

impl<D: RecordBatchDecoder> ReplaySource<D> {
    /// Creates a source over in-memory events.
    #[must_use]
    pub fn new(decoder: D, events: Vec<Vec<u8>>) -> Self {
        Self {
            decoder,
            events,
            acks: Arc::default(),
        }
    }

    /// Reads one event per file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SourceError::Io`] when a file cannot be read.
    pub fn from_files<P: AsRef<Path>>(
        decoder: D,
        paths: impl IntoIterator<Item = P>,
    ) -> crate::error::Result<Self> {
        let events = paths
            .into_iter()
            .map(std::fs::read)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(decoder, events))
    }

    /// Acknowledgements received so far.
    #[must_use]
    pub fn acks(&self) -> Vec<BatchAck> {
        self.acks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<D: RecordBatchDecoder> BatchSource for ReplaySource<D> {
    fn stream(&self) -> FlowFuture<'_, SourceOutput, DecodeError> {
        let (source_tx, source_rx) = flume::unbounded();
        let (feedback_tx, feedback_rx) = flume::unbounded::<BatchAck>();

        for raw in &self.events {
            // The receiver is still held here, sending cannot fail.
            let _ = source_tx.send(self.decoder.decode(raw));
        }
        info!("Replaying {} events", self.events.len());

        let acks = Arc::clone(&self.acks);
        tokio::spawn(async move {
            while let Ok(ack) = feedback_rx.recv_async().await {
                if let BatchAck::Rejected { partition_id, reason } = &ack {
                    warn!("Batch of {partition_id} rejected: {reason}");
                }
                acks.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(ack);
            }
        });

        Box::pin(async move {
            Ok(SourceOutput {
                receiver: source_rx,
                feedback: feedback_tx,
            })
        })
    }
}
