//! Kafka batch source

use crate::envelope::decode_payload;
use crate::error::Result;
use conduit_core::{
    BatchAck, BatchSource, DecodeError, DecodedBatch, FlowFuture, Record, SourceOutput,
};
use rdkafka::{
    consumer::{CommitMode, Consumer, StreamConsumer},
    ClientConfig, Message, Offset, TopicPartitionList,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Configuration for Kafka source
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Bootstrap servers (comma-separated list)
    pub bootstrap_servers: String,
    /// Topic to consume from
    pub topic: String,
    /// Consumer group ID
    pub group_id: String,
    /// Auto offset reset (earliest/latest)
    pub auto_offset_reset: String,
    /// Session timeout (in milliseconds)
    pub session_timeout_ms: u64,
    /// Maximum number of messages gathered before batches are emitted
    pub batch_size: usize,
    /// Maximum time spent gathering one round of batches
    pub batch_window: Duration,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            topic: "default-topic".to_string(),
            group_id: "conduit-consumer".to_string(),
            auto_offset_reset: "earliest".to_string(),
            session_timeout_ms: 6000,
            batch_size: 500,
            batch_window: Duration::from_secs(1),
        }
    }
}

/// Offsets waiting for the acknowledgement of their batch, per partition id.
type PendingOffsets = Arc<Mutex<HashMap<String, VecDeque<(String, i32, i64)>>>>;

/// A source that reads JSON messages from Kafka and emits one batch per
/// topic partition.
///
/// Offsets are committed only when the batch that contains them is
/// acknowledged with [`BatchAck::Committed`]. Once a batch of a partition is
/// rejected, that partition is not committed again until the source is
/// recreated.
pub struct KafkaBatchSource {
    consumer: Arc<StreamConsumer>,
    batch_size: usize,
    batch_window: Duration,
}

impl KafkaBatchSource {
    /// Create a new Kafka source with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * Failed to create Kafka consumer
    /// * Failed to subscribe to topic
    /// * Invalid configuration parameters
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", &config.group_id)
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", config.session_timeout_ms.to_string())
            .create()?;

        consumer.subscribe(&[&config.topic])?;

        Ok(Self {
            consumer: Arc::new(consumer),
            batch_size: config.batch_size.max(1),
            batch_window: config.batch_window,
        })
    }

    /// Set how long a round of batches is gathered
    #[must_use]
    pub const fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window = window;
        self
    }
}

/// Records gathered for one topic partition.
struct Pending {
    topic: String,
    partition: i32,
    last_offset: i64,
    records: Vec<Record>,
}

fn partition_id(topic: &str, partition: i32) -> String {
    format!("{topic}-{partition}")
}

async fn gather(
    consumer: &StreamConsumer,
    batch_size: usize,
    window: Duration,
) -> std::result::Result<BTreeMap<String, Pending>, DecodeError> {
    let mut gathered: BTreeMap<String, Pending> = BTreeMap::new();
    let mut count = 0;
    let deadline = tokio::time::Instant::now() + window;

    while count < batch_size {
        let message = match tokio::time::timeout_at(deadline, consumer.recv()).await {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => return Err(DecodeError::Source(e.to_string())),
            Err(_) => break,
        };

        let id = partition_id(message.topic(), message.partition());
        let pending = gathered.entry(id).or_insert_with(|| Pending {
            topic: message.topic().to_string(),
            partition: message.partition(),
            last_offset: message.offset(),
            records: Vec::new(),
        });
        let payload = message.payload().unwrap_or_default();
        let record = decode_payload(pending.records.len(), payload)?;
        pending.records.push(record);
        pending.last_offset = message.offset();
        count += 1;
    }
    Ok(gathered)
}

fn commit(consumer: &StreamConsumer, topic: &str, partition: i32, offset: i64) {
    let mut offsets = TopicPartitionList::new();
    if let Err(e) = offsets.add_partition_offset(topic, partition, Offset::Offset(offset + 1)) {
        error!("Invalid offset {offset} for {topic}-{partition}: {e}");
        return;
    }
    match consumer.commit(&offsets, CommitMode::Async) {
        Ok(()) => debug!("Committed {topic}-{partition} up to offset {offset}"),
        Err(e) => error!("Failed to commit offsets: {}", e),
    }
}

impl BatchSource for KafkaBatchSource {
    fn stream(&self) -> FlowFuture<'_, SourceOutput, DecodeError> {
        let (source_tx, source_rx) = flume::bounded(16);
        let (feedback_tx, feedback_rx) = flume::unbounded::<BatchAck>();
        let pending: PendingOffsets = Arc::default();

        // Spawn a task to gather messages into per-partition batches
        let consumer = Arc::clone(&self.consumer);
        let offsets = Arc::clone(&pending);
        let (batch_size, window) = (self.batch_size, self.batch_window);
        tokio::spawn(async move {
            loop {
                let batches = match gather(&consumer, batch_size, window).await {
                    Ok(batches) => batches,
                    Err(e) => {
                        if source_tx.send_async(Err(e)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                for (id, batch) in batches {
                    offsets
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entry(id.clone())
                        .or_default()
                        .push_back((batch.topic, batch.partition, batch.last_offset));
                    let decoded = DecodedBatch::new(batch.records, id);
                    if source_tx.send_async(Ok(decoded)).await.is_err() {
                        return;
                    }
                }
            }
        });

        // Spawn a task to handle feedback and commit offsets
        // A rejected batch must be read again, so its partition is never
        // committed past it.
        let consumer = Arc::clone(&self.consumer);
        tokio::spawn(async move {
            let mut blocked = HashSet::new();
            while let Ok(ack) = feedback_rx.recv_async().await {
                let (id, committed) = match &ack {
                    BatchAck::Committed { partition_id, .. } => (partition_id, true),
                    BatchAck::Rejected { partition_id, reason } => {
                        warn!("Batch of {partition_id} rejected, offsets not committed: {reason}");
                        blocked.insert(partition_id.clone());
                        (partition_id, false)
                    }
                };
                let next = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get_mut(id)
                    .and_then(VecDeque::pop_front);
                if blocked.contains(id) {
                    continue;
                }
                if let (true, Some((topic, partition, offset))) = (committed, next) {
                    commit(&consumer, &topic, partition, offset);
                }
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
