//! Kafka stream sink

use crate::error::Result;
use crate::types::QueueSinkConfig;
use conduit_core::{PartitionKey, ProcessingContext, Record, SinkFuture, SinkStatus, StreamSink};
use futures::future::join_all;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{debug, error, instrument};

/// Publishes records as JSON messages, one topic per target.
///
/// Records are produced concurrently. When some of them are not acknowledged
/// the sink answers with status 500 and the number of failed records, so the
/// invocation fails as a rejected write.
pub struct KafkaStreamSink {
    producer: FutureProducer,
    config: QueueSinkConfig,
}

impl KafkaStreamSink {
    /// Creates the producer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SinkError::Queue`] when the producer cannot be created.
    pub fn new(config: QueueSinkConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.connection_string)
            .set("message.timeout.ms", config.timeout.as_millis().to_string())
            .create()?;

        Ok(Self { producer, config })
    }

    #[instrument(skip_all, fields(topic = %topic, records = records.len()))]
    async fn produce(
        &self,
        records: &[Record],
        topic: &str,
        partition_key: Option<&dyn PartitionKey>,
        context: &ProcessingContext,
    ) -> Result<SinkStatus> {
        let messages = records
            .iter()
            .map(|record| -> Result<(Option<String>, String)> {
                let key = partition_key
                    .map(|key| key.partition_key(record, context))
                    .transpose()?;
                let payload = serde_json::to_string(record)?;
                Ok((key, payload))
            })
            .collect::<Result<Vec<_>>>()?;

        let deliveries = messages.iter().map(|(key, payload)| {
            let message = FutureRecord::to(topic).payload(payload);
            let message = match key {
                Some(key) => message.key(key),
                None => message,
            };
            self.producer.send(message, self.config.timeout)
        });

        let failures: Vec<String> = join_all(deliveries)
            .await
            .into_iter()
            .filter_map(|delivery| delivery.err().map(|(err, _)| err.to_string()))
            .collect();

        if let Some(first) = failures.first() {
            error!(
                "{} of {} records were not published: {first}",
                failures.len(),
                records.len()
            );
            return Ok(SinkStatus::new(
                500,
                format!("{} failed record(s), first error: {first}", failures.len()),
            ));
        }

        debug!("Published {} records", records.len());
        Ok(SinkStatus::ok())
    }
}

impl StreamSink for KafkaStreamSink {
    fn send<'a>(
        &'a self,
        records: &'a [Record],
        target: &'a str,
        partition_key: Option<&'a dyn PartitionKey>,
        context: &'a ProcessingContext,
    ) -> SinkFuture<'a> {
        Box::pin(async move {
            let topic = self.config.topic(target);
            self.produce(records, &topic, partition_key, context)
                .await
                .map_err(Into::into)
        })
    }
}
