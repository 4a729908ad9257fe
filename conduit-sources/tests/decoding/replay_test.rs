use crate::helpers::{acks, envelope, init_tracing};
use conduit_core::{
    BatchAck, BatchProcessor, CallableError, DriverError, MapperFn, PipelineSpec,
    ProcessingContext, QuarantineRouter, Record, StreamDriver, ERROR_FIELD,
};
use conduit_sinks::MemoryStreamSink;
use conduit_sources::{ReplaySource, StreamEventDecoder};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;

#[cfg(test)]
mod replay_tests {
    use super::*;

    #[tokio::test]
    async fn it_should_drive_decoded_events_to_sinks() {
        // Given
        init_tracing();
        let sink = MemoryStreamSink::new();
        let processor = BatchProcessor::builder()
            .output(PipelineSpec::new().stream("out"))
            .stream_sink(Arc::new(sink.clone()))
            .build()
            .unwrap();
        let source = ReplaySource::new(
            StreamEventDecoder::new().with_received_at("received_at"),
            vec![
                envelope("shardId-000000000000", &[json!({"id": 1}), json!({"id": 2})]),
                envelope("shardId-000000000001", &[json!({"id": 3})]),
            ],
        );
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        // When
        let report = StreamDriver::new(Arc::new(processor))
            .run(&source, shutdown_rx)
            .await
            .unwrap();

        // Then
        assert_eq!(report.batches, 2);
        assert_eq!(report.records, 3);
        let delivered = sink.records("out");
        assert_eq!(delivered.len(), 3);
        assert!(delivered.iter().all(|r| r.contains_key("received_at")));
        let acks = acks(&source, 2).await;
        assert_eq!(
            acks,
            vec![
                BatchAck::Committed {
                    partition_id: "shardId-000000000000".to_string(),
                    records: 2,
                },
                BatchAck::Committed {
                    partition_id: "shardId-000000000001".to_string(),
                    records: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn it_should_quarantine_raw_record_of_failed_event() {
        // Given
        let sink = MemoryStreamSink::new();
        let processor = BatchProcessor::builder()
            .output(
                PipelineSpec::new()
                    .mapper(MapperFn::new(
                        |record: Record, _: &ProcessingContext| {
                            if record.contains_key("broken") {
                                Err(CallableError::message("broken record"))
                            } else {
                                Ok(record.into())
                            }
                        },
                    ))
                    .stream("out"),
            )
            .stream_sink(Arc::new(sink.clone()))
            .build()
            .unwrap();
        let quarantine =
            QuarantineRouter::new(PipelineSpec::new().stream("errors"), Arc::new(sink.clone()))
                .unwrap();
        let source = ReplaySource::new(
            StreamEventDecoder::new(),
            vec![envelope(
                "shardId-000000000000",
                &[json!({"id": 1}), json!({"id": 2, "broken": true})],
            )],
        );
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        // When
        let report = StreamDriver::new(Arc::new(processor))
            .with_quarantine(quarantine)
            .run(&source, shutdown_rx)
            .await
            .unwrap();

        // Then
        assert_eq!(report.quarantined, 1);
        assert_eq!(sink.records("out").len(), 1);
        let errors = sink.records("errors");
        assert_eq!(errors[0]["id"], json!(2));
        assert_eq!(errors[0][ERROR_FIELD]["message"], json!("broken record"));
    }

    #[tokio::test]
    async fn it_should_stop_on_undecodable_event() {
        // Given
        let processor = BatchProcessor::builder().build().unwrap();
        let source = ReplaySource::new(StreamEventDecoder::new(), vec![b"not json".to_vec()]);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        // When
        let result = StreamDriver::new(Arc::new(processor))
            .run(&source, shutdown_rx)
            .await;

        // Then
        assert!(matches!(result, Err(DriverError::Source(_))));
    }
}
