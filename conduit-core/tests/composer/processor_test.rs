use crate::helpers::{
    batch, index_of, init_tracing, sample_records, EventLog, RecordingArchivalSink,
    RecordingStreamSink,
};
use conduit_core::{
    ArchiveTarget, BatchMapperFn, BatchProcessor, CallableError, ConfigError, DecodedBatch, FanOutMode, Filter, FilterFn,
    InvocationMetadata, JsonMapper, MapOutput, Mapper, MapperFn, PartitionKeyFn, PipelineSpec,
    ProcessError, ProcessingContext, Record, ERROR_FIELD,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(test)]
mod processor_tests {
    use super::*;

    fn all() -> impl Filter {
        FilterFn::new(|_: &Record, _: &ProcessingContext| Ok(true))
    }

    fn none() -> impl Filter {
        FilterFn::new(|_: &Record, _: &ProcessingContext| Ok(false))
    }

    fn dupper() -> impl Mapper {
        MapperFn::new(|record: Record, _: &ProcessingContext| {
            Ok(MapOutput::Many(vec![record.clone(), record]))
        })
    }

    fn failing_on(index: u64) -> impl Mapper {
        MapperFn::new(move |record: Record, _: &ProcessingContext| {
            if index_of(&record) == index {
                Err(CallableError::record("OutOfOrderError", "Event out of order"))
            } else {
                Ok(record.into())
            }
        })
    }

    #[tokio::test]
    async fn it_should_return_input_unchanged_through_identity_pipelines() {
        // Given
        init_tracing();
        let processor = BatchProcessor::builder()
            .input(PipelineSpec::new())
            .output(PipelineSpec::new())
            .build()
            .unwrap();

        // When
        let outputs = processor
            .process(batch(5), InvocationMetadata::default())
            .await
            .unwrap();

        // Then
        assert_eq!(outputs, vec![sample_records(5)]);
    }

    #[tokio::test]
    async fn it_should_return_no_outputs_without_output_pipelines() {
        // Given
        let processor = BatchProcessor::builder().build().unwrap();

        // When
        let outputs = processor
            .process(batch(2), InvocationMetadata::default())
            .await
            .unwrap();

        // Then
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn it_should_handle_empty_batch() {
        // Given
        let sink = Arc::new(RecordingStreamSink::default());
        let processor = BatchProcessor::builder()
            .output(PipelineSpec::new().stream("out"))
            .stream_sink(sink.clone())
            .build()
            .unwrap();

        // When
        let outputs = processor
            .process(DecodedBatch::new(Vec::new(), "shard-0"), InvocationMetadata::default())
            .await
            .unwrap();

        // Then
        assert_eq!(outputs, vec![Vec::<Record>::new()]);
        assert_eq!(sink.calls(), 0);
    }

    #[tokio::test]
    async fn it_should_duplicate_only_accepted_record() {
        // Given
        let sink = Arc::new(RecordingStreamSink::default());
        let processor = BatchProcessor::builder()
            .output(
                PipelineSpec::new()
                    .filter(FilterFn::new(|record: &Record, _: &ProcessingContext| {
                        Ok(index_of(record) == 0)
                    }))
                    .mapper(dupper())
                    .stream("out"),
            )
            .stream_sink(sink.clone())
            .build()
            .unwrap();

        // When
        let outputs = processor
            .process(batch(2), InvocationMetadata::default())
            .await
            .unwrap();

        // Then
        assert_eq!(outputs[0].len(), 2);
        assert!(outputs[0].iter().all(|record| index_of(record) == 0));
        assert_eq!(sink.calls(), 1);
        assert_eq!(sink.delivered(), 2);
    }

    #[tokio::test]
    async fn it_should_never_map_records_rejected_by_input_filter() {
        // Given
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sink = Arc::new(RecordingStreamSink::default());
        let processor = BatchProcessor::builder()
            .input(
                PipelineSpec::new()
                    .filter(none())
                    .mapper(MapperFn::new(move |record: Record, _: &ProcessingContext| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(record.into())
                    })),
            )
            .output(PipelineSpec::new().filter(all()).stream("out"))
            .stream_sink(sink.clone())
            .build()
            .unwrap();

        // When
        let outputs = processor
            .process(batch(3), InvocationMetadata::default())
            .await
            .unwrap();

        // Then
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(outputs, vec![Vec::<Record>::new()]);
        assert_eq!(sink.calls(), 0);
    }

    #[tokio::test]
    async fn it_should_report_input_failure_and_forward_the_rest() {
        // Given
        let sink = Arc::new(RecordingStreamSink::default());
        let processor = BatchProcessor::builder()
            .input(PipelineSpec::new().mapper(failing_on(0)))
            .output(PipelineSpec::new().stream("out"))
            .output(PipelineSpec::new().stream("copy"))
            .stream_sink(sink.clone())
            .build()
            .unwrap();

        // When
        let result = processor
            .process(batch(2), InvocationMetadata::default())
            .await;

        // Then
        let err = result.unwrap_err();
        assert!(!err.is_fatal());
        let failures = err.failures().unwrap();
        assert_eq!(failures.indices(), vec![0]);
        assert_eq!(failures.errors[0].original.as_ref(), Some(&sample_records(2)[0]));
        assert_eq!(
            failures.errors[0].record[ERROR_FIELD]["type"],
            json!("OutOfOrderError")
        );

        let deliveries = sink.deliveries();
        assert_eq!(deliveries.len(), 2);
        for delivery in deliveries {
            assert_eq!(delivery.records.len(), 1);
            assert_eq!(index_of(&delivery.records[0]), 1);
        }
    }

    #[tokio::test]
    async fn it_should_report_record_failing_in_two_outputs_once() {
        // Given
        let processor = BatchProcessor::builder()
            .output(PipelineSpec::new().mapper(failing_on(1)))
            .output(PipelineSpec::new().mapper(failing_on(1)))
            .build()
            .unwrap();

        // When
        let err = processor
            .process(batch(3), InvocationMetadata::default())
            .await
            .unwrap_err();

        // Then
        assert_eq!(err.failures().unwrap().indices(), vec![1]);
    }

    #[tokio::test]
    async fn it_should_remap_output_failures_to_raw_indices() {
        // Given
        // The input drops raw record 0 and fails on raw record 1.
        let processor = BatchProcessor::builder()
            .input(
                PipelineSpec::new()
                    .filter(FilterFn::new(|record: &Record, _: &ProcessingContext| {
                        Ok(index_of(record) != 0)
                    }))
                    .mapper(failing_on(1)),
            )
            .output(PipelineSpec::new().mapper(failing_on(3)))
            .fan_out(FanOutMode::Parallel)
            .build()
            .unwrap();

        // When
        let err = processor
            .process(batch(4), InvocationMetadata::default())
            .await
            .unwrap_err();

        // Then
        let failures = err.failures().unwrap();
        assert_eq!(failures.indices(), vec![1, 3]);
        assert_eq!(failures.errors[1].original.as_ref(), Some(&sample_records(4)[3]));
    }

    #[tokio::test]
    async fn it_should_skip_delivery_for_empty_output() {
        // Given
        let sink = Arc::new(RecordingStreamSink::default());
        let processor = BatchProcessor::builder()
            .output(PipelineSpec::new().filter(none()).stream("a"))
            .output(PipelineSpec::new().filter(all()).stream("b"))
            .stream_sink(sink.clone())
            .build()
            .unwrap();

        // When
        let outputs = processor
            .process(batch(3), InvocationMetadata::default())
            .await
            .unwrap();

        // Then
        assert!(outputs[0].is_empty());
        assert_eq!(outputs[1].len(), 3);
        let deliveries = sink.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].target, "b");
        assert_eq!(deliveries[0].records.len(), 3);
    }

    #[tokio::test]
    async fn it_should_abort_before_delivery_on_malformed_mapper_output() {
        // Given
        let sink = Arc::new(RecordingStreamSink::default());
        let processor = BatchProcessor::builder()
            .output(PipelineSpec::new().stream("first"))
            .output(PipelineSpec::new().mapper(JsonMapper::new(
                |_: Record, _: &ProcessingContext| Ok(Value::String("Hi there!".to_string())),
            )))
            .stream_sink(sink.clone())
            .build()
            .unwrap();

        // When
        let result = processor
            .process(batch(2), InvocationMetadata::default())
            .await;

        // Then
        assert!(matches!(result, Err(ProcessError::Critical { ref pipeline, .. }) if pipeline == "output 1"));
        assert_eq!(sink.calls(), 0);
    }

    #[tokio::test]
    async fn it_should_abort_when_input_mapper_expands_records() {
        // Given
        let processor = BatchProcessor::builder()
            .input(PipelineSpec::new().mapper(dupper()))
            .output(PipelineSpec::new())
            .build()
            .unwrap();

        // When
        let result = processor
            .process(batch(2), InvocationMetadata::default())
            .await;

        // Then
        let err = result.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ProcessError::Critical { .. }));
    }

    #[tokio::test]
    async fn it_should_abort_on_critical_sentinel_from_filter() {
        // Given
        let processor = BatchProcessor::builder()
            .output(PipelineSpec::new().filter(FilterFn::new(
                |_: &Record, _: &ProcessingContext| Err(CallableError::critical("bad config")),
            )))
            .build()
            .unwrap();

        // When
        let result = processor
            .process(batch(1), InvocationMetadata::default())
            .await;

        // Then
        assert!(matches!(
            result,
            Err(ProcessError::Critical { ref reason, .. }) if reason == "bad config"
        ));
    }

    #[tokio::test]
    async fn it_should_deliver_only_after_all_outputs_are_produced() {
        // Given
        let log = EventLog::default();
        let sink = Arc::new(RecordingStreamSink::with_log(log.clone()));
        let tracer = |name: &'static str, log: EventLog| {
            MapperFn::new(move |record: Record, _: &ProcessingContext| {
                log.push(format!("map:{name}"));
                Ok(record.into())
            })
        };
        let processor = BatchProcessor::builder()
            .output(PipelineSpec::new().mapper(tracer("a", log.clone())).stream("a"))
            .output(PipelineSpec::new().mapper(tracer("b", log.clone())).stream("b"))
            .stream_sink(sink)
            .build()
            .unwrap();

        // When
        processor
            .process(batch(2), InvocationMetadata::default())
            .await
            .unwrap();

        // Then
        let entries = log.entries();
        let first_send = entries.iter().position(|e| e.starts_with("send:")).unwrap();
        let last_map = entries.iter().rposition(|e| e.starts_with("map:")).unwrap();
        assert!(last_map < first_send);
        assert_eq!(&entries[first_send..], ["send:a", "send:b"]);
    }

    #[tokio::test]
    async fn it_should_archive_raw_records_even_when_input_fails_everything() {
        // Given
        let archive = Arc::new(RecordingArchivalSink::default());
        let processor = BatchProcessor::builder()
            .input(
                PipelineSpec::new()
                    .mapper(MapperFn::new(|_: Record, _: &ProcessingContext| {
                        Err(CallableError::message("always fails"))
                    }))
                    .archive(ArchiveTarget::new("raw")),
            )
            .output(PipelineSpec::new())
            .archival_sink(archive.clone())
            .build()
            .unwrap();

        // When
        let err = processor
            .process(batch(3), InvocationMetadata::default())
            .await
            .unwrap_err();

        // Then
        assert_eq!(err.failures().unwrap().indices(), vec![0, 1, 2]);
        let deliveries = archive.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].target, "raw");
        assert_eq!(deliveries[0].records, sample_records(3));
    }

    #[tokio::test]
    async fn it_should_apply_archive_local_filter_and_mapper() {
        // Given
        let archive = Arc::new(RecordingArchivalSink::default());
        let target = ArchiveTarget::new("analytics")
            .filter(FilterFn::new(|record: &Record, _: &ProcessingContext| {
                Ok(index_of(record) % 2 == 0)
            }))
            .mapper(MapperFn::new(|mut record: Record, _: &ProcessingContext| {
                record.remove("user_agent");
                Ok(record.into())
            }));
        let processor = BatchProcessor::builder()
            .output(PipelineSpec::new().archive(target))
            .archival_sink(archive.clone())
            .build()
            .unwrap();

        // When
        let outputs = processor
            .process(batch(4), InvocationMetadata::default())
            .await
            .unwrap();

        // Then
        assert!(outputs[0].iter().all(|r| r.contains_key("user_agent")));
        let deliveries = archive.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].records.len(), 2);
        assert!(deliveries[0].records.iter().all(|r| !r.contains_key("user_agent")));
    }

    #[tokio::test]
    async fn it_should_pass_partition_key_and_context_to_stream_sink() {
        // Given
        let sink = Arc::new(RecordingStreamSink::default());
        let processor = BatchProcessor::builder()
            .output(
                PipelineSpec::new()
                    .partition_key(PartitionKeyFn::new(
                        |record: &Record, context: &ProcessingContext| {
                            let id = record["id"].as_str().unwrap_or_default();
                            Ok(format!("{}:{id}", context.partition_id()))
                        },
                    ))
                    .stream("out"),
            )
            .stream_sink(sink.clone())
            .build()
            .unwrap();

        // When
        processor
            .process(batch(2), InvocationMetadata::default())
            .await
            .unwrap();

        // Then
        let keys = sink.deliveries()[0].keys.clone();
        assert_eq!(
            keys,
            vec![
                Some("shardId-000000000000:id-0".to_string()),
                Some("shardId-000000000000:id-1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn it_should_fail_on_rejected_sink_write() {
        // Given
        let sink = Arc::new(RecordingStreamSink::rejecting(500));
        let processor = BatchProcessor::builder()
            .output(PipelineSpec::new().stream("out"))
            .stream_sink(sink)
            .build()
            .unwrap();

        // When
        let result = processor
            .process(batch(1), InvocationMetadata::default())
            .await;

        // Then
        let err = result.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ProcessError::Delivery(_)));
        assert!(err.to_string().contains("status 500"));
    }

    #[tokio::test]
    async fn it_should_error_when_stream_sink_not_set() {
        // Given
        let builder = BatchProcessor::builder().output(PipelineSpec::new().stream("out"));

        // When
        let result = builder.build();

        // Then
        assert!(result.is_err());
        assert_eq!(
            result.err().unwrap().to_string(),
            "pipeline 'output 0' sends to a stream but no stream sink is configured"
        );
    }

    #[tokio::test]
    async fn it_should_not_attach_raw_record_after_input_batch_mapper() {
        // Given
        // The batch mapper drops raw record 1, so the failing record 2 sits
        // at position 1 of the mapped list.
        let processor = BatchProcessor::builder()
            .input(
                PipelineSpec::new()
                    .batch_mapper(BatchMapperFn::new(
                        |records: Vec<Record>, _: &ProcessingContext| {
                            Ok(records
                                .into_iter()
                                .filter(|record| index_of(record) != 1)
                                .collect())
                        },
                    ))
                    .mapper(failing_on(2)),
            )
            .output(PipelineSpec::new())
            .build()
            .unwrap();

        // When
        let err = processor
            .process(batch(3), InvocationMetadata::default())
            .await
            .unwrap_err();

        // Then
        let failures = err.failures().unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures.errors[0].original.is_none());
        assert_eq!(index_of(&failures.errors[0].record), 2);
    }

    #[tokio::test]
    async fn it_should_not_attach_raw_record_to_output_failure_after_input_batch_mapper() {
        // Given
        let processor = BatchProcessor::builder()
            .input(PipelineSpec::new().batch_mapper(BatchMapperFn::new(
                |mut records: Vec<Record>, _: &ProcessingContext| {
                    records.reverse();
                    Ok(records)
                },
            )))
            .output(PipelineSpec::new().mapper(failing_on(0)))
            .build()
            .unwrap();

        // When
        let err = processor
            .process(batch(3), InvocationMetadata::default())
            .await
            .unwrap_err();

        // Then
        let failures = err.failures().unwrap();
        assert!(failures.errors[0].original.is_none());
        assert_eq!(index_of(&failures.errors[0].record), 0);
    }

    #[tokio::test]
    async fn it_should_reject_stream_on_input_pipeline() {
        // Given
        let sink = Arc::new(RecordingStreamSink::default());
        let builder = BatchProcessor::builder()
            .input(PipelineSpec::new().stream("input-stream"))
            .stream_sink(sink);

        // When
        let result = builder.build();

        // Then
        assert!(matches!(result, Err(ConfigError::InputStream)));
    }
}
