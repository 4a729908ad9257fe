use crate::helpers::{events, init_tracing, KeyedSink};
use conduit_core::{
    BatchProcessor, InvocationMetadata, PipelineSpec, ProcessorConfig, Registry,
};
use conduit_processors::{register_builtins, FieldFilter, RenameField};
use serde_json::json;
use std::sync::Arc;

#[cfg(test)]
mod config_tests {
    use super::*;

    #[tokio::test]
    async fn it_should_run_configured_builtins() {
        // Given
        init_tracing();
        let mut registry = Registry::new();
        register_builtins(&mut registry);
        let config = ProcessorConfig::from_json(
            r#"{
                "input": { "batch_mapper": "dedup_by_id", "mapper": "identity" },
                "outputs": [
                    { "filter": "has_id", "mapper": "duplicate", "partition_key": "by_id", "stream": "out" }
                ]
            }"#,
        )
        .unwrap();
        let sink = Arc::new(KeyedSink::default());

        // When
        let processor = config
            .builder(&registry)
            .unwrap()
            .stream_sink(sink.clone())
            .build()
            .unwrap();
        let outputs = processor
            .process(events(), InvocationMetadata::default())
            .await
            .unwrap();

        // Then
        // Deduplication keeps a, b and the record without id; the filter drops the last one.
        assert_eq!(outputs[0].len(), 4);
        let keys: Vec<Option<String>> = sink.sent().into_iter().map(|(_, _, key)| key).collect();
        assert_eq!(
            keys,
            vec![
                Some("a".to_string()),
                Some("a".to_string()),
                Some("b".to_string()),
                Some("b".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn it_should_compose_builtins_in_code() {
        // Given
        let processor = BatchProcessor::builder()
            .output(
                PipelineSpec::new()
                    .filter(FieldFilter::equals("kind", "click"))
                    .mapper(RenameField::new("ua", "user_agent")),
            )
            .build()
            .unwrap();

        // When
        let outputs = processor
            .process(events(), InvocationMetadata::default())
            .await
            .unwrap();

        // Then
        assert_eq!(outputs[0].len(), 3);
        assert_eq!(outputs[0][0]["user_agent"], json!("Mozilla/5.0"));
        assert!(outputs[0][2].get("user_agent").is_none());
    }
}
