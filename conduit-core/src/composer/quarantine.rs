use super::delivery::Sinks;
use super::runner;
use crate::{
    error::{ConfigError, EventError, ProcessError, ProcessingError},
    flow::{
        context::ProcessingContext,
        pipeline::{PipelineSpec, Role},
        record::{annotate_error, Record},
        sink::StreamSink,
    },
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Routes the records of a [`ProcessingError`] to an error stream.
///
/// The record sent for each failure is the raw record as received (or the
/// snapshot taken at failure time when the raw record is unknown) annotated
/// with the error. The quarantine pipeline may filter, map and partition
/// those records like any output pipeline.
pub struct QuarantineRouter {
    pipeline: PipelineSpec,
    sinks: Sinks,
}

impl QuarantineRouter {
    /// # Errors
    ///
    /// Returns [`ConfigError::NoQuarantineStream`] when the pipeline has no
    /// stream target.
    pub fn new(pipeline: PipelineSpec, sink: Arc<dyn StreamSink>) -> Result<Self, ConfigError> {
        if pipeline.stream.is_none() {
            return Err(ConfigError::NoQuarantineStream);
        }
        Ok(Self {
            pipeline,
            sinks: Sinks::new(Some(sink), None),
        })
    }

    /// Sends the failed records to the error stream.
    ///
    /// # Returns
    ///
    /// The number of records delivered.
    ///
    /// # Errors
    ///
    /// Fatal errors of the quarantine pipeline and delivery errors. When the
    /// quarantine pipeline fails on some records the others are still sent
    /// and the unrouted ones come back as [`ProcessError::Processing`],
    /// indexed like the failures they came from.
    #[instrument(skip_all, fields(failures = failures.len()))]
    pub async fn route(
        &self,
        failures: &ProcessingError,
        context: &ProcessingContext,
    ) -> Result<usize, ProcessError> {
        let records: Vec<Record> = failures
            .errors
            .iter()
            .map(|err| {
                let record = err.original.clone().unwrap_or_else(|| err.record.clone());
                annotate_error(record, &err.error)
            })
            .collect();

        let run = runner::run(&self.pipeline, records, context, Role::Quarantine)?;
        let unrouted: Vec<EventError> = run
            .failed
            .into_iter()
            .map(|err| {
                let source = failures.errors.get(err.index);
                let index = source.map_or(err.index, |failure| failure.index);
                let original = if run.correlated {
                    source.and_then(|failure| failure.original.clone())
                } else {
                    None
                };
                err.remap(index, original)
            })
            .collect();

        let mut routed = 0;
        if let Some(target) = self.pipeline.stream.as_deref().filter(|_| !run.records.is_empty()) {
            self.sinks
                .send_to_stream(&run.records, target, self.pipeline.partition_key.as_deref(), context)
                .await?;
            info!("Routed {} failed records to '{target}'", run.records.len());
            routed = run.records.len();
        }

        if !unrouted.is_empty() {
            warn!(
                "{} failed records could not be prepared for the error stream",
                unrouted.len()
            );
            return Err(ProcessingError::new(unrouted).into());
        }
        Ok(routed)
    }
}
