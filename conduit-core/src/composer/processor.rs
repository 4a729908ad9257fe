use super::delivery::Sinks;
use super::fanout::{self, FanOutMode, Upstream};
use super::runner;
use crate::{
    error::{ConfigError, ProcessError, ProcessingError},
    flow::{
        context::{Environment, InvocationMetadata, ProcessingContext},
        pipeline::{PipelineSpec, Role},
        record::{pretty, Record},
        sink::{ArchivalSink, StreamSink},
        source::DecodedBatch,
    },
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Runs a decoded batch through the input pipeline, fans the result out to
/// the output pipelines and delivers every output to its sinks.
///
/// Per-record failures never abort the batch: the records that succeeded are
/// delivered and the failures are returned afterwards as one
/// [`ProcessError::Processing`]. Critical callable errors and sink failures
/// abort the invocation.
///
/// Delivery only starts once every output has been produced, so nothing
/// reaches a sink when a later output hits a critical error. Raw records are
/// archived before any transformation when the input pipeline has archive
/// targets.
///
/// # Examples
///
/// ```
/// use conduit_core::{
///     BatchProcessor, DecodedBatch, FilterFn, InvocationMetadata, PipelineSpec,
///     ProcessingContext, Record,
/// };
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() {
///     let processor = BatchProcessor::builder()
///         .output(PipelineSpec::new().filter(FilterFn::new(
///             |record: &Record, _: &ProcessingContext| Ok(record.contains_key("id")),
///         )))
///         .build()
///         .unwrap();
///
///     let mut with_id = Record::new();
///     with_id.insert("id".to_string(), json!(1));
///     let batch = DecodedBatch::new(vec![with_id, Record::new()], "shard-0");
///
///     let outputs = processor
///         .process(batch, InvocationMetadata::default())
///         .await
///         .unwrap();
///     assert_eq!(outputs[0].len(), 1);
/// }
/// ```
pub struct BatchProcessor {
    input: Option<PipelineSpec>,
    outputs: Vec<PipelineSpec>,
    sinks: Sinks,
    environment: Environment,
    fan_out: FanOutMode,
}

impl BatchProcessor {
    #[must_use]
    pub fn builder() -> BatchProcessorBuilder {
        BatchProcessorBuilder::default()
    }

    /// Builds the context handed to callables for one invocation.
    #[must_use]
    pub fn context(
        &self,
        partition_id: impl Into<String>,
        invocation: InvocationMetadata,
    ) -> ProcessingContext {
        ProcessingContext::new(self.environment.clone(), partition_id, invocation)
    }

    #[must_use]
    pub const fn sinks(&self) -> &Sinks {
        &self.sinks
    }

    /// Processes one batch.
    ///
    /// # Returns
    ///
    /// The records produced by each output pipeline, in declaration order.
    ///
    /// # Errors
    ///
    /// * [`ProcessError::Processing`] when some records failed; every other
    ///   record was delivered
    /// * [`ProcessError::Critical`] or [`ProcessError::BatchMapper`] when user
    ///   code broke its contract; nothing but the raw archive was delivered
    /// * [`ProcessError::Delivery`] when a sink rejected a write
    #[instrument(skip_all, fields(partition = %batch.partition_id, records = batch.records.len()))]
    pub async fn process(
        &self,
        batch: DecodedBatch,
        invocation: InvocationMetadata,
    ) -> Result<Vec<Vec<Record>>, ProcessError> {
        let DecodedBatch {
            records: raw,
            partition_id,
        } = batch;
        let context = self.context(partition_id, invocation);

        info!("Going to process {} records", raw.len());
        if let Some(first) = raw.first() {
            debug!("First record: {}", pretty(first));
        }

        // Records that failed in the input or output pipelines
        let mut failed = Vec::new();

        let (records, origins, correlated) = match &self.input {
            Some(input) => {
                for archive in &input.archives {
                    self.sinks.archive(&raw, archive, &context).await?;
                }

                let run = runner::run(input, raw.clone(), &context, Role::Input)?;
                if !run.failed.is_empty() {
                    error!("{} records failed in the input pipeline", run.failed.len());
                }
                // After a batch mapper the index is only positional.
                failed.extend(run.failed.into_iter().map(|err| {
                    let original = if run.correlated {
                        raw.get(err.index).cloned()
                    } else {
                        None
                    };
                    let index = err.index;
                    err.remap(index, original)
                }));
                (run.records, run.origins, run.correlated)
            }
            None => (raw.clone(), (0..raw.len()).collect(), true),
        };

        let produced = if records.is_empty() || self.outputs.is_empty() {
            vec![Vec::new(); self.outputs.len()]
        } else {
            let fan = fanout::fan_out(
                &self.outputs,
                Upstream {
                    records: &records,
                    origins: &origins,
                    raw: correlated.then_some(raw.as_slice()),
                },
                &context,
                self.fan_out,
            )?;
            if !fan.failed.is_empty() {
                error!("{} records failed in the output pipelines", fan.failed.len());
            }
            failed.extend(fan.failed);

            // Deliver only after all outputs are produced.
            self.sinks.deliver(&self.outputs, &fan.outputs, &context).await?;
            fan.outputs
        };

        if !failed.is_empty() {
            return Err(ProcessingError::new(failed).into());
        }

        debug!("Batch processed successfully");
        Ok(produced)
    }
}

/// Builder for [`BatchProcessor`].
#[derive(Default)]
pub struct BatchProcessorBuilder {
    input: Option<PipelineSpec>,
    outputs: Vec<PipelineSpec>,
    stream_sink: Option<Arc<dyn StreamSink>>,
    archival_sink: Option<Arc<dyn ArchivalSink>>,
    environment: Environment,
    fan_out: FanOutMode,
}

impl BatchProcessorBuilder {
    /// Sets the input pipeline. Its mapper must be 1-to-1 and it may only
    /// archive raw records, never send them to a stream.
    #[must_use]
    pub fn input(mut self, input: PipelineSpec) -> Self {
        self.input = Some(input);
        self
    }

    /// Appends an output pipeline.
    #[must_use]
    pub fn output(mut self, output: PipelineSpec) -> Self {
        self.outputs.push(output);
        self
    }

    #[must_use]
    pub fn outputs(mut self, outputs: impl IntoIterator<Item = PipelineSpec>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    #[must_use]
    pub fn stream_sink(mut self, sink: Arc<dyn StreamSink>) -> Self {
        self.stream_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn archival_sink(mut self, sink: Arc<dyn ArchivalSink>) -> Self {
        self.archival_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub const fn fan_out(mut self, mode: FanOutMode) -> Self {
        self.fan_out = mode;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let pipelines = self
            .input
            .iter()
            .map(|spec| (Role::Input, spec))
            .chain(
                self.outputs
                    .iter()
                    .enumerate()
                    .map(|(index, spec)| (Role::Output(index), spec)),
            );

        if self.input.as_ref().is_some_and(|input| input.stream.is_some()) {
            return Err(ConfigError::InputStream);
        }

        for (role, spec) in pipelines {
            if spec.stream.is_some() && self.stream_sink.is_none() {
                return Err(ConfigError::NoStreamSink {
                    pipeline: role.to_string(),
                });
            }
            if !spec.archives.is_empty() && self.archival_sink.is_none() {
                return Err(ConfigError::NoArchivalSink {
                    pipeline: role.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Builds the processor.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the input pipeline targets a stream,
    /// or when a pipeline targets a stream or an archive and the matching
    /// sink is missing.
    pub fn build(self) -> Result<BatchProcessor, ConfigError> {
        self.validate()?;
        Ok(BatchProcessor {
            input: self.input,
            outputs: self.outputs,
            sinks: Sinks::new(self.stream_sink, self.archival_sink),
            environment: self.environment,
            fan_out: self.fan_out,
        })
    }
}
