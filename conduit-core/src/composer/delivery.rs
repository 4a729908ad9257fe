use crate::error::{CallableError, DeliveryError};
use crate::flow::{
    callable::PartitionKey,
    context::ProcessingContext,
    pipeline::{ArchiveTarget, PipelineSpec},
    record::{pretty, Record},
    sink::{ArchivalSink, SinkKind, SinkStatus, StreamSink},
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// The sinks an invocation may deliver to.
#[derive(Clone, Default)]
pub struct Sinks {
    pub(crate) stream: Option<Arc<dyn StreamSink>>,
    pub(crate) archival: Option<Arc<dyn ArchivalSink>>,
}

impl Sinks {
    #[must_use]
    pub fn new(
        stream: Option<Arc<dyn StreamSink>>,
        archival: Option<Arc<dyn ArchivalSink>>,
    ) -> Self {
        Self { stream, archival }
    }

    /// Delivers each output's records to its stream and archive targets.
    ///
    /// Must only be called once every output has been produced. Outputs with
    /// no records are skipped.
    ///
    /// # Errors
    ///
    /// The first sink failure aborts delivery of the remaining outputs.
    #[instrument(skip_all, fields(outputs = outputs.len()))]
    pub async fn deliver(
        &self,
        outputs: &[PipelineSpec],
        produced: &[Vec<Record>],
        context: &ProcessingContext,
    ) -> Result<(), DeliveryError> {
        for (index, (spec, records)) in outputs.iter().zip(produced).enumerate() {
            info!("Forwarding output #{index}");
            if records.is_empty() {
                info!("All records have been filtered out for output #{index}");
                continue;
            }

            match spec.stream.as_deref() {
                Some(target) => {
                    self.send_to_stream(records, target, spec.partition_key.as_deref(), context)
                        .await?;
                }
                None => debug!("No output stream: not forwarding output #{index} to a stream"),
            }

            for archive in &spec.archives {
                self.archive(records, archive, context).await?;
            }
        }
        Ok(())
    }

    /// Sends records to a stream.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] when no stream sink is configured, the send
    /// fails, or the sink answers with a non-success status.
    pub async fn send_to_stream(
        &self,
        records: &[Record],
        target: &str,
        partition_key: Option<&dyn PartitionKey>,
        context: &ProcessingContext,
    ) -> Result<(), DeliveryError> {
        if records.is_empty() {
            return Ok(());
        }
        let sink = self
            .stream
            .as_deref()
            .ok_or_else(|| DeliveryError::Unconfigured {
                sink: SinkKind::Stream,
                target: target.to_string(),
            })?;

        info!("Sending {} records to stream '{target}'", records.len());
        debug!("First sent record: {}", pretty(&records[0]));
        let status = sink
            .send(records, target, partition_key, context)
            .await
            .map_err(|source| DeliveryError::Transport {
                sink: SinkKind::Stream,
                target: target.to_string(),
                source,
            })?;
        check(status, SinkKind::Stream, target, records.len())
    }

    /// Applies the target's local filter and mapper, then sends the result to
    /// the archival sink. Nothing is sent when every record is filtered out.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] when the local filter or mapper fails, no
    /// archival sink is configured, the send fails, or the sink answers with a
    /// non-success status.
    pub async fn archive(
        &self,
        records: &[Record],
        target: &ArchiveTarget,
        context: &ProcessingContext,
    ) -> Result<(), DeliveryError> {
        if records.is_empty() {
            return Ok(());
        }
        let name = target.name.as_str();
        info!("Sending {} records to archive '{name}'", records.len());

        let archival_error = |source: CallableError| DeliveryError::Archival {
            target: name.to_string(),
            source,
        };

        let selected = match target.filter.as_deref() {
            Some(filter) => {
                let mut selected = Vec::with_capacity(records.len());
                for record in records {
                    if filter.filter(record, context).map_err(archival_error)? {
                        selected.push(record.clone());
                    }
                }
                info!("Selected {} records for archive '{name}'", selected.len());
                selected
            }
            None => records.to_vec(),
        };

        let selected = match target.mapper.as_deref() {
            Some(mapper) => {
                let mut mapped = Vec::with_capacity(selected.len());
                for record in selected {
                    let output = mapper.map(record, context).map_err(archival_error)?;
                    mapped.extend(output.into_records());
                }
                mapped
            }
            None => selected,
        };

        if selected.is_empty() {
            info!("All records were filtered out: nothing archived to '{name}'");
            return Ok(());
        }

        let sink = self
            .archival
            .as_deref()
            .ok_or_else(|| DeliveryError::Unconfigured {
                sink: SinkKind::Archival,
                target: name.to_string(),
            })?;

        debug!("First archived record: {}", pretty(&selected[0]));
        let status = sink
            .send(&selected, name)
            .await
            .map_err(|source| DeliveryError::Transport {
                sink: SinkKind::Archival,
                target: name.to_string(),
                source,
            })?;
        check(status, SinkKind::Archival, name, selected.len())
    }
}

fn check(
    status: SinkStatus,
    sink: SinkKind,
    target: &str,
    records: usize,
) -> Result<(), DeliveryError> {
    if status.is_success() {
        debug!("{sink} sink accepted {records} records for '{target}': {}", status.code);
        return Ok(());
    }
    Err(DeliveryError::Rejected {
        sink,
        target: target.to_string(),
        records,
        status: status.code,
        body: status.body,
    })
}
