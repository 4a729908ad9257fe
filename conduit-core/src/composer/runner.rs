use super::stage;
use crate::error::{EventError, ProcessError};
use crate::flow::{
    context::ProcessingContext,
    pipeline::{PipelineSpec, Role},
    record::{pretty, Record},
};
use tracing::{debug, error, info, instrument};

/// Records produced by one pipeline and the records it failed on.
#[derive(Debug, Default)]
pub struct PipelineRun {
    pub records: Vec<Record>,
    /// For each produced record, the index of the record it came from in the
    /// list the stage saw.
    pub origins: Vec<usize>,
    pub failed: Vec<EventError>,
    /// False when a batch mapper ran, so indices no longer line up with the
    /// records passed to [`run`].
    pub correlated: bool,
}

/// Runs one pipeline: the batch mapper over the whole list, then the
/// filter/mapper stage.
///
/// # Errors
///
/// A failing batch mapper is fatal and returns [`ProcessError::BatchMapper`].
/// Critical errors from the stage are propagated unchanged.
#[instrument(skip_all, fields(pipeline = %role))]
pub fn run(
    spec: &PipelineSpec,
    records: Vec<Record>,
    context: &ProcessingContext,
    role: Role,
) -> Result<PipelineRun, ProcessError> {
    info!("Processing {} records with pipeline '{role}'", records.len());

    let records = match &spec.batch_mapper {
        Some(batch_mapper) => {
            let mapped = batch_mapper
                .map_batch(records, context)
                .map_err(|source| ProcessError::BatchMapper {
                    pipeline: role.to_string(),
                    source,
                })?;
            debug!("Batch mapper produced {} records", mapped.len());
            mapped
        }
        None => records,
    };

    let outcome = stage::execute(
        spec.filter.as_deref(),
        spec.mapper.as_deref(),
        records,
        context,
        role,
    )?;

    if let Some(first) = outcome.failed.first() {
        error!(
            "{} records failed in pipeline '{role}'",
            outcome.failed.len()
        );
        debug!("First failed record: {}", pretty(&first.record));
    }

    Ok(PipelineRun {
        records: outcome.processed,
        origins: outcome.origins,
        failed: outcome.failed,
        correlated: spec.batch_mapper.is_none(),
    })
}
