use crate::error::{CallableError, EventError, ProcessError};
use crate::flow::{
    callable::{Filter, MapOutput, Mapper},
    context::ProcessingContext,
    pipeline::Role,
    record::{annotate_error, Record},
};
use tracing::{debug, warn};

/// Result of running one filter/mapper stage over a record list.
#[derive(Debug, Default)]
pub struct StageOutcome {
    /// Transformed records, in input order. Expansions are contiguous.
    pub processed: Vec<Record>,
    /// For each processed record, the index of the input record it came from.
    pub origins: Vec<usize>,
    /// Records whose filter or mapper failed.
    pub failed: Vec<EventError>,
    /// Indices of input records that passed the filter and were mapped
    /// without error.
    pub survived: Vec<usize>,
}

impl StageOutcome {
    fn emit(&mut self, index: usize, records: Vec<Record>) {
        self.origins.extend(std::iter::repeat(index).take(records.len()));
        self.processed.extend(records);
        self.survived.push(index);
    }

    fn fail(
        &mut self,
        index: usize,
        record: Record,
        error: CallableError,
        role: Role,
    ) -> Result<(), ProcessError> {
        if error.is_critical() {
            return Err(ProcessError::Critical {
                pipeline: role.to_string(),
                reason: error.detail(),
            });
        }
        warn!("Record #{index} failed in pipeline '{role}': {error}");
        let record = annotate_error(record, &error);
        self.failed.push(EventError::new(index, record, error));
        Ok(())
    }
}

/// Applies an optional filter then an optional mapper to every record.
///
/// Per-record failures are collected and never stop the stage. Critical
/// errors, including a 1-to-1 violation by the input mapper, abort it.
///
/// # Errors
///
/// Returns [`ProcessError::Critical`] when a callable raises the critical
/// sentinel, a mapper returns a malformed shape, or an input mapper does not
/// produce exactly one record.
pub fn execute(
    filter: Option<&dyn Filter>,
    mapper: Option<&dyn Mapper>,
    records: Vec<Record>,
    context: &ProcessingContext,
    role: Role,
) -> Result<StageOutcome, ProcessError> {
    let mut outcome = StageOutcome::default();

    for (index, record) in records.into_iter().enumerate() {
        if let Some(filter) = filter {
            match filter.filter(&record, context) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Record #{index} filtered out of pipeline '{role}'");
                    continue;
                }
                Err(error) => {
                    outcome.fail(index, record, error, role)?;
                    continue;
                }
            }
        }

        let Some(mapper) = mapper else {
            outcome.emit(index, vec![record]);
            continue;
        };

        match mapper.map(record.clone(), context) {
            Ok(output) => {
                // Dropping is allowed; expanding or merging breaks index correlation.
                if role.is_one_to_one() && matches!(output, MapOutput::Many(_)) && output.len() != 1 {
                    return Err(ProcessError::Critical {
                        pipeline: role.to_string(),
                        reason: format!(
                            "input mappers must be 1-to-1, record #{index} produced {} records",
                            output.len()
                        ),
                    });
                }
                outcome.emit(index, output.into_records());
            }
            Err(error) => outcome.fail(index, record, error, role)?,
        }
    }

    Ok(outcome)
}
