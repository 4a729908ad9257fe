use super::runner::{self, PipelineRun};
use crate::error::{EventError, ProcessError};
use crate::flow::{
    context::ProcessingContext,
    pipeline::{PipelineSpec, Role},
    record::{pretty, Record},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// How output pipelines are scheduled. Results are identical either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOutMode {
    #[default]
    Sequential,
    /// Run every output on the rayon pool.
    Parallel,
}

/// The records upstream of the output pipelines.
#[derive(Debug, Clone, Copy)]
pub struct Upstream<'a> {
    /// Records produced by the input pipeline.
    pub records: &'a [Record],
    /// For each upstream record, its index in the raw batch.
    pub origins: &'a [usize],
    /// The raw batch as decoded, or `None` when an input batch mapper ran
    /// and upstream records can no longer be matched to raw ones.
    pub raw: Option<&'a [Record]>,
}

impl<'a> Upstream<'a> {
    fn raw_index(&self, index: usize) -> usize {
        self.origins.get(index).copied().unwrap_or(index)
    }

    fn original(&self, raw_index: usize) -> Option<Record> {
        self.raw.and_then(|raw| raw.get(raw_index)).cloned()
    }
}

/// Per-output results and the merged failures, indexed against the raw batch.
#[derive(Debug, Default)]
pub struct FanOut {
    pub outputs: Vec<Vec<Record>>,
    pub failed: Vec<EventError>,
}

/// Runs every output pipeline over its own copy of the upstream records.
///
/// A record must succeed in every output to count as processed, but it is
/// reported once: when it fails in several outputs only the failure of the
/// earliest output is kept.
///
/// # Errors
///
/// Returns the first fatal error by output declaration order.
#[instrument(skip_all, fields(outputs = outputs.len(), records = upstream.records.len()))]
pub fn fan_out(
    outputs: &[PipelineSpec],
    upstream: Upstream<'_>,
    context: &ProcessingContext,
    mode: FanOutMode,
) -> Result<FanOut, ProcessError> {
    let runs: Vec<PipelineRun> = match mode {
        FanOutMode::Sequential => outputs
            .iter()
            .enumerate()
            .map(|(index, spec)| produce(index, spec, upstream.records, context))
            .collect::<Result<_, _>>()?,
        FanOutMode::Parallel => outputs
            .par_iter()
            .enumerate()
            .map(|(index, spec)| produce(index, spec, upstream.records, context))
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<Result<_, _>>()?,
    };

    let mut merged: BTreeMap<usize, (EventError, bool)> = BTreeMap::new();
    let mut produced = Vec::with_capacity(runs.len());
    for run in runs {
        for err in run.failed {
            merged.entry(err.index).or_insert((err, run.correlated));
        }
        produced.push(run.records);
    }

    // Failures behind an output batch mapper keep their position but lose
    // the raw record.
    let failed = merged
        .into_values()
        .map(|(err, correlated)| {
            let raw_index = upstream.raw_index(err.index);
            let original = if correlated {
                upstream.original(raw_index)
            } else {
                None
            };
            err.remap(raw_index, original)
        })
        .collect();

    Ok(FanOut {
        outputs: produced,
        failed,
    })
}

fn produce(
    index: usize,
    spec: &PipelineSpec,
    records: &[Record],
    context: &ProcessingContext,
) -> Result<PipelineRun, ProcessError> {
    info!("Producing output #{index}");
    let run = runner::run(spec, records.to_vec(), context, Role::Output(index))?;
    if let Some(first) = run.failed.first() {
        info!("{} records failed for output #{index}", run.failed.len());
        debug!("First failed record: {}", pretty(&first.record));
    }
    Ok(run)
}
