//! Batch mappers for record streams

use conduit_core::{BatchMapper, CallableError, ProcessingContext, Record};
use std::collections::HashSet;
use tracing::debug;

/// Keeps the first record seen for each value of `field`.
///
/// Records without the field are always kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupBy {
    pub field: String,
}

impl DedupBy {
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl BatchMapper for DedupBy {
    fn map_batch(
        &self,
        records: Vec<Record>,
        _context: &ProcessingContext,
    ) -> Result<Vec<Record>, CallableError> {
        let total = records.len();
        let mut seen = HashSet::new();
        let kept: Vec<Record> = records
            .into_iter()
            .filter(|record| match record.get(&self.field) {
                Some(value) => seen.insert(value.to_string()),
                None => true,
            })
            .collect();

        debug!(
            "Dropped {} duplicate records by '{}'",
            total - kept.len(),
            self.field
        );
        Ok(kept)
    }
}
