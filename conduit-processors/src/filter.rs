//! Filters for record streams

use conduit_core::{CallableError, Filter, ProcessingContext, Record};
use serde_json::Value;

/// Selects records by the presence or value of a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    field: String,
    expected: Option<Value>,
}

impl FieldFilter {
    /// Accepts records that carry `field`, whatever its value.
    #[must_use]
    pub fn exists(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: None,
        }
    }

    /// Accepts records whose `field` equals `value`.
    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            expected: Some(value.into()),
        }
    }
}

impl Filter for FieldFilter {
    fn filter(&self, record: &Record, _context: &ProcessingContext) -> Result<bool, CallableError> {
        Ok(match (record.get(&self.field), &self.expected) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        })
    }
}
