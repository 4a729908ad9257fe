//! Partition keys for stream sinks

use conduit_core::{CallableError, PartitionKey, ProcessingContext, Record};
use serde_json::Value;

/// Partitions by the value of a top-level field. String values are used as
/// is, other values by their JSON rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKey {
    pub field: String,
}

impl FieldKey {
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl PartitionKey for FieldKey {
    fn partition_key(
        &self,
        record: &Record,
        _context: &ProcessingContext,
    ) -> Result<String, CallableError> {
        match record.get(&self.field) {
            Some(Value::String(key)) => Ok(key.clone()),
            Some(Value::Null) | None => Err(CallableError::record(
                "MissingPartitionKey",
                format!("record has no '{}' field", self.field),
            )),
            Some(other) => Ok(other.to_string()),
        }
    }
}
