//! Mappers for record streams

use conduit_core::{CallableError, MapOutput, Mapper, ProcessingContext, Record};
use serde_json::Value;

/// Sets a field to a fixed value, overwriting any previous value.
#[derive(Debug, Clone, PartialEq)]
pub struct SetField {
    field: String,
    value: Value,
}

impl SetField {
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl Mapper for SetField {
    fn map(&self, mut record: Record, _context: &ProcessingContext) -> Result<MapOutput, CallableError> {
        record.insert(self.field.clone(), self.value.clone());
        Ok(MapOutput::One(record))
    }
}

/// Moves a field to a new key. Records without the field pass unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameField {
    from: String,
    to: String,
}

impl RenameField {
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl Mapper for RenameField {
    fn map(&self, mut record: Record, _context: &ProcessingContext) -> Result<MapOutput, CallableError> {
        if let Some(value) = record.remove(&self.from) {
            record.insert(self.to.clone(), value);
        }
        Ok(MapOutput::One(record))
    }
}

/// Removes the listed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropFields {
    fields: Vec<String>,
}

impl DropFields {
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl Mapper for DropFields {
    fn map(&self, mut record: Record, _context: &ProcessingContext) -> Result<MapOutput, CallableError> {
        for field in &self.fields {
            record.remove(field);
        }
        Ok(MapOutput::One(record))
    }
}

/// Emits `copies` copies of each record. Zero copies drops the record.
///
/// Not usable as an input mapper unless `copies` is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duplicate {
    pub copies: usize,
}

impl Mapper for Duplicate {
    fn map(&self, record: Record, _context: &ProcessingContext) -> Result<MapOutput, CallableError> {
        Ok(match self.copies {
            0 => MapOutput::Nothing,
            1 => MapOutput::One(record),
            n => MapOutput::Many(vec![record; n]),
        })
    }
}
