//! Contracts for user-supplied callables and adapters that lift plain
//! closures into them.

use super::context::ProcessingContext;
use super::record::Record;
use crate::error::CallableError;
use serde_json::Value;

/// Selects records for a pipeline. `Ok(false)` silently drops the record.
pub trait Filter: Send + Sync {
    fn filter(&self, record: &Record, context: &ProcessingContext) -> Result<bool, CallableError>;
}

/// Transforms one record into zero, one or many records.
pub trait Mapper: Send + Sync {
    fn map(&self, record: Record, context: &ProcessingContext) -> Result<MapOutput, CallableError>;
}

/// Transforms the whole record list of a pipeline at once.
pub trait BatchMapper: Send + Sync {
    fn map_batch(
        &self,
        records: Vec<Record>,
        context: &ProcessingContext,
    ) -> Result<Vec<Record>, CallableError>;
}

/// Computes the partitioning value a stream sink uses for a record.
pub trait PartitionKey: Send + Sync {
    fn partition_key(
        &self,
        record: &Record,
        context: &ProcessingContext,
    ) -> Result<String, CallableError>;
}

/// What a mapper emits for a single input record.
#[derive(Debug, Clone, PartialEq)]
pub enum MapOutput {
    One(Record),
    Many(Vec<Record>),
    /// Emit nothing. Not a failure.
    Nothing,
}

impl MapOutput {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(records) => records.len(),
            Self::Nothing => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Self::One(record) => vec![record],
            Self::Many(records) => records,
            Self::Nothing => Vec::new(),
        }
    }
}

impl From<Record> for MapOutput {
    fn from(record: Record) -> Self {
        Self::One(record)
    }
}

impl From<Vec<Record>> for MapOutput {
    fn from(records: Vec<Record>) -> Self {
        Self::Many(records)
    }
}

impl From<Option<Record>> for MapOutput {
    fn from(record: Option<Record>) -> Self {
        record.map_or(Self::Nothing, Self::One)
    }
}

impl TryFrom<Value> for MapOutput {
    type Error = CallableError;

    /// Objects map to `One`, arrays of objects to `Many` and `null` to
    /// `Nothing`. Any other shape is a critical error.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(record) => Ok(Self::One(record)),
            Value::Null => Ok(Self::Nothing),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record),
                    other => Err(invalid_shape(&other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Many),
            other => Err(invalid_shape(&other)),
        }
    }
}

fn invalid_shape(value: &Value) -> CallableError {
    CallableError::critical(format!(
        "mapper must return a record, a list of records or null, got {value}"
    ))
}

/// A filter backed by a closure.
pub struct FilterFn<F> {
    predicate: F,
}

impl<F> FilterFn<F>
where
    F: Fn(&Record, &ProcessingContext) -> Result<bool, CallableError> + Send + Sync,
{
    #[must_use]
    pub const fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> Filter for FilterFn<F>
where
    F: Fn(&Record, &ProcessingContext) -> Result<bool, CallableError> + Send + Sync,
{
    fn filter(&self, record: &Record, context: &ProcessingContext) -> Result<bool, CallableError> {
        (self.predicate)(record, context)
    }
}

/// A mapper backed by a closure.
pub struct MapperFn<F> {
    transform: F,
}

impl<F> MapperFn<F>
where
    F: Fn(Record, &ProcessingContext) -> Result<MapOutput, CallableError> + Send + Sync,
{
    #[must_use]
    pub const fn new(transform: F) -> Self {
        Self { transform }
    }
}

impl<F> Mapper for MapperFn<F>
where
    F: Fn(Record, &ProcessingContext) -> Result<MapOutput, CallableError> + Send + Sync,
{
    fn map(&self, record: Record, context: &ProcessingContext) -> Result<MapOutput, CallableError> {
        (self.transform)(record, context)
    }
}

/// A mapper whose closure returns an untyped JSON value. The shape of the
/// value is checked on every call and a wrong shape is critical.
pub struct JsonMapper<F> {
    transform: F,
}

impl<F> JsonMapper<F>
where
    F: Fn(Record, &ProcessingContext) -> Result<Value, CallableError> + Send + Sync,
{
    #[must_use]
    pub const fn new(transform: F) -> Self {
        Self { transform }
    }
}

impl<F> Mapper for JsonMapper<F>
where
    F: Fn(Record, &ProcessingContext) -> Result<Value, CallableError> + Send + Sync,
{
    fn map(&self, record: Record, context: &ProcessingContext) -> Result<MapOutput, CallableError> {
        MapOutput::try_from((self.transform)(record, context)?)
    }
}

/// A batch mapper backed by a closure.
pub struct BatchMapperFn<F> {
    transform: F,
}

impl<F> BatchMapperFn<F>
where
    F: Fn(Vec<Record>, &ProcessingContext) -> Result<Vec<Record>, CallableError> + Send + Sync,
{
    #[must_use]
    pub const fn new(transform: F) -> Self {
        Self { transform }
    }
}

impl<F> BatchMapper for BatchMapperFn<F>
where
    F: Fn(Vec<Record>, &ProcessingContext) -> Result<Vec<Record>, CallableError> + Send + Sync,
{
    fn map_batch(
        &self,
        records: Vec<Record>,
        context: &ProcessingContext,
    ) -> Result<Vec<Record>, CallableError> {
        (self.transform)(records, context)
    }
}

/// A partition key backed by a closure.
pub struct PartitionKeyFn<F> {
    key: F,
}

impl<F> PartitionKeyFn<F>
where
    F: Fn(&Record, &ProcessingContext) -> Result<String, CallableError> + Send + Sync,
{
    #[must_use]
    pub const fn new(key: F) -> Self {
        Self { key }
    }
}

impl<F> PartitionKey for PartitionKeyFn<F>
where
    F: Fn(&Record, &ProcessingContext) -> Result<String, CallableError> + Send + Sync,
{
    fn partition_key(
        &self,
        record: &Record,
        context: &ProcessingContext,
    ) -> Result<String, CallableError> {
        (self.key)(record, context)
    }
}
