//! Named callables, resolved once when pipelines are built from
//! configuration.

use crate::error::ConfigError;
use crate::flow::callable::{BatchMapper, Filter, Mapper, PartitionKey};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Registry {
    filters: HashMap<String, Arc<dyn Filter>>,
    mappers: HashMap<String, Arc<dyn Mapper>>,
    batch_mappers: HashMap<String, Arc<dyn BatchMapper>>,
    partition_keys: HashMap<String, Arc<dyn PartitionKey>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_filter<F>(&mut self, name: impl Into<String>, filter: F) -> &mut Self
    where
        F: Filter + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
        self
    }

    pub fn register_mapper<M>(&mut self, name: impl Into<String>, mapper: M) -> &mut Self
    where
        M: Mapper + 'static,
    {
        self.mappers.insert(name.into(), Arc::new(mapper));
        self
    }

    pub fn register_batch_mapper<B>(&mut self, name: impl Into<String>, batch_mapper: B) -> &mut Self
    where
        B: BatchMapper + 'static,
    {
        self.batch_mappers.insert(name.into(), Arc::new(batch_mapper));
        self
    }

    pub fn register_partition_key<K>(&mut self, name: impl Into<String>, key: K) -> &mut Self
    where
        K: PartitionKey + 'static,
    {
        self.partition_keys.insert(name.into(), Arc::new(key));
        self
    }

    /// # Errors
    ///
    /// [`ConfigError::UnknownCallable`] when nothing is registered under `name`.
    pub fn filter(&self, name: &str) -> Result<Arc<dyn Filter>, ConfigError> {
        lookup(&self.filters, "filter", name)
    }

    /// # Errors
    ///
    /// [`ConfigError::UnknownCallable`] when nothing is registered under `name`.
    pub fn mapper(&self, name: &str) -> Result<Arc<dyn Mapper>, ConfigError> {
        lookup(&self.mappers, "mapper", name)
    }

    /// # Errors
    ///
    /// [`ConfigError::UnknownCallable`] when nothing is registered under `name`.
    pub fn batch_mapper(&self, name: &str) -> Result<Arc<dyn BatchMapper>, ConfigError> {
        lookup(&self.batch_mappers, "batch mapper", name)
    }

    /// # Errors
    ///
    /// [`ConfigError::UnknownCallable`] when nothing is registered under `name`.
    pub fn partition_key(&self, name: &str) -> Result<Arc<dyn PartitionKey>, ConfigError> {
        lookup(&self.partition_keys, "partition key", name)
    }
}

fn lookup<T: ?Sized>(
    entries: &HashMap<String, Arc<T>>,
    kind: &'static str,
    name: &str,
) -> Result<Arc<T>, ConfigError> {
    entries
        .get(name)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownCallable {
            kind,
            name: name.to_string(),
        })
}
