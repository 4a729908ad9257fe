use super::callable::{BatchMapper, Filter, Mapper, PartitionKey};
use std::fmt;
use std::sync::Arc;

/// Which direction a pipeline runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The single input pipeline. Its mapper is strictly 1-to-1.
    Input,
    /// One of the output pipelines, by declaration order.
    Output(usize),
    /// The pipeline preparing failed records for the error stream.
    Quarantine,
}

impl Role {
    #[must_use]
    pub const fn is_one_to_one(self) -> bool {
        matches!(self, Self::Input)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output(index) => write!(f, "output {index}"),
            Self::Quarantine => write!(f, "quarantine"),
        }
    }
}

/// An archival destination with its own optional filter and mapper, applied
/// right before sending.
#[derive(Clone)]
pub struct ArchiveTarget {
    pub(crate) name: String,
    pub(crate) filter: Option<Arc<dyn Filter>>,
    pub(crate) mapper: Option<Arc<dyn Mapper>>,
}

impl ArchiveTarget {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: None,
            mapper: None,
        }
    }

    #[must_use]
    pub fn filter<F: Filter + 'static>(self, filter: F) -> Self {
        self.shared_filter(Arc::new(filter))
    }

    #[must_use]
    pub fn shared_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn mapper<M: Mapper + 'static>(self, mapper: M) -> Self {
        self.shared_mapper(Arc::new(mapper))
    }

    #[must_use]
    pub fn shared_mapper(mut self, mapper: Arc<dyn Mapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ArchiveTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ArchiveTarget")
            .field("name", &self.name)
            .field("filter", &self.filter.is_some())
            .field("mapper", &self.mapper.is_some())
            .finish()
    }
}

/// The callables and routing of one pipeline.
///
/// Every part is optional: an empty spec is the identity pipeline and
/// delivers nowhere.
#[derive(Clone, Default)]
pub struct PipelineSpec {
    pub(crate) batch_mapper: Option<Arc<dyn BatchMapper>>,
    pub(crate) filter: Option<Arc<dyn Filter>>,
    pub(crate) mapper: Option<Arc<dyn Mapper>>,
    pub(crate) partition_key: Option<Arc<dyn PartitionKey>>,
    pub(crate) stream: Option<String>,
    pub(crate) archives: Vec<ArchiveTarget>,
}

impl PipelineSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn batch_mapper<B: BatchMapper + 'static>(self, batch_mapper: B) -> Self {
        self.shared_batch_mapper(Arc::new(batch_mapper))
    }

    #[must_use]
    pub fn shared_batch_mapper(mut self, batch_mapper: Arc<dyn BatchMapper>) -> Self {
        self.batch_mapper = Some(batch_mapper);
        self
    }

    #[must_use]
    pub fn filter<F: Filter + 'static>(self, filter: F) -> Self {
        self.shared_filter(Arc::new(filter))
    }

    #[must_use]
    pub fn shared_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn mapper<M: Mapper + 'static>(self, mapper: M) -> Self {
        self.shared_mapper(Arc::new(mapper))
    }

    #[must_use]
    pub fn shared_mapper(mut self, mapper: Arc<dyn Mapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    #[must_use]
    pub fn partition_key<K: PartitionKey + 'static>(self, partition_key: K) -> Self {
        self.shared_partition_key(Arc::new(partition_key))
    }

    #[must_use]
    pub fn shared_partition_key(mut self, partition_key: Arc<dyn PartitionKey>) -> Self {
        self.partition_key = Some(partition_key);
        self
    }

    /// Sets the stream the pipeline's records are delivered to.
    #[must_use]
    pub fn stream(mut self, target: impl Into<String>) -> Self {
        self.stream = Some(target.into());
        self
    }

    /// Adds an archival destination.
    #[must_use]
    pub fn archive(mut self, target: ArchiveTarget) -> Self {
        self.archives.push(target);
        self
    }

    #[must_use]
    pub fn stream_target(&self) -> Option<&str> {
        self.stream.as_deref()
    }

    #[must_use]
    pub fn archive_targets(&self) -> &[ArchiveTarget] {
        &self.archives
    }
}

impl fmt::Debug for PipelineSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PipelineSpec")
            .field("batch_mapper", &self.batch_mapper.is_some())
            .field("filter", &self.filter.is_some())
            .field("mapper", &self.mapper.is_some())
            .field("partition_key", &self.partition_key.is_some())
            .field("stream", &self.stream)
            .field("archives", &self.archives)
            .finish()
    }
}
