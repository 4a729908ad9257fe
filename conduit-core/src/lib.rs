pub mod composer;
pub mod config;
pub mod error;
pub mod flow;
pub mod registry;

// Re-export main types for easier access
pub use composer::{
    BatchProcessor, BatchProcessorBuilder, DriverReport, FanOutMode, QuarantineRouter, Sinks,
    StreamDriver,
};
pub use config::{ArchiveConfig, PipelineConfig, ProcessorConfig};
pub use error::{
    BoxError, CallableError, ConfigError, DecodeError, DeliveryError, DriverError, EventError,
    ProcessError, ProcessingError,
};
pub use flow::callable::{
    BatchMapper, BatchMapperFn, Filter, FilterFn, JsonMapper, MapOutput, Mapper, MapperFn,
    PartitionKey, PartitionKeyFn,
};
pub use flow::context::{Environment, InvocationMetadata, ProcessingContext};
pub use flow::pipeline::{ArchiveTarget, PipelineSpec, Role};
pub use flow::record::{annotate_error, Record, ERROR_FIELD};
pub use flow::sink::{ArchivalSink, SinkFuture, SinkKind, SinkStatus, StreamSink};
pub use flow::source::{BatchAck, BatchSource, DecodedBatch, RecordBatchDecoder, SourceOutput};
pub use flow::types::FlowFuture;
pub use registry::Registry;
