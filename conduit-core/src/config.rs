//! Configuration types for the batch processor
//!
//! Pipelines are declared by callable name and resolved against a
//! [`Registry`] when the processor is built.

use crate::composer::{BatchProcessorBuilder, FanOutMode, QuarantineRouter};
use crate::error::ConfigError;
use crate::flow::context::Environment;
use crate::flow::pipeline::{ArchiveTarget, PipelineSpec};
use crate::flow::sink::StreamSink;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Main processor configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Deployment identifiers. Unset fields fall back to `CONDUIT_*` variables.
    #[serde(default)]
    pub environment: Environment,

    /// The input pipeline, enforced 1-to-1
    #[serde(default)]
    pub input: Option<PipelineConfig>,

    /// Output pipelines, in delivery order
    #[serde(default)]
    pub outputs: Vec<PipelineConfig>,

    /// Pipeline preparing failed records for the error stream
    #[serde(default)]
    pub quarantine: Option<PipelineConfig>,

    /// How output pipelines are scheduled
    #[serde(default)]
    pub fan_out: FanOutMode,
}

/// One pipeline, by callable name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub batch_mapper: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub mapper: Option<String>,
    #[serde(default)]
    pub partition_key: Option<String>,
    /// Target stream name
    #[serde(default)]
    pub stream: Option<String>,
    /// Archival targets
    #[serde(default)]
    pub archive: Vec<ArchiveConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    pub name: String,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub mapper: Option<String>,
}

impl ProcessorConfig {
    /// Parse a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Resolves every pipeline against the registry.
    ///
    /// The returned builder still needs its sinks before it can be built.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCallable`] for any unresolved name and
    /// [`ConfigError::InputStream`] when the input names a stream.
    pub fn builder(&self, registry: &Registry) -> Result<BatchProcessorBuilder, ConfigError> {
        let mut builder = BatchProcessorBuilder::default()
            .environment(self.environment.clone().or_env())
            .fan_out(self.fan_out);

        if let Some(input) = &self.input {
            if input.stream.is_some() {
                return Err(ConfigError::InputStream);
            }
            builder = builder.input(input.resolve(registry)?);
        }
        let outputs = self
            .outputs
            .iter()
            .map(|output| output.resolve(registry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(builder.outputs(outputs))
    }

    /// Builds the quarantine router, if one is configured.
    ///
    /// # Errors
    ///
    /// Unresolved names and a quarantine pipeline without a stream.
    pub fn quarantine(
        &self,
        registry: &Registry,
        sink: Arc<dyn StreamSink>,
    ) -> Result<Option<QuarantineRouter>, ConfigError> {
        self.quarantine
            .as_ref()
            .map(|pipeline| QuarantineRouter::new(pipeline.resolve(registry)?, sink))
            .transpose()
    }
}

impl PipelineConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCallable`] for any unresolved name.
    pub fn resolve(&self, registry: &Registry) -> Result<PipelineSpec, ConfigError> {
        let mut spec = PipelineSpec::new();
        if let Some(name) = &self.batch_mapper {
            spec = spec.shared_batch_mapper(registry.batch_mapper(name)?);
        }
        if let Some(name) = &self.filter {
            spec = spec.shared_filter(registry.filter(name)?);
        }
        if let Some(name) = &self.mapper {
            spec = spec.shared_mapper(registry.mapper(name)?);
        }
        if let Some(name) = &self.partition_key {
            spec = spec.shared_partition_key(registry.partition_key(name)?);
        }
        if let Some(stream) = &self.stream {
            spec = spec.stream(stream.clone());
        }
        for archive in &self.archive {
            spec = spec.archive(archive.resolve(registry)?);
        }
        Ok(spec)
    }
}

impl ArchiveConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCallable`] for any unresolved name.
    pub fn resolve(&self, registry: &Registry) -> Result<ArchiveTarget, ConfigError> {
        let mut target = ArchiveTarget::new(self.name.clone());
        if let Some(name) = &self.filter {
            target = target.shared_filter(registry.filter(name)?);
        }
        if let Some(name) = &self.mapper {
            target = target.shared_mapper(registry.mapper(name)?);
        }
        Ok(target)
    }
}
