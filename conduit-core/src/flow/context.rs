use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ENVIRONMENT_VAR: &str = "CONDUIT_ENVIRONMENT";
pub const LAYER_VAR: &str = "CONDUIT_LAYER";
pub const STAGE_VAR: &str = "CONDUIT_STAGE";

/// Deployment identifiers handed to every callable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Environment {
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub layer: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
}

impl Environment {
    /// Reads the identifiers from the `CONDUIT_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().or_env()
    }

    /// Fills every unset identifier from its environment variable.
    #[must_use]
    pub fn or_env(self) -> Self {
        Self {
            environment: self.environment.or_else(|| std::env::var(ENVIRONMENT_VAR).ok()),
            layer: self.layer.or_else(|| std::env::var(LAYER_VAR).ok()),
            stage: self.stage.or_else(|| std::env::var(STAGE_VAR).ok()),
        }
    }
}

/// Metadata about the hosting invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationMetadata {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl InvocationMetadata {
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Read-only context passed to every filter, mapper, batch mapper and
/// partition key of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingContext {
    environment: Environment,
    partition_id: String,
    invocation: InvocationMetadata,
}

impl ProcessingContext {
    #[must_use]
    pub fn new(
        environment: Environment,
        partition_id: impl Into<String>,
        invocation: InvocationMetadata,
    ) -> Self {
        Self {
            environment,
            partition_id: partition_id.into(),
            invocation,
        }
    }

    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.environment
    }

    #[must_use]
    pub fn environment_name(&self) -> Option<&str> {
        self.environment.environment.as_deref()
    }

    #[must_use]
    pub fn layer(&self) -> Option<&str> {
        self.environment.layer.as_deref()
    }

    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        self.environment.stage.as_deref()
    }

    /// Identifier of the source partition (shard) the batch was read from.
    #[must_use]
    pub fn partition_id(&self) -> &str {
        &self.partition_id
    }

    #[must_use]
    pub const fn invocation(&self) -> &InvocationMetadata {
        &self.invocation
    }
}
