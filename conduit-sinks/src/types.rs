//! Common types used across different sinks

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for file system sinks
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Directory archive files are written under
    pub path: PathBuf,
    /// Append every batch of a target to one file instead of writing one
    /// file per batch
    pub append: bool,
}

/// Configuration for message queue sinks
#[derive(Debug, Clone)]
pub struct QueueSinkConfig {
    /// Queue connection string
    pub connection_string: String,
    /// Prefix prepended to every target to form the topic name
    pub topic_prefix: Option<String>,
    /// How long a record may wait in the producer queue
    pub timeout: Duration,
}

impl QueueSinkConfig {
    /// Creates a configuration with no topic prefix and a 5 second timeout.
    #[must_use]
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            topic_prefix: None,
            timeout: Duration::from_secs(5),
        }
    }

    /// The topic a target resolves to.
    #[must_use]
    pub fn topic(&self, target: &str) -> String {
        match &self.topic_prefix {
            Some(prefix) => format!("{prefix}{target}"),
            None => target.to_string(),
        }
    }
}
