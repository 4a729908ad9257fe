//! Newline-delimited JSON archival sink

use crate::error::Result;
use crate::types::FileSinkConfig;
use chrono::Utc;
use conduit_core::{ArchivalSink, Record, SinkFuture, SinkStatus};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// Archives records as newline-delimited JSON under a directory.
///
/// In append mode every target has one `<target>.ndjson` file. Otherwise
/// each write creates a new file under `<target>/`, named after the write
/// time and a sequence number.
pub struct FileArchivalSink {
    config: FileSinkConfig,
    sequence: AtomicU64,
}

impl FileArchivalSink {
    /// Creates a sink writing under `config.path`.
    #[must_use]
    pub const fn new(config: FileSinkConfig) -> Self {
        Self {
            config,
            sequence: AtomicU64::new(0),
        }
    }

    fn file_for(&self, target: &str) -> PathBuf {
        if self.config.append {
            return self.config.path.join(format!("{target}.ndjson"));
        }
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.config.path.join(target).join(format!(
            "{}-{sequence:06}.ndjson",
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
        ))
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    async fn write(&self, records: &[Record], target: &str) -> Result<SinkStatus> {
        let path = self.file_for(target);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&buffer).await?;
        file.flush().await?;

        debug!("Archived {} records to {}", records.len(), path.display());
        Ok(SinkStatus::ok())
    }
}

impl ArchivalSink for FileArchivalSink {
    fn send<'a>(&'a self, records: &'a [Record], target: &'a str) -> SinkFuture<'a> {
        Box::pin(async move { self.write(records, target).await.map_err(Into::into) })
    }
}
