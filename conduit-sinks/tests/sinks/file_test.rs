use crate::helpers::{init_tracing, records};
use conduit_core::{ArchivalSink, Record};
use conduit_sinks::{FileArchivalSink, FileSinkConfig};
use std::path::Path;

#[cfg(test)]
mod file_tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<Record> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn it_should_append_batches_to_target_file() {
        // Given
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let sink = FileArchivalSink::new(FileSinkConfig {
            path: dir.path().to_path_buf(),
            append: true,
        });

        // When
        let first = sink.send(&records(2), "raw").await.unwrap();
        let second = sink.send(&records(1), "raw").await.unwrap();

        // Then
        assert!(first.is_success());
        assert!(second.is_success());
        let archived = read_lines(&dir.path().join("raw.ndjson"));
        assert_eq!(archived.len(), 3);
        assert_eq!(archived[2], records(1)[0]);
    }

    #[tokio::test]
    async fn it_should_write_one_file_per_batch() {
        // Given
        let dir = tempfile::tempdir().unwrap();
        let sink = FileArchivalSink::new(FileSinkConfig {
            path: dir.path().to_path_buf(),
            append: false,
        });

        // When
        sink.send(&records(2), "analytics").await.unwrap();
        sink.send(&records(3), "analytics").await.unwrap();

        // Then
        let mut files: Vec<_> = std::fs::read_dir(dir.path().join("analytics"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        assert_eq!(files.len(), 2);
        let total: usize = files.iter().map(|file| read_lines(file).len()).sum();
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn it_should_fail_when_directory_cannot_be_created() {
        // Given
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let sink = FileArchivalSink::new(FileSinkConfig {
            path: blocker,
            append: true,
        });

        // When
        let result = sink.send(&records(1), "raw").await;

        // Then
        assert!(result.unwrap_err().to_string().starts_with("IO error"));
    }
}
