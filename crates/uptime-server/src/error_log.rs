//! Process-local diagnostic error log.

use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{error, warn};

/// Error log file name inside the data directory
pub const ERROR_LOG_FILE: &str = "error.log";

/// Appends timestamped error entries to `<data_dir>/error.log`
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    /// Create a log writing into `data_dir`
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(ERROR_LOG_FILE),
        }
    }

    /// Log file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `payload` with the current timestamp.
    ///
    /// Never fails: a write error is reported once as a warning.
    pub async fn append(&self, payload: impl fmt::Display, also_print: bool) {
        let payload = payload.to_string();

        if also_print {
            error!(error = %payload, "Error recorded");
        }

        let line = format!("[{}] {}\n", Utc::now().to_rfc3339(), payload);
        if let Err(e) = self.write_line(&line).await {
            warn!(path = %self.path.display(), error = %e, "Failed to write error log");
        }
    }

    async fn write_line(&self, line: &str) -> common::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_creates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path().join("nested"));

        log.append("first failure", false).await;
        log.append(common::Error::not_found("maintenance 3"), true).await;

        let contents = tokio::fs::read_to_string(log.path()).await.unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] first failure"));
        assert!(lines[1].ends_with("Not found: maintenance 3"));
    }

    #[tokio::test]
    async fn test_write_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the data directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let log = ErrorLog::new(&blocker);
        log.append("lost entry", true).await;

        assert!(!log.path().exists());
    }
}
