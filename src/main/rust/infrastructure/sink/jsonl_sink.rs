use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{DetectionRecord, DetectionSink};

/// Append-only detection event sink: one JSON object per line.
#[derive(Debug)]
pub struct JsonlDetectionSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlDetectionSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| DomainError::SinkAppend(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DetectionSink for JsonlDetectionSink {
    async fn append(&self, record: &DetectionRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| DomainError::SinkAppend(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| DomainError::SinkAppend(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| DomainError::SinkAppend(e.to_string()))?;

        Ok(())
    }
}
