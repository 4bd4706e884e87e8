use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;

use super::{ResponseDraft, ResponseRecord, ResponseSink, Result, SinkError};

/// Sink writing one pretty-printed JSON file per call under a base directory.
/// The reservation and the finished record live in separate files so an
/// interrupted session still leaves the draft behind.
pub struct JsonFileSink {
    base_path: PathBuf,
}

impl JsonFileSink {
    pub async fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let base_path = path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    fn sanitize_filename(key: &str) -> String {
        key.replace(|c: char| !c.is_alphanumeric() && c != '.' && c != '-', "_")
    }

    fn draft_path(&self, call_id: &str) -> PathBuf {
        self.base_path
            .join(format!("{}.draft.json", Self::sanitize_filename(call_id)))
    }

    fn record_path(&self, call_id: &str) -> PathBuf {
        self.base_path
            .join(format!("{}.json", Self::sanitize_filename(call_id)))
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read(path).await {
            Ok(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| SinkError::Serialization(e.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SinkError::Io(e)),
        }
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(value)
            .map_err(|e| SinkError::Serialization(e.to_string()))?;
        fs::write(path, data).await.map_err(SinkError::Io)
    }

    pub async fn load_draft(&self, call_id: &str) -> Result<Option<ResponseDraft>> {
        self.read_json(&self.draft_path(call_id)).await
    }

    pub async fn load_record(&self, call_id: &str) -> Result<Option<ResponseRecord>> {
        self.read_json(&self.record_path(call_id)).await
    }
}

#[async_trait]
impl ResponseSink for JsonFileSink {
    async fn create(&self, draft: &ResponseDraft) -> Result<()> {
        self.write_json(&self.draft_path(&draft.call_id), draft)
            .await
    }

    async fn save(&self, call_id: &str, record: &ResponseRecord) -> Result<()> {
        self.write_json(&self.record_path(call_id), record).await
    }
}
