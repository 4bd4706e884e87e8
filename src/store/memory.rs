use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ResponseDraft, ResponseRecord, ResponseSink, Result, SinkError};

#[derive(Clone)]
struct StoredResponse {
    draft: ResponseDraft,
    record: Option<ResponseRecord>,
}

/// In-memory sink for tests and the dry-run demo. `save` follows the backing
/// store's update-by-id semantics: it fails for a call id that was never
/// reserved with `create`.
#[derive(Default)]
pub struct MemorySink {
    responses: Mutex<HashMap<String, StoredResponse>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn draft(&self, call_id: &str) -> Option<ResponseDraft> {
        self.responses
            .lock()
            .await
            .get(call_id)
            .map(|stored| stored.draft.clone())
    }

    pub async fn saved(&self, call_id: &str) -> Option<ResponseRecord> {
        self.responses
            .lock()
            .await
            .get(call_id)
            .and_then(|stored| stored.record.clone())
    }

    pub async fn len(&self) -> usize {
        self.responses.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.responses.lock().await.is_empty()
    }
}

#[async_trait]
impl ResponseSink for MemorySink {
    async fn create(&self, draft: &ResponseDraft) -> Result<()> {
        self.responses.lock().await.insert(
            draft.call_id.clone(),
            StoredResponse {
                draft: draft.clone(),
                record: None,
            },
        );
        Ok(())
    }

    async fn save(&self, call_id: &str, record: &ResponseRecord) -> Result<()> {
        let mut responses = self.responses.lock().await;
        match responses.get_mut(call_id) {
            Some(stored) => {
                stored.record = Some(record.clone());
                Ok(())
            }
            None => Err(SinkError::NotFound(call_id.to_string())),
        }
    }
}
