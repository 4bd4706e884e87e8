//! Persistence of interview responses.
//!
//! The sink is an external collaborator behind the [`ResponseSink`] trait: a
//! record is reserved when the call starts (create) and the finished
//! transcript is written once at session end (save), keyed by the call id.

pub mod filestore;
pub mod memory;

pub use filestore::JsonFileSink;
pub use memory::MemorySink;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::transcript::TranscriptEntry;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Record not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// Reservation issued right after the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDraft {
    pub call_id: String,
    pub interview_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
}

/// The finished record saved at session end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub is_ended: bool,
    pub tab_switch_count: u32,
    pub details: ResponseDetails,
    /// Wall-clock seconds between session start and end, rounded.
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDetails {
    pub transcript: String,
    pub transcript_object: Vec<TranscriptEntry>,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Reserve a record for a starting call.
    async fn create(&self, draft: &ResponseDraft) -> Result<()>;

    /// Persist the finished record for a previously reserved call.
    async fn save(&self, call_id: &str, record: &ResponseRecord) -> Result<()>;
}
