//! Transcript accumulation with duplicate suppression.
//!
//! The agent occasionally re-delivers the same conversational-text event, so
//! an entry is appended only when its `(role, content)` pair differs from the
//! last one in the log.

use serde::{Deserialize, Serialize};

use crate::agent::Role;

/// One utterance in the conversation, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

impl TranscriptEntry {
    fn speaker_label(&self) -> &'static str {
        match self.role {
            Role::Agent => "Interviewer",
            Role::User => "Candidate",
        }
    }
}

/// The ordered transcript built during one session.
#[derive(Debug, Clone, Default)]
pub struct TranscriptLog {
    entries: Vec<TranscriptEntry>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an utterance unless it repeats the last entry exactly.
    /// Returns whether the entry was appended.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> bool {
        let entry = TranscriptEntry {
            role,
            content: content.into(),
        };
        if self.entries.last() == Some(&entry) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the human-readable form, one "Speaker: text" line per entry.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}: {}", e.speaker_label(), e.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
