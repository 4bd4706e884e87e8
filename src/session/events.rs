use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use super::state::{EndReason, Turn};
use super::transcript::TranscriptEntry;

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 100;

/// The session reached `Active`: the agent is configured and audio flows.
#[derive(Debug, Clone)]
pub struct SessionStarted {
    pub call_id: String,
    pub started_at: DateTime<Utc>,
}

/// The session is over and the record has been handed to the sink.
#[derive(Debug, Clone)]
pub struct SessionEnded {
    pub reason: EndReason,
    pub duration_secs: u64,
}

/// A session-level failure, already normalized to a description.
#[derive(Debug, Clone)]
pub struct SessionError {
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct TurnChanged {
    pub turn: Turn,
}

#[derive(Debug, Clone)]
pub struct TranscriptUpdated {
    pub entry: TranscriptEntry,
}

/// Periodic countdown toward the configured duration limit.
#[derive(Debug, Clone)]
pub struct TimeRemaining {
    pub seconds_left: u64,
}

// Macro to generate EventBus fields and constructor
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus that provides separate broadcast channels for each
        /// event type consumed by the surrounding UI.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    (started, Arc<SessionStarted>),
    (ended, Arc<SessionEnded>),
    (error, Arc<SessionError>),
    (turn_changed, Arc<TurnChanged>),
    (transcript_updated, Arc<TranscriptUpdated>),
    (time_remaining, Arc<TimeRemaining>),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
