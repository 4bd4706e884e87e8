//! Inbound agent wire messages, normalized into one canonical event type.
//!
//! Control messages arrive as JSON text frames. Conversational text comes in
//! two accepted shapes (`{role, content}` or nested `{agent:{text}}` /
//! `{user:{text}}`); both are folded into a single `{role, content}` form
//! here and nowhere else.

use bytes::Bytes;
use log::debug;
use serde::{Deserialize, Serialize};

/// Which party produced a piece of conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    User,
}

/// A fully normalized event from the agent connection.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// The transport reached the remote endpoint.
    Opened,
    /// The remote party is ready to receive configuration.
    Welcome,
    /// One utterance, attributed to a speaker.
    ConversationText { role: Role, content: String },
    /// The user began speaking (barge-in trigger).
    UserStartedSpeaking,
    /// The agent began speaking. Latencies are advisory diagnostics.
    AgentStartedSpeaking {
        total_latency: Option<f64>,
        tts_latency: Option<f64>,
        ttt_latency: Option<f64>,
    },
    /// The agent finished its speaking turn.
    AgentAudioDone,
    /// One chunk of synthesized speech (PCM16 wire format).
    AudioChunk(Bytes),
    /// The remote party reported a fatal error.
    RemoteError { description: String },
    /// The connection is gone.
    Closed,
}

#[derive(Debug, Deserialize)]
struct SpeakerText {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireMessage {
    Welcome {
        #[allow(dead_code)]
        request_id: Option<String>,
    },
    ConversationText {
        role: Option<String>,
        content: Option<String>,
        agent: Option<SpeakerText>,
        user: Option<SpeakerText>,
    },
    UserStartedSpeaking,
    AgentStartedSpeaking {
        total_latency: Option<f64>,
        tts_latency: Option<f64>,
        ttt_latency: Option<f64>,
    },
    AgentAudioDone,
    Error {
        description: Option<String>,
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Parse one inbound text frame. Returns `None` for message types this
/// pipeline does not consume.
pub fn parse_agent_message(text: &str) -> Option<AgentEvent> {
    let wire: WireMessage = match serde_json::from_str(text) {
        Ok(wire) => wire,
        Err(e) => {
            debug!(target: "Agent", "Unparseable agent message ({}): {}", e, text);
            return None;
        }
    };

    match wire {
        WireMessage::Welcome { .. } => Some(AgentEvent::Welcome),
        WireMessage::ConversationText {
            role,
            content,
            agent,
            user,
        } => normalize_conversation_text(role, content, agent, user),
        WireMessage::UserStartedSpeaking => Some(AgentEvent::UserStartedSpeaking),
        WireMessage::AgentStartedSpeaking {
            total_latency,
            tts_latency,
            ttt_latency,
        } => Some(AgentEvent::AgentStartedSpeaking {
            total_latency,
            tts_latency,
            ttt_latency,
        }),
        WireMessage::AgentAudioDone => Some(AgentEvent::AgentAudioDone),
        WireMessage::Error {
            description,
            message,
        } => Some(AgentEvent::RemoteError {
            description: description
                .or(message)
                .unwrap_or_else(|| "unspecified agent error".to_string()),
        }),
        WireMessage::Unknown => {
            debug!(target: "Agent", "Ignoring agent message: {}", text);
            None
        }
    }
}

/// Fold both accepted conversational-text shapes into `{role, content}`.
fn normalize_conversation_text(
    role: Option<String>,
    content: Option<String>,
    agent: Option<SpeakerText>,
    user: Option<SpeakerText>,
) -> Option<AgentEvent> {
    if let (Some(role), Some(content)) = (role, content) {
        let role = if role == "assistant" || role == "agent" {
            Role::Agent
        } else {
            Role::User
        };
        return Some(AgentEvent::ConversationText { role, content });
    }
    if let Some(agent) = agent {
        return Some(AgentEvent::ConversationText {
            role: Role::Agent,
            content: agent.text,
        });
    }
    if let Some(user) = user {
        return Some(AgentEvent::ConversationText {
            role: Role::User,
            content: user.text,
        });
    }
    debug!(target: "Agent", "ConversationText without usable text");
    None
}
