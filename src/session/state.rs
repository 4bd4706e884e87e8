//! Interview session state machine.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which party currently holds the conversational floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Turn {
    Agent,
    User,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndReason {
    UserEnded,
    TimeExpired,
    ConnectionLost,
    AgentError,
}

/// Current phase of an interview session.
#[derive(Debug, Clone, Serialize, Default)]
pub enum SessionPhase {
    /// Nothing acquired yet.
    #[default]
    NotStarted,
    /// Resources are being acquired: microphone, connection, configuration.
    Connecting { started_at: DateTime<Utc> },
    /// Conversation in progress with audio flowing.
    Active {
        connected_at: DateTime<Utc>,
        turn: Turn,
    },
    /// Session over. Terminal.
    Ended {
        reason: EndReason,
        ended_at: DateTime<Utc>,
        duration_secs: Option<i64>,
    },
}

impl SessionPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended { .. })
    }

    pub fn can_start(&self) -> bool {
        matches!(self, Self::NotStarted)
    }

    pub fn current_turn(&self) -> Option<Turn> {
        match self {
            Self::Active { turn, .. } => Some(*turn),
            _ => None,
        }
    }
}

/// State transitions for sessions.
#[derive(Debug, Clone)]
pub enum SessionTransition {
    ConnectStarted,
    AgentReady,
    TurnChanged { turn: Turn },
    Ended { reason: EndReason },
}

/// Apply a state transition. Returns error if transition is invalid.
pub fn apply_transition(
    phase: &mut SessionPhase,
    transition: SessionTransition,
) -> Result<(), InvalidTransition> {
    let new_phase = match (&*phase, transition) {
        (SessionPhase::NotStarted, SessionTransition::ConnectStarted) => SessionPhase::Connecting {
            started_at: Utc::now(),
        },
        (SessionPhase::Connecting { .. }, SessionTransition::AgentReady) => SessionPhase::Active {
            connected_at: Utc::now(),
            turn: Turn::Agent,
        },
        (SessionPhase::Active { connected_at, .. }, SessionTransition::TurnChanged { turn }) => {
            SessionPhase::Active {
                connected_at: *connected_at,
                turn,
            }
        }
        (SessionPhase::Active { connected_at, .. }, SessionTransition::Ended { reason }) => {
            let duration = Utc::now()
                .signed_duration_since(*connected_at)
                .num_seconds();
            SessionPhase::Ended {
                reason,
                ended_at: Utc::now(),
                duration_secs: Some(duration),
            }
        }
        (
            SessionPhase::NotStarted | SessionPhase::Connecting { .. },
            SessionTransition::Ended { reason },
        ) => SessionPhase::Ended {
            reason,
            ended_at: Utc::now(),
            duration_secs: None,
        },
        (current, transition) => {
            return Err(InvalidTransition {
                current_phase: format!("{:?}", current),
                attempted: format!("{:?}", transition),
            });
        }
    };
    *phase = new_phase;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct InvalidTransition {
    pub current_phase: String,
    pub attempted: String,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid transition {} in phase {}",
            self.attempted, self.current_phase
        )
    }
}

impl std::error::Error for InvalidTransition {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test the complete session flow.
    /// Flow: NotStarted → Connecting → Active → Ended
    #[test]
    fn test_full_session_flow() {
        let mut phase = SessionPhase::default();
        assert!(phase.can_start());

        apply_transition(&mut phase, SessionTransition::ConnectStarted).unwrap();
        assert!(matches!(phase, SessionPhase::Connecting { .. }));
        assert!(!phase.can_start());

        apply_transition(&mut phase, SessionTransition::AgentReady).unwrap();
        assert!(phase.is_active());
        assert_eq!(phase.current_turn(), Some(Turn::Agent));

        apply_transition(
            &mut phase,
            SessionTransition::Ended {
                reason: EndReason::UserEnded,
            },
        )
        .unwrap();
        assert!(phase.is_ended());

        // Verify duration was recorded
        if let SessionPhase::Ended { duration_secs, .. } = phase {
            assert!(duration_secs.is_some());
        }
    }

    /// Test turn changes while active.
    #[test]
    fn test_turn_changes() {
        let mut phase = SessionPhase::default();
        apply_transition(&mut phase, SessionTransition::ConnectStarted).unwrap();
        apply_transition(&mut phase, SessionTransition::AgentReady).unwrap();

        apply_transition(&mut phase, SessionTransition::TurnChanged { turn: Turn::User }).unwrap();
        assert_eq!(phase.current_turn(), Some(Turn::User));

        // Re-asserting the held turn is allowed
        apply_transition(&mut phase, SessionTransition::TurnChanged { turn: Turn::User }).unwrap();
        assert_eq!(phase.current_turn(), Some(Turn::User));

        apply_transition(
            &mut phase,
            SessionTransition::TurnChanged { turn: Turn::Agent },
        )
        .unwrap();
        assert_eq!(phase.current_turn(), Some(Turn::Agent));
    }

    /// Test ending before the conversation became active records no duration.
    #[test]
    fn test_end_while_connecting_has_no_duration() {
        let mut phase = SessionPhase::default();
        apply_transition(&mut phase, SessionTransition::ConnectStarted).unwrap();

        apply_transition(
            &mut phase,
            SessionTransition::Ended {
                reason: EndReason::ConnectionLost,
            },
        )
        .unwrap();

        if let SessionPhase::Ended {
            reason,
            duration_secs,
            ..
        } = phase
        {
            assert_eq!(reason, EndReason::ConnectionLost);
            assert!(duration_secs.is_none());
        } else {
            panic!("expected Ended phase");
        }
    }

    /// Test invalid state transitions are rejected.
    #[test]
    fn test_invalid_transitions() {
        let mut phase = SessionPhase::default();

        // Can't become ready before connecting
        assert!(apply_transition(&mut phase, SessionTransition::AgentReady).is_err());

        // Can't change turn before active
        assert!(
            apply_transition(&mut phase, SessionTransition::TurnChanged { turn: Turn::User })
                .is_err()
        );
    }

    /// Test that ended sessions reject further transitions.
    #[test]
    fn test_ended_session_rejects_transitions() {
        let mut phase = SessionPhase::default();
        apply_transition(
            &mut phase,
            SessionTransition::Ended {
                reason: EndReason::UserEnded,
            },
        )
        .unwrap();
        assert!(phase.is_ended());

        // All transitions should fail
        assert!(apply_transition(&mut phase, SessionTransition::ConnectStarted).is_err());
        assert!(apply_transition(&mut phase, SessionTransition::AgentReady).is_err());
        assert!(
            apply_transition(
                &mut phase,
                SessionTransition::Ended {
                    reason: EndReason::TimeExpired,
                },
            )
            .is_err()
        );
    }
}
