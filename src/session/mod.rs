//! Interview session orchestration.
//!
//! The session layer turns the raw agent event stream into conversation
//! state: turn-taking, the deduplicated transcript, the duration limit, and
//! the final persisted record. [`orchestrator::InterviewSession`] is the
//! entry point; everything else supports it.

pub mod events;
pub mod fluency;
pub mod orchestrator;
pub mod state;
pub mod transcript;

pub use events::EventBus;
pub use fluency::{FluencyReport, TimedWord};
pub use orchestrator::{InterviewSession, SessionCommand, SessionResources, SessionSummary};
pub use state::{EndReason, SessionPhase, SessionTransition, Turn, apply_transition};
pub use transcript::{TranscriptEntry, TranscriptLog};
