pub mod agent;
pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod transport;

pub use config::{AgentSecret, InterviewConfig, PersonalityDials};
pub use error::VoiceError;
pub use session::{EventBus, InterviewSession, SessionCommand, SessionResources, SessionSummary};
