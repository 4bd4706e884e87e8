//! Conversational agent integration.
//!
//! Everything specific to the remote voice agent lives here: the settings
//! payload and prompt construction, the wire-message vocabulary, and the
//! connection that performs the welcome/configure handshake and keeps the
//! link alive.

pub mod connection;
pub mod events;
pub mod prompt;
pub mod settings;

pub use connection::{AgentConnection, ConnectionReadiness, ConnectionState};
pub use events::{AgentEvent, Role, parse_agent_message};
pub use prompt::build_prompt;
pub use settings::{KEEP_ALIVE, SettingsMessage};
