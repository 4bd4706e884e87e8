//! Session configuration supplied once before connecting.

use serde::{Deserialize, Serialize};

/// Applied when the interview record carries no duration.
pub const DEFAULT_DURATION_MINUTES: &str = "15";

/// Interviewer personality dials, each on a 0-10 scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PersonalityDials {
    pub empathy: u8,
    pub rapport: u8,
    pub exploration: u8,
    pub speed: u8,
}

impl Default for PersonalityDials {
    fn default() -> Self {
        Self {
            empathy: 7,
            rapport: 7,
            exploration: 7,
            speed: 5,
        }
    }
}

/// Immutable description of one interview session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewConfig {
    pub candidate_name: String,
    pub objective: String,
    pub questions: Vec<String>,
    /// Minutes, as recorded upstream. Unparseable values fall back to the
    /// default.
    #[serde(default = "default_duration")]
    pub duration_minutes: String,
    #[serde(default)]
    pub interviewer_name: Option<String>,
    #[serde(default)]
    pub personality: PersonalityDials,
    /// Upstream identifiers forwarded to the persistence sink.
    #[serde(default)]
    pub interview_id: Option<String>,
    #[serde(default)]
    pub candidate_email: Option<String>,
}

fn default_duration() -> String {
    DEFAULT_DURATION_MINUTES.to_string()
}

impl InterviewConfig {
    pub fn new(
        candidate_name: impl Into<String>,
        objective: impl Into<String>,
        questions: Vec<String>,
    ) -> Self {
        Self {
            candidate_name: candidate_name.into(),
            objective: objective.into(),
            questions,
            duration_minutes: default_duration(),
            interviewer_name: None,
            personality: PersonalityDials::default(),
            interview_id: None,
            candidate_email: None,
        }
    }

    /// Configured duration limit in seconds.
    pub fn duration_seconds(&self) -> u64 {
        let minutes = self
            .duration_minutes
            .trim()
            .parse::<u64>()
            .unwrap_or_else(|_| DEFAULT_DURATION_MINUTES.parse().unwrap_or(15));
        minutes * 60
    }
}

/// Bearer credential for the agent endpoint.
#[derive(Clone)]
pub struct AgentSecret(String);

impl AgentSecret {
    pub const ENV_VAR: &'static str = "DEEPGRAM_API_KEY";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the credential from the environment. Empty values count as
    /// absent.
    pub fn from_env() -> Option<Self> {
        std::env::var(Self::ENV_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Self)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AgentSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AgentSecret(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_on_deserialize() {
        let config: InterviewConfig = serde_json::from_str(
            r#"{"candidate_name":"Ada","objective":"Systems role","questions":["Q1"]}"#,
        )
        .unwrap();
        assert_eq!(config.duration_minutes, "15");
        assert_eq!(config.personality.empathy, 7);
        assert_eq!(config.personality.speed, 5);
        assert!(config.interviewer_name.is_none());
    }

    #[test]
    fn test_duration_seconds_parses_minutes() {
        let mut config = InterviewConfig::new("Ada", "Role", vec![]);
        config.duration_minutes = "1".to_string();
        assert_eq!(config.duration_seconds(), 60);
    }

    #[test]
    fn test_duration_seconds_falls_back_on_garbage() {
        let mut config = InterviewConfig::new("Ada", "Role", vec![]);
        config.duration_minutes = "soon".to_string();
        assert_eq!(config.duration_seconds(), 15 * 60);
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = AgentSecret::new("sk-very-secret");
        assert_eq!(format!("{:?}", secret), "AgentSecret(***)");
    }
}
