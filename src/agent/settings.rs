//! Configuration payload sent in response to the remote welcome signal.
//!
//! Field names and values are part of the wire contract; audio stays 16-bit
//! linear PCM at 16kHz in both directions.

use serde::Serialize;

use super::prompt;
use crate::config::InterviewConfig;

/// Periodic keep-alive message, sent every 5 seconds once configured.
pub const KEEP_ALIVE: &str = r#"{"type":"KeepAlive"}"#;

const LANGUAGE: &str = "en";
const LISTEN_MODEL: &str = "nova-3";
const THINK_MODEL: &str = "gpt-4o-mini";
const SPEAK_MODEL: &str = "aura-2-thalia-en";

#[derive(Debug, Clone, Serialize)]
pub struct SettingsMessage {
    #[serde(rename = "type")]
    message_type: &'static str,
    pub audio: AudioSettings,
    pub agent: AgentSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioSettings {
    pub input: AudioFormat,
    pub output: AudioFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioFormat {
    pub encoding: &'static str,
    pub sample_rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSettings {
    pub language: &'static str,
    pub listen: ListenSettings,
    pub think: ThinkSettings,
    pub speak: SpeakSettings,
    pub greeting: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListenSettings {
    pub provider: Provider,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThinkSettings {
    pub provider: Provider,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakSettings {
    pub provider: Provider,
}

#[derive(Debug, Clone, Serialize)]
pub struct Provider {
    #[serde(rename = "type")]
    pub provider_type: &'static str,
    pub model: &'static str,
}

impl SettingsMessage {
    /// Build the full configuration payload for one interview.
    pub fn for_interview(config: &InterviewConfig) -> Self {
        Self {
            message_type: "Settings",
            audio: AudioSettings {
                input: AudioFormat {
                    encoding: "linear16",
                    sample_rate: 16000,
                    container: None,
                },
                output: AudioFormat {
                    encoding: "linear16",
                    sample_rate: 16000,
                    container: Some("wav"),
                },
            },
            agent: AgentSettings {
                language: LANGUAGE,
                listen: ListenSettings {
                    provider: Provider {
                        provider_type: "deepgram",
                        model: LISTEN_MODEL,
                    },
                },
                think: ThinkSettings {
                    provider: Provider {
                        provider_type: "open_ai",
                        model: THINK_MODEL,
                    },
                    prompt: prompt::build_prompt(config),
                },
                speak: SpeakSettings {
                    provider: Provider {
                        provider_type: "deepgram",
                        model: SPEAK_MODEL,
                    },
                },
                greeting: build_greeting(&config.candidate_name),
            },
        }
    }
}

fn build_greeting(candidate_name: &str) -> String {
    format!("Hello {}! Let's start the interview.", candidate_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_settings() -> serde_json::Value {
        let config = InterviewConfig::new("Ada", "Role", vec!["Q1".to_string()]);
        let settings = SettingsMessage::for_interview(&config);
        serde_json::to_value(&settings).unwrap()
    }

    #[test]
    fn test_settings_wire_shape() {
        let value = sample_settings();
        assert_eq!(value["type"], "Settings");
        assert_eq!(value["audio"]["input"]["encoding"], "linear16");
        assert_eq!(value["audio"]["input"]["sample_rate"], 16000);
        assert!(value["audio"]["input"].get("container").is_none());
        assert_eq!(value["audio"]["output"]["container"], "wav");
        assert_eq!(value["agent"]["language"], "en");
        assert_eq!(value["agent"]["listen"]["provider"]["model"], "nova-3");
        assert_eq!(value["agent"]["think"]["provider"]["type"], "open_ai");
        assert_eq!(value["agent"]["speak"]["provider"]["model"], "aura-2-thalia-en");
    }

    #[test]
    fn test_greeting_templated_with_name() {
        let value = sample_settings();
        assert_eq!(value["agent"]["greeting"], "Hello Ada! Let's start the interview.");
    }

    #[test]
    fn test_prompt_included_in_think_section() {
        let value = sample_settings();
        let prompt = value["agent"]["think"]["prompt"].as_str().unwrap();
        assert!(prompt.contains("1. Q1"));
    }

    #[test]
    fn test_keep_alive_shape() {
        let value: serde_json::Value = serde_json::from_str(KEEP_ALIVE).unwrap();
        assert_eq!(value["type"], "KeepAlive");
    }
}
