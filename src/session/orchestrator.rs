//! Top-level interview session orchestration.
//!
//! One [`InterviewSession`] wires capture, connection and playback together
//! and runs the whole conversation as a single event reducer: every inbound
//! signal (agent event, timer tick, external command) is processed to
//! completion before the next one. The session owns all mutable state;
//! the surrounding UI observes through the [`EventBus`] only.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::events::{
    EventBus, SessionEnded, SessionError, SessionStarted, TimeRemaining, TranscriptUpdated,
    TurnChanged,
};
use super::state::{self, EndReason, SessionPhase, SessionTransition, Turn};
use super::transcript::TranscriptLog;
use crate::agent::{AgentConnection, AgentEvent, Role};
use crate::audio::{AudioOutputFactory, CapturePipeline, CaptureSource, PlaybackScheduler};
use crate::config::InterviewConfig;
use crate::error::VoiceError;
use crate::store::{ResponseDetails, ResponseDraft, ResponseRecord, ResponseSink};
use crate::transport::TransportFactory;

/// How long to wait for the open/welcome/configure sequence.
const CONFIGURE_TIMEOUT: Duration = Duration::from_secs(15);

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// External commands accepted while the session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// End the interview now.
    End,
    /// The candidate's window lost focus once more.
    NoteTabSwitch,
}

/// The collaborators a session is wired to. One set per session; nothing
/// here is shared process-wide.
pub struct SessionResources {
    pub transport_factory: Arc<dyn TransportFactory>,
    pub capture_source: Box<dyn CaptureSource>,
    pub output_factory: Arc<dyn AudioOutputFactory>,
    pub sink: Arc<dyn ResponseSink>,
}

/// What a finished session leaves behind. The record is retained here even
/// when persisting it failed, so a caller can retry the save.
#[derive(Debug)]
pub struct SessionSummary {
    pub call_id: String,
    pub reason: EndReason,
    pub duration_secs: u64,
    pub record: ResponseRecord,
    pub persist_failure: Option<String>,
}

pub struct InterviewSession {
    config: InterviewConfig,
    resources: SessionResources,
    call_id: String,
    bus: Arc<EventBus>,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
}

impl InterviewSession {
    pub fn new(config: InterviewConfig, resources: SessionResources) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        Self {
            config,
            resources,
            call_id: generate_call_id(),
            bus: Arc::new(EventBus::new()),
            command_tx,
            command_rx,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// The bus the surrounding UI subscribes to. Grab it before `run`.
    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// A sender for external commands. Grab it before `run`.
    pub fn commands(&self) -> mpsc::UnboundedSender<SessionCommand> {
        self.command_tx.clone()
    }

    /// Drive the session from connection to persisted record.
    ///
    /// Fails before any hardware or network resource is acquired when the
    /// configuration is unusable, and during setup when the microphone,
    /// output device or agent connection cannot be brought up. Once the
    /// conversation is active the session always runs to a summary.
    pub async fn run(self) -> Result<SessionSummary, VoiceError> {
        // The session's own sender keeps the command channel open even when
        // no external handle was taken.
        let InterviewSession {
            config,
            resources,
            call_id,
            bus,
            command_tx: _command_tx,
            mut command_rx,
        } = self;

        if config.candidate_name.trim().is_empty() {
            return Err(VoiceError::Precondition(
                "interview configuration has no candidate name".to_string(),
            ));
        }

        let mut phase = SessionPhase::default();
        apply_or_warn(&mut phase, SessionTransition::ConnectStarted);
        info!(target: "Session", "Starting interview session {}", call_id);

        let (connection, mut agent_events) =
            AgentConnection::connect(&*resources.transport_factory, &config).await?;

        // The connection pump flips to Configured on its own once the remote
        // welcome arrives; wait for that before touching any audio hardware.
        let deadline = Instant::now() + CONFIGURE_TIMEOUT;
        loop {
            let event = match tokio::time::timeout_at(deadline, agent_events.recv()).await {
                Ok(event) => event,
                Err(_) => {
                    return Err(abort_setup(
                        &connection,
                        &bus,
                        VoiceError::Connection(
                            "timed out waiting for agent configuration".to_string(),
                        ),
                    )
                    .await);
                }
            };
            match event {
                Some(AgentEvent::Opened) => {}
                Some(AgentEvent::Welcome) => break,
                Some(AgentEvent::RemoteError { description }) => {
                    return Err(abort_setup(&connection, &bus, VoiceError::Connection(description))
                        .await);
                }
                Some(AgentEvent::Closed) | None => {
                    return Err(abort_setup(
                        &connection,
                        &bus,
                        VoiceError::Connection("connection closed during configuration".to_string()),
                    )
                    .await);
                }
                Some(other) => {
                    debug!(target: "Session", "Ignoring pre-configuration event: {:?}", other);
                }
            }
        }

        let scheduler = PlaybackScheduler::new(resources.output_factory.clone());
        if let Err(e) = scheduler.initialize() {
            return Err(abort_setup(&connection, &bus, VoiceError::from(e)).await);
        }

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let mut pipeline =
            CapturePipeline::new(resources.capture_source, connection.readiness(), outbound_tx);
        if let Err(e) = pipeline.start() {
            scheduler.stop();
            return Err(abort_setup(&connection, &bus, VoiceError::from(e)).await);
        }

        // Encoded capture frames go out on their own task so a slow send
        // never backs up into the reducer.
        let audio_connection = connection.clone();
        tokio::task::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = audio_connection.send_audio(&frame).await {
                    debug!(target: "Session", "Stopping audio forwarding: {}", e);
                    break;
                }
            }
        });

        let draft = ResponseDraft {
            call_id: call_id.clone(),
            interview_id: config.interview_id.clone(),
            name: config.candidate_name.clone(),
            email: config.candidate_email.clone(),
        };
        if let Err(e) = resources.sink.create(&draft).await {
            warn!(target: "Session", "Could not reserve response record: {}", e);
        }

        let started_wall = Utc::now();
        let started_monotonic = Instant::now();
        apply_or_warn(&mut phase, SessionTransition::AgentReady);
        let _ = bus.started.send(Arc::new(SessionStarted {
            call_id: call_id.clone(),
            started_at: started_wall,
        }));
        info!(target: "Session", "Session {} active", call_id);

        let mut transcript = TranscriptLog::new();
        let mut tab_switches: u32 = 0;
        let duration_limit = Duration::from_secs(config.duration_seconds());
        let mut tick = tokio::time::interval(TICK_INTERVAL);

        let reason = loop {
            tokio::select! {
                maybe_event = agent_events.recv() => match maybe_event {
                    Some(event) => {
                        if let Some(reason) =
                            reduce(event, &mut phase, &mut transcript, &scheduler, &bus)
                        {
                            break reason;
                        }
                    }
                    None => break EndReason::ConnectionLost,
                },
                maybe_command = command_rx.recv() => match maybe_command {
                    Some(SessionCommand::End) => break EndReason::UserEnded,
                    Some(SessionCommand::NoteTabSwitch) => {
                        tab_switches += 1;
                        debug!(target: "Session", "Tab switch noted ({} so far)", tab_switches);
                    }
                    None => {}
                },
                _ = tick.tick() => {
                    let elapsed = started_monotonic.elapsed();
                    if elapsed >= duration_limit {
                        info!(target: "Session", "Duration limit reached");
                        break EndReason::TimeExpired;
                    }
                    let _ = bus.time_remaining.send(Arc::new(TimeRemaining {
                        seconds_left: duration_limit.saturating_sub(elapsed).as_secs(),
                    }));
                }
            }
        };

        apply_or_warn(&mut phase, SessionTransition::Ended { reason });
        connection.close().await;
        scheduler.stop();
        pipeline.stop();

        let ended_wall = Utc::now();
        let duration_secs = round_seconds_between(started_wall, ended_wall);
        let record = ResponseRecord {
            is_ended: true,
            tab_switch_count: tab_switches,
            details: ResponseDetails {
                transcript: transcript.render(),
                transcript_object: transcript.entries().to_vec(),
                start_timestamp: started_wall,
                end_timestamp: ended_wall,
            },
            duration: duration_secs,
        };

        let _ = bus.ended.send(Arc::new(SessionEnded {
            reason,
            duration_secs,
        }));
        info!(
            target: "Session",
            "Session {} ended ({:?}) after {}s with {} transcript entries",
            call_id, reason, duration_secs, transcript.len()
        );

        let persist_failure = match resources.sink.save(&call_id, &record).await {
            Ok(()) => None,
            Err(e) => {
                warn!(target: "Session", "Saving response failed: {}", e);
                let _ = bus.error.send(Arc::new(SessionError {
                    description: format!("saving response failed: {e}"),
                }));
                Some(e.to_string())
            }
        };

        Ok(SessionSummary {
            call_id,
            reason,
            duration_secs,
            record,
            persist_failure,
        })
    }
}

/// One step of the event reducer. Returns the end reason once the session
/// must stop.
fn reduce(
    event: AgentEvent,
    phase: &mut SessionPhase,
    transcript: &mut TranscriptLog,
    scheduler: &PlaybackScheduler,
    bus: &EventBus,
) -> Option<EndReason> {
    match event {
        AgentEvent::ConversationText { role, content } => {
            if transcript.append(role, content) {
                let entry = transcript.entries().last().cloned();
                if let Some(entry) = entry {
                    let _ = bus
                        .transcript_updated
                        .send(Arc::new(TranscriptUpdated { entry }));
                }
            }
            let turn = match role {
                Role::Agent => Turn::Agent,
                Role::User => Turn::User,
            };
            set_turn(phase, turn, bus);
            None
        }
        AgentEvent::UserStartedSpeaking => {
            scheduler.clear_buffer();
            set_turn(phase, Turn::User, bus);
            None
        }
        AgentEvent::AgentStartedSpeaking {
            total_latency,
            tts_latency,
            ttt_latency,
        } => {
            debug!(
                target: "Session",
                "Agent speaking (latency total {:?} tts {:?} ttt {:?})",
                total_latency, tts_latency, ttt_latency
            );
            set_turn(phase, Turn::Agent, bus);
            None
        }
        AgentEvent::AgentAudioDone => {
            set_turn(phase, Turn::User, bus);
            None
        }
        AgentEvent::AudioChunk(data) => {
            if let Err(e) = scheduler.enqueue(&data) {
                warn!(target: "Session", "Could not enqueue agent audio: {}", e);
            }
            set_turn(phase, Turn::Agent, bus);
            None
        }
        AgentEvent::RemoteError { description } => {
            let _ = bus.error.send(Arc::new(SessionError {
                description: description.clone(),
            }));
            warn!(target: "Session", "Agent reported an error: {}", description);
            Some(EndReason::AgentError)
        }
        AgentEvent::Closed => Some(EndReason::ConnectionLost),
        AgentEvent::Opened | AgentEvent::Welcome => {
            debug!(target: "Session", "Ignoring repeated handshake event");
            None
        }
    }
}

fn set_turn(phase: &mut SessionPhase, turn: Turn, bus: &EventBus) {
    if phase.current_turn() == Some(turn) {
        return;
    }
    apply_or_warn(phase, SessionTransition::TurnChanged { turn });
    let _ = bus.turn_changed.send(Arc::new(TurnChanged { turn }));
}

fn apply_or_warn(phase: &mut SessionPhase, transition: SessionTransition) {
    if let Err(e) = state::apply_transition(phase, transition) {
        warn!(target: "Session", "{}", e);
    }
}

async fn abort_setup(
    connection: &Arc<AgentConnection>,
    bus: &EventBus,
    error: VoiceError,
) -> VoiceError {
    let _ = bus.error.send(Arc::new(SessionError {
        description: error.to_string(),
    }));
    connection.close().await;
    error
}

fn round_seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let millis = end.signed_duration_since(start).num_milliseconds().max(0);
    ((millis as f64) / 1000.0).round() as u64
}

/// Call ids follow the surrounding platform's format:
/// `call_<unix millis>_<9 random lowercase alphanumerics>`.
fn generate_call_id() -> String {
    const CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect();
    format!("call_{}_{}", Utc::now().timestamp_millis(), suffix)
}
