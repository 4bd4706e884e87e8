// tests/session_e2e_test.rs
//
// End-to-end test driving a full interview session against in-process
// doubles: a scripted transport playing the agent's side, a silent
// microphone, a null audio output, and the in-memory response sink.

use async_trait::async_trait;
use bytes::Bytes;
use log::info;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use intervox::audio::capture::BlockHandler;
use intervox::audio::{
    AudioOutput, AudioOutputFactory, CaptureError, CaptureSource, PlaybackError, ScheduledChunk,
};
use intervox::session::EndReason;
use intervox::store::MemorySink;
use intervox::transport::{Transport, TransportEvent, TransportFactory};
use intervox::{InterviewConfig, InterviewSession, SessionCommand, SessionResources};

/// Transport double that records everything the session sends.
#[derive(Default)]
struct RecordingTransport {
    sent_text: Mutex<Vec<String>>,
    sent_binary: Mutex<Vec<Vec<u8>>>,
    disconnects: Mutex<u32>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, text: &str) -> Result<(), anyhow::Error> {
        self.sent_text.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn send_binary(&self, frame: &[u8]) -> Result<(), anyhow::Error> {
        self.sent_binary.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    async fn disconnect(&self) {
        *self.disconnects.lock().unwrap() += 1;
    }
}

/// Hands out one recording transport; the test keeps the event sender to
/// play the agent's side of the conversation.
struct ScriptedFactory {
    transport: Arc<RecordingTransport>,
    rx: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
}

impl ScriptedFactory {
    fn new() -> (Self, mpsc::Sender<TransportEvent>, Arc<RecordingTransport>) {
        let (tx, rx) = mpsc::channel(100);
        let transport = Arc::new(RecordingTransport::default());
        (
            Self {
                transport: transport.clone(),
                rx: Mutex::new(Some(rx)),
            },
            tx,
            transport,
        )
    }
}

#[async_trait]
impl TransportFactory for ScriptedFactory {
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("transport already created"))?;
        Ok((self.transport.clone() as Arc<dyn Transport>, rx))
    }
}

/// Microphone double that never produces audio.
#[derive(Default)]
struct SilentSource {
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl CaptureSource for SilentSource {
    fn start(&mut self, _handler: BlockHandler) -> Result<(), CaptureError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Output double with a frozen clock that counts begun chunks.
#[derive(Default)]
struct NullOutput {
    begun: Mutex<Vec<(f64, f64)>>,
}

impl NullOutput {
    fn begun(&self) -> Vec<(f64, f64)> {
        self.begun.lock().unwrap().clone()
    }
}

impl AudioOutput for NullOutput {
    fn current_time(&self) -> f64 {
        0.0
    }

    fn resume(&self) {}

    fn begin(&self, chunk: ScheduledChunk) {
        self.begun
            .lock()
            .unwrap()
            .push((chunk.start_time, chunk.duration));
    }

    fn close(&self) {}
}

struct NullOutputFactory(Arc<NullOutput>);

impl AudioOutputFactory for NullOutputFactory {
    fn create(&self) -> Result<Arc<dyn AudioOutput>, PlaybackError> {
        Ok(self.0.clone())
    }
}

/// TestHarness wires one session to all four doubles and keeps the handles
/// the assertions need.
struct TestHarness {
    session: InterviewSession,
    events_tx: mpsc::Sender<TransportEvent>,
    transport: Arc<RecordingTransport>,
    output: Arc<NullOutput>,
    sink: Arc<MemorySink>,
    mic_started: Arc<AtomicBool>,
    mic_stopped: Arc<AtomicBool>,
}

impl TestHarness {
    fn new(config: InterviewConfig) -> Self {
        let (factory, events_tx, transport) = ScriptedFactory::new();
        let output = Arc::new(NullOutput::default());
        let sink = Arc::new(MemorySink::new());
        let source = SilentSource::default();
        let mic_started = source.started.clone();
        let mic_stopped = source.stopped.clone();

        let resources = SessionResources {
            transport_factory: Arc::new(factory),
            capture_source: Box::new(source),
            output_factory: Arc::new(NullOutputFactory(output.clone())),
            sink: sink.clone(),
        };

        Self {
            session: InterviewSession::new(config, resources),
            events_tx,
            transport,
            output,
            sink,
            mic_started,
            mic_stopped,
        }
    }
}

fn interview_config() -> InterviewConfig {
    InterviewConfig::new(
        "Ada Lovelace",
        "Evaluate distributed systems background",
        vec![
            "Tell me about a hard bug you chased down".to_string(),
            "How did you verify the fix?".to_string(),
            "What would you do differently today?".to_string(),
        ],
    )
}

#[tokio::test]
async fn test_interview_runs_end_to_end() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .try_init();

    // 1. Setup
    let harness = TestHarness::new(interview_config());
    let call_id = harness.session.call_id().to_string();
    let bus = harness.session.bus();
    let commands = harness.session.commands();
    let mut started_rx = bus.started.subscribe();
    let mut transcript_rx = bus.transcript_updated.subscribe();
    let mut turns_rx = bus.turn_changed.subscribe();
    let mut ended_rx = bus.ended.subscribe();

    let run_handle = tokio::spawn(harness.session.run());

    // 2. Walk the agent through its handshake: connect, welcome, settings.
    harness
        .events_tx
        .send(TransportEvent::Connected)
        .await
        .unwrap();
    harness
        .events_tx
        .send(TransportEvent::TextReceived(
            r#"{"type":"Welcome","request_id":"req-1"}"#.to_string(),
        ))
        .await
        .unwrap();

    let started = started_rx.recv().await.expect("session should go live");
    assert_eq!(started.call_id, call_id);
    assert!(
        harness.mic_started.load(Ordering::SeqCst),
        "microphone should be capturing once the session is live"
    );

    // 3. Conversation: a greeting, the same greeting delivered twice, and
    //    one answer in the nested wire shape.
    let greeting = "Hello Ada Lovelace! Let's start the interview.";
    let agent_line = format!(
        r#"{{"type":"ConversationText","role":"assistant","content":"{greeting}"}}"#
    );
    harness
        .events_tx
        .send(TransportEvent::TextReceived(agent_line.clone()))
        .await
        .unwrap();
    harness
        .events_tx
        .send(TransportEvent::TextReceived(agent_line))
        .await
        .unwrap();
    harness
        .events_tx
        .send(TransportEvent::TextReceived(
            r#"{"type":"ConversationText","user":{"text":"It was a race in the scheduler."}}"#
                .to_string(),
        ))
        .await
        .unwrap();

    let first = transcript_rx.recv().await.expect("agent line on the bus");
    assert_eq!(first.entry.content, greeting);
    let second = transcript_rx.recv().await.expect("candidate line on the bus");
    assert_eq!(second.entry.content, "It was a race in the scheduler.");

    // The settings frame went out before any conversation was processed.
    let sent_text = harness.transport.sent_text.lock().unwrap().clone();
    let settings: serde_json::Value =
        serde_json::from_str(&sent_text[0]).expect("first frame should be the settings JSON");
    assert_eq!(settings["type"], "Settings");
    assert_eq!(settings["audio"]["input"]["sample_rate"], 16000);
    assert_eq!(settings["audio"]["output"]["encoding"], "linear16");
    let prompt = settings["agent"]["think"]["prompt"].as_str().unwrap();
    assert!(prompt.contains("Tell me about a hard bug you chased down"));

    // 4. Agent speech: one 0.1s PCM chunk must reach the output.
    harness
        .events_tx
        .send(TransportEvent::BinaryReceived(Bytes::from(vec![0u8; 3200])))
        .await
        .unwrap();

    // Turn flow: candidate spoke, then agent audio claimed the floor back.
    let turn = turns_rx.recv().await.expect("turn change to candidate");
    assert_eq!(turn.turn, intervox::session::Turn::User);
    let turn = turns_rx.recv().await.expect("turn change back to agent");
    assert_eq!(turn.turn, intervox::session::Turn::Agent);

    let begun = harness.output.begun();
    assert_eq!(begun.len(), 1);
    assert!((begun[0].1 - 0.1).abs() < 1e-9, "3200 bytes is 0.1s at 16kHz");

    // 5. End by user command and check everything left behind.
    commands.send(SessionCommand::End).unwrap();
    let summary = run_handle
        .await
        .expect("session task should not panic")
        .expect("session should end with a summary");

    assert_eq!(summary.call_id, call_id);
    assert_eq!(summary.reason, EndReason::UserEnded);
    assert!(summary.persist_failure.is_none());

    let ended = ended_rx.recv().await.expect("ended event on the bus");
    assert_eq!(ended.reason, EndReason::UserEnded);

    let draft = harness
        .sink
        .draft(&call_id)
        .await
        .expect("draft reserved when the session went live");
    assert_eq!(draft.name, "Ada Lovelace");

    let record = harness
        .sink
        .saved(&call_id)
        .await
        .expect("final record persisted");
    assert!(record.is_ended);
    assert_eq!(record.tab_switch_count, 0);
    assert_eq!(record.details.transcript_object.len(), 2, "duplicate line deduplicated");
    assert_eq!(
        record.details.transcript,
        format!("Interviewer: {greeting}\nCandidate: It was a race in the scheduler.")
    );

    assert!(harness.mic_stopped.load(Ordering::SeqCst));
    assert_eq!(*harness.transport.disconnects.lock().unwrap(), 1);
    assert!(
        harness.transport.sent_binary.lock().unwrap().is_empty(),
        "a silent microphone sends no audio frames"
    );

    info!("✅ test_interview_runs_end_to_end completed successfully!");
}

#[tokio::test(start_paused = true)]
async fn test_duration_limit_expires_session() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .try_init();

    // 1. A one-minute interview where nobody says anything.
    let mut config = interview_config();
    config.duration_minutes = "1".to_string();
    let harness = TestHarness::new(config);
    let call_id = harness.session.call_id().to_string();

    let run_handle = tokio::spawn(harness.session.run());

    harness
        .events_tx
        .send(TransportEvent::Connected)
        .await
        .unwrap();
    harness
        .events_tx
        .send(TransportEvent::TextReceived(
            r#"{"type":"Welcome","request_id":"req-2"}"#.to_string(),
        ))
        .await
        .unwrap();

    // 2. With the clock paused, awaiting the session drives the timer until
    //    the limit fires.
    let summary = run_handle
        .await
        .expect("session task should not panic")
        .expect("session should end with a summary");

    assert_eq!(summary.reason, EndReason::TimeExpired);
    assert!(summary.record.details.transcript_object.is_empty());

    let record = harness
        .sink
        .saved(&call_id)
        .await
        .expect("record persisted even for a silent interview");
    assert!(record.is_ended);
    assert_eq!(*harness.transport.disconnects.lock().unwrap(), 1);

    info!("✅ test_duration_limit_expires_session completed successfully!");
}
