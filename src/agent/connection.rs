//! The persistent connection to the conversational agent.
//!
//! Owns the transport lifecycle and the configuration handshake: the remote
//! party sends a welcome signal, we answer with the full settings payload,
//! and only then does audio flow. A transport drop at any point is terminal
//! for this instance; reconnection means a new connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Notify;
use tokio::sync::mpsc;

use super::events::{self, AgentEvent};
use super::settings::{self, SettingsMessage};
use crate::config::InterviewConfig;
use crate::error::VoiceError;
use crate::transport::{Transport, TransportEvent, TransportFactory};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Connection lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Configured,
    Closed,
}

#[derive(Default)]
struct ReadinessFlags {
    is_connected: AtomicBool,
    is_configured: AtomicBool,
}

/// Shared readiness flags, written only by the connection.
///
/// The capture pipeline reads these on its audio thread to decide whether a
/// block may be forwarded; it never mutates them.
#[derive(Clone, Default)]
pub struct ConnectionReadiness {
    inner: Arc<ReadinessFlags>,
}

impl ConnectionReadiness {
    pub fn is_connected(&self) -> bool {
        self.inner.is_connected.load(Ordering::Relaxed)
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_configured.load(Ordering::Relaxed)
    }

    pub fn is_ready(&self) -> bool {
        self.is_connected() && self.is_configured()
    }

    pub(crate) fn set_connected(&self, value: bool) {
        self.inner.is_connected.store(value, Ordering::Relaxed);
    }

    pub(crate) fn set_configured(&self, value: bool) {
        self.inner.is_configured.store(value, Ordering::Relaxed);
    }
}

/// One agent connection instance.
pub struct AgentConnection {
    transport: Arc<dyn Transport>,
    state: Mutex<ConnectionState>,
    readiness: ConnectionReadiness,
    shutdown_notifier: Arc<Notify>,
}

impl AgentConnection {
    /// Dial the agent and start the event pump. Returns the connection and
    /// the stream of normalized events, delivered in arrival order.
    pub async fn connect(
        factory: &dyn TransportFactory,
        config: &InterviewConfig,
    ) -> Result<(Arc<Self>, mpsc::Receiver<AgentEvent>), VoiceError> {
        let settings_json = serde_json::to_string(&SettingsMessage::for_interview(config))
            .map_err(|e| VoiceError::Connection(format!("settings serialization: {e}")))?;

        let (transport, transport_rx) = factory
            .create_transport()
            .await
            .map_err(|e| VoiceError::Connection(e.to_string()))?;

        let connection = Arc::new(Self {
            transport,
            state: Mutex::new(ConnectionState::Connecting),
            readiness: ConnectionReadiness::default(),
            shutdown_notifier: Arc::new(Notify::new()),
        });

        let (event_tx, event_rx) = mpsc::channel(100);
        tokio::task::spawn(Self::event_pump(
            connection.clone(),
            transport_rx,
            event_tx,
            settings_json,
        ));

        Ok((connection, event_rx))
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    /// Readiness flags for the capture pipeline.
    pub fn readiness(&self) -> ConnectionReadiness {
        self.readiness.clone()
    }

    /// Transmit one encoded audio frame. Valid only once configured; callers
    /// enforce the drop-if-not-ready policy, nothing is queued here.
    pub async fn send_audio(&self, frame: &[u8]) -> Result<(), VoiceError> {
        if self.state() != ConnectionState::Configured {
            return Err(VoiceError::Connection(
                "connection is not configured for audio".to_string(),
            ));
        }
        self.transport
            .send_binary(frame)
            .await
            .map_err(|e| VoiceError::Connection(e.to_string()))
    }

    /// Close the connection. Safe from any state, idempotent.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closed;
        }
        self.readiness.set_connected(false);
        self.readiness.set_configured(false);
        self.shutdown_notifier.notify_waiters();
        self.transport.disconnect().await;
        info!(target: "Agent", "Connection closed");
    }

    fn set_state(&self, new_state: ConnectionState) {
        *self.state.lock().unwrap() = new_state;
    }

    /// Terminal bookkeeping shared by `close` and the pump's disconnect path.
    fn mark_closed(&self) {
        self.set_state(ConnectionState::Closed);
        self.readiness.set_connected(false);
        self.readiness.set_configured(false);
        self.shutdown_notifier.notify_waiters();
    }

    async fn event_pump(
        connection: Arc<Self>,
        mut transport_rx: mpsc::Receiver<TransportEvent>,
        events: mpsc::Sender<AgentEvent>,
        settings_json: String,
    ) {
        while let Some(transport_event) = transport_rx.recv().await {
            match transport_event {
                TransportEvent::Connected => {
                    connection.set_state(ConnectionState::Open);
                    connection.readiness.set_connected(true);
                    info!(target: "Agent", "Connection open, awaiting welcome");
                    if events.send(AgentEvent::Opened).await.is_err() {
                        break;
                    }
                }
                TransportEvent::TextReceived(text) => match events::parse_agent_message(&text) {
                    Some(AgentEvent::Welcome) => {
                        if connection.state() == ConnectionState::Configured {
                            debug!(target: "Agent", "Duplicate welcome ignored");
                            continue;
                        }
                        debug!(target: "Agent", "Welcome received, sending configuration");
                        match connection.transport.send_text(&settings_json).await {
                            Ok(()) => {
                                connection.set_state(ConnectionState::Configured);
                                connection.readiness.set_configured(true);
                                info!(target: "Agent", "Configuration sent, connection ready");
                                Self::spawn_keepalive(&connection);
                                if events.send(AgentEvent::Welcome).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(target: "Agent", "Failed to send configuration: {}", e);
                                let _ = events
                                    .send(AgentEvent::RemoteError {
                                        description: format!("configuration send failed: {e}"),
                                    })
                                    .await;
                            }
                        }
                    }
                    Some(event) => {
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    None => {}
                },
                TransportEvent::BinaryReceived(data) => {
                    if events.send(AgentEvent::AudioChunk(data)).await.is_err() {
                        break;
                    }
                }
                TransportEvent::Disconnected => {
                    info!(target: "Agent", "Transport disconnected");
                    break;
                }
            }
        }

        connection.mark_closed();
        let _ = events.send(AgentEvent::Closed).await;
    }

    fn spawn_keepalive(connection: &Arc<Self>) {
        let transport = connection.transport.clone();
        let shutdown = connection.shutdown_notifier.clone();
        let readiness = connection.readiness.clone();
        tokio::task::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(KEEP_ALIVE_INTERVAL) => {
                        if !readiness.is_connected() {
                            debug!(target: "Agent/Keepalive", "Not connected, exiting keep-alive loop");
                            return;
                        }
                        debug!(target: "Agent/Keepalive", "Sending keep-alive");
                        if let Err(e) = transport.send_text(settings::KEEP_ALIVE).await {
                            warn!(target: "Agent/Keepalive", "Keep-alive send failed: {}", e);
                            return;
                        }
                    }
                    _ = shutdown.notified() => {
                        debug!(target: "Agent/Keepalive", "Shutdown signaled, exiting keep-alive loop");
                        return;
                    }
                }
            }
        });
    }
}
