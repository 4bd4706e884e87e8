//! Duplex message transport to the remote agent.
//!
//! The agent speaks JSON control messages as text frames and raw PCM audio as
//! binary frames. Everything above this module consumes the normalized
//! [`TransportEvent`] stream; the concrete WebSocket implementation lives in
//! [`websocket`].

pub mod websocket;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use websocket::WebSocketTransportFactory;

/// An event produced by the transport layer.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport has successfully connected.
    Connected,
    /// A text (JSON control) message has been received.
    TextReceived(String),
    /// A binary (audio) frame has been received.
    BinaryReceived(Bytes),
    /// The connection was lost.
    Disconnected,
}

/// Represents an active duplex connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a text (JSON control) message.
    async fn send_text(&self, text: &str) -> Result<(), anyhow::Error>;

    /// Sends a binary (audio) frame.
    async fn send_binary(&self, frame: &[u8]) -> Result<(), anyhow::Error>;

    /// Closes the connection.
    async fn disconnect(&self);
}

/// A factory responsible for creating new transport instances.
///
/// Each call dials a fresh connection; a dropped connection is never reused.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Creates a new transport and returns it, along with a stream of events.
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// A transport that records everything sent through it.
    #[derive(Default)]
    pub struct MockTransport {
        pub sent_text: Mutex<Vec<String>>,
        pub sent_binary: Mutex<Vec<Bytes>>,
        pub disconnects: Mutex<u32>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send_text(&self, text: &str) -> Result<(), anyhow::Error> {
            self.sent_text.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_binary(&self, frame: &[u8]) -> Result<(), anyhow::Error> {
            self.sent_binary
                .lock()
                .unwrap()
                .push(Bytes::copy_from_slice(frame));
            Ok(())
        }

        async fn disconnect(&self) {
            *self.disconnects.lock().unwrap() += 1;
        }
    }

    /// Factory handing out one scripted transport; the test keeps the event
    /// sender to inject inbound traffic.
    pub struct MockTransportFactory {
        transport: Arc<MockTransport>,
        rx: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
    }

    impl MockTransportFactory {
        pub fn new() -> (Self, mpsc::Sender<TransportEvent>, Arc<MockTransport>) {
            let (tx, rx) = mpsc::channel(100);
            let transport = Arc::new(MockTransport::default());
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
    impl TransportFactory for MockTransportFactory {
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
}
