//! WebSocket transport implementation over tokio-tungstenite.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{Transport, TransportEvent, TransportFactory};

/// Conversational agent endpoint.
pub const DEFAULT_AGENT_URL: &str = "wss://agent.deepgram.com/v1/agent/converse";

type RawWs = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<RawWs, Message>;
type WsStream = SplitStream<RawWs>;

/// WebSocket transport for one agent session.
pub struct WebSocketTransport {
    ws_sink: Arc<Mutex<Option<WsSink>>>,
    is_connected: Arc<Mutex<bool>>,
}

impl WebSocketTransport {
    fn new(sink: WsSink) -> Self {
        Self {
            ws_sink: Arc::new(Mutex::new(Some(sink))),
            is_connected: Arc::new(Mutex::new(true)),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&self, text: &str) -> Result<(), anyhow::Error> {
        let mut sink_guard = self.ws_sink.lock().await;
        let sink = sink_guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Socket is closed"))?;

        debug!(target: "Transport", "--> Sending text message: {} bytes", text.len());
        sink.send(Message::text(text.to_string()))
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket send error: {}", e))?;
        Ok(())
    }

    async fn send_binary(&self, frame: &[u8]) -> Result<(), anyhow::Error> {
        let mut sink_guard = self.ws_sink.lock().await;
        let sink = sink_guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Socket is closed"))?;

        trace!(target: "Transport", "--> Sending binary frame: {} bytes", frame.len());
        sink.send(Message::binary(frame.to_vec()))
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket send error: {}", e))?;
        Ok(())
    }

    async fn disconnect(&self) {
        let mut is_connected = self.is_connected.lock().await;
        if *is_connected {
            *is_connected = false;
            if let Some(mut sink) = self.ws_sink.lock().await.take() {
                let _ = sink.send(Message::Close(None)).await;
            }
        }
    }
}

/// Factory dialing the agent endpoint with a bearer credential.
pub struct WebSocketTransportFactory {
    url: String,
    credential: String,
}

impl WebSocketTransportFactory {
    pub fn new(url: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credential: credential.into(),
        }
    }
}

#[async_trait]
impl TransportFactory for WebSocketTransportFactory {
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        info!(target: "Transport", "Dialing {}", self.url);

        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| anyhow::anyhow!("Failed to build request: {}", e))?;
        request.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Token {}", self.credential))
                .map_err(|e| anyhow::anyhow!("Invalid credential header: {}", e))?,
        );

        let (client, _response) = connect_async(request)
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket connect failed: {}", e))?;

        let (sink, stream) = client.split();

        let (event_tx, event_rx) = mpsc::channel(100);
        let transport = Arc::new(WebSocketTransport::new(sink));

        let event_tx_clone = event_tx.clone();
        tokio::task::spawn(read_pump(stream, event_tx_clone));

        let _ = event_tx.send(TransportEvent::Connected).await;

        Ok((transport, event_rx))
    }
}

async fn read_pump(mut stream: WsStream, event_tx: mpsc::Sender<TransportEvent>) {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!(target: "Transport", "<-- Received text message: {} bytes", text.len());
                if event_tx
                    .send(TransportEvent::TextReceived(text.as_str().to_string()))
                    .await
                    .is_err()
                {
                    warn!(target: "Transport", "Event receiver dropped, closing read pump");
                    break;
                }
            }
            Some(Ok(Message::Binary(data))) => {
                trace!(target: "Transport", "<-- Received binary frame: {} bytes", data.len());
                if event_tx
                    .send(TransportEvent::BinaryReceived(data))
                    .await
                    .is_err()
                {
                    warn!(target: "Transport", "Event receiver dropped, closing read pump");
                    break;
                }
            }
            Some(Ok(Message::Close(_))) => {
                trace!(target: "Transport", "Received close frame");
                break;
            }
            // Ping/pong handled by the protocol layer.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!(target: "Transport", "Error reading from websocket: {e}");
                break;
            }
            None => {
                trace!(target: "Transport", "Websocket stream ended");
                break;
            }
        }
    }

    let _ = event_tx.send(TransportEvent::Disconnected).await;
}
