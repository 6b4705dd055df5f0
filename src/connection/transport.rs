//! Transport capability
//!
//! The connection only needs to open a duplex text stream, write frames to it
//! and observe what comes back. `Connector` is that capability; `WsConnector`
//! provides it over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::{DriverError, DriverResult};

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Close code for a normal, user-initiated shutdown.
pub const CLOSE_NORMAL: u16 = 1000;

/// Something observed on an open transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message(String),
    Error(String),
    Closed { code: Option<u16>, reason: String },
}

/// A frame to write to an open transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

/// The connection-side ends of an open transport.
#[derive(Debug)]
pub struct TransportStream {
    pub outbound: mpsc::UnboundedSender<Outbound>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// The transport-side ends matching a [`TransportStream`].
#[derive(Debug)]
pub struct TransportPeer {
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportStream {
    pub fn pair() -> (TransportStream, TransportPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            TransportStream {
                outbound: outbound_tx,
                events: events_rx,
            },
            TransportPeer {
                outbound: outbound_rx,
                events: events_tx,
            },
        )
    }
}

/// Opens transports. `Ok` means the transport is open; `Err` means the
/// handshake failed.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open_stream(&self, url: &str) -> DriverResult<TransportStream>;
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// WebSocket transport.
#[derive(Debug, Clone)]
pub struct WsConnector {
    handshake_timeout: Duration,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

impl WsConnector {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open_stream(&self, url: &str) -> DriverResult<TransportStream> {
        debug!(url = %url, "Connecting to WebSocket");

        let (ws, _) = tokio::time::timeout(self.handshake_timeout, connect_async(url))
            .await
            .map_err(|_| {
                DriverError::Connection(format!(
                    "Handshake with {} timed out after {}ms",
                    url,
                    self.handshake_timeout.as_millis()
                ))
            })?
            .map_err(|e| DriverError::Connection(format!("WebSocket connect failed: {}", e)))?;

        let (sink, stream) = ws.split();
        let (transport, peer) = TransportStream::pair();
        tokio::spawn(write_loop(sink, peer.outbound, peer.events.clone()));
        tokio::spawn(read_loop(stream, peer.events));

        debug!(url = %url, "WebSocket connected");
        Ok(transport)
    }
}

async fn write_loop(
    mut sink: WsSink,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    while let Some(frame) = outbound.recv().await {
        match frame {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    let _ = events.send(TransportEvent::Error(format!("Failed to send: {}", e)));
                    break;
                }
            }
            Outbound::Close { code, reason } => {
                let frame = CloseFrame {
                    code: CloseCode::from(code),
                    reason: reason.into(),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                break;
            }
        }
    }
    let _ = sink.close().await;
    trace!("Writer loop ended");
}

async fn read_loop(mut stream: WsStream, events: mpsc::UnboundedSender<TransportEvent>) {
    while let Some(msg) = stream.next().await {
        let event = match msg {
            Ok(Message::Text(text)) => TransportEvent::Message(text.as_str().to_owned()),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => TransportEvent::Message(text),
                Err(_) => {
                    debug!("Dropping non UTF-8 binary frame");
                    continue;
                }
            },
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame
                    .map(|f| (Some(u16::from(f.code)), f.reason.as_str().to_owned()))
                    .unwrap_or((None, String::new()));
                let _ = events.send(TransportEvent::Closed { code, reason });
                return;
            }
            // Ping/pong are answered by tungstenite
            Ok(_) => continue,
            Err(e) => {
                let reason = e.to_string();
                let _ = events.send(TransportEvent::Error(reason.clone()));
                let _ = events.send(TransportEvent::Closed { code: None, reason });
                return;
            }
        };

        if events.send(event).is_err() {
            return;
        }
    }

    let _ = events.send(TransportEvent::Closed {
        code: None,
        reason: "stream ended".to_string(),
    });
}
