//! Common test utilities for connection and client tests
//!
//! Provides:
//! - A scripted in-memory `Connector` that accepts or refuses handshakes
//! - A `MockServer` handle for each accepted transport
//! - Event recording and polling helpers

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use surreal_rpc::connection::{
    Connection, ConnectionEvent, ConnectionEventKind, Connector, Outbound, ReconnectPolicy,
    TransportEvent, TransportStream,
};
use surreal_rpc::{DriverError, DriverResult};
use tokio::sync::mpsc;

pub const MOCK_HOST: &str = "http://mock.local:8000";

const WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Accept,
    Refuse,
}

/// Connector whose handshakes follow a script, then a fallback.
pub struct MockConnector {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    attempts: AtomicU32,
    servers: mpsc::UnboundedSender<MockServer>,
}

impl MockConnector {
    /// Accept every handshake.
    pub fn accepting() -> (Arc<Self>, ServerQueue) {
        Self::scripted(vec![], Step::Accept)
    }

    pub fn scripted(steps: Vec<Step>, fallback: Step) -> (Arc<Self>, ServerQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(steps.into()),
            fallback,
            attempts: AtomicU32::new(0),
            servers: tx,
        });
        (connector, ServerQueue { rx })
    }

    /// Number of handshakes attempted so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open_stream(&self, url: &str) -> DriverResult<TransportStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().pop_front().unwrap_or(self.fallback);

        match step {
            Step::Refuse => Err(DriverError::Connection(format!(
                "connection refused: {}",
                url
            ))),
            Step::Accept => {
                let (stream, peer) = TransportStream::pair();
                let _ = self.servers.send(MockServer {
                    outbound: peer.outbound,
                    events: peer.events,
                });
                Ok(stream)
            }
        }
    }
}

/// Accepted transports, in handshake order.
pub struct ServerQueue {
    rx: mpsc::UnboundedReceiver<MockServer>,
}

impl ServerQueue {
    pub async fn next(&mut self) -> MockServer {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("Timed out waiting for a handshake")
            .expect("Connector dropped")
    }
}

/// Server side of one accepted transport.
pub struct MockServer {
    outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl MockServer {
    pub async fn next_frame(&mut self) -> Outbound {
        tokio::time::timeout(WAIT, self.outbound.recv())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Client side dropped")
    }

    /// Next request envelope, skipping keepalive pings unless asked for.
    pub async fn next_request(&mut self) -> Value {
        loop {
            match self.next_frame().await {
                Outbound::Text(text) => {
                    let request: Value = serde_json::from_str(&text).expect("Invalid envelope");
                    if request["method"] != "ping" {
                        return request;
                    }
                }
                Outbound::Close { code, reason } => {
                    panic!("Expected a request, got close {} {}", code, reason)
                }
            }
        }
    }

    pub async fn next_any_request(&mut self) -> Value {
        match self.next_frame().await {
            Outbound::Text(text) => serde_json::from_str(&text).expect("Invalid envelope"),
            other => panic!("Expected a request, got {:?}", other),
        }
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self
            .events
            .send(TransportEvent::Message(text.to_string()));
    }

    pub fn reply(&self, id: &Value, result: Value) {
        self.send_raw(&json!({"id": id, "result": result}).to_string());
    }

    pub fn reply_error(&self, id: &Value, message: &str) {
        self.send_raw(&json!({"id": id, "error": {"code": -32000, "message": message}}).to_string());
    }

    pub fn push(&self, params: Vec<Value>) {
        self.send_raw(&json!({"method": "notify", "params": params}).to_string());
    }

    /// Simulate an unexpected drop.
    pub fn drop_connection(&self) {
        let _ = self.events.send(TransportEvent::Closed {
            code: Some(1006),
            reason: "abnormal closure".to_string(),
        });
    }
}

pub fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        auto_reconnect: true,
        reconnect_interval: Duration::from_millis(5),
        max_reconnect_interval: Duration::from_millis(20),
        max_reconnect_attempts: 3,
    }
}

/// Record every lifecycle event of `connection`, except messages.
pub fn record(connection: &Connection) -> Arc<Mutex<Vec<ConnectionEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in ConnectionEventKind::ALL {
        if kind == ConnectionEventKind::Message {
            continue;
        }
        let sink = Arc::clone(&log);
        connection.on(kind, move |event| sink.lock().push(event.clone()));
    }
    log
}

/// Poll `condition` until it holds, panicking after a timeout.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("Condition not reached in time");
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

pub fn has_event(log: &Mutex<Vec<ConnectionEvent>>, wanted: &ConnectionEvent) -> bool {
    log.lock().iter().any(|e| e == wanted)
}

pub fn count_kind(log: &Mutex<Vec<ConnectionEvent>>, kind: ConnectionEventKind) -> usize {
    use surreal_rpc::BusEvent;
    log.lock().iter().filter(|e| e.kind() == kind).count()
}
