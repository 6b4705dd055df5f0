//! Connection lifecycle and reconnection
//!
//! A `Connection` owns at most one open transport at a time and drives the
//! state machine:
//!
//! ```text
//!   None ──open()──▶ Opening ──open event──▶ Opened
//!                       │                      │ transport closed
//!       first handshake │                      ▼
//!       fails (attempt 0)│               Reconnecting ──timer──▶ Opening (attempt n)
//!                       ▼                      │
//!                    Closed ◀── close() / retries exhausted / vetoed
//! ```
//!
//! Only a connection that has opened at least once earns automatic retries;
//! a failed first handshake is reported to the caller of `open()`.
//!
//! Each transport is tagged with a generation number. Events from a
//! superseded transport, or from an attempt that was already settled, are
//! ignored, so a pending `open()` is settled exactly once.

mod events;
mod state;
mod transport;
mod url;

pub use events::{ConnectionEvent, ConnectionEventKind};
pub use state::{ConnectionState, ReconnectPolicy, ReconnectSnapshot};
pub use transport::{
    Connector, Outbound, TransportEvent, TransportPeer, TransportStream, WsConnector,
    CLOSE_NORMAL, DEFAULT_HANDSHAKE_TIMEOUT,
};
pub use url::{normalize_endpoint, RPC_PATH};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::emitter::{EventBus, ListenerId};
use crate::error::{DriverError, DriverResult};
use state::ReconnectState;

/// Veto hook consulted before every retry; returning false stops reconnecting.
pub type ReconnectPredicate = Arc<dyn Fn(u32) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    url: String,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    predicate: RwLock<Option<ReconnectPredicate>>,
    events: EventBus<ConnectionEvent>,
    core: Mutex<Core>,
}

struct Core {
    state: ConnectionState,
    reconnect: ReconnectState,
    closed_by_user: bool,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    resolver: Option<OpenResolver>,
}

/// Settles the `open()` future of one attempt exactly once.
struct OpenResolver {
    generation: u64,
    handled: bool,
    tx: Option<oneshot::Sender<DriverResult<()>>>,
}

impl OpenResolver {
    fn new(generation: u64, tx: oneshot::Sender<DriverResult<()>>) -> Self {
        Self {
            generation,
            handled: false,
            tx: Some(tx),
        }
    }

    fn is_pending_for(&self, generation: u64) -> bool {
        self.generation == generation && !self.handled
    }

    fn settle(&mut self, result: DriverResult<()>) -> bool {
        if self.handled {
            return false;
        }
        self.handled = true;
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
        true
    }
}

impl Connection {
    /// Create a connection for an `http(s)://` endpoint. Nothing is dialed
    /// until `open()`.
    pub fn new(
        endpoint: &str,
        policy: ReconnectPolicy,
        connector: Arc<dyn Connector>,
    ) -> DriverResult<Self> {
        let url = normalize_endpoint(endpoint)?;
        let reconnect = ReconnectState::new(&policy);

        Ok(Self {
            inner: Arc::new(Inner {
                url,
                policy,
                connector,
                predicate: RwLock::new(None),
                events: EventBus::new(),
                core: Mutex::new(Core {
                    state: ConnectionState::None,
                    reconnect,
                    closed_by_user: false,
                    generation: 0,
                    outbound: None,
                    resolver: None,
                }),
            }),
        })
    }

    pub fn set_reconnect_predicate<F>(&self, predicate: F)
    where
        F: Fn(u32) -> bool + Send + Sync + 'static,
    {
        *self.inner.predicate.write() = Some(Arc::new(predicate));
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.inner.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.core.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Opened
    }

    pub fn is_connecting(&self) -> bool {
        self.state() == ConnectionState::Opening
    }

    pub fn is_reconnecting(&self) -> bool {
        self.state() == ConnectionState::Reconnecting
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    pub fn reconnect_state(&self) -> ReconnectSnapshot {
        self.inner.core.lock().reconnect.snapshot()
    }

    pub fn events(&self) -> &EventBus<ConnectionEvent> {
        &self.inner.events
    }

    pub fn on<F>(&self, kind: ConnectionEventKind, listener: F) -> ListenerId
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, listener)
    }

    /// Establish (or re-establish) the transport.
    ///
    /// Resolves once the transport is open. A failed first handshake is
    /// returned here and is never retried automatically.
    pub async fn open(&self) -> DriverResult<()> {
        let settled = self.inner.begin_open();
        match settled.await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Connection(
                "Open attempt was abandoned".to_string(),
            )),
        }
    }

    /// Write a text frame to the open transport.
    pub fn send(&self, payload: String) -> DriverResult<()> {
        let core = self.inner.core.lock();
        match (core.state, core.outbound.as_ref()) {
            (ConnectionState::Opened, Some(outbound)) => outbound
                .send(Outbound::Text(payload))
                .map_err(|_| DriverError::ConnectionLost),
            _ => Err(DriverError::NotConnected),
        }
    }

    /// Close the transport and disable automatic reconnection for this
    /// connection.
    pub fn close(&self, code: u16, reason: &str) {
        self.inner.close(code, reason);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn begin_open(self: &Arc<Self>) -> oneshot::Receiver<DriverResult<()>> {
        let (tx, rx) = oneshot::channel();

        let (generation, attempt) = {
            let mut core = self.core.lock();
            core.generation += 1;
            let generation = core.generation;

            if let Some(stale) = core.outbound.take() {
                let _ = stale.send(Outbound::Close {
                    code: CLOSE_NORMAL,
                    reason: "superseded".to_string(),
                });
            }
            if let Some(previous) = core.resolver.as_mut() {
                previous.settle(Err(DriverError::Connection(
                    "Superseded by a newer open attempt".to_string(),
                )));
            }
            core.reconnect.cancel_timer();
            core.resolver = Some(OpenResolver::new(generation, tx));
            core.state = ConnectionState::Opening;

            let attempt = core.reconnect.attempt;
            if attempt > 0 {
                core.reconnect.grow(&self.policy);
            }
            (generation, attempt)
        };

        if attempt > 0 {
            if attempt > self.policy.max_reconnect_attempts {
                self.abort_reconnect(
                    generation,
                    DriverError::ReconnectFailed {
                        attempts: attempt - 1,
                    },
                );
                return rx;
            }

            let predicate = self.predicate.read().clone();
            if let Some(predicate) = predicate {
                if !predicate(attempt) {
                    self.abort_reconnect(generation, DriverError::ReconnectCancelled { attempt });
                    return rx;
                }
            }
            info!(attempt = attempt, url = %self.url, "Attempting reconnection");
        } else {
            debug!(url = %self.url, "Opening connection");
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            match inner.connector.open_stream(&inner.url).await {
                Ok(stream) => inner.handle_open(generation, stream),
                Err(e) => inner.connecting_failed(generation, e),
            }
        });

        rx
    }

    fn handle_open(self: &Arc<Self>, generation: u64, stream: TransportStream) {
        let TransportStream { outbound, events } = stream;

        let (consumed, resolver) = {
            let mut core = self.core.lock();
            let current = core.generation == generation
                && core
                    .resolver
                    .as_ref()
                    .is_some_and(|r| r.is_pending_for(generation));
            if !current {
                drop(core);
                debug!(generation = generation, "Discarding transport from a settled attempt");
                let _ = outbound.send(Outbound::Close {
                    code: CLOSE_NORMAL,
                    reason: "stale".to_string(),
                });
                return;
            }

            core.state = ConnectionState::Opened;
            core.outbound = Some(outbound);
            let consumed = core.reconnect.reset(&self.policy);
            (consumed, core.resolver.take())
        };

        // Steady-state handling from here on: drops feed the reconnect path
        tokio::spawn(pump(Arc::downgrade(self), generation, events));

        if consumed > 0 {
            info!(attempts = consumed, url = %self.url, "Reconnected");
            self.events
                .emit(&ConnectionEvent::Reconnected { attempts: consumed });
        } else {
            info!(url = %self.url, "Connection opened");
        }
        self.events.emit(&ConnectionEvent::Open);

        if let Some(mut resolver) = resolver {
            resolver.settle(Ok(()));
        }
    }

    fn connecting_failed(self: &Arc<Self>, generation: u64, err: DriverError) {
        let (retry, attempt) = {
            let mut core = self.core.lock();
            if core.generation != generation {
                return;
            }
            let Some(resolver) = core.resolver.as_mut() else {
                return;
            };
            if !resolver.settle(Err(err.clone())) {
                return;
            }
            core.resolver = None;
            core.outbound = None;

            let attempt = core.reconnect.attempt;
            let retry = attempt > 0 && !core.closed_by_user && self.policy.auto_reconnect;
            core.state = if retry {
                ConnectionState::Reconnecting
            } else {
                ConnectionState::Closed
            };
            (retry, attempt)
        };

        if retry {
            warn!(attempt = attempt, error = %err, "Reconnect attempt failed");
            self.schedule_retry(generation);
        } else {
            warn!(url = %self.url, error = %err, "Connection failed");
        }
    }

    fn transport_closed(self: &Arc<Self>, generation: u64, code: Option<u16>, reason: String) {
        let (first_drop, retry) = {
            let mut core = self.core.lock();
            if core.generation != generation || core.state != ConnectionState::Opened {
                return;
            }
            core.outbound = None;

            if core.closed_by_user || !self.policy.auto_reconnect {
                core.state = ConnectionState::Closed;
                (false, false)
            } else {
                core.state = ConnectionState::Reconnecting;
                (core.reconnect.attempt == 0, true)
            }
        };

        if !retry {
            info!(code = ?code, reason = %reason, "Connection closed");
            self.events.emit(&ConnectionEvent::Close);
            return;
        }

        if first_drop {
            warn!(code = ?code, reason = %reason, url = %self.url, "Lost connection");
            self.events.emit(&ConnectionEvent::LostConnection);
        }
        self.schedule_retry(generation);
    }

    fn schedule_retry(self: &Arc<Self>, generation: u64) {
        let scheduled = {
            let mut core = self.core.lock();
            if core.generation != generation || core.state != ConnectionState::Reconnecting {
                return;
            }
            core.reconnect.cancel_timer();

            let made = core.reconnect.attempt;
            if made >= self.policy.max_reconnect_attempts {
                Err(made)
            } else {
                let delay = core.reconnect.interval;
                let weak = Arc::downgrade(self);
                core.reconnect.pending_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(inner) = weak.upgrade() {
                        inner.fire_retry(generation);
                    }
                }));
                Ok((made + 1, delay))
            }
        };

        // Cap reached: no further timer is armed
        let (attempt, delay) = match scheduled {
            Ok(next) => next,
            Err(attempts) => {
                self.abort_reconnect(generation, DriverError::ReconnectFailed { attempts });
                return;
            }
        };

        debug!(
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduled reconnect"
        );
        self.events
            .emit(&ConnectionEvent::Reconnecting { attempt, delay });
    }

    fn fire_retry(self: &Arc<Self>, generation: u64) {
        {
            let mut core = self.core.lock();
            if core.generation != generation
                || core.state != ConnectionState::Reconnecting
                || core.closed_by_user
            {
                return;
            }
            // This task is the pending timer; detach rather than abort it
            core.reconnect.pending_timer = None;
            core.reconnect.attempt += 1;
            core.reconnect.last_attempt_at = Some(Utc::now());
        }

        // Nobody awaits an automatic attempt; failures reschedule themselves
        let _ = self.begin_open();
    }

    fn abort_reconnect(&self, generation: u64, err: DriverError) {
        {
            let mut core = self.core.lock();
            if core.generation != generation {
                return;
            }
            core.reconnect.reset(&self.policy);
            core.outbound = None;
            core.state = ConnectionState::Closed;
            if let Some(resolver) = core.resolver.as_mut() {
                resolver.settle(Err(err.clone()));
            }
            core.resolver = None;
        }

        error!(url = %self.url, error = %err, "Giving up on reconnection");
        self.events.emit(&ConnectionEvent::Failure(err));
        self.events.emit(&ConnectionEvent::Close);
    }

    fn close(&self, code: u16, reason: &str) {
        let (previous, outbound) = {
            let mut core = self.core.lock();
            core.closed_by_user = true;
            core.generation += 1;
            core.reconnect.reset(&self.policy);
            if let Some(resolver) = core.resolver.as_mut() {
                resolver.settle(Err(DriverError::Connection(
                    "Connection closed before it opened".to_string(),
                )));
            }
            core.resolver = None;

            let previous = core.state;
            core.state = ConnectionState::Closed;
            (previous, core.outbound.take())
        };

        if let Some(outbound) = outbound {
            let _ = outbound.send(Outbound::Close {
                code,
                reason: reason.to_string(),
            });
        }

        if matches!(
            previous,
            ConnectionState::Opened | ConnectionState::Reconnecting
        ) {
            info!(url = %self.url, code = code, "Connection closed by client");
            self.events.emit(&ConnectionEvent::Close);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.core.lock().generation == generation
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        core.reconnect.cancel_timer();
        if let Some(outbound) = core.outbound.take() {
            let _ = outbound.send(Outbound::Close {
                code: CLOSE_NORMAL,
                reason: "dropped".to_string(),
            });
        }
    }
}

/// Forward steady-state transport events until the transport closes or is
/// superseded.
async fn pump(
    weak: Weak<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if !inner.is_current(generation) {
            return;
        }

        match event {
            TransportEvent::Message(text) => {
                inner.events.emit(&ConnectionEvent::Message(text));
            }
            TransportEvent::Error(reason) => {
                warn!(error = %reason, "Transport error");
                inner.events.emit(&ConnectionEvent::Error(reason));
            }
            TransportEvent::Closed { code, reason } => {
                inner.transport_closed(generation, code, reason);
                return;
            }
        }
    }

    if let Some(inner) = weak.upgrade() {
        inner.transport_closed(generation, None, "transport dropped".to_string());
    }
}
