//! RPC client façade
//!
//! A `Client` owns the current [`Connection`], correlates replies to calls by
//! id, fans push notifications out to subscribers and keeps the connection
//! warm with periodic pings.

mod builder;
mod flow;
mod global;
mod hooks;
mod output;
mod rpc;

pub use builder::ClientBuilder;
pub use global::global;
pub use hooks::{FailureHook, LifecycleHook, ReconnectAttemptHook, ReconnectedHook};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::connection::{
    Connection, ConnectionEvent, ConnectionEventKind, Connector, ReconnectPolicy, CLOSE_NORMAL,
};
use crate::emitter::{BusEvent, EventBus, ListenerId};
use crate::error::{DriverError, DriverResult};
use crate::pinger::Pinger;
use crate::protocol::{Auth, Inbound, RpcReply, RpcRequest, UseConfig};
use hooks::Hooks;

/// Where to connect and how to start a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_config: Option<UseConfig>,
}

impl ClientConfig {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Self::default()
        }
    }

    /// A host is always required; `full` also requires auth and use settings.
    pub fn is_complete(&self, full: bool) -> bool {
        if self.host.trim().is_empty() {
            return false;
        }
        !full || (self.auth.is_some() && self.use_config.is_some())
    }
}

/// Events published to client subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// One element of a server push.
    Notify(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEventKind {
    Notify,
}

impl BusEvent for ClientEvent {
    type Kind = ClientEventKind;

    fn kind(&self) -> ClientEventKind {
        match self {
            ClientEvent::Notify(_) => ClientEventKind::Notify,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ClientOptions {
    pub ping_interval: Duration,
    pub reject_pending_on_disconnect: bool,
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    connector: Arc<dyn Connector>,
    options: ClientOptions,
    config: RwLock<Option<ClientConfig>>,
    policy: RwLock<ReconnectPolicy>,
    connection: RwLock<Option<Connection>>,
    pending: Mutex<HashMap<String, oneshot::Sender<RpcReply>>>,
    token: RwLock<Option<String>>,
    hooks: RwLock<Hooks>,
    pinger: Pinger,
    events: EventBus<ClientEvent>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Unconfigured client using the WebSocket transport and default policy.
    pub fn new() -> Self {
        ClientBuilder::new().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(
        connector: Arc<dyn Connector>,
        config: Option<ClientConfig>,
        policy: ReconnectPolicy,
        options: ClientOptions,
    ) -> Self {
        let pinger = Pinger::new(options.ping_interval);
        Self {
            inner: Arc::new(ClientInner {
                connector,
                options,
                config: RwLock::new(config),
                policy: RwLock::new(policy),
                connection: RwLock::new(None),
                pending: Mutex::new(HashMap::new()),
                token: RwLock::new(None),
                hooks: RwLock::new(Hooks::default()),
                pinger,
                events: EventBus::new(),
            }),
        }
    }

    // ==================== Configuration ====================

    pub fn configure(&self, config: ClientConfig) {
        *self.inner.config.write() = Some(config);
    }

    pub fn config(&self) -> Option<ClientConfig> {
        self.inner.config.read().clone()
    }

    pub fn is_configured(&self, full: bool) -> bool {
        self.inner
            .config
            .read()
            .as_ref()
            .is_some_and(|c| c.is_complete(full))
    }

    /// Applies to connections created by later `connect` calls.
    pub fn set_reconnect_policy(&self, policy: ReconnectPolicy) {
        *self.inner.policy.write() = policy;
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.inner.policy.read().clone()
    }

    // ==================== Token ====================

    pub fn token(&self) -> Option<String> {
        self.inner.token.read().clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.inner.token.write() = token;
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.token.read().is_some()
    }

    // ==================== Hooks ====================

    pub fn on_connection_open<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.hooks.write().open = Some(Arc::new(hook));
    }

    pub fn on_connection_end<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.hooks.write().end = Some(Arc::new(hook));
    }

    pub fn on_connection_failure<F>(&self, hook: F)
    where
        F: Fn(&DriverError) + Send + Sync + 'static,
    {
        self.inner.hooks.write().failure = Some(Arc::new(hook));
    }

    pub fn on_lost_connection<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.hooks.write().lost = Some(Arc::new(hook));
    }

    /// Consulted before every reconnect attempt; return false to stop retrying.
    pub fn on_reconnect_attempt<F>(&self, hook: F)
    where
        F: Fn(u32) -> bool + Send + Sync + 'static,
    {
        self.inner.hooks.write().reconnect_attempt = Some(Arc::new(hook));
    }

    pub fn on_reconnected<F>(&self, hook: F)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.inner.hooks.write().reconnected = Some(Arc::new(hook));
    }

    /// Subscribe to server push notifications, one call per pushed element.
    pub fn on_notify<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.events.on(ClientEventKind::Notify, move |event| {
            let ClientEvent::Notify(value) = event;
            listener(value);
        })
    }

    pub fn off_notify(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    // ==================== Lifecycle ====================

    /// Create a fresh connection to the configured host and open it.
    ///
    /// Any previous connection is closed first. Connection failures are also
    /// reported to the connection-failure hook; a missing configuration is not.
    pub async fn connect(&self) -> DriverResult<()> {
        let host = self
            .inner
            .config
            .read()
            .as_ref()
            .filter(|c| c.is_complete(false))
            .map(|c| c.host.clone())
            .ok_or_else(|| {
                DriverError::NotConfigured(
                    "Call configure() with your database configuration first".to_string(),
                )
            })?;

        let result = self.try_connect(&host).await;
        if let Err(err) = &result {
            error!(error = %err, "Failed to connect");
            self.inner.hooks().fire_failure(err);
        }
        result
    }

    async fn try_connect(&self, host: &str) -> DriverResult<()> {
        let previous = self.inner.connection.write().take();
        if let Some(previous) = previous {
            debug!(url = %previous.url(), "Closing previous connection");
            previous.close(CLOSE_NORMAL, "replaced");
        }

        let policy = self.inner.policy.read().clone();
        let connection = Connection::new(host, policy, Arc::clone(&self.inner.connector))?;
        self.inner.wire(&connection);
        *self.inner.connection.write() = Some(connection.clone());

        info!(url = %connection.url(), "Connecting");
        connection.open().await
    }

    pub fn connection(&self) -> Option<Connection> {
        self.inner.current_connection()
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .current_connection()
            .is_some_and(|c| c.is_open())
    }

    /// Close the current connection. No reconnection follows.
    pub fn close(&self) {
        if let Some(connection) = self.inner.current_connection() {
            connection.close(CLOSE_NORMAL, "client closed");
        }
        self.inner.pinger.stop();
    }

    /// Number of calls still waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.lock().len()
    }

    // ==================== Calls ====================

    /// Send `method` with positional `params` and wait for the matching reply.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> DriverResult<RpcReply> {
        let connection = self
            .inner
            .current_connection()
            .filter(Connection::is_open)
            .ok_or(DriverError::NotConnected)?;

        let id = Uuid::new_v4().to_string();
        let payload = RpcRequest::new(id.clone(), method, params).encode()?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id.clone(), tx);
        let _entry = PendingEntry {
            inner: Arc::downgrade(&self.inner),
            id: id.clone(),
        };

        debug!(id = %id, method = %method, "Sending request");
        connection.send(payload)?;

        rx.await.map_err(|_| DriverError::ConnectionLost)
    }
}

/// Removes a call's pending entry when its future finishes or is dropped.
struct PendingEntry {
    inner: Weak<ClientInner>,
    id: String,
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            if inner.pending.lock().remove(&self.id).is_some() {
                debug!(id = %self.id, "Abandoned pending call");
            }
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field(
                "host",
                &self.inner.config.read().as_ref().map(|c| c.host.clone()),
            )
            .field("connection", &self.inner.current_connection())
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}

impl ClientInner {
    fn current_connection(&self) -> Option<Connection> {
        self.connection.read().clone()
    }

    fn hooks(&self) -> Hooks {
        self.hooks.read().clone()
    }

    fn wire(self: &Arc<Self>, connection: &Connection) {
        let weak = Arc::downgrade(self);

        connection.set_reconnect_predicate({
            let weak = weak.clone();
            move |attempt| {
                weak.upgrade()
                    .is_some_and(|inner| inner.hooks().allow_reconnect(attempt))
            }
        });

        connection.on(ConnectionEventKind::Open, {
            let weak = weak.clone();
            move |_| with_inner(&weak, |inner| inner.handle_open())
        });
        connection.on(ConnectionEventKind::Close, {
            let weak = weak.clone();
            move |_| with_inner(&weak, |inner| inner.handle_close())
        });
        connection.on(ConnectionEventKind::LostConnection, {
            let weak = weak.clone();
            move |_| with_inner(&weak, |inner| inner.handle_lost())
        });
        connection.on(ConnectionEventKind::Reconnected, {
            let weak = weak.clone();
            move |event| {
                if let ConnectionEvent::Reconnected { attempts } = event {
                    with_inner(&weak, |inner| inner.hooks().fire_reconnected(*attempts));
                }
            }
        });
        connection.on(ConnectionEventKind::Failure, {
            let weak = weak.clone();
            move |event| {
                if let ConnectionEvent::Failure(err) = event {
                    with_inner(&weak, |inner| inner.hooks().fire_failure(err));
                }
            }
        });
        connection.on(ConnectionEventKind::Message, move |event| {
            if let ConnectionEvent::Message(text) = event {
                with_inner(&weak, |inner| inner.dispatch(text));
            }
        });
    }

    fn handle_open(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.pinger.start(move || {
            with_inner(&weak, |inner| inner.send_ping());
        });
        self.hooks().fire_open();
    }

    fn handle_close(&self) {
        self.pinger.stop();
        self.sweep_pending();
        self.hooks().fire_end();
    }

    fn handle_lost(&self) {
        self.pinger.stop();
        self.sweep_pending();
        self.hooks().fire_lost();
    }

    /// With `reject_pending_on_disconnect`, dropping the waiters fails their
    /// calls with `ConnectionLost`. Otherwise they keep waiting.
    fn sweep_pending(&self) {
        if !self.options.reject_pending_on_disconnect {
            return;
        }
        let drained: Vec<_> = self.pending.lock().drain().collect();
        if !drained.is_empty() {
            warn!(count = drained.len(), "Rejecting calls pending on a lost connection");
        }
    }

    fn dispatch(&self, text: &str) {
        match Inbound::decode(text) {
            Ok(Inbound::Reply { id, reply }) => {
                let waiter = self.pending.lock().remove(&id);
                match waiter {
                    Some(tx) => {
                        debug!(id = %id, "Received reply");
                        let _ = tx.send(reply);
                    }
                    None => debug!(id = %id, "Dropping reply with no pending call"),
                }
            }
            Ok(Inbound::Notify(items)) => {
                for item in items {
                    self.events.emit(&ClientEvent::Notify(item));
                }
            }
            Err(e) => warn!(error = %e, "Ignoring malformed message"),
        }
    }

    /// Keepalive ping; the reply is not awaited and is dropped on arrival.
    fn send_ping(&self) {
        let Some(connection) = self.current_connection() else {
            return;
        };
        let request = RpcRequest::new(Uuid::new_v4().to_string(), "ping", Vec::new());
        match request.encode().and_then(|payload| connection.send(payload)) {
            Ok(()) => debug!("Sent keepalive ping"),
            Err(e) => debug!(error = %e, "Skipped keepalive ping"),
        }
    }
}

fn with_inner(weak: &Weak<ClientInner>, f: impl FnOnce(&Arc<ClientInner>)) {
    if let Some(inner) = weak.upgrade() {
        f(&inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_completeness() {
        let mut config = ClientConfig::new("http://localhost:8000");
        assert!(config.is_complete(false));
        assert!(!config.is_complete(true));

        config.auth = Some(Auth::root("root", "root"));
        config.use_config = Some(UseConfig::new("test", "test"));
        assert!(config.is_complete(true));

        assert!(!ClientConfig::new("  ").is_complete(false));
    }

    #[test]
    fn test_config_serde_uses_use_key() {
        let config: ClientConfig = serde_json::from_value(json!({
            "host": "http://localhost:8000",
            "auth": {"user": "root", "pass": "root"},
            "use": {"ns": "test", "db": "app"}
        }))
        .unwrap();
        assert_eq!(config.use_config, Some(UseConfig::new("test", "app")));
        assert_eq!(config.auth, Some(Auth::root("root", "root")));
    }

    #[test]
    fn test_unconfigured_client() {
        let client = Client::new();
        assert!(!client.is_configured(false));
        assert!(!client.is_connected());
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_call_without_connection() {
        let client = Client::new();
        let err = client.call("ping", vec![]).await.unwrap_err();
        assert_eq!(err, DriverError::NotConnected);
        assert_eq!(client.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_connect_requires_host() {
        let client = Client::new();
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, DriverError::NotConfigured(_)));
    }

    #[test]
    fn test_dispatch_fans_out_notify() {
        let client = Client::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client.on_notify(move |v| sink.lock().push(v.clone()));

        client
            .inner
            .dispatch(r#"{"method":"notify","params":[{"a":1},{"b":2}]}"#);

        assert_eq!(*seen.lock(), vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn test_dispatch_drops_unknown_reply() {
        let client = Client::new();
        client.inner.dispatch(r#"{"id":"nobody","result":true}"#);
        client.inner.dispatch("not json");
        assert_eq!(client.pending_calls(), 0);
    }
}
