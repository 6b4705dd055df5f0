use std::sync::Arc;
use std::time::Duration;

use super::{Client, ClientConfig, ClientOptions};
use crate::connection::{Connector, ReconnectPolicy, WsConnector};
use crate::pinger::DEFAULT_PING_INTERVAL;
use crate::protocol::{Auth, UseConfig};

pub struct ClientBuilder {
    config: Option<ClientConfig>,
    policy: ReconnectPolicy,
    ping_interval: Duration,
    reject_pending_on_disconnect: bool,
    connector: Option<Arc<dyn Connector>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            policy: ReconnectPolicy::default(),
            ping_interval: DEFAULT_PING_INTERVAL,
            reject_pending_on_disconnect: false,
            connector: None,
        }
    }

    fn config_mut(&mut self) -> &mut ClientConfig {
        self.config.get_or_insert_with(ClientConfig::default)
    }

    pub fn host(mut self, host: &str) -> Self {
        self.config_mut().host = host.to_string();
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.config_mut().auth = Some(auth);
        self
    }

    pub fn use_config(mut self, ns: &str, db: &str) -> Self {
        self.config_mut().use_config = Some(UseConfig::new(ns, db));
        self
    }

    /// Replace host, auth and use settings at once.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Fail calls still waiting for a reply when the connection drops,
    /// instead of leaving them pending.
    pub fn reject_pending_on_disconnect(mut self, enabled: bool) -> Self {
        self.reject_pending_on_disconnect = enabled;
        self
    }

    /// Use a custom transport instead of WebSockets.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn build(self) -> Client {
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector::default()));

        Client::from_parts(
            connector,
            self.config,
            self.policy,
            ClientOptions {
                ping_interval: self.ping_interval,
                reject_pending_on_disconnect: self.reject_pending_on_disconnect,
            },
        )
    }
}
