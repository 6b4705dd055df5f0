//! Configuration file handling
//!
//! Settings live in `surreal-rpc.toml`:
//!
//! ```toml
//! host = "http://127.0.0.1:8000"
//! ping_interval_ms = 30000
//!
//! [auth]
//! user = "root"
//! pass = "root"
//!
//! [use]
//! ns = "test"
//! db = "test"
//!
//! [reconnect]
//! auto_reconnect = true
//! reconnect_interval_ms = 1000
//! max_reconnect_interval_ms = 30000
//! max_reconnect_attempts = 10
//! ```
//!
//! ## Environment Variables
//!
//! - `SURREAL_HOST` - Server endpoint
//! - `SURREAL_USER` / `SURREAL_PASS` - Credentials
//! - `SURREAL_NS` / `SURREAL_DB` - Namespace and database
//!
//! These can be set in a `.env` file next to the configuration file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::client::{ClientBuilder, ClientConfig};
use crate::connection::ReconnectPolicy;
use crate::pinger::DEFAULT_PING_INTERVAL;
use crate::protocol::{Auth, UseConfig};

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "surreal-rpc.toml";

/// Environment variable names
pub const ENV_HOST: &str = "SURREAL_HOST";
pub const ENV_USER: &str = "SURREAL_USER";
pub const ENV_PASS: &str = "SURREAL_PASS";
pub const ENV_NS: &str = "SURREAL_NS";
pub const ENV_DB: &str = "SURREAL_DB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_config: Option<UseConfig>,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
}

fn default_ping_interval_ms() -> u64 {
    DEFAULT_PING_INTERVAL.as_millis() as u64
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            auth: None,
            use_config: None,
            reconnect: ReconnectPolicy::default(),
            ping_interval_ms: default_ping_interval_ms(),
        }
    }
}

impl DriverConfig {
    /// Load `surreal-rpc.toml` from a directory.
    ///
    /// A `.env` file in the same directory is loaded first, and environment
    /// variables override file settings.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let env_path = dir.join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }

        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            anyhow::bail!("Configuration file not found: {}", config_path.display());
        }

        let mut config = Self::from_file(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a configuration file without applying overrides.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DriverConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults plus whatever the environment provides.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = get(ENV_HOST) {
            self.host = host;
        }

        let user = get(ENV_USER);
        let pass = get(ENV_PASS);
        if user.is_some() || pass.is_some() {
            self.override_credentials(user, pass);
        }

        let ns = get(ENV_NS);
        let db = get(ENV_DB);
        match self.use_config.as_mut() {
            Some(current) => {
                if let Some(ns) = ns {
                    current.ns = ns;
                }
                if let Some(db) = db {
                    current.db = db;
                }
            }
            None => {
                if let (Some(ns), Some(db)) = (ns, db) {
                    self.use_config = Some(UseConfig { ns, db });
                }
            }
        }
    }

    fn override_credentials(&mut self, user: Option<String>, pass: Option<String>) {
        match &mut self.auth {
            Some(Auth::Root { user: u, pass: p })
            | Some(Auth::Namespace { user: u, pass: p, .. })
            | Some(Auth::Database { user: u, pass: p, .. }) => {
                if let Some(user) = user {
                    *u = user;
                }
                if let Some(pass) = pass {
                    *p = pass;
                }
            }
            // Scope credentials are arbitrary variables; only a full pair replaces them
            _ => {
                if let (Some(user), Some(pass)) = (user, pass) {
                    self.auth = Some(Auth::Root { user, pass });
                }
            }
        }
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.host.clone(),
            auth: self.auth.clone(),
            use_config: self.use_config.clone(),
        }
    }

    /// Builder preloaded with these settings.
    pub fn builder(&self) -> ClientBuilder {
        ClientBuilder::new()
            .config(self.client_config())
            .reconnect_policy(self.reconnect.clone())
            .ping_interval(self.ping_interval())
    }
}
