//! Surreal RPC Client
//!
//! Async driver that keeps one WebSocket RPC connection to a database server,
//! multiplexes calls over it by correlation id and reconnects with
//! exponential backoff after a drop.
//!
//! # Example
//!
//! ```no_run
//! use surreal_rpc::{Auth, Client, Outcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), surreal_rpc::DriverError> {
//!     let client = Client::builder()
//!         .host("http://127.0.0.1:8000")
//!         .auth(Auth::root("root", "root"))
//!         .use_config("test", "test")
//!         .build();
//!
//!     let flow = client.start_connection_flow().await;
//!     if flow.did_fail() {
//!         eprintln!("{:?} failed: {:?}", flow.failure_stage(), flow.error());
//!         return Ok(());
//!     }
//!
//!     let people = client.select("person").await?;
//!     println!("{}", people);
//!     client.close();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod emitter;
pub mod error;
pub mod outcome;
pub mod pinger;
pub mod protocol;

pub use client::{global, Client, ClientBuilder, ClientConfig, ClientEvent, ClientEventKind};
pub use config::DriverConfig;
pub use connection::{
    Connection, ConnectionEvent, ConnectionEventKind, ConnectionState, Connector,
    ReconnectPolicy, WsConnector,
};
pub use emitter::{BusEvent, EventBus, ListenerId};
pub use error::{DriverError, DriverResult};
pub use outcome::{AuthOutcome, BaseOutcome, FlowOutcome, FlowStage, Outcome, SelectOutcome};
pub use pinger::Pinger;
pub use protocol::{Auth, Patch, UseConfig};
