use std::time::Duration;

use crate::emitter::BusEvent;
use crate::error::DriverError;

/// Lifecycle and inbound-traffic events published by a [`Connection`](super::Connection).
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Open,
    /// The connection reached `Closed` from a usable state.
    Close,
    /// First unexpected drop after a successful open.
    LostConnection,
    /// A retry timer was armed.
    Reconnecting { attempt: u32, delay: Duration },
    Reconnected { attempts: u32 },
    Message(String),
    Error(String),
    /// Terminal failure: retries exhausted or vetoed.
    Failure(DriverError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEventKind {
    Open,
    Close,
    LostConnection,
    Reconnecting,
    Reconnected,
    Message,
    Error,
    Failure,
}

impl ConnectionEventKind {
    pub const ALL: [ConnectionEventKind; 8] = [
        ConnectionEventKind::Open,
        ConnectionEventKind::Close,
        ConnectionEventKind::LostConnection,
        ConnectionEventKind::Reconnecting,
        ConnectionEventKind::Reconnected,
        ConnectionEventKind::Message,
        ConnectionEventKind::Error,
        ConnectionEventKind::Failure,
    ];
}

impl BusEvent for ConnectionEvent {
    type Kind = ConnectionEventKind;

    fn kind(&self) -> ConnectionEventKind {
        match self {
            ConnectionEvent::Open => ConnectionEventKind::Open,
            ConnectionEvent::Close => ConnectionEventKind::Close,
            ConnectionEvent::LostConnection => ConnectionEventKind::LostConnection,
            ConnectionEvent::Reconnecting { .. } => ConnectionEventKind::Reconnecting,
            ConnectionEvent::Reconnected { .. } => ConnectionEventKind::Reconnected,
            ConnectionEvent::Message(_) => ConnectionEventKind::Message,
            ConnectionEvent::Error(_) => ConnectionEventKind::Error,
            ConnectionEvent::Failure(_) => ConnectionEventKind::Failure,
        }
    }
}
