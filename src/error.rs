use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Connection lost before a response arrived")]
    ConnectionLost,

    #[error("Failed to reconnect after {attempts} attempts")]
    ReconnectFailed { attempts: u32 },

    #[error("Reconnect cancelled before attempt {attempt}")]
    ReconnectCancelled { attempt: u32 },

    // Server-side rejections
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Permission error: {0}")]
    Permission(String),

    #[error("Record error: {0}")]
    Record(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Client is not configured: {0}")]
    NotConfigured(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

impl DriverError {
    /// True for failures of the transport itself, as opposed to a server reply.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DriverError::InvalidUrl(_)
                | DriverError::Connection(_)
                | DriverError::NotConnected
                | DriverError::ConnectionLost
                | DriverError::ReconnectFailed { .. }
                | DriverError::ReconnectCancelled { .. }
        )
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::Protocol(err.to_string())
    }
}

impl serde::Serialize for DriverError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            DriverError::Permission("Unable to create record: person".into()).to_string(),
            "Permission error: Unable to create record: person"
        );
        assert_eq!(
            DriverError::ReconnectFailed { attempts: 10 }.to_string(),
            "Failed to reconnect after 10 attempts"
        );
    }

    #[test]
    fn test_connection_error_classification() {
        assert!(DriverError::NotConnected.is_connection_error());
        assert!(DriverError::ReconnectCancelled { attempt: 2 }.is_connection_error());
        assert!(!DriverError::Server("parse error".into()).is_connection_error());
        assert!(!DriverError::Authentication("bad creds".into()).is_connection_error());
    }

    #[test]
    fn test_json_error_maps_to_protocol() {
        let err: DriverError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, DriverError::Protocol(_)));
    }
}
