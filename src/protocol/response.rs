use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DriverError, DriverResult};

/// Method name the server uses for unsolicited push messages.
pub const NOTIFY_METHOD: &str = "notify";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// The payload half of a correlated reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcReply {
    pub result: Option<Value>,
    pub error: Option<RpcError>,
}

impl RpcReply {
    pub fn ok(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(RpcError {
                code: None,
                message: message.into(),
            }),
        }
    }

    /// Split into the server error or the (possibly absent) result.
    /// A JSON `null` result counts as absent.
    pub fn into_result(self) -> Result<Option<Value>, RpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.filter(|v| !v.is_null())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawInbound {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Reply { id: String, reply: RpcReply },
    Notify(Vec<Value>),
}

impl Inbound {
    pub fn decode(text: &str) -> DriverResult<Self> {
        let raw: RawInbound = serde_json::from_str(text)?;

        if raw.method.as_deref() == Some(NOTIFY_METHOD) {
            let params = match raw.params {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => vec![other],
            };
            return Ok(Inbound::Notify(params));
        }

        let id = match raw.id {
            Some(Value::String(id)) => id,
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(DriverError::Protocol(
                    "Reply without a correlation id".to_string(),
                ))
            }
        };

        Ok(Inbound::Reply {
            id,
            reply: RpcReply {
                result: raw.result,
                error: raw.error,
            },
        })
    }
}
