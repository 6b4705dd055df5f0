use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::DriverResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    pub id: String,
    pub method: String,
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    pub fn encode(&self) -> DriverResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The record-level methods whose replies go through outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrudMethod {
    Select,
    Create,
    Update,
    Change,
    Modify,
    Delete,
}

impl CrudMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrudMethod::Select => "select",
            CrudMethod::Create => "create",
            CrudMethod::Update => "update",
            CrudMethod::Change => "change",
            CrudMethod::Modify => "modify",
            CrudMethod::Delete => "delete",
        }
    }
}

impl fmt::Display for CrudMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_envelope() {
        let request = RpcRequest::new("abc", "use", vec![json!("ns"), json!("db")]);
        let encoded: Value = serde_json::from_str(&request.encode().unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({"id": "abc", "method": "use", "params": ["ns", "db"]})
        );
    }

    #[test]
    fn test_empty_params_are_sent_as_array() {
        let request = RpcRequest::new("1", "ping", vec![]);
        assert_eq!(
            request.encode().unwrap(),
            r#"{"id":"1","method":"ping","params":[]}"#
        );
    }
}
