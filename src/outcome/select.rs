use serde::Serialize;
use serde_json::Value;

use super::{BaseOutcome, Outcome};

/// Result of a `use` call; carries the server payload on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectOutcome {
    #[serde(flatten)]
    base: BaseOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl SelectOutcome {
    pub fn successful(data: Option<Value>) -> Self {
        Self {
            base: BaseOutcome::successful(),
            data,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            base: BaseOutcome::failed(error),
            data: None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}

impl Outcome for SelectOutcome {
    fn status(&self) -> bool {
        self.base.status()
    }

    fn error(&self) -> Option<&str> {
        self.base.error()
    }
}
