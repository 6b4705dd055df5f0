use serde::Serialize;

use super::{BaseOutcome, Outcome};

/// Result of a `signin`; carries the session token on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthOutcome {
    #[serde(flatten)]
    base: BaseOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

impl AuthOutcome {
    pub fn successful(token: impl Into<String>) -> Self {
        Self {
            base: BaseOutcome::successful(),
            token: Some(token.into()),
        }
    }

    /// Accepted sign-in where the server returned no token.
    pub fn successful_without_token() -> Self {
        Self {
            base: BaseOutcome::successful(),
            token: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            base: BaseOutcome::failed(error),
            token: None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl Outcome for AuthOutcome {
    fn status(&self) -> bool {
        self.base.status()
    }

    fn error(&self) -> Option<&str> {
        self.base.error()
    }
}
