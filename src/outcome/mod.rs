//! Result values for authentication, dataset selection and the staged
//! connection flow.
//!
//! Outcomes report failure as data instead of as an `Err`, so a caller can
//! inspect what went wrong without error handling.

mod auth;
mod flow;
mod select;

pub use auth::AuthOutcome;
pub use flow::{FlowOutcome, FlowStage};
pub use select::SelectOutcome;

use serde::Serialize;

use crate::error::DriverError;

/// Shared status accessors for every outcome type.
pub trait Outcome {
    fn status(&self) -> bool;

    fn error(&self) -> Option<&str>;

    fn did_fail(&self) -> bool {
        !self.status() || self.error().is_some()
    }

    fn did_succeed(&self) -> bool {
        self.status() && self.error().is_none()
    }
}

/// A boolean status with an optional error message.
///
/// The default value is a failed outcome with no message, which is what a
/// stage that never ran reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BaseOutcome {
    status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl BaseOutcome {
    pub fn successful() -> Self {
        Self {
            status: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: false,
            error: Some(error.into()),
        }
    }

    pub fn for_error(error: &DriverError) -> Self {
        Self::failed(error.to_string())
    }

    pub(crate) fn set_error(&mut self, error: impl Into<String>) {
        self.status = false;
        self.error = Some(error.into());
    }

    pub(crate) fn update_from(&mut self, other: &impl Outcome) {
        self.status = other.status();
        if let Some(error) = other.error() {
            self.error = Some(error.to_string());
        }
    }
}

impl Outcome for BaseOutcome {
    fn status(&self) -> bool {
        self.status
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
