use serde::Serialize;
use std::fmt;

use super::{AuthOutcome, BaseOutcome, Outcome, SelectOutcome};

/// The ordered steps of establishing a usable session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStage {
    Connect,
    Signin,
    Use,
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowStage::Connect => write!(f, "connect"),
            FlowStage::Signin => write!(f, "signin"),
            FlowStage::Use => write!(f, "use"),
        }
    }
}

/// Aggregate result of `Client::start_connection_flow`.
///
/// `failure_stage` is recorded once, for the first failure. The `auth` and
/// `select` sub-outcomes keep their default (failed, no message) value when
/// their stage was never attempted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowOutcome {
    #[serde(flatten)]
    base: BaseOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<FlowStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_stage: Option<FlowStage>,
    auth: AuthOutcome,
    select: SelectOutcome,
}

impl FlowOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stage that was running when the flow returned.
    pub fn stage(&self) -> Option<FlowStage> {
        self.stage
    }

    pub fn failure_stage(&self) -> Option<FlowStage> {
        self.failure_stage
    }

    pub fn auth(&self) -> &AuthOutcome {
        &self.auth
    }

    pub fn select(&self) -> &SelectOutcome {
        &self.select
    }

    pub(crate) fn enter(&mut self, stage: FlowStage) {
        self.stage = Some(stage);
    }

    /// Record an error raised by the current stage.
    pub(crate) fn set_error(&mut self, error: impl Into<String>) {
        if self.failure_stage.is_some() {
            return;
        }
        self.base.set_error(error);
        self.failure_stage = self.stage;
    }

    pub(crate) fn set_auth(&mut self, auth: AuthOutcome) {
        if self.failure_stage.is_none() {
            if auth.did_fail() {
                self.failure_stage = Some(FlowStage::Signin);
            }
            self.base.update_from(&auth);
        }
        self.auth = auth;
    }

    pub(crate) fn set_select(&mut self, select: SelectOutcome) {
        if self.failure_stage.is_none() {
            if select.did_fail() {
                self.failure_stage = Some(FlowStage::Use);
            }
            self.base.update_from(&select);
        }
        self.select = select;
    }
}

impl Outcome for FlowOutcome {
    fn status(&self) -> bool {
        self.base.status()
    }

    fn error(&self) -> Option<&str> {
        self.base.error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_flow_is_failed() {
        let flow = FlowOutcome::new();
        assert!(flow.did_fail());
        assert_eq!(flow.failure_stage(), None);
        assert!(flow.auth().did_fail());
        assert!(flow.select().did_fail());
    }

    #[test]
    fn test_error_marks_current_stage() {
        let mut flow = FlowOutcome::new();
        flow.enter(FlowStage::Connect);
        flow.set_error("connection refused");

        assert_eq!(flow.failure_stage(), Some(FlowStage::Connect));
        assert_eq!(flow.error(), Some("connection refused"));
    }

    #[test]
    fn test_failed_auth_marks_signin() {
        let mut flow = FlowOutcome::new();
        flow.enter(FlowStage::Signin);
        flow.set_auth(AuthOutcome::failed("bad credentials"));

        assert_eq!(flow.failure_stage(), Some(FlowStage::Signin));
        assert!(flow.did_fail());
        assert!(flow.auth().did_fail());
        assert_eq!(flow.select(), &SelectOutcome::default());
    }

    #[test]
    fn test_first_failure_wins() {
        let mut flow = FlowOutcome::new();
        flow.enter(FlowStage::Signin);
        flow.set_auth(AuthOutcome::failed("first"));
        flow.enter(FlowStage::Use);
        flow.set_error("second");

        assert_eq!(flow.failure_stage(), Some(FlowStage::Signin));
        assert_eq!(flow.error(), Some("first"));
    }

    #[test]
    fn test_all_stages_successful() {
        let mut flow = FlowOutcome::new();
        flow.enter(FlowStage::Connect);
        flow.enter(FlowStage::Signin);
        flow.set_auth(AuthOutcome::successful("token"));
        flow.enter(FlowStage::Use);
        flow.set_select(SelectOutcome::successful(Some(json!(null))));

        assert!(flow.did_succeed());
        assert_eq!(flow.failure_stage(), None);
        assert_eq!(flow.stage(), Some(FlowStage::Use));
        assert_eq!(flow.auth().token(), Some("token"));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(FlowStage::Signin.to_string(), "signin");
        assert_eq!(serde_json::to_value(FlowStage::Use).unwrap(), json!("use"));
    }
}
