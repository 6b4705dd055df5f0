use tracing::{info, warn};

use super::Client;
use crate::outcome::{FlowOutcome, FlowStage, Outcome};

impl Client {
    /// Connect, sign in and select the configured namespace/database.
    ///
    /// Never returns an error: the first failure is recorded in the outcome
    /// together with the stage it happened in, and the connection is closed.
    /// Stages after a failure are not attempted.
    pub async fn start_connection_flow(&self) -> FlowOutcome {
        let mut flow = FlowOutcome::new();

        flow.enter(FlowStage::Connect);
        if !self.is_configured(true) {
            flow.set_error(
                "Client is not configured: host, auth and use settings are required",
            );
            return flow;
        }
        if !self.is_connected() {
            if let Err(e) = self.connect().await {
                return self.fail_flow(flow, e.to_string());
            }
        }

        flow.enter(FlowStage::Signin);
        match self.signin(None).await {
            Ok(auth) => {
                let failed = auth.did_fail();
                flow.set_auth(auth);
                if failed {
                    return self.abandon(flow);
                }
            }
            Err(e) => return self.fail_flow(flow, e.to_string()),
        }

        flow.enter(FlowStage::Use);
        match self.use_database(None).await {
            Ok(select) => {
                let failed = select.did_fail();
                flow.set_select(select);
                if failed {
                    return self.abandon(flow);
                }
            }
            Err(e) => return self.fail_flow(flow, e.to_string()),
        }

        info!("Connection flow completed");
        flow
    }

    fn fail_flow(&self, mut flow: FlowOutcome, error: String) -> FlowOutcome {
        flow.set_error(error);
        self.abandon(flow)
    }

    fn abandon(&self, flow: FlowOutcome) -> FlowOutcome {
        warn!(
            stage = ?flow.failure_stage(),
            error = flow.error().unwrap_or_default(),
            "Connection flow failed"
        );
        if self.is_connected() {
            self.close();
        }
        flow
    }
}
