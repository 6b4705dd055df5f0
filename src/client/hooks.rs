//! Observer callbacks for connection lifecycle changes.

use std::sync::Arc;

use crate::error::DriverError;

pub type LifecycleHook = Arc<dyn Fn() + Send + Sync>;
pub type FailureHook = Arc<dyn Fn(&DriverError) + Send + Sync>;
pub type ReconnectAttemptHook = Arc<dyn Fn(u32) -> bool + Send + Sync>;
pub type ReconnectedHook = Arc<dyn Fn(u32) + Send + Sync>;

/// One optional callback per lifecycle change. Setting a hook replaces the
/// previous one.
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub open: Option<LifecycleHook>,
    pub end: Option<LifecycleHook>,
    pub failure: Option<FailureHook>,
    pub lost: Option<LifecycleHook>,
    pub reconnect_attempt: Option<ReconnectAttemptHook>,
    pub reconnected: Option<ReconnectedHook>,
}

impl Hooks {
    pub fn fire_open(&self) {
        if let Some(hook) = &self.open {
            hook();
        }
    }

    pub fn fire_end(&self) {
        if let Some(hook) = &self.end {
            hook();
        }
    }

    pub fn fire_failure(&self, err: &DriverError) {
        if let Some(hook) = &self.failure {
            hook(err);
        }
    }

    pub fn fire_lost(&self) {
        if let Some(hook) = &self.lost {
            hook();
        }
    }

    /// Without a hook every attempt is allowed.
    pub fn allow_reconnect(&self, attempt: u32) -> bool {
        self.reconnect_attempt
            .as_ref()
            .map_or(true, |hook| hook(attempt))
    }

    pub fn fire_reconnected(&self, attempts: u32) {
        if let Some(hook) = &self.reconnected {
            hook(attempts);
        }
    }
}
