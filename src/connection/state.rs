use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    None,
    Opening,
    Opened,
    Closed,
    Reconnecting,
}

/// Retry policy applied after a previously successful connection drops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub auto_reconnect: bool,
    #[serde(rename = "reconnect_interval_ms", with = "duration_ms")]
    pub reconnect_interval: Duration,
    #[serde(rename = "max_reconnect_interval_ms", with = "duration_ms")]
    pub max_reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_interval: Duration::from_millis(1000),
            max_reconnect_interval: Duration::from_millis(30_000),
            max_reconnect_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            auto_reconnect: false,
            ..Self::default()
        }
    }
}

/// Mutable per-connection retry bookkeeping.
///
/// `attempt` is zero whenever the connection is opened; `interval` doubles
/// (up to the policy ceiling) only while attempts are being made.
#[derive(Debug)]
pub(crate) struct ReconnectState {
    pub attempt: u32,
    pub interval: Duration,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub pending_timer: Option<JoinHandle<()>>,
}

impl ReconnectState {
    pub fn new(policy: &ReconnectPolicy) -> Self {
        Self {
            attempt: 0,
            interval: policy.reconnect_interval,
            last_attempt_at: None,
            pending_timer: None,
        }
    }

    /// Reset after a successful open, returning the attempts that were consumed.
    pub fn reset(&mut self, policy: &ReconnectPolicy) -> u32 {
        let consumed = self.attempt;
        self.cancel_timer();
        self.attempt = 0;
        self.interval = policy.reconnect_interval;
        self.last_attempt_at = None;
        consumed
    }

    pub fn grow(&mut self, policy: &ReconnectPolicy) {
        self.interval = self
            .interval
            .saturating_mul(2)
            .min(policy.max_reconnect_interval);
    }

    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            timer.abort();
        }
    }

    pub fn snapshot(&self) -> ReconnectSnapshot {
        ReconnectSnapshot {
            attempt: self.attempt,
            interval: self.interval,
            last_attempt_at: self.last_attempt_at,
            timer_pending: self.pending_timer.is_some(),
        }
    }
}

/// Read-only view of the retry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectSnapshot {
    pub attempt: u32,
    pub interval: Duration,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub timer_pending: bool,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert!(policy.auto_reconnect);
        assert_eq!(policy.reconnect_interval, Duration::from_millis(1000));
        assert_eq!(policy.max_reconnect_interval, Duration::from_millis(30_000));
        assert_eq!(policy.max_reconnect_attempts, 10);
    }

    #[test]
    fn test_grow_doubles_and_caps() {
        let policy = ReconnectPolicy::default();
        let mut state = ReconnectState::new(&policy);
        let mut seen = vec![state.interval];
        for _ in 0..8 {
            state.grow(&policy);
            seen.push(state.interval);
        }

        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen[1], Duration::from_millis(2000));
        assert_eq!(*seen.last().unwrap(), policy.max_reconnect_interval);
    }

    #[test]
    fn test_reset_returns_consumed_attempts() {
        let policy = ReconnectPolicy::default();
        let mut state = ReconnectState::new(&policy);
        state.attempt = 3;
        state.grow(&policy);
        state.last_attempt_at = Some(Utc::now());

        assert_eq!(state.reset(&policy), 3);
        assert_eq!(state.attempt, 0);
        assert_eq!(state.interval, policy.reconnect_interval);
        assert!(state.last_attempt_at.is_none());
    }

    #[test]
    fn test_policy_serde_uses_millis() {
        let policy: ReconnectPolicy = serde_json::from_str(
            r#"{"auto_reconnect": true, "reconnect_interval_ms": 250, "max_reconnect_attempts": 3}"#,
        )
        .unwrap();
        assert_eq!(policy.reconnect_interval, Duration::from_millis(250));
        assert_eq!(policy.max_reconnect_interval, Duration::from_millis(30_000));
        assert_eq!(policy.max_reconnect_attempts, 3);
    }
}
