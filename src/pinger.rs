//! Keepalive ticker
//!
//! Invokes a callback at a fixed period so that proxies and load balancers
//! do not recycle an idle connection. It does not detect connection loss.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

pub struct Pinger {
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for Pinger {
    fn default() -> Self {
        Self::new(DEFAULT_PING_INTERVAL)
    }
}

impl Pinger {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking. A no-op returning false when already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&self, tick: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        let period = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tick();
            }
        }));
        true
    }

    /// Stop ticking. A no-op returning false when not running.
    pub fn stop(&self) -> bool {
        match self.task.lock().take() {
            Some(task) => {
                let was_running = !task.is_finished();
                task.abort();
                was_running
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Pinger {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_start_twice_runs_one_timer() {
        let pinger = Pinger::new(Duration::from_millis(20));
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&count);
        let c2 = Arc::clone(&count);
        assert!(pinger.start(move || {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(!pinger.start(move || {
            c2.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(pinger.is_running());

        tokio::time::sleep(Duration::from_millis(110)).await;
        let ticks = count.load(Ordering::SeqCst);
        // Two timers would have produced roughly twice as many ticks
        assert!(ticks >= 2, "expected ticks, got {}", ticks);
        assert!(ticks <= 6, "expected a single timer, got {} ticks", ticks);

        assert!(pinger.stop());
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let pinger = Pinger::new(Duration::from_millis(10));
        assert!(!pinger.stop());
        assert!(!pinger.is_running());
    }

    #[tokio::test]
    async fn test_stop_halts_ticks() {
        let pinger = Pinger::new(Duration::from_millis(10));
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        pinger.start(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(pinger.stop());
        let after_stop = count.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
        assert!(!pinger.stop());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let pinger = Pinger::new(Duration::from_millis(10));
        assert!(pinger.start(|| {}));
        assert!(pinger.stop());
        assert!(pinger.start(|| {}));
        assert!(pinger.is_running());
    }
}
