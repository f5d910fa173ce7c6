//! Background expiry sweep.
//!
//! A long-lived view can sit idle past the token's expiry without issuing a
//! request. The sweep re-checks the stored expiry on a fixed period and
//! invalidates the session as soon as it has passed.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::SessionGuard;

/// Default sweep period in seconds.
pub const DEFAULT_SWEEP_PERIOD_SECS: u64 = 60;

/// Shortest period accepted; a zero period would spin.
const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Owns a running sweep task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct SweepHandle {
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Stop the sweep. No further checks or notifications happen.
    pub fn stop(mut self) {
        self.abort();
    }

    /// False once the sweep invalidated the session or was stopped.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Expiry sweep stopped");
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

impl SessionGuard {
    /// Start checking the stored expiry every `period`.
    ///
    /// Must be called from within a tokio runtime. The task ends after the
    /// first invalidation, since the owning view is gone by then.
    pub fn start_expiry_sweep(&self, period: Duration) -> SweepHandle {
        let period = period.max(MIN_SWEEP_PERIOD);
        let guard = self.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if guard.sweep_expired() {
                    break;
                }
            }
        });

        debug!(period_secs = period.as_secs(), "Expiry sweep started");
        SweepHandle { task: Some(task) }
    }
}
