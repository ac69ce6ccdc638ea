//! Expiry sweep and the periodic task that drives it.

use crate::error::{SessionError, SessionResult};
use crate::traits::{SessionIndex, SweepWindow};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Scans the global expiry index and evicts what it finds.
#[derive(Clone)]
pub struct Sweeper {
    index: Arc<dyn SessionIndex>,
}

impl Sweeper {
    pub fn new(index: Arc<dyn SessionIndex>) -> Self {
        Self { index }
    }

    /// Run one sweep over `window`, returning how many global index entries
    /// were removed.
    ///
    /// Each entry is evicted in its own atomic unit. Entries that vanished or
    /// were re-scored out of the window since the scan count as no-ops.
    pub async fn run(&self, window: SweepWindow) -> SessionResult<u64> {
        let entries = self.index.scan(window).await?;
        let scanned = entries.len();

        let mut removed = 0u64;
        for entry in &entries {
            if self.index.evict(entry, window).await? {
                removed += 1;
            }
        }

        debug!(
            scanned = scanned,
            removed = removed,
            purge = window.is_purge(),
            "Session sweep finished"
        );

        Ok(removed)
    }
}

/// Periodic sweep task.
///
/// At most one task runs per scheduler; it is aborted on [`stop`](Self::stop)
/// and when the scheduler is dropped.
pub struct CleanupScheduler {
    sweeper: Sweeper,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl CleanupScheduler {
    /// Create a stopped scheduler.
    pub fn new(sweeper: Sweeper, interval: Duration) -> Self {
        Self {
            sweeper,
            interval,
            handle: None,
        }
    }

    /// Sweep interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the sweep task on the current Tokio runtime.
    ///
    /// The first sweep happens one full interval after starting.
    pub fn start(&mut self) -> SessionResult<()> {
        if self.is_running() {
            warn!("Cleanup scheduler already running");
            return Err(SessionError::SchedulerAlreadyRunning);
        }

        if self.interval.is_zero() {
            return Err(SessionError::Config(
                "cleanup interval must be greater than zero".to_string(),
            ));
        }

        let runtime = Handle::try_current().map_err(|_| {
            SessionError::Config("cleanup scheduler requires a Tokio runtime".to_string())
        })?;

        let sweeper = self.sweeper.clone();
        let interval = self.interval;

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                match sweeper.run(SweepWindow::expired_now()).await {
                    Ok(removed) if removed > 0 => {
                        info!(removed = removed, "Swept expired sessions");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Session sweep failed");
                    }
                }
            }
        });

        info!(interval_ms = interval_millis(interval), "Cleanup scheduler started");
        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the sweep task. Returns whether one was running.
    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                if was_running {
                    info!("Cleanup scheduler stopped");
                }
                was_running
            }
            None => false,
        }
    }

    /// Check if the sweep task is running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Interval in whole milliseconds, saturating at `u64::MAX`.
fn interval_millis(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
