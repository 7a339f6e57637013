//! Group lifecycle — expiry of sequences that stop making progress.
//!
//! The engine only retires a group once its terminal position is released. A
//! sequence whose tail never arrives would stay buffered forever, so the
//! reaper periodically asks the engine to expire groups idle past a timeout.
//! Expiry and natural retirement are both idempotent; whichever takes the
//! group's lock first wins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use resequencer_config::LifecycleConfig;
use resequencer_core::TimeoutAction;
use resequencer_engine::{ExpiredGroup, Resequencer};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodically expires idle groups.
#[derive(Clone)]
pub struct GroupReaper {
    engine: Arc<Resequencer>,
    timeout: Duration,
    interval: Duration,
    action: TimeoutAction,
}

impl GroupReaper {
    pub fn new(
        engine: Arc<Resequencer>,
        timeout: Duration,
        interval: Duration,
        action: TimeoutAction,
    ) -> Self {
        Self {
            engine,
            timeout,
            interval,
            action,
        }
    }

    pub fn from_config(engine: Arc<Resequencer>, config: &LifecycleConfig) -> Self {
        Self::new(
            engine,
            config.group_timeout(),
            config.reap_interval(),
            config.on_timeout,
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one expiry pass now.
    pub fn sweep(&self) -> Vec<ExpiredGroup> {
        self.sweep_at(Instant::now())
    }

    /// Run one expiry pass as if the clock read `now`.
    pub fn sweep_at(&self, now: Instant) -> Vec<ExpiredGroup> {
        let expired = self.engine.expire_idle_at(now, self.timeout, self.action);
        for group in &expired {
            info!(
                correlation_key = %group.correlation_key,
                idle_ms = group.idle_for.as_millis() as u64,
                leftover = group.leftover,
                action = %group.action,
                "Expired idle group"
            );
        }
        expired
    }

    /// Start the reaper background loop.
    ///
    /// Returns a receiver of expiry reports and the loop's join handle. The
    /// loop stops when the receiver is dropped or the handle is aborted.
    pub fn start(&self) -> (mpsc::Receiver<ExpiredGroup>, tokio::task::JoinHandle<()>) {
        let reaper = self.clone();
        let (tx, rx) = mpsc::channel::<ExpiredGroup>(64);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(reaper.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = tx.closed() => {
                        debug!("Expiry report receiver dropped, stopping reaper");
                        return;
                    }
                }
                for expired in reaper.sweep() {
                    if tx.send(expired).await.is_err() {
                        debug!("Expiry report receiver dropped, stopping reaper");
                        return;
                    }
                }
            }
        });

        (rx, handle)
    }
}
