//! Background secret rotation.

use crate::auth::{RateLimiter, Secret, SecretStore};
use std::sync::Arc;
use thiserror::Error;
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{interval_at, Duration, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// A period that cannot drive a timer: zero, or so long that the first
/// deadline does not fit in an [`Instant`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot schedule a task every {0:?}")]
pub struct InvalidPeriod(pub Duration);

/// Handle to a task that runs a job on a fixed period until stopped.
///
/// Dropping the handle also ends the loop, at its next wake up at the latest.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn `job` to run every `period`, first one `period` from now.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPeriod`] if `period` is zero or too long to schedule.
    pub fn spawn<F>(
        name: &'static str,
        period: Duration,
        mut job: F,
    ) -> Result<Self, InvalidPeriod>
    where
        F: FnMut() + Send + 'static,
    {
        let start = Instant::now()
            .checked_add(period)
            .filter(|_| !period.is_zero())
            .ok_or(InvalidPeriod(period))?;

        let (stop, mut stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stopped => {
                        debug!("{} task stopped", name);
                        break;
                    }
                    _ = ticker.tick() => job(),
                }
            }
        });

        Ok(Self { name, stop, handle })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal the task and wait for it to finish.
    pub async fn stop(self) {
        // the receiver is gone only if the task already ended
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            warn!("{} task ended abnormally: {}", self.name, e);
        }
    }
}

/// Rotates the signing secret of a [`SecretStore`] on a fixed interval.
pub struct RotationScheduler;

impl RotationScheduler {
    /// Start rotating `store` every `interval` with freshly generated secrets.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPeriod`] if `interval` cannot be scheduled.
    pub fn start(
        store: Arc<SecretStore>,
        interval: Duration,
    ) -> Result<PeriodicTask, InvalidPeriod> {
        let task = PeriodicTask::spawn("secret-rotation", interval, move || {
            let generation = store.rotate(Secret::generate());
            info!(
                "JWT secret rotated, generation {}, {} retired secrets kept",
                generation,
                store.retired().len()
            );
        })?;

        info!("rotating signing secret every {} seconds", interval.as_secs());
        Ok(task)
    }
}

/// Periodically drops idle keys from a [`RateLimiter`].
///
/// # Errors
///
/// Returns [`InvalidPeriod`] if `every` cannot be scheduled.
pub fn start_limiter_sweep(
    limiter: Arc<RateLimiter>,
    every: Duration,
) -> Result<PeriodicTask, InvalidPeriod> {
    PeriodicTask::spawn("rate-limit-sweep", every, move || {
        limiter.sweep();
    })
}
