//! Cancellable periodic tasks.
//!
//! Background work (health probing, cache sweeping) runs on a ticker owned by
//! a [`PeriodicTask`]. The task stops when its [`CancellationToken`] fires and
//! [`PeriodicTask::stop`] waits for it to exit, so tests can start and tear
//! down background loops deterministically.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a spawned periodic loop.
#[derive(Debug)]
pub struct PeriodicTask {
    name: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn `tick` every `period`. The first run happens one period after spawn.
    ///
    /// A tick in progress is abandoned when the token is cancelled.
    pub fn spawn<F, Fut>(
        name: impl Into<String>,
        period: Duration,
        cancel: CancellationToken,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let task_name = name.clone();
        let token = cancel.clone();
        let period = period.max(MIN_PERIOD);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    () = tick() => {}
                }
            }

            tracing::info!("[{}] periodic task shutting down", task_name);
        });

        tracing::debug!("[{}] periodic task started (period={}ms)", name, period.as_millis());
        Self { name, cancel, handle }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                tracing::error!("[{}] periodic task panicked: {}", self.name, e);
            }
        }
    }
}
