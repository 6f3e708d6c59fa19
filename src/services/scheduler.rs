//! Periodic tasks with an explicit cancellation handle

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A running periodic task. Cancel it with [`shutdown`](Self::shutdown).
pub struct ScheduledTask {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `job` every `period` until `parent` (or this task's own handle) is cancelled.
    ///
    /// The first run happens one full period after start. Overlapping ticks are
    /// skipped rather than queued.
    pub fn spawn<F, Fut>(
        name: &'static str,
        period: Duration,
        parent: &CancellationToken,
        mut job: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let token = parent.child_token();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            info!(task = name, "Scheduled task started with period {:?}", period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!(task = name, "Running scheduled task");
                        if let Err(e) = job().await {
                            error!(task = name, "Scheduled task failed: {:#}", e);
                        }
                    }
                    _ = task_token.cancelled() => break,
                }
            }
            info!(task = name, "Scheduled task stopped");
        });

        Self {
            name,
            token,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait for the current run, if any, to finish
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            error!(task = self.name, "Scheduled task panicked: {}", e);
        }
    }
}
