//! Bounded background work queue
//!
//! Side effects that must not slow a request (recording session use, for
//! example) are submitted here. The queue has a fixed capacity: when it is
//! full the task is dropped with a warning instead of blocking the caller.
//! Each task runs under its own timeout and its failure is only logged.

use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct BackgroundJob {
    name: &'static str,
    work: BoxFuture<'static, anyhow::Result<()>>,
}

/// Handle for submitting background work. Cheap to clone.
#[derive(Clone)]
pub struct BackgroundTasks {
    sender: mpsc::Sender<BackgroundJob>,
}

/// Owns the worker loop; dropping it does not stop the worker
pub struct BackgroundWorker {
    handle: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Start the worker on the current runtime
    pub fn spawn(
        capacity: usize,
        task_timeout: Duration,
        cancellation_token: CancellationToken,
    ) -> (Self, BackgroundWorker) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(receiver, task_timeout, cancellation_token));
        (Self { sender }, BackgroundWorker { handle })
    }

    /// Queue a task without waiting. Returns false if it was dropped.
    pub fn submit<F>(&self, name: &'static str, work: F) -> bool
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let job = BackgroundJob {
            name,
            work: Box::pin(work),
        };
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(task = job.name, "Background queue full, dropping task");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                debug!(task = job.name, "Background worker stopped, dropping task");
                false
            }
        }
    }
}

impl BackgroundWorker {
    /// Wait for the worker to finish draining after cancellation
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!("Background worker terminated abnormally: {}", e);
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<BackgroundJob>,
    task_timeout: Duration,
    cancellation_token: CancellationToken,
) {
    info!("Background worker started (task timeout: {:?})", task_timeout);

    loop {
        tokio::select! {
            job = receiver.recv() => match job {
                Some(job) => run_job(job, task_timeout).await,
                None => break,
            },
            _ = cancellation_token.cancelled() => {
                receiver.close();
                // Finish what was already accepted
                while let Some(job) = receiver.recv().await {
                    run_job(job, task_timeout).await;
                }
                break;
            }
        }
    }

    info!("Background worker stopped");
}

async fn run_job(job: BackgroundJob, task_timeout: Duration) {
    match tokio::time::timeout(task_timeout, job.work).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(task = job.name, "Background task failed: {:#}", e),
        Err(_) => warn!(
            task = job.name,
            "Background task timed out after {}ms",
            task_timeout.as_millis()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn runs_submitted_tasks_and_drains_on_cancel() {
        let token = CancellationToken::new();
        let (tasks, worker) = BackgroundTasks::spawn(8, Duration::from_secs(1), token.clone());
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = counter.clone();
            assert!(tasks.submit("count", async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        token.cancel();
        worker.join().await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert!(!tasks.submit("late", async { Ok(()) }));
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let token = CancellationToken::new();
        let (tasks, _worker) = BackgroundTasks::spawn(1, Duration::from_secs(5), token.clone());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();

        assert!(tasks.submit("blocker", async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok(())
        }));
        started_rx.await.unwrap();

        assert!(tasks.submit("queued", async { Ok(()) }));
        assert!(!tasks.submit("overflow", async { Ok(()) }));

        let _ = release_tx.send(());
        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tasks_are_cut_off() {
        let token = CancellationToken::new();
        let (tasks, worker) = BackgroundTasks::spawn(4, Duration::from_millis(50), token.clone());
        let finished = Arc::new(AtomicUsize::new(0));

        let slow = finished.clone();
        tasks.submit("slow", async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            slow.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let fast = finished.clone();
        tasks.submit("fast", async move {
            fast.fetch_add(10, Ordering::SeqCst);
            Ok(())
        });

        token.cancel();
        worker.join().await;
        assert_eq!(finished.load(Ordering::SeqCst), 10);
    }
}
