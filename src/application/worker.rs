use crate::application::executor::PayoutExecutor;
use crate::application::retry::RetryPolicy;
use crate::config::WorkerConfig;
use crate::domain::payout::PayoutTask;
use crate::domain::ports::TaskQueue;
use crate::error::{PayoutError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Acknowledgement returned by the manual-retry trigger. The actual result is
/// only observable through the outcome topic or the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAccepted {
    pub offer_id: Uuid,
}

/// Cloneable handle used to submit payout tasks to a [`WorkerPool`].
#[derive(Clone)]
pub struct PayoutQueue {
    sender: mpsc::Sender<PayoutTask>,
}

impl PayoutQueue {
    /// Re-enqueues a payout for `offer_id`. Safe to call repeatedly: a paid
    /// offer is detected by the executor and nothing is disbursed twice.
    pub async fn retry_payout(&self, offer_id: Uuid) -> Result<RetryAccepted> {
        self.enqueue(PayoutTask::manual(offer_id)).await?;
        tracing::info!(offer_id = %offer_id, "manual_retry_enqueued");
        Ok(RetryAccepted { offer_id })
    }
}

#[async_trait]
impl TaskQueue for PayoutQueue {
    async fn enqueue(&self, task: PayoutTask) -> Result<()> {
        self.sender
            .send(task)
            .await
            .map_err(|_| PayoutError::QueueClosed)
    }
}

/// A fixed set of tokio tasks pulling payout work from one bounded channel.
///
/// Each task runs the executor under the retry policy, so a slow payout never
/// blocks the consumer that feeds the queue.
pub struct WorkerPool {
    queue: PayoutQueue,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(executor: Arc<PayoutExecutor>, policy: RetryPolicy, config: &WorkerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..config.concurrency.max(1))
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let executor = Arc::clone(&executor);
                let policy = policy.clone();
                tokio::spawn(async move {
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(task) = next else { break };
                        run_task(worker_id, &executor, &policy, task).await;
                    }
                    tracing::debug!(worker_id, "payout_worker_stopped");
                })
            })
            .collect();

        Self {
            queue: PayoutQueue { sender },
            workers,
        }
    }

    pub fn queue(&self) -> PayoutQueue {
        self.queue.clone()
    }

    /// Closes the pool's own sender and waits for queued and in-flight tasks.
    ///
    /// Returns once every other [`PayoutQueue`] clone has been dropped too.
    pub async fn shutdown(self) {
        drop(self.queue);
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "payout_worker_join_failed");
            }
        }
    }
}

async fn run_task(worker_id: usize, executor: &PayoutExecutor, policy: &RetryPolicy, task: PayoutTask) {
    let offer_id = task.offer_id;
    let result = policy
        .run(|attempt| {
            tracing::debug!(worker_id, offer_id = %offer_id, attempt, "payout_dispatch");
            executor.execute(&task)
        })
        .await;

    match result {
        Ok(report) => tracing::info!(
            worker_id,
            offer_id = %offer_id,
            method = ?report.method,
            reference_id = ?report.reference_id,
            already_paid = report.already_paid,
            "payout_task_succeeded"
        ),
        Err(err) => tracing::error!(
            worker_id,
            offer_id = %offer_id,
            error = %err,
            "payout_task_failed"
        ),
    }
}
