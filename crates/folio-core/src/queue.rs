use crate::errors::ExecutionError;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub type QueueTask = BoxFuture<'static, Result<(), ExecutionError>>;

struct QueueItem {
    task: QueueTask,
    token: CancellationToken,
    settled: oneshot::Sender<Result<(), ExecutionError>>,
}

/// Settlement of one enqueued task: resolves when that specific task
/// completes, fails, or is evicted.
pub struct QueueTicket {
    settled: oneshot::Receiver<Result<(), ExecutionError>>,
}

impl QueueTicket {
    pub async fn settled(self) -> Result<(), ExecutionError> {
        match self.settled.await {
            Ok(outcome) => outcome,
            // Worker dropped the item without settling it (queue shut down).
            Err(_) => Err(ExecutionError::Cancelled),
        }
    }
}

/// Per-document admission point for execution side effects: one worker,
/// strict FIFO, no priority lanes. Documents get independent queues and run
/// fully in parallel; within one document at most one task is ever running.
///
/// There is no timeout anywhere in the queue: a hung task blocks the whole
/// document's queue until its caller aborts it. Known limitation.
pub struct ExecutionQueue {
    admit: mpsc::UnboundedSender<QueueItem>,
    in_flight: Arc<AtomicUsize>,
}

impl ExecutionQueue {
    /// Spawns the worker; must be called from within a tokio runtime.
    pub fn new() -> Self {
        let (admit, mut next) = mpsc::unbounded_channel::<QueueItem>();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let worker_in_flight = Arc::clone(&in_flight);
        tokio::spawn(async move {
            while let Some(item) = next.recv().await {
                let outcome = if item.token.is_cancelled() {
                    // Evicted before starting: the task future is dropped
                    // without ever being polled.
                    debug!("evicting cancelled task before start");
                    Err(ExecutionError::Cancelled)
                } else {
                    item.task.await
                };
                worker_in_flight.fetch_sub(1, Ordering::SeqCst);
                let _ = item.settled.send(outcome);
            }
        });

        Self { admit, in_flight }
    }

    /// Appends a task. The task runs after everything enqueued before it,
    /// regardless of which block or requester it belongs to. Cancelling the
    /// token before the worker reaches the task evicts it unrun.
    pub fn enqueue(&self, token: CancellationToken, task: QueueTask) -> QueueTicket {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let (settled_tx, settled_rx) = oneshot::channel();
        let item = QueueItem {
            task,
            token,
            settled: settled_tx,
        };
        if self.admit.send(item).is_err() {
            // Worker is gone; the dropped sender settles the ticket as
            // cancelled.
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        QueueTicket {
            settled: settled_rx,
        }
    }

    /// True iff nothing is queued and nothing is running.
    pub fn is_idle(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0
    }
}

impl Default for ExecutionQueue {
    fn default() -> Self {
        Self::new()
    }
}
