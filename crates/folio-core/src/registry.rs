use folio_doc::BlockId;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Cancellation state for one in-flight execution: the attempt id guards
/// clears against superseding runs (a stale attempt must never remove its
/// successor's handle), and the settle waiter resolves when the attempt's
/// queue item settles or is evicted.
pub struct RunningHandle {
    attempt_id: Uuid,
    token: CancellationToken,
    settled: Option<oneshot::Receiver<()>>,
}

impl RunningHandle {
    pub fn new(
        attempt_id: Uuid,
        token: CancellationToken,
        settled: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            attempt_id,
            token,
            settled: Some(settled),
        }
    }
}

/// Per-document table of in-flight executions, keyed by block. At most one
/// handle exists per block at any time.
#[derive(Default)]
pub struct RunningRegistry {
    handles: Mutex<HashMap<BlockId, RunningHandle>>,
}

impl RunningRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the handle for a block, replacing any prior one. Registering
    /// over a live handle cancels it: the superseded attempt observes its
    /// token at its checkpoint and abandons its kernel operation itself.
    /// This is the single documented cancel-and-replace choice, not a race
    /// outcome.
    pub fn register(&self, block: &BlockId, handle: RunningHandle) {
        let prior = self
            .handles
            .lock()
            .expect("registry lock poisoned")
            .insert(block.clone(), handle);
        if let Some(prior) = prior {
            debug!(block = %block, "superseding in-flight execution");
            prior.token.cancel();
        }
    }

    /// Signals cancellation for a block's in-flight execution and waits for
    /// it to settle. No-op when nothing is running for the block.
    pub async fn abort(&self, block: &BlockId) {
        let handle = self
            .handles
            .lock()
            .expect("registry lock poisoned")
            .remove(block);
        let Some(mut handle) = handle else {
            return;
        };

        debug!(block = %block, "aborting in-flight execution");
        handle.token.cancel();
        if let Some(settled) = handle.settled.take() {
            // The sender side is dropped when the queue item settles or is
            // evicted; either way the attempt is over.
            let _ = settled.await;
        }
    }

    /// Signals cancellation without removing the handle or waiting. Used to
    /// fan a batch abort out to every member before draining them.
    pub fn cancel(&self, block: &BlockId) {
        if let Some(handle) = self
            .handles
            .lock()
            .expect("registry lock poisoned")
            .get(block)
        {
            handle.token.cancel();
        }
    }

    /// Removes the handle once its attempt settles, but only if it still
    /// belongs to that attempt.
    pub fn clear_if(&self, block: &BlockId, attempt_id: Uuid) {
        let mut handles = self.handles.lock().expect("registry lock poisoned");
        if handles
            .get(block)
            .is_some_and(|handle| handle.attempt_id == attempt_id)
        {
            handles.remove(block);
        }
    }

    pub fn is_running(&self, block: &BlockId) -> bool {
        self.handles
            .lock()
            .expect("registry lock poisoned")
            .contains_key(block)
    }

    /// Blocks with an outstanding handle, in no particular order.
    pub fn running_blocks(&self) -> Vec<BlockId> {
        self.handles
            .lock()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(token: &CancellationToken) -> (RunningHandle, oneshot::Sender<()>, Uuid) {
        let attempt_id = Uuid::new_v4();
        let (settled_tx, settled_rx) = oneshot::channel();
        (
            RunningHandle::new(attempt_id, token.clone(), settled_rx),
            settled_tx,
            attempt_id,
        )
    }

    #[tokio::test]
    async fn register_over_live_handle_cancels_the_prior_attempt() {
        let registry = RunningRegistry::new();
        let block = BlockId::new("b1");

        let first_token = CancellationToken::new();
        let (first, _first_settled, _) = handle(&first_token);
        registry.register(&block, first);

        let second_token = CancellationToken::new();
        let (second, _second_settled, _) = handle(&second_token);
        registry.register(&block, second);

        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());
        assert!(registry.is_running(&block));
    }

    #[tokio::test]
    async fn abort_cancels_and_waits_for_settlement() {
        let registry = RunningRegistry::new();
        let block = BlockId::new("b1");
        let token = CancellationToken::new();
        let (running, settled_tx, _) = handle(&token);
        registry.register(&block, running);

        let settle_token = token.clone();
        tokio::spawn(async move {
            settle_token.cancelled().await;
            drop(settled_tx);
        });

        registry.abort(&block).await;
        assert!(token.is_cancelled());
        assert!(!registry.is_running(&block));
    }

    #[tokio::test]
    async fn abort_without_handle_is_a_no_op() {
        let registry = RunningRegistry::new();
        registry.abort(&BlockId::new("missing")).await;
        assert!(registry.running_blocks().is_empty());
    }

    #[tokio::test]
    async fn stale_attempt_cannot_clear_its_successor() {
        let registry = RunningRegistry::new();
        let block = BlockId::new("b1");

        let first_token = CancellationToken::new();
        let (first, _s1, first_attempt) = handle(&first_token);
        registry.register(&block, first);

        let second_token = CancellationToken::new();
        let (second, _s2, second_attempt) = handle(&second_token);
        registry.register(&block, second);

        registry.clear_if(&block, first_attempt);
        assert!(registry.is_running(&block), "stale clear must be ignored");

        registry.clear_if(&block, second_attempt);
        assert!(!registry.is_running(&block));
    }
}
