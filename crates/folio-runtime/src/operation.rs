use crate::errors::RuntimeError;
use futures::future::BoxFuture;
use std::future::Future;

/// Caller-invocable cleanup for an in-flight kernel operation.
pub type AbortFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// A kernel operation in flight: the kernel call itself returns immediately
/// with this handle, pairing the deferred result with a cleanup the caller
/// invokes to abandon the operation. Every executor depends on this exact
/// two-phase shape.
pub struct Operation<T> {
    pub result: BoxFuture<'static, Result<T, RuntimeError>>,
    pub abort: AbortFn,
}

impl<T> std::fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Operation<T> {
    pub fn new<F, A, Fut>(result: F, abort: A) -> Self
    where
        F: Future<Output = Result<T, RuntimeError>> + Send + 'static,
        A: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            result: Box::pin(result),
            abort: Box::new(move || Box::pin(abort())),
        }
    }

    /// An already-settled operation whose abort is a no-op.
    pub fn ready(outcome: Result<T, RuntimeError>) -> Self {
        Self::new(async move { outcome }, || async {})
    }
}
