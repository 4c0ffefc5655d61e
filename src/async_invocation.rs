//! `AsyncInvocation`: a packaged callable bound to a [`Future`].
//!
//! Concrete variants (void vs value-returning invocations) are distinguished
//! by the type parameter on `Future<T>` itself rather than by an open class
//! hierarchy: every invocation exposes exactly `execute()` and
//! `drop_invocation()`.

use std::future::Future as StdFuture;
use std::pin::Pin;

use crate::errors::EngineError;
use crate::future::{CancellationToken, Future, FutureError};

/// A boxed, owned async callable. Invocations receive a [`CancellationToken`]
/// bound to their own future so they can cooperatively observe cancellation
/// without needing to clone the value type.
pub type BoxedCallable<T> =
    Box<dyn FnOnce(CancellationToken) -> Pin<Box<dyn StdFuture<Output = Result<T, EngineError>> + Send>> + Send>;

/// A (future, callable) pair executed by an [`crate::active_object::ActiveObject`]
/// worker.
pub struct AsyncInvocation<T: Clone + Send + 'static> {
    future: Future<T>,
    callable: Option<BoxedCallable<T>>,
}

impl<T: Clone + Send + 'static> AsyncInvocation<T> {
    pub fn new(callable: BoxedCallable<T>) -> (Self, Future<T>) {
        let future = Future::new();
        let handle = future.clone();
        (
            AsyncInvocation {
                future,
                callable: Some(callable),
            },
            handle,
        )
    }

    pub fn future(&self) -> Future<T> {
        self.future.clone()
    }

    /// Runs the callable, capturing any error into the future. Never panics
    /// on the callable's behalf: a callable that returns `Err` simply routes
    /// that error into the future.
    pub async fn execute(mut self) {
        let callable = match self.callable.take() {
            Some(c) => c,
            None => return,
        };
        let token = self.future.cancellation_token();
        match callable(token).await {
            Ok(v) => {
                // AlreadySet cannot happen here: this invocation owns the
                // only producer handle to this future.
                let _ = self.future.set_result(v);
            }
            Err(e) => self.future.set_exception(FutureError::from_engine_error(e)),
        }
    }

    /// Marks the future with a distinguished "dropped" failure without
    /// running the callable at all — used when a shutdown policy discards
    /// queued-but-not-started work.
    pub fn drop_invocation(self) {
        self.future.set_exception(FutureError::from_engine_error(EngineError::Dropped));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_callable(value: i32) -> BoxedCallable<i32> {
        Box::new(move |_token| Box::pin(async move { Ok(value) }))
    }

    #[tokio::test]
    async fn execute_routes_value_into_future() {
        let (invocation, future) = AsyncInvocation::new(ok_callable(5));
        invocation.execute().await;
        assert_eq!(future.get_result().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn drop_invocation_fails_future_with_dropped() {
        let (invocation, future) = AsyncInvocation::new(ok_callable(5));
        invocation.drop_invocation();
        assert_eq!(future.get_result().await.unwrap_err(), EngineError::Dropped);
    }

    #[tokio::test]
    async fn callable_observes_cancellation_token() {
        let callable: BoxedCallable<i32> = Box::new(|token| {
            Box::pin(async move {
                if token.is_cancelled() {
                    Err(EngineError::ShuttingDown)
                } else {
                    Ok(1)
                }
            })
        });
        let (invocation, future) = AsyncInvocation::new(callable);
        future.cancel();
        invocation.execute().await;
        assert_eq!(future.get_result().await.unwrap_err(), EngineError::ShuttingDown);
    }
}
