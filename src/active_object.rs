//! `ActiveObject`: a single worker task draining a bounded queue of
//! invocations, one at a time, each producing a future.
//!
//! A polling-based drain loop is prone to a race between a queue-depth
//! check and an interruptible sleep. This implementation never polls:
//! [`crate::event_queue::EventQueue::get`] blocks on a
//! `tokio::sync::Notify` that both enqueue and shutdown wake, so the worker
//! makes progress exactly when an item becomes available or shutdown closes
//! the queue — there is no window where a wakeup can be missed.

use dusa_collection_utils::core::logger::LogLevel;
use dusa_collection_utils::log;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::async_invocation::{AsyncInvocation, BoxedCallable};
use crate::errors::EngineError;
use crate::event_queue::{EventQueue, DEFAULT_CAPACITY};
use crate::future::Future;

/// A single worker thread (here, a dedicated tokio task) that owns exactly
/// one invocation queue and runs invocations to completion one at a time.
pub struct ActiveObject<T: Clone + Send + 'static> {
    queue: EventQueue<AsyncInvocation<T>>,
    current: std::sync::Arc<Mutex<Option<Future<T>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Clone + Send + 'static> ActiveObject<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let queue: EventQueue<AsyncInvocation<T>> = EventQueue::new(capacity);
        let current: std::sync::Arc<Mutex<Option<Future<T>>>> = std::sync::Arc::new(Mutex::new(None));

        let worker_queue = queue.clone();
        let worker_current = current.clone();
        let handle = tokio::spawn(async move {
            loop {
                let invocation = match worker_queue.get().await {
                    Some(invocation) => invocation,
                    None => break,
                };
                {
                    let mut guard = worker_current.lock().await;
                    *guard = Some(invocation.future());
                }
                invocation.execute().await;
                {
                    let mut guard = worker_current.lock().await;
                    *guard = None;
                }
            }
            log!(LogLevel::Trace, "active object worker exiting");
        });

        ActiveObject {
            queue,
            current,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Enqueues `callable`, returning its future. Fails with
    /// [`EngineError::ShuttingDown`] once `shutdown` has been called.
    pub async fn invoke_async(&self, callable: BoxedCallable<T>) -> Result<Future<T>, EngineError> {
        let (invocation, future) = AsyncInvocation::new(callable);
        self.queue.add(invocation).await?;
        Ok(future)
    }

    pub async fn depth(&self) -> usize {
        self.queue.depth().await
    }

    /// Shuts down the active object per the four-way policy matrix:
    ///
    /// | wait_for_drain | cancel_running | behavior |
    /// |---|---|---|
    /// | true  | false | run every enqueued item, then exit |
    /// | true  | true  | run queued items; signal current invocation to cancel |
    /// | false | false | drop queued items; still finish the in-flight one |
    /// | false | true  | drop queued items; signal current invocation to cancel |
    ///
    /// In every case, no further `invoke_async` call is accepted once this
    /// returns (indeed, once this is called at all).
    pub async fn shutdown(&self, wait_for_drain: bool, cancel_running: bool) {
        self.queue.close();

        if cancel_running {
            let guard = self.current.lock().await;
            if let Some(current) = guard.as_ref() {
                current.cancel();
            }
        }

        if !wait_for_drain {
            let dropped = self.queue.drain_all().await;
            for invocation in dropped {
                invocation.drop_invocation();
            }
        }

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl<T: Clone + Send + 'static> Default for ActiveObject<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn sleepy(millis: u64, value: i32) -> BoxedCallable<i32> {
        Box::new(move |_token| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(value)
            })
        })
    }

    fn cancellable_poll(value: i32) -> BoxedCallable<i32> {
        Box::new(move |token| {
            Box::pin(async move {
                loop {
                    if token.is_cancelled() {
                        return Err(EngineError::Killed);
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    return Ok(value);
                }
            })
        })
    }

    #[tokio::test]
    async fn runs_invocations_in_enqueue_order() {
        let ao: ActiveObject<i32> = ActiveObject::new();
        let order: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));

        let mut futures = Vec::new();
        for i in 0..5 {
            let order = order.clone();
            let callable: BoxedCallable<i32> = Box::new(move |_token| {
                Box::pin(async move {
                    order.lock().await.push(i);
                    Ok(i)
                })
            });
            futures.push(ao.invoke_async(callable).await.unwrap());
        }

        for (i, f) in futures.into_iter().enumerate() {
            assert_eq!(f.get_result().await.unwrap(), i as i32);
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn shutdown_true_false_drains_everything() {
        let ao: ActiveObject<i32> = ActiveObject::new();
        let f1 = ao.invoke_async(sleepy(10, 1)).await.unwrap();
        let f2 = ao.invoke_async(sleepy(10, 2)).await.unwrap();

        ao.shutdown(true, false).await;

        assert_eq!(f1.get_result().await.unwrap(), 1);
        assert_eq!(f2.get_result().await.unwrap(), 2);
        assert_eq!(
            ao.invoke_async(sleepy(1, 3)).await.unwrap_err(),
            EngineError::ShuttingDown
        );
    }

    #[tokio::test]
    async fn shutdown_false_false_drops_queued_but_finishes_inflight() {
        let ao: ActiveObject<i32> = ActiveObject::new();
        let in_flight = ao.invoke_async(sleepy(50, 1)).await.unwrap();
        // give the worker a moment to pick up the in-flight invocation
        tokio::time::sleep(Duration::from_millis(10)).await;
        let queued = ao.invoke_async(sleepy(10, 2)).await.unwrap();

        ao.shutdown(false, false).await;

        assert_eq!(in_flight.get_result().await.unwrap(), 1);
        assert_eq!(queued.get_result().await.unwrap_err(), EngineError::Dropped);
    }

    #[tokio::test]
    async fn shutdown_cancel_running_signals_cooperative_cancel() {
        let ao: ActiveObject<i32> = ActiveObject::new();
        let started = Arc::new(AtomicBool::new(false));
        let started_clone = started.clone();
        let callable: BoxedCallable<i32> = Box::new(move |token| {
            Box::pin(async move {
                started_clone.store(true, Ordering::SeqCst);
                loop {
                    if token.is_cancelled() {
                        return Err(EngineError::Killed);
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
        });
        let f = ao.invoke_async(callable).await.unwrap();
        while !started.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        ao.shutdown(true, true).await;
        assert_eq!(f.get_result().await.unwrap_err(), EngineError::Killed);
    }

    #[tokio::test]
    async fn s7_active_object_cancellation_via_future_cancel() {
        let ao: ActiveObject<i32> = ActiveObject::new();
        let f = ao.invoke_async(cancellable_poll(1)).await.unwrap();
        f.cancel();
        assert!(f.is_cancelled());
        tokio::time::sleep(Duration::from_millis(50)).await;
        ao.shutdown(true, false).await;
    }
}
