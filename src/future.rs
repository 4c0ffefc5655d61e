//! `Future<T>`: a one-shot, sticky, multi-consumer result cell.
//!
//! An atomic flag plus a pair of `tokio::sync::Notify`s, with
//! `tokio::time::timeout` used for bounded waits, form a single-assignment
//! value-or-error cell that can be cloned and awaited from many tasks at
//! once.

use dusa_collection_utils::core::logger::LogLevel;
use dusa_collection_utils::log;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::{timeout, Duration};

use crate::errors::EngineError;

/// Opaque exception token carried across the producer/consumer boundary.
///
/// Any error type can be boxed into this; a captured value that cannot be
/// downcast back to its original type at the consumer manifests as
/// [`EngineError::ExceptionUnknown`] rather than panicking.
#[derive(Clone)]
pub struct FutureError(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl FutureError {
    pub fn new<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        FutureError(Arc::new(err))
    }

    pub fn from_engine_error(err: EngineError) -> Self {
        FutureError(Arc::new(err))
    }

    /// Attempt to recover the original `EngineError`, falling back to
    /// [`EngineError::ExceptionUnknown`] when the token holds something else.
    pub fn into_engine_error(self) -> EngineError {
        match self.0.downcast_ref::<EngineError>() {
            Some(e) => e.clone(),
            None => EngineError::ExceptionUnknown,
        }
    }
}

impl fmt::Debug for FutureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FutureError({})", self.0)
    }
}

impl fmt::Display for FutureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

enum Slot<T> {
    Pending,
    Value(T),
    Error(FutureError),
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    ready: AtomicBool,
    cancelled: Arc<AtomicBool>,
    notify: Notify,
}

/// A one-shot result cell, held jointly by a producer and zero or more
/// consumers. `T` must be `Clone` so that more than one consumer may read
/// the completed value.
pub struct Future<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future { inner: self.inner.clone() }
    }
}

/// A cheap, `T`-independent handle onto a future's advisory cancellation
/// flag. Handed to [`crate::async_invocation::AsyncInvocation`] callables so
/// they can observe `IsCancelled()` without needing the value type to be
/// `Clone`.
#[derive(Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl<T> Future<T> {
    pub fn new() -> Self {
        Future {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot::Pending),
                ready: AtomicBool::new(false),
                cancelled: Arc::new(AtomicBool::new(false)),
                notify: Notify::new(),
            }),
        }
    }

    /// Stores `v` and marks the cell ready. Fails with [`EngineError::AlreadySet`]
    /// if the cell was already ready (as either value or error).
    pub fn set_result(&self, v: T) -> Result<(), EngineError> {
        let mut slot = self.inner.slot.lock().expect("future mutex poisoned");
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Value(v);
            drop(slot);
            self.inner.ready.store(true, Ordering::SeqCst);
            self.inner.notify.notify_waiters();
            Ok(())
        } else {
            Err(EngineError::AlreadySet)
        }
    }

    /// Stores an exception token and marks the cell ready, waking every
    /// waiter. Unlike `set_result`, an already-ready cell is a silent no-op
    /// at the call site that matters (terminal-state handling always checks
    /// readiness before calling this), so this never fails.
    pub fn set_exception(&self, e: FutureError) {
        let mut slot = self.inner.slot.lock().expect("future mutex poisoned");
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Error(e);
            drop(slot);
            self.inner.ready.store(true, Ordering::SeqCst);
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sets the advisory cancellation flag. Does not by itself complete the
    /// future; the producer decides whether and how to honour it.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        CancellationToken(self.inner.cancelled.clone())
    }
}

impl<T: Clone> Future<T> {
    fn read_slot(&self) -> Result<T, EngineError> {
        let slot = self.inner.slot.lock().expect("future mutex poisoned");
        match &*slot {
            Slot::Pending => unreachable!("read_slot called before ready"),
            Slot::Value(v) => Ok(v.clone()),
            Slot::Error(e) => Err(e.clone().into_engine_error()),
        }
    }

    /// Blocks until ready, then returns the value or re-raises the captured
    /// error.
    pub async fn get_result(&self) -> Result<T, EngineError> {
        loop {
            // `enable()` registers this waiter before the readiness check
            // below runs, so a `set_result`/`set_exception` that lands
            // between the check and the `.await` still wakes it — the
            // opposite order can park a waiter past a notification it
            // should have seen, since `notify_waiters` only wakes waiters
            // already registered at the time it is called.
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_ready() {
                return self.read_slot();
            }
            notified.await;
        }
    }

    /// As [`Future::get_result`], but fails with
    /// [`EngineError::TimeoutWaitingForResult`] if `deadline` elapses first.
    /// The timeout is relative: it is measured from the call, not from
    /// future creation.
    pub async fn get_result_timed(&self, deadline: Duration) -> Result<T, EngineError> {
        if self.is_ready() {
            return self.read_slot();
        }
        match timeout(deadline, self.get_result()).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::TimeoutWaitingForResult),
        }
    }
}

impl<T> Default for Future<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// `Future<()>` specialization helper for the no-payload case — `set_result`
/// degenerates to "mark ready with no payload".
impl Future<()> {
    pub fn complete(&self) -> Result<(), EngineError> {
        self.set_result(())
    }
}

pub(crate) fn log_dropped_future() {
    log!(LogLevel::Trace, "future dropped without a result ever being set");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_result_then_get_result() {
        let f: Future<i32> = Future::new();
        f.set_result(42).unwrap();
        assert_eq!(f.get_result().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn set_result_twice_fails() {
        let f: Future<i32> = Future::new();
        f.set_result(1).unwrap();
        assert_eq!(f.set_result(2), Err(EngineError::AlreadySet));
    }

    #[tokio::test]
    async fn exception_round_trips() {
        let f: Future<i32> = Future::new();
        f.set_exception(FutureError::from_engine_error(EngineError::Killed));
        let err = f.get_result().await.unwrap_err();
        assert_eq!(err, EngineError::Killed);
    }

    #[tokio::test]
    async fn timeout_elapses_without_altering_state() {
        let f: Future<i32> = Future::new();
        let result = f.get_result_timed(Duration::from_millis(10)).await;
        assert_eq!(result, Err(EngineError::TimeoutWaitingForResult));
        assert!(!f.is_ready());
    }

    #[tokio::test]
    async fn ready_is_sticky_and_multi_consumer() {
        let f: Future<i32> = Future::new();
        let f2 = f.clone();
        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            f2.set_result(7).unwrap();
        });
        assert_eq!(f.get_result().await.unwrap(), 7);
        producer.await.unwrap();
        assert!(f.is_ready());
        assert_eq!(f.get_result().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn cancel_is_advisory_only() {
        let f: Future<i32> = Future::new();
        f.cancel();
        assert!(f.is_cancelled());
        assert!(!f.is_ready());
    }
}
