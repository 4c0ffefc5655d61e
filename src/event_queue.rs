//! Bounded FIFO event queue with blocking producer/consumer semantics.
//!
//! This is the queue an [`crate::active_object::ActiveObject`] drains. The
//! blocking `get` is built on `tokio::sync::Notify`, generalized into "wake
//! everyone waiting on non-empty" / "wake everyone waiting on non-full": a
//! `get` that blocks on a condition notified by both enqueue and shutdown
//! never busy-polls and never misses a wakeup.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use crate::errors::EngineError;

pub const DEFAULT_CAPACITY: usize = 128;

struct Inner<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
    closed: AtomicBool,
    not_empty: Notify,
    not_full: Notify,
}

/// A bounded, FIFO, multi-producer multi-consumer queue.
pub struct EventQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventQueue<T> {
    fn clone(&self) -> Self {
        EventQueue { inner: self.inner.clone() }
    }
}

impl<T> EventQueue<T> {
    pub fn new(capacity: usize) -> Self {
        EventQueue {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                closed: AtomicBool::new(false),
                not_empty: Notify::new(),
                not_full: Notify::new(),
            }),
        }
    }

    /// Pushes `item` onto the back of the queue, blocking while the queue is
    /// full. Fails with [`EngineError::ShuttingDown`] if the queue has been
    /// closed.
    pub async fn add(&self, item: T) -> Result<(), EngineError> {
        let mut item = Some(item);
        loop {
            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(EngineError::ShuttingDown);
            }

            // Register for the next `not_full` wakeup before checking
            // capacity: a `get` that drains the queue and notifies between
            // our check and an unregistered `.await` would otherwise park
            // this waiter past the one wakeup it needed.
            let notified = self.inner.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut guard = self.inner.queue.lock().await;
                if guard.len() < self.inner.capacity {
                    guard.push_back(item.take().expect("item consumed at most once"));
                    drop(guard);
                    self.inner.not_empty.notify_waiters();
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// Pops the item at the front of the queue, blocking until one is
    /// available or the queue is closed and drained (in which case `None` is
    /// returned).
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.inner.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut guard = self.inner.queue.lock().await;
                if let Some(item) = guard.pop_front() {
                    drop(guard);
                    self.inner.not_full.notify_waiters();
                    return Some(item);
                }
                if self.inner.closed.load(Ordering::SeqCst) {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Pops the item at the front without blocking, if any.
    pub async fn get_nonblocking(&self) -> Option<T> {
        let mut guard = self.inner.queue.lock().await;
        let item = guard.pop_front();
        drop(guard);
        if item.is_some() {
            self.inner.not_full.notify_waiters();
        }
        item
    }

    /// Drains every item currently queued, returning them in FIFO order.
    pub async fn drain_all(&self) -> Vec<T> {
        let mut guard = self.inner.queue.lock().await;
        let drained: Vec<T> = guard.drain(..).collect();
        drop(guard);
        self.inner.not_full.notify_waiters();
        drained
    }

    pub async fn depth(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    /// Blocks until the queue becomes empty.
    pub async fn wait_until_empty(&self) {
        loop {
            let notified = self.inner.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.depth().await == 0 {
                return;
            }

            notified.await;
        }
    }

    /// Stops the queue from accepting further `add`s and wakes every blocked
    /// `get`/`add` so they can observe the closed state instead of waiting
    /// forever.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.not_empty.notify_waiters();
        self.inner.not_full.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_order_preserved() {
        let q: EventQueue<i32> = EventQueue::new(DEFAULT_CAPACITY);
        q.add(1).await.unwrap();
        q.add(2).await.unwrap();
        q.add(3).await.unwrap();
        assert_eq!(q.get().await, Some(1));
        assert_eq!(q.get().await, Some(2));
        assert_eq!(q.get().await, Some(3));
    }

    #[tokio::test]
    async fn add_blocks_when_full_until_drained() {
        let q: EventQueue<i32> = EventQueue::new(1);
        q.add(1).await.unwrap();
        let q2 = q.clone();
        let blocked = tokio::spawn(async move {
            q2.add(2).await.unwrap();
        });
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());
        assert_eq!(q.get().await, Some(1));
        blocked.await.unwrap();
        assert_eq!(q.get().await, Some(2));
    }

    #[tokio::test]
    async fn closed_queue_rejects_add_and_drains_to_none() {
        let q: EventQueue<i32> = EventQueue::new(DEFAULT_CAPACITY);
        q.add(1).await.unwrap();
        q.close();
        assert_eq!(q.add(2).await, Err(EngineError::ShuttingDown));
        assert_eq!(q.get().await, Some(1));
        assert_eq!(q.get().await, None);
    }

    #[tokio::test]
    async fn get_wakes_promptly_on_enqueue() {
        let q: EventQueue<i32> = EventQueue::new(DEFAULT_CAPACITY);
        let q2 = q.clone();
        let getter = tokio::spawn(async move { q2.get().await });
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        q.add(99).await.unwrap();
        let got = tokio::time::timeout(tokio::time::Duration::from_millis(200), getter)
            .await
            .expect("get should return promptly after enqueue")
            .unwrap();
        assert_eq!(got, Some(99));
    }
}
