// ABOUTME: Bounded submission ingress implementing Wait/DropOldest/Error overflow modes

use super::Submission;
use crate::config::OverflowMode;
use crate::error::RespError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

struct Shared {
    queue: Mutex<VecDeque<Submission>>,
    capacity: Option<usize>,
    mode: OverflowMode,
    item_ready: Notify,
    space_freed: Notify,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct IngressSender(Arc<Shared>);

#[derive(Clone)]
pub struct IngressReceiver(Arc<Shared>);

pub fn channel(capacity: Option<usize>, mode: OverflowMode) -> (IngressSender, IngressReceiver) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::new()),
        capacity,
        mode,
        item_ready: Notify::new(),
        space_freed: Notify::new(),
        closed: AtomicBool::new(false),
    });
    (IngressSender(shared.clone()), IngressReceiver(shared))
}

impl IngressSender {
    pub async fn send(&self, mut submission: Submission) -> Result<(), RespError> {
        loop {
            if self.0.closed.load(Ordering::Acquire) {
                return Err(RespError::ClosedClient);
            }
            let Some(capacity) = self.0.capacity else {
                let mut queue = self.0.queue.lock().await;
                queue.push_back(submission);
                drop(queue);
                self.0.item_ready.notify_one();
                return Ok(());
            };

            let mut queue = self.0.queue.lock().await;
            if queue.len() < capacity {
                queue.push_back(submission);
                drop(queue);
                self.0.item_ready.notify_one();
                return Ok(());
            }

            match self.0.mode {
                OverflowMode::Error => return Err(RespError::QueueOverflow),
                OverflowMode::DropOldest => {
                    let dropped = queue.pop_front();
                    queue.push_back(submission);
                    drop(queue);
                    self.0.item_ready.notify_one();
                    if let Some(dropped) = dropped {
                        if let Some(resolver) = dropped.resolver {
                            resolver.resolve(Err(RespError::QueueOverflow));
                        }
                    }
                    return Ok(());
                }
                OverflowMode::Wait => {
                    drop(queue);
                    submission = Self::wait_for_space(&self.0, submission).await?;
                    continue;
                }
            }
        }
    }

    async fn wait_for_space(shared: &Shared, submission: Submission) -> Result<Submission, RespError> {
        shared.space_freed.notified().await;
        Ok(submission)
    }

    pub fn close(&self) {
        self.0.closed.store(true, Ordering::Release);
        self.0.item_ready.notify_waiters();
    }
}

impl IngressReceiver {
    pub async fn recv(&self) -> Option<Submission> {
        loop {
            {
                let mut queue = self.0.queue.lock().await;
                if let Some(item) = queue.pop_front() {
                    drop(queue);
                    self.0.space_freed.notify_one();
                    return Some(item);
                }
                if self.0.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.0.item_ready.notified().await;
        }
    }

    pub fn try_recv(&self) -> Option<Submission> {
        let mut queue = self.0.queue.try_lock().ok()?;
        let item = queue.pop_front();
        drop(queue);
        if item.is_some() {
            self.0.space_freed.notify_one();
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::handle::HandlePool;

    fn submission(encode: impl FnOnce(&mut bytes::BytesMut) + Send + 'static) -> Submission {
        Submission {
            encode: Box::new(encode),
            resolver: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            cache_key: None,
        }
    }

    #[tokio::test]
    async fn fifo_order_preserved() {
        let (tx, rx) = channel(None, OverflowMode::Wait);
        tx.send(submission(|_| {})).await.unwrap();
        tx.send(submission(|_| {})).await.unwrap();
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn error_mode_rejects_when_full() {
        let (tx, _rx) = channel(Some(1), OverflowMode::Error);
        tx.send(submission(|_| {})).await.unwrap();
        let err = tx.send(submission(|_| {})).await.unwrap_err();
        assert!(matches!(err, RespError::QueueOverflow));
    }

    #[tokio::test]
    async fn drop_oldest_evicts_and_resolves_overflow() {
        let pool = HandlePool::new(4);
        let (resolver, awaiter) = pool.rent();
        let (tx, rx) = channel(Some(1), OverflowMode::DropOldest);
        tx.send(Submission {
            encode: Box::new(|_| {}),
            resolver: Some(resolver),
            cancelled: Arc::new(AtomicBool::new(false)),
            cache_key: None,
        })
        .await
        .unwrap();
        tx.send(submission(|_| {})).await.unwrap();

        let result = awaiter.wait(&pool).await.unwrap_err();
        assert!(matches!(result, RespError::QueueOverflow));
        assert!(rx.try_recv().is_some());
    }
}
