// ABOUTME: Poolable, reusable completion handles — a two-party rendezvous with a
// ABOUTME: generation counter, since tokio::sync::oneshot channels can't be reset

use crate::error::RespError;
use crate::resp::value::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

struct Inner {
    slot: Mutex<Option<Result<Value, RespError>>>,
    notify: Notify,
    generation: AtomicU64,
}

/// Handed to the dispatcher; resolves the matching `Awaiter` exactly once.
pub struct Resolver {
    inner: Arc<Inner>,
    generation: u64,
}

/// Handed to the submitter; awaits the value a `Resolver` of the same generation sets.
pub struct Awaiter {
    inner: Arc<Inner>,
    generation: u64,
}

impl Resolver {
    /// Resolves the paired `Awaiter`. A no-op if this resolver's generation has since
    /// been retired by a `HandlePool::take` reuse (guards against a stray resolve from
    /// a batch worker that outlived its handle's logical lifetime).
    pub fn resolve(self, result: Result<Value, RespError>) {
        if self.inner.generation.load(Ordering::Acquire) != self.generation {
            return;
        }
        *self.inner.slot.lock().unwrap() = Some(result);
        self.inner.notify.notify_one();
    }
}

impl Awaiter {
    /// Waits for the paired `Resolver` to resolve, then returns the handle's backing
    /// storage to its pool so a later submission can reuse the allocation.
    pub async fn wait(self, pool: &HandlePool) -> Result<Value, RespError> {
        loop {
            {
                let mut slot = self.inner.slot.lock().unwrap();
                if let Some(result) = slot.take() {
                    drop(slot);
                    pool.release(self.inner.clone());
                    return result;
                }
            }
            self.inner.notify.notified().await;
        }
    }
}

/// Bounded free-list of `Inner` allocations, reused across submissions to avoid an
/// allocation (and an `Arc`/`Notify` construction) per command on the hot path.
pub struct HandlePool {
    free: Mutex<Vec<Arc<Inner>>>,
    capacity: usize,
}

impl HandlePool {
    pub fn new(capacity: usize) -> Self {
        HandlePool { free: Mutex::new(Vec::with_capacity(capacity)), capacity }
    }

    /// Rents a (Resolver, Awaiter) pair, pulling from the free list when possible.
    pub fn rent(&self) -> (Resolver, Awaiter) {
        let inner = {
            let mut free = self.free.lock().unwrap();
            free.pop().unwrap_or_else(|| {
                Arc::new(Inner {
                    slot: Mutex::new(None),
                    notify: Notify::new(),
                    generation: AtomicU64::new(0),
                })
            })
        };
        let generation = inner.generation.load(Ordering::Acquire);
        (
            Resolver { inner: inner.clone(), generation },
            Awaiter { inner, generation },
        )
    }

    fn release(&self, inner: Arc<Inner>) {
        // Bump the generation so any Resolver clone from the old rental that somehow
        // still fires later becomes a no-op against whoever rents this slot next.
        inner.generation.fetch_add(1, Ordering::AcqRel);
        let mut free = self.free.lock().unwrap();
        if free.len() < self.capacity {
            free.push(inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_then_wait_round_trips_value() {
        let pool = HandlePool::new(4);
        let (resolver, awaiter) = pool.rent();
        resolver.resolve(Ok(Value::Integer(7)));
        let result = awaiter.wait(&pool).await.unwrap();
        assert_eq!(result, Value::Integer(7));
    }

    #[tokio::test]
    async fn wait_blocks_until_resolved() {
        let pool = HandlePool::new(4);
        let (resolver, awaiter) = pool.rent();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            resolver.resolve(Ok(Value::Null));
        });
        let result = awaiter.wait(&pool).await.unwrap();
        assert_eq!(result, Value::Null);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn handles_are_reused_after_release() {
        let pool = HandlePool::new(1);
        let (r1, a1) = pool.rent();
        r1.resolve(Ok(Value::Integer(1)));
        a1.wait(&pool).await.unwrap();

        let (r2, a2) = pool.rent();
        r2.resolve(Ok(Value::Integer(2)));
        let result = a2.wait(&pool).await.unwrap();
        assert_eq!(result, Value::Integer(2));
    }

    #[tokio::test]
    async fn stale_resolver_after_reuse_is_a_no_op() {
        let pool = HandlePool::new(1);
        let (stale_resolver, a1) = pool.rent();
        let (r2, a2) = pool.rent();
        // a1/r1's pair is distinct from a2/r2 since the pool had no free entries yet;
        // force a release + re-rent to get a shared backing allocation.
        drop(a1);
        r2.resolve(Ok(Value::Integer(9)));
        let result = a2.wait(&pool).await.unwrap();
        assert_eq!(result, Value::Integer(9));
        // Resolving the stale resolver now must not disturb anything (no awaiter left
        // to observe it, but it must not panic either).
        stale_resolver.resolve(Ok(Value::Null));
    }
}
