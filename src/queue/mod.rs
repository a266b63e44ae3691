// ABOUTME: Pipelined command queue and dispatcher (C6) — batches submissions onto pool
// ABOUTME: connections preserving FIFO order, resolving each via a reusable completion handle

pub mod cache;
pub mod handle;
pub mod ingress;

use crate::config::{BatchProfile, OverflowMode};
use crate::error::RespError;
use crate::metrics::PoolMetrics;
use crate::pool::Pool;
use crate::resp::value::Value;
use bytes::{Bytes, BytesMut};
use cache::CommandCache;
use handle::{Awaiter, HandlePool, Resolver};
use ingress::{IngressReceiver, IngressSender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::warn;

/// One request waiting to be encoded and written. `resolver` is `None` for
/// fire-and-forget submissions. `cache_key` is `Some` for submissions eligible for the
/// pre-encoded command cache (§4.6): on a cache hit, `encode` is never called at all.
pub struct Submission {
    pub encode: Box<dyn FnOnce(&mut BytesMut) + Send>,
    pub resolver: Option<Resolver>,
    pub cancelled: Arc<AtomicBool>,
    pub cache_key: Option<Bytes>,
}

/// Lets a caller cancel a submission before it's dispatched onto a connection.
#[derive(Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }
}

struct PendingItem {
    resolver: Option<Resolver>,
}

/// Batches submissions onto `Pool` connections and correlates replies back to
/// submitters via `HandlePool`. This is the hardest subsystem in the crate: it owns
/// FIFO ordering per connection, batching, backpressure and cancellation.
pub struct Dispatcher<S> {
    pool: Arc<Pool<S>>,
    ingress: IngressSender,
    handles: Arc<HandlePool>,
    cache: Arc<CommandCache>,
    profile: BatchProfile,
    metrics: Arc<PoolMetrics>,
    push_sender: Option<mpsc::UnboundedSender<Value>>,
}

impl<S> Dispatcher<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn spawn(
        pool: Arc<Pool<S>>,
        profile: BatchProfile,
        overflow_mode: OverflowMode,
        ingress_capacity: Option<usize>,
        handle_pool_size: usize,
        command_cache_capacity: usize,
        push_sender: Option<mpsc::UnboundedSender<Value>>,
    ) -> Arc<Self> {
        let (tx, rx) = ingress::channel(ingress_capacity, overflow_mode);
        let metrics = pool.metrics().clone();
        let dispatcher = Arc::new(Dispatcher {
            pool,
            ingress: tx,
            handles: Arc::new(HandlePool::new(handle_pool_size)),
            cache: Arc::new(CommandCache::new(command_cache_capacity)),
            profile,
            metrics,
            push_sender,
        });
        let worker = dispatcher.clone();
        tokio::spawn(async move { worker.run(rx).await });
        dispatcher
    }

    pub fn handle_pool(&self) -> &Arc<HandlePool> {
        &self.handles
    }

    pub fn command_cache(&self) -> &Arc<CommandCache> {
        &self.cache
    }

    /// Submits a command, returning its correlated reply once the connection it lands
    /// on has read it back.
    pub async fn submit(
        &self,
        encode: impl FnOnce(&mut BytesMut) + Send + 'static,
    ) -> Result<Value, RespError> {
        let (resolver, awaiter) = self.handles.rent();
        let cancelled = Arc::new(AtomicBool::new(false));
        self.metrics.record_submitted();
        self.ingress
            .send(Submission {
                encode: Box::new(encode),
                resolver: Some(resolver),
                cancelled,
                cache_key: None,
            })
            .await?;
        awaiter.wait(&self.handles).await
    }

    /// Submits a command eligible for the pre-encoded command cache (§4.6): if `key`
    /// is already cached, `encode` is skipped entirely and the cached bytes are written
    /// as-is; otherwise `encode` runs once and its output is cached under `key` for the
    /// next submission to reuse.
    pub async fn submit_cached(
        &self,
        cache_key: Bytes,
        encode: impl FnOnce(&mut BytesMut) + Send + 'static,
    ) -> Result<Value, RespError> {
        let (resolver, awaiter) = self.handles.rent();
        let cancelled = Arc::new(AtomicBool::new(false));
        self.metrics.record_submitted();
        self.ingress
            .send(Submission {
                encode: Box::new(encode),
                resolver: Some(resolver),
                cancelled,
                cache_key: Some(cache_key),
            })
            .await?;
        awaiter.wait(&self.handles).await
    }

    /// Submits a command whose reply is drained and discarded by the dispatcher but
    /// never surfaced to a caller.
    pub async fn submit_fire_and_forget(
        &self,
        encode: impl FnOnce(&mut BytesMut) + Send + 'static,
    ) -> Result<(), RespError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.metrics.record_submitted();
        self.ingress
            .send(Submission { encode: Box::new(encode), resolver: None, cancelled, cache_key: None })
            .await
    }

    /// Submits a command alongside a `CancelToken` the caller can use to cancel before
    /// dispatch; cancelling after the batch has been written has no effect.
    pub async fn submit_cancellable(
        &self,
        encode: impl FnOnce(&mut BytesMut) + Send + 'static,
    ) -> Result<(CancelToken, Awaiter), RespError> {
        let (resolver, awaiter) = self.handles.rent();
        let cancelled = Arc::new(AtomicBool::new(false));
        let token = CancelToken(cancelled.clone());
        self.metrics.record_submitted();
        self.ingress
            .send(Submission {
                encode: Box::new(encode),
                resolver: Some(resolver),
                cancelled,
                cache_key: None,
            })
            .await?;
        Ok((token, awaiter))
    }

    pub fn close(&self) {
        self.ingress.close();
    }

    async fn run(self: Arc<Self>, rx: IngressReceiver) {
        loop {
            let first = match rx.recv().await {
                Some(s) => s,
                None => return,
            };
            let mut batch = vec![first];
            while batch.len() < self.profile.max_batch {
                match rx.try_recv() {
                    Some(s) => batch.push(s),
                    None => break,
                }
            }
            if batch.len() > 1 && batch.len() < self.profile.max_batch {
                let deadline = tokio::time::Instant::now() + self.profile.batch_timeout;
                while batch.len() < self.profile.max_batch {
                    match tokio::time::timeout_at(deadline, rx.recv()).await {
                        Ok(Some(s)) => batch.push(s),
                        _ => break,
                    }
                }
            }

            let worker = self.clone();
            tokio::spawn(async move { worker.run_batch(batch).await });
        }
    }

    async fn run_batch(self: Arc<Self>, batch: Vec<Submission>) {
        let mut lease = match self.pool.lease().await {
            Ok(lease) => lease,
            Err(e) => {
                for submission in batch {
                    if let Some(resolver) = submission.resolver {
                        resolver.resolve(Err(e.clone()));
                    }
                }
                return;
            }
        };

        lease.begin_batch();
        let mut items: Vec<PendingItem> = Vec::with_capacity(batch.len());
        let mut write_failure: Option<RespError> = None;

        for submission in batch {
            if submission.cancelled.load(Ordering::Acquire) {
                if let Some(resolver) = submission.resolver {
                    resolver.resolve(Err(RespError::Cancelled));
                }
                continue;
            }
            if write_failure.is_some() {
                if let Some(resolver) = submission.resolver {
                    resolver.resolve(Err(RespError::Broken));
                }
                continue;
            }
            let mut buf = BytesMut::new();
            let mut cache_hit = false;
            if let Some(key) = &submission.cache_key {
                if let Some(cached) = self.cache.get(key) {
                    buf.extend_from_slice(&cached);
                    cache_hit = true;
                }
            }
            if !cache_hit {
                (submission.encode)(&mut buf);
                if let Some(key) = submission.cache_key.clone() {
                    self.cache.insert(key, buf.clone().freeze());
                    self.metrics.set_cache_size(self.cache.len());
                }
            }
            if let Err(e) = lease.write_frame(&buf).await {
                write_failure = Some(e.clone());
                if let Some(resolver) = submission.resolver {
                    resolver.resolve(Err(e));
                }
                continue;
            }
            items.push(PendingItem { resolver: submission.resolver });
        }

        if let Some(e) = write_failure {
            lease.mark_failed();
            warn!(error = %e, "batch write failed, connection marked dead");
            for item in items {
                if let Some(resolver) = item.resolver {
                    resolver.resolve(Err(e.clone()));
                }
            }
            return;
        }

        if let Err(e) = lease.end_batch().await {
            lease.mark_failed();
            for item in items {
                if let Some(resolver) = item.resolver {
                    resolver.resolve(Err(e.clone()));
                }
            }
            return;
        }

        self.metrics.record_batch(items.len());

        let mut items = items.into_iter();
        for item in items.by_ref() {
            let reply = self.read_one_reply(&mut lease).await;
            match reply {
                Ok(Some(value)) => {
                    self.metrics.record_completed();
                    if let Some(resolver) = item.resolver {
                        resolver.resolve(Ok(value));
                    }
                }
                Ok(None) => {
                    lease.mark_failed();
                    if let Some(resolver) = item.resolver {
                        resolver.resolve(Err(RespError::Broken));
                    }
                }
                Err(e) => {
                    lease.mark_failed();
                    if let Some(resolver) = item.resolver {
                        resolver.resolve(Err(e));
                    }
                }
            }
            if !lease.is_healthy() {
                break;
            }
        }
        // A read failure partway through the batch leaves the remaining items never
        // read off the (now dead) connection; resolve them with `Broken` rather than
        // dropping their resolvers and leaving the awaiting submitters parked forever.
        for item in items {
            if let Some(resolver) = item.resolver {
                resolver.resolve(Err(RespError::Broken));
            }
        }
    }

    /// Reads the next reply for a pending item, transparently forwarding any RESP3
    /// push frames encountered along the way to the optional side channel instead of
    /// consuming a pending slot with them.
    async fn read_one_reply(
        &self,
        lease: &mut crate::pool::Lease<'_, S>,
    ) -> Result<Option<Value>, RespError> {
        loop {
            match lease.read_frame().await? {
                Some(Value::Push(items)) => {
                    if let Some(sender) = &self.push_sender {
                        let _ = sender.send(Value::Push(items));
                    }
                    continue;
                }
                other => return Ok(other),
            }
        }
    }
}
