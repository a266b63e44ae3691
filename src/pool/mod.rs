// ABOUTME: Connection multiplexer — lease/release over a fixed set of slots, health
// ABOUTME: checking and reconnect backoff, generalized from the teacher's connection layer

pub mod backoff;
pub mod handshake;
pub mod health;

use crate::connection::{Connection, ConnectionState};
use crate::error::RespError;
use crate::metrics::PoolMetrics;
use backoff::BackoffPolicy;
use health::{HealthCheckConfig, HealthMonitor};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Async factory producing a fresh transport, used to (re)dial a slot.
pub type Connector<S> =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = std::io::Result<S>> + Send>> + Send + Sync>;

/// Async per-connection setup (typically the HELLO/AUTH/SELECT handshake), run once at
/// initial pool fill and again on every reconnect so a replacement connection ends up
/// authenticated and pointed at the same database as the slot it replaced.
pub type Initializer<S> = Arc<
    dyn Fn(&mut Connection<S>) -> Pin<Box<dyn Future<Output = Result<(), RespError>> + Send>>
        + Send
        + Sync,
>;

struct Slot<S> {
    connection: Mutex<Connection<S>>,
    live: std::sync::atomic::AtomicBool,
    usage: AtomicUsize,
    reconnect_attempts: AtomicU32,
    next_attempt_at: Mutex<Option<Instant>>,
    health: Mutex<HealthMonitor>,
}

/// A leased connection. Dropping it releases the slot back to the pool.
pub struct Lease<'a, S> {
    guard: MutexGuard<'a, Connection<S>>,
    slot: &'a Slot<S>,
}

impl<'a, S> std::ops::Deref for Lease<'a, S> {
    type Target = Connection<S>;
    fn deref(&self) -> &Connection<S> {
        &self.guard
    }
}

impl<'a, S> std::ops::DerefMut for Lease<'a, S> {
    fn deref_mut(&mut self) -> &mut Connection<S> {
        &mut self.guard
    }
}

impl<'a, S> Lease<'a, S> {
    pub fn mark_failed(&mut self) {
        self.guard.mark_failed();
        self.slot.live.store(false, Ordering::Release);
    }
}

/// Round-robin connection multiplexer over `pool_size` slots (C5).
pub struct Pool<S> {
    slots: Vec<Arc<Slot<S>>>,
    next: AtomicUsize,
    connector: Connector<S>,
    initializer: Initializer<S>,
    backoff: BackoffPolicy,
    metrics: Arc<PoolMetrics>,
}

impl<S> Pool<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Dials `pool_size` connections up front via `connector`, running `initializer`
    /// (typically the RESP handshake) on each before the slot is marked live. The same
    /// `initializer` is retained and re-run on every reconnect, so a replacement
    /// connection ends up authenticated and pointed at the same database as the slot
    /// it replaced.
    pub async fn connect(
        pool_size: usize,
        connector: Connector<S>,
        backoff: BackoffPolicy,
        health_config: HealthCheckConfig,
        metrics: Arc<PoolMetrics>,
        initializer: Initializer<S>,
    ) -> Result<Self, RespError> {
        let mut slots = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let socket = (connector)().await?;
            let mut conn = Connection::new(socket);
            (initializer)(&mut conn).await?;
            slots.push(Arc::new(Slot {
                connection: Mutex::new(conn),
                live: std::sync::atomic::AtomicBool::new(true),
                usage: AtomicUsize::new(0),
                reconnect_attempts: AtomicU32::new(0),
                next_attempt_at: Mutex::new(None),
                health: Mutex::new(HealthMonitor::new(health_config.clone())),
            }));
        }
        metrics.set_connection_counts(slots.len(), slots.len());
        Ok(Pool { slots, next: AtomicUsize::new(0), connector, initializer, backoff, metrics })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn metrics(&self) -> &Arc<PoolMetrics> {
        &self.metrics
    }

    /// Leases one connection. Tries a zero-wait `try_lock` across all live slots in
    /// round-robin order first; if every live slot is momentarily busy, falls back to
    /// awaiting the next live slot in sequence. Errors if no slot is live at all.
    pub async fn lease(&self) -> Result<Lease<'_, S>, RespError> {
        let n = self.slots.len();
        if n == 0 {
            return Err(RespError::PoolExhausted);
        }
        let start = self.next.fetch_add(1, Ordering::Relaxed) % n;

        for offset in 0..n {
            let idx = (start + offset) % n;
            let slot = &self.slots[idx];
            if !slot.live.load(Ordering::Acquire) {
                continue;
            }
            if let Ok(guard) = slot.connection.try_lock() {
                slot.usage.fetch_add(1, Ordering::Relaxed);
                return Ok(Lease { guard, slot });
            }
        }

        for offset in 0..n {
            let idx = (start + offset) % n;
            let slot = &self.slots[idx];
            if !slot.live.load(Ordering::Acquire) {
                continue;
            }
            let guard = slot.connection.lock().await;
            slot.usage.fetch_add(1, Ordering::Relaxed);
            return Ok(Lease { guard, slot });
        }

        Err(RespError::PoolExhausted)
    }

    /// Spawns the background task that periodically PINGs idle connections and drives
    /// reconnects for failed ones. Intended to be `tokio::spawn`ed once per pool.
    pub async fn run_maintenance(self: Arc<Self>, tick: Duration) {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            self.health_check_pass().await;
            self.reconnect_pass().await;
        }
    }

    async fn health_check_pass(&self) {
        for slot in &self.slots {
            if !slot.live.load(Ordering::Acquire) {
                continue;
            }
            let should_ping = {
                let health = slot.health.lock().await;
                health.should_ping()
            };
            if !should_ping {
                continue;
            }
            let Ok(mut guard) = slot.connection.try_lock() else {
                continue;
            };
            let timeout = {
                let health = slot.health.lock().await;
                health.timeout()
            };
            {
                let mut health = slot.health.lock().await;
                health.on_ping_sent();
            }
            let result = tokio::time::timeout(timeout, async {
                guard.write_command(b"PING", std::iter::empty()).await?;
                guard.read_frame().await
            })
            .await;
            match result {
                Ok(Ok(Some(_))) => {
                    slot.health.lock().await.on_ping_success();
                }
                _ => {
                    let mut health = slot.health.lock().await;
                    health.on_ping_failure();
                    if health.is_dead() {
                        guard.mark_failed();
                        drop(guard);
                        slot.live.store(false, Ordering::Release);
                        warn!("connection failed health check repeatedly, marking dead");
                    }
                }
            }
        }
    }

    async fn reconnect_pass(&self) {
        let mut connected = 0usize;
        for slot in &self.slots {
            if slot.live.load(Ordering::Acquire) {
                connected += 1;
                continue;
            }
            let mut next_attempt = slot.next_attempt_at.lock().await;
            if let Some(at) = *next_attempt {
                if Instant::now() < at {
                    continue;
                }
            }
            let Ok(mut guard) = slot.connection.try_lock() else { continue };
            let dial_and_init = async {
                let socket = (self.connector)().await?;
                let mut conn = Connection::new(socket);
                (self.initializer)(&mut conn).await?;
                Ok::<_, RespError>(conn)
            };
            match dial_and_init.await {
                Ok(conn) => {
                    *guard = conn;
                    slot.reconnect_attempts.store(0, Ordering::Relaxed);
                    *next_attempt = None;
                    slot.live.store(true, Ordering::Release);
                    connected += 1;
                    debug!("reconnected pool slot");
                }
                Err(e) => {
                    let attempt = slot.reconnect_attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    let delay = self.backoff.delay(attempt);
                    *next_attempt = Some(Instant::now() + delay);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "reconnect attempt failed");
                }
            }
        }
        self.metrics.set_connection_counts(connected, self.slots.len());
    }
}
