// ABOUTME: Client configuration — endpoint, credentials, pool sizing, batch/backoff profiles

use crate::pool::backoff::BackoffPolicy;
use std::time::Duration;

/// Batching behavior for the command queue (C6). `Default` favors balanced latency and
/// throughput; the named profiles bias one way or the other.
#[derive(Debug, Clone, Copy)]
pub struct BatchProfile {
    pub max_batch: usize,
    pub batch_timeout: Duration,
}

impl BatchProfile {
    pub const DEFAULT: BatchProfile =
        BatchProfile { max_batch: 100, batch_timeout: Duration::from_millis(1) };

    pub const HIGH_THROUGHPUT: BatchProfile =
        BatchProfile { max_batch: 1000, batch_timeout: Duration::from_millis(10) };

    pub const LOW_LATENCY: BatchProfile =
        BatchProfile { max_batch: 10, batch_timeout: Duration::from_micros(100) };
}

impl Default for BatchProfile {
    fn default() -> Self {
        BatchProfile::DEFAULT
    }
}

/// What the ingress queue does when it's full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowMode {
    /// Block the submitter until space frees up.
    Wait,
    /// Evict the oldest queued submission, failing it with `QueueOverflow`.
    DropOldest,
    /// Reject the new submission immediately with `QueueOverflow`.
    Error,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: String,
}

/// Configuration for one `Client`/`Pool`. Mirrors the teacher's `ClientOptions`
/// fluent-builder shape, generalized to the RESP client's knobs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
    pub database: u32,
    pub use_resp3: bool,

    pub pool_size: usize,
    pub connect_timeout: Duration,
    pub command_timeout: Option<Duration>,

    pub batch_profile: BatchProfile,
    pub reconnect_policy: BackoffPolicy,
    pub auto_reconnect: bool,

    pub ingress_capacity: Option<usize>,
    pub overflow_mode: OverflowMode,
    pub handle_pool_size: usize,
    pub command_cache_capacity: usize,

    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
    pub health_check_max_failures: u32,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ClientConfig {
            host: host.into(),
            port,
            credentials: None,
            database: 0,
            use_resp3: true,
            pool_size: default_pool_size(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Some(Duration::from_secs(5)),
            batch_profile: BatchProfile::default(),
            reconnect_policy: BackoffPolicy::default(),
            auto_reconnect: true,
            ingress_capacity: Some(10_000),
            overflow_mode: OverflowMode::Wait,
            handle_pool_size: 256,
            command_cache_capacity: 1000,
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(5),
            health_check_max_failures: 3,
        }
    }

    pub fn with_credentials(mut self, username: Option<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials { username, password: password.into() });
        self
    }

    pub fn with_database(mut self, database: u32) -> Self {
        self.database = database;
        self
    }

    pub fn without_resp3(mut self) -> Self {
        self.use_resp3 = false;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn with_batch_profile(mut self, profile: BatchProfile) -> Self {
        self.batch_profile = profile;
        self
    }

    pub fn with_reconnect_policy(mut self, policy: BackoffPolicy) -> Self {
        self.reconnect_policy = policy;
        self
    }

    pub fn without_auto_reconnect(mut self) -> Self {
        self.auto_reconnect = false;
        self
    }

    pub fn with_overflow_mode(mut self, mode: OverflowMode) -> Self {
        self.overflow_mode = mode;
        self
    }

    pub fn with_ingress_capacity(mut self, capacity: Option<usize>) -> Self {
        self.ingress_capacity = capacity;
        self
    }

    pub fn with_handle_pool_size(mut self, size: usize) -> Self {
        self.handle_pool_size = size;
        self
    }

    pub fn with_command_cache_capacity(mut self, capacity: usize) -> Self {
        self.command_cache_capacity = capacity;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

fn default_pool_size() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain_applies_overrides() {
        let cfg = ClientConfig::new("127.0.0.1", 6379)
            .with_database(3)
            .with_pool_size(8)
            .without_resp3()
            .with_overflow_mode(OverflowMode::Error);
        assert_eq!(cfg.database, 3);
        assert_eq!(cfg.pool_size, 8);
        assert!(!cfg.use_resp3);
        assert_eq!(cfg.overflow_mode, OverflowMode::Error);
    }

    #[test]
    fn pool_size_floor_is_one() {
        let cfg = ClientConfig::new("127.0.0.1", 6379).with_pool_size(0);
        assert_eq!(cfg.pool_size, 1);
    }
}
