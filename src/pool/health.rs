// ABOUTME: Health-check timer for one pooled connection, tracked via periodic PING
// ABOUTME: Generalized from the teacher's KeepAliveManager (enquire_link -> PING)

use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub max_failures: u32,
    pub enabled: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        HealthCheckConfig {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            max_failures: 3,
            enabled: true,
        }
    }
}

impl HealthCheckConfig {
    pub fn new(interval: Duration) -> Self {
        HealthCheckConfig { interval, ..Default::default() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn disabled() -> Self {
        HealthCheckConfig { enabled: false, ..Default::default() }
    }
}

/// Tracks whether a pooled connection is due for a PING and how many have failed in a
/// row. A connection is considered dead once `consecutive_failures` reaches
/// `max_failures`; the pool then marks the slot `Failed` and hands it to the
/// reconnect backoff.
#[derive(Debug)]
pub struct HealthMonitor {
    config: HealthCheckConfig,
    last_ping: Option<Instant>,
    consecutive_failures: u32,
}

impl HealthMonitor {
    pub fn new(config: HealthCheckConfig) -> Self {
        HealthMonitor { config, last_ping: None, consecutive_failures: 0 }
    }

    pub fn should_ping(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        match self.last_ping {
            None => true,
            Some(last) => last.elapsed() >= self.config.interval,
        }
    }

    pub fn on_ping_sent(&mut self) {
        self.last_ping = Some(Instant::now());
    }

    pub fn on_ping_success(&mut self) {
        if self.consecutive_failures > 0 {
            debug!("connection recovered after {} failed health checks", self.consecutive_failures);
        }
        self.consecutive_failures = 0;
    }

    pub fn on_ping_failure(&mut self) {
        self.consecutive_failures += 1;
        warn!(failures = self.consecutive_failures, "health check PING failed");
    }

    pub fn is_dead(&self) -> bool {
        self.consecutive_failures >= self.config.max_failures
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pings_immediately_when_never_pinged() {
        let m = HealthMonitor::new(HealthCheckConfig::default());
        assert!(m.should_ping());
    }

    #[test]
    fn waits_out_the_interval() {
        let mut m = HealthMonitor::new(HealthCheckConfig::new(Duration::from_millis(50)));
        m.on_ping_sent();
        assert!(!m.should_ping());
        std::thread::sleep(Duration::from_millis(80));
        assert!(m.should_ping());
    }

    #[test]
    fn dies_after_max_failures() {
        let mut m = HealthMonitor::new(HealthCheckConfig::default().with_max_failures(2));
        assert!(!m.is_dead());
        m.on_ping_failure();
        assert!(!m.is_dead());
        m.on_ping_failure();
        assert!(m.is_dead());
    }

    #[test]
    fn success_resets_failures() {
        let mut m = HealthMonitor::new(HealthCheckConfig::default().with_max_failures(2));
        m.on_ping_failure();
        m.on_ping_success();
        assert!(!m.is_dead());
    }

    #[test]
    fn disabled_never_pings() {
        let m = HealthMonitor::new(HealthCheckConfig::disabled());
        assert!(!m.should_ping());
    }
}
