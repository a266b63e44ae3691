// ABOUTME: Reconnect backoff policies for failed pool connections

use rand::Rng;
use std::time::Duration;

/// Delay policy applied between successive reconnect attempts for one slot.
#[derive(Debug, Clone, Copy)]
pub enum BackoffPolicy {
    Fixed(Duration),
    Linear { base: Duration, step: Duration, max: Duration },
    Exponential { base: Duration, max: Duration },
    /// Exponential with up to 30% jitter applied on top, to avoid every slot in a
    /// pool retrying in lockstep after a shared outage.
    ExponentialWithJitter { base: Duration, max: Duration },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::ExponentialWithJitter {
            base: Duration::from_millis(50),
            max: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            BackoffPolicy::Fixed(d) => d,
            BackoffPolicy::Linear { base, step, max } => {
                let scaled = step.saturating_mul(attempt.saturating_sub(1));
                (base + scaled).min(max)
            }
            BackoffPolicy::Exponential { base, max } => exponential(base, max, attempt),
            BackoffPolicy::ExponentialWithJitter { base, max } => {
                let d = exponential(base, max, attempt);
                jitter(d)
            }
        }
    }
}

fn exponential(base: Duration, max: Duration, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(32);
    let factor = 1u64.checked_shl(exp).unwrap_or(u64::MAX);
    base.checked_mul(factor as u32).unwrap_or(max).min(max)
}

fn jitter(d: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let factor: f64 = rng.gen_range(0.85..=1.15);
    Duration::from_secs_f64((d.as_secs_f64() * factor).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_never_changes() {
        let p = BackoffPolicy::Fixed(Duration::from_millis(100));
        assert_eq!(p.delay(1), p.delay(10));
    }

    #[test]
    fn linear_grows_and_caps() {
        let p = BackoffPolicy::Linear {
            base: Duration::from_millis(100),
            step: Duration::from_millis(50),
            max: Duration::from_millis(300),
        };
        assert_eq!(p.delay(1), Duration::from_millis(100));
        assert_eq!(p.delay(2), Duration::from_millis(150));
        assert_eq!(p.delay(100), Duration::from_millis(300));
    }

    #[test]
    fn exponential_doubles_and_caps() {
        let p = BackoffPolicy::Exponential {
            base: Duration::from_millis(10),
            max: Duration::from_secs(1),
        };
        assert_eq!(p.delay(1), Duration::from_millis(10));
        assert_eq!(p.delay(2), Duration::from_millis(20));
        assert_eq!(p.delay(3), Duration::from_millis(40));
        assert_eq!(p.delay(100), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = BackoffPolicy::ExponentialWithJitter {
            base: Duration::from_millis(100),
            max: Duration::from_secs(10),
        };
        for attempt in 1..8 {
            let d = p.delay(attempt);
            let nominal = exponential(Duration::from_millis(100), Duration::from_secs(10), attempt);
            let lo = nominal.mul_f64(0.8);
            let hi = nominal.mul_f64(1.2);
            assert!(d >= lo && d <= hi, "attempt {attempt}: {d:?} not within [{lo:?}, {hi:?}]");
        }
    }

    #[test]
    fn delay_is_monotonic_until_cap() {
        let p = BackoffPolicy::Exponential {
            base: Duration::from_millis(5),
            max: Duration::from_secs(5),
        };
        let mut prev = Duration::ZERO;
        for attempt in 1..10 {
            let d = p.delay(attempt);
            assert!(d >= prev);
            prev = d;
        }
    }
}
