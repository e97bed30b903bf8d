//! Circuit breaker guarding the physical connection.
//!
//! Tracks consecutive connectivity failures and fails fast once a
//! threshold is crossed, re-probing after a cooldown instead of
//! hammering a database that is already down.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::{Result, StoreError};

/// Configuration for the connection circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before probing.
    pub reset_timeout: Duration,
    /// Probe calls allowed in the half-open state.
    pub half_open_max_attempts: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_millis(60_000),
            half_open_max_attempts: 3,
        }
    }
}

/// State of the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected immediately.
    Open,
    /// A bounded number of probe calls is testing recovery.
    HalfOpen,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_attempts: u32,
    half_open_successes: u32,
}

/// Circuit breaker for one connection target.
#[derive(Debug)]
pub struct CircuitBreaker {
    target: String,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(target: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            target: target.into(),
            config,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_attempts: 0,
                half_open_successes: 0,
            }),
        }
    }

    /// Check whether a call may proceed, transitioning Open → HalfOpen
    /// once the reset timeout has elapsed.
    pub fn try_acquire(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.reset_timeout {
                    info!(target = %self.target, "circuit half-open, probing");
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_attempts = 1;
                    inner.half_open_successes = 0;
                    Ok(())
                } else {
                    let remaining = self.config.reset_timeout - elapsed;
                    Err(StoreError::CircuitOpen {
                        target: self.target.clone(),
                        retry_after_ms: remaining.as_millis() as u64,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_attempts < self.config.half_open_max_attempts {
                    inner.half_open_attempts += 1;
                    Ok(())
                } else {
                    // Probe budget spent; wait for in-flight probes to resolve.
                    Err(StoreError::CircuitOpen {
                        target: self.target.clone(),
                        retry_after_ms: 0,
                    })
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_max_attempts {
                    info!(target = %self.target, "circuit closed after successful probes");
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.opened_at = None;
                    inner.half_open_attempts = 0;
                    inner.half_open_successes = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a connectivity failure.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        target = %self.target,
                        failures = inner.consecutive_failures,
                        "circuit opened"
                    );
                    Self::open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                warn!(target = %self.target, "probe failed, circuit re-opened");
                Self::open(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    fn open(inner: &mut CircuitInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.half_open_attempts = 0;
        inner.half_open_successes = 0;
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Whether calls would currently be admitted.
    pub fn is_ready(&self) -> bool {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => inner
                .opened_at
                .map(|t| t.elapsed() >= self.config.reset_timeout)
                .unwrap_or(false),
        }
    }

    /// Manually reset to closed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.half_open_attempts = 0;
        inner.half_open_successes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_timeout: Duration::from_millis(reset_ms),
                half_open_max_attempts: 3,
            },
        )
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let cb = breaker(3, 60_000);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(matches!(
            cb.try_acquire(),
            Err(StoreError::CircuitOpen { .. })
        ));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, 60_000);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_after_timeout_then_closes() {
        let cb = breaker(1, 0);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        // Zero reset timeout: next acquire transitions to half-open.
        cb.try_acquire().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        cb.try_acquire().unwrap();
        cb.record_success();
        cb.try_acquire().unwrap();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(1, 0);
        cb.record_failure();
        cb.try_acquire().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_half_open_probe_budget() {
        let cb = breaker(1, 0);
        cb.record_failure();
        cb.try_acquire().unwrap(); // probe 1 (transitions)
        cb.try_acquire().unwrap(); // probe 2
        cb.try_acquire().unwrap(); // probe 3
        assert!(cb.try_acquire().is_err()); // budget spent
    }

    #[test]
    fn test_reset() {
        let cb = breaker(1, 60_000);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_ok());
    }
}
