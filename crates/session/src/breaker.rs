//! Circuit breaker for external peer connections
//!
//! Repeatedly retrying a down or misconfigured upstream wastes resources and
//! adds latency to every call. The breaker converts cascading connect
//! failures into fast rejections, then probes the peer again after a
//! cool-down. State is process-wide per peer and outlives sessions.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use callbridge_config::BreakerConfig;

/// Breaker state tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation, calls flow.
    Closed,
    /// Peer considered down, calls are rejected until the cool-down elapses.
    Open,
    /// Probing: a limited number of attempts are let through.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    half_open_successes: u32,
    /// Probe permits handed out while half-open and not yet resolved by a
    /// recorded success or failure.
    half_open_probes: u32,
    last_failure: Option<Instant>,
}

/// Per-peer failure tracker with closed/open/half-open transitions.
///
/// Shared across concurrent sessions, hence the interior mutex.
#[derive(Debug)]
pub struct CircuitBreaker {
    peer: String,
    failure_threshold: u32,
    cooldown: Duration,
    success_threshold: u32,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(peer: impl Into<String>, config: &BreakerConfig) -> Self {
        Self {
            peer: peer.into(),
            failure_threshold: config.failure_threshold,
            cooldown: Duration::from_secs(config.cooldown_secs),
            success_threshold: config.success_threshold,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                half_open_probes: 0,
                last_failure: None,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Whether a connection attempt may proceed right now.
    ///
    /// An open breaker whose cool-down has elapsed transitions to half-open
    /// here, letting the caller through as a probe. While half-open, at most
    /// `success_threshold` probes may be outstanding at once; each recorded
    /// success or failure settles one permit.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => {
                if inner.half_open_probes < self.success_threshold {
                    inner.half_open_probes += 1;
                    true
                } else {
                    false
                }
            }
            BreakerState::Open => {
                let cooled = inner
                    .last_failure
                    .map(|at| at.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if cooled {
                    info!(peer = %self.peer, "Circuit breaker half-open, probing");
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_successes = 0;
                    inner.half_open_probes = 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                inner.half_open_probes = inner.half_open_probes.saturating_sub(1);
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.success_threshold {
                    info!(peer = %self.peer, "Circuit breaker closed");
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_successes = 0;
                    inner.half_open_probes = 0;
                    inner.last_failure = None;
                }
            }
            // A success while open is stale information; the cool-down rules.
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure = Some(Instant::now());
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(
                        peer = %self.peer,
                        failures = inner.consecutive_failures,
                        "Circuit breaker opened"
                    );
                    inner.state = BreakerState::Open;
                }
            }
            BreakerState::HalfOpen => {
                warn!(peer = %self.peer, "Probe failed, circuit breaker re-opened");
                inner.state = BreakerState::Open;
                inner.half_open_successes = 0;
                inner.half_open_probes = 0;
            }
            BreakerState::Open => {}
        }
    }
}

/// Process-wide registry of breakers, one per external peer.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Breaker for the named peer, created on first use.
    pub fn for_peer(&self, peer: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(peer.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(peer, &self.config)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(failure_threshold: u32, cooldown_secs: u64, success_threshold: u32) -> BreakerConfig {
        BreakerConfig {
            failure_threshold,
            cooldown_secs,
            success_threshold,
        }
    }

    #[test]
    fn test_opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new("agent", &config(3, 30, 2));

        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.can_execute());
        assert_eq!(breaker.state(), BreakerState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.can_execute());
    }

    #[test]
    fn test_success_resets_failure_count_while_closed() {
        let breaker = CircuitBreaker::new("agent", &config(2, 30, 1));

        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_after_cooldown_then_closes_on_successes() {
        // Zero cool-down: the next can_execute after opening probes.
        let breaker = CircuitBreaker::new("agent", &config(1, 0, 2));

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        assert!(breaker.can_execute());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.can_execute());
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("agent", &config(1, 0, 2));

        breaker.record_failure();
        assert!(breaker.can_execute());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn test_half_open_probe_permits_are_bounded() {
        let breaker = CircuitBreaker::new("agent", &config(1, 0, 2));
        breaker.record_failure();

        // Two permits while half-open, then rejection until one settles.
        assert!(breaker.can_execute());
        assert!(breaker.can_execute());
        assert!(!breaker.can_execute());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_success();
        assert!(breaker.can_execute());

        // A probe failure re-opens and voids the outstanding permits.
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.can_execute());
        assert!(breaker.can_execute());
        assert!(!breaker.can_execute());
    }

    #[test]
    fn test_open_breaker_rejects_before_cooldown() {
        let breaker = CircuitBreaker::new("agent", &config(1, 3600, 1));
        breaker.record_failure();

        assert!(!breaker.can_execute());
        assert!(!breaker.can_execute());
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn test_registry_returns_same_breaker_per_peer() {
        let registry = BreakerRegistry::new(config(1, 30, 1));
        let a = registry.for_peer("agent");
        let b = registry.for_peer("agent");

        a.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert_eq!(registry.for_peer("other").state(), BreakerState::Closed);
    }
}
