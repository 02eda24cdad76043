//! # Circuit Breaker
//!
//! Per-category breakers opened by the `circuit_breaker` remediation.
//! An open circuit moves to half-open once `reset_timeout` has elapsed and
//! closes again after enough successes, so no background timer is needed.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation, requests allowed
    Closed,
    /// Failing, requests blocked
    Open,
    /// Testing recovery, limited requests allowed
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF-OPEN"),
        }
    }
}

/// Configuration for a circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Time to keep a circuit open before probing
    pub reset_timeout: Duration,
    /// Consecutive successes needed to close from half-open
    pub half_open_success_threshold: usize,
    /// Requests allowed through while half-open
    pub half_open_max_calls: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            reset_timeout: Duration::from_secs(30),
            half_open_success_threshold: 2,
            half_open_max_calls: 5,
        }
    }
}

#[derive(Debug)]
struct CircuitStats {
    state: CircuitState,
    last_state_change: Instant,
    trips: u64,
    consecutive_successes: usize,
    half_open_remaining: usize,
}

impl CircuitStats {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            last_state_change: Instant::now(),
            trips: 0,
            consecutive_successes: 0,
            half_open_remaining: 0,
        }
    }

    fn transition(&mut self, state: CircuitState) {
        self.state = state;
        self.last_state_change = Instant::now();
        self.consecutive_successes = 0;
    }
}

/// Health snapshot for one circuit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitHealth {
    pub state: CircuitState,
    pub trips: u64,
    pub time_in_state: Duration,
    /// Remaining time before an open circuit starts probing
    pub time_to_retry: Option<Duration>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: RwLock<HashMap<String, CircuitStats>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CircuitBreaker {
    pub fn new(config: Option<CircuitBreakerConfig>) -> Self {
        Self {
            config: config.unwrap_or_default(),
            circuits: RwLock::new(HashMap::new()),
        }
    }

    /// Opens the circuit for `key` regardless of its current state
    pub fn trip(&self, key: &str) {
        let mut circuits = self.circuits.write().unwrap_or_else(PoisonError::into_inner);
        let stats = circuits.entry(key.to_string()).or_insert_with(CircuitStats::closed);
        let previous = stats.state;
        stats.transition(CircuitState::Open);
        stats.trips += 1;

        counter!("error_intelligence.circuit.opened", 1, "circuit" => key.to_string());
        warn!(circuit = %key, from = %previous, trips = stats.trips, "Circuit OPEN");
    }

    /// Checks whether a call for `key` may proceed
    pub fn is_allowed(&self, key: &str) -> bool {
        let mut circuits = self.circuits.write().unwrap_or_else(PoisonError::into_inner);
        let Some(stats) = circuits.get_mut(key) else {
            return true;
        };

        match stats.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if stats.last_state_change.elapsed() >= self.config.reset_timeout {
                    stats.transition(CircuitState::HalfOpen);
                    stats.half_open_remaining = self.config.half_open_max_calls.saturating_sub(1);
                    info!(circuit = %key, "Circuit HALF-OPEN: probing recovery");
                    true
                } else {
                    debug!(circuit = %key, "Circuit open, request rejected");
                    false
                }
            }
            CircuitState::HalfOpen => {
                if stats.half_open_remaining > 0 {
                    stats.half_open_remaining -= 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self, key: &str) {
        let mut circuits = self.circuits.write().unwrap_or_else(PoisonError::into_inner);
        let Some(stats) = circuits.get_mut(key) else {
            return;
        };

        if stats.state == CircuitState::HalfOpen {
            stats.consecutive_successes += 1;
            if stats.consecutive_successes >= self.config.half_open_success_threshold {
                stats.transition(CircuitState::Closed);
                info!(circuit = %key, "Circuit CLOSED: service recovered");
            }
        }
    }

    pub fn record_failure(&self, key: &str) {
        let mut circuits = self.circuits.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(stats) = circuits.get_mut(key) {
            if stats.state == CircuitState::HalfOpen {
                stats.transition(CircuitState::Open);
                stats.trips += 1;
                warn!(circuit = %key, "Circuit re-opened after failed probe");
            }
        }
    }

    pub fn state(&self, key: &str) -> CircuitState {
        let circuits = self.circuits.read().unwrap_or_else(PoisonError::into_inner);
        circuits.get(key).map(|s| s.state).unwrap_or(CircuitState::Closed)
    }

    pub fn health(&self, key: &str) -> CircuitHealth {
        let circuits = self.circuits.read().unwrap_or_else(PoisonError::into_inner);
        match circuits.get(key) {
            Some(stats) => {
                let elapsed = stats.last_state_change.elapsed();
                CircuitHealth {
                    state: stats.state,
                    trips: stats.trips,
                    time_in_state: elapsed,
                    time_to_retry: (stats.state == CircuitState::Open)
                        .then(|| self.config.reset_timeout.saturating_sub(elapsed)),
                }
            }
            None => CircuitHealth {
                state: CircuitState::Closed,
                trips: 0,
                time_in_state: Duration::ZERO,
                time_to_retry: None,
            },
        }
    }

    pub fn reset(&self, key: &str) {
        let mut circuits = self.circuits.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(stats) = circuits.get_mut(key) {
            stats.transition(CircuitState::Closed);
        }
    }

    pub fn circuit_names(&self) -> Vec<String> {
        let circuits = self.circuits.read().unwrap_or_else(PoisonError::into_inner);
        circuits.keys().cloned().collect()
    }
}
