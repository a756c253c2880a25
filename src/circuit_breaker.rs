//! # Circuit Breaker Module
//!
//! This module implements the circuit breaker pattern for a pipeline stage.
//! When the external tool behind a stage fails for several files in a row it is
//! almost certainly broken (missing delegate, bad install, wrong language
//! data), so the breaker opens and the rest of that stage is skipped instead
//! of failing every remaining file one timeout at a time.
//!
//! ```text
//! CLOSED ──consecutive failures ≥ threshold──► OPEN (until the stage ends)
//!    ▲
//!    └──────────success resets count
//! ```
//!
//! A batch is short-lived, so there is no half-open state: a fresh breaker is
//! created for every stage.

use parking_lot::Mutex;

use crate::tool_config::RecoveryConfig;

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    tripped: bool,
}

/// Circuit breaker for one stage of the pipeline
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    threshold: u32,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    ///
    /// ```rust
    /// use batch_ocr::circuit_breaker::CircuitBreaker;
    /// use batch_ocr::tool_config::RecoveryConfig;
    ///
    /// let breaker = CircuitBreaker::new(&RecoveryConfig::default());
    /// assert!(!breaker.is_open());
    /// ```
    pub fn new(config: &RecoveryConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            threshold: config.circuit_breaker_threshold.max(1),
        }
    }

    /// `true` once the failure threshold has been reached
    pub fn is_open(&self) -> bool {
        self.state.lock().tripped
    }

    /// Record a failed file; returns `true` if this failure opened the breaker
    pub fn record_failure(&self) -> bool {
        let mut state = self.state.lock();
        state.consecutive_failures += 1;
        if !state.tripped && state.consecutive_failures >= self.threshold {
            state.tripped = true;
            return true;
        }
        false
    }

    /// Record a successful file, resetting the consecutive failure count
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if !state.tripped {
            state.consecutive_failures = 0;
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }
}
