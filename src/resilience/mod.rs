//! # Resilience Module
//!
//! Circuit breaker used by the cache provider so that a cache outage costs
//! one fast rejection per call instead of one timeout per call.
//!
//! ```rust,no_run
//! use catalog_core::resilience::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new(
//!     "cache".to_string(),
//!     CircuitBreakerConfig {
//!         failure_threshold: 5,
//!         timeout: Duration::from_secs(30),
//!         success_threshold: 2,
//!     },
//! );
//!
//! let result = breaker.call(|| async { Ok::<_, String>("PONG") }).await;
//! # }
//! ```

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};

use std::time::Duration;

/// Thresholds for a single circuit breaker
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing
    pub timeout: Duration,
    /// Successful probes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}
