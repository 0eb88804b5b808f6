//! 弹性模块：熔断器与提供方健康状态。
//!
//! # Resilience Module
//!
//! Holds the per-provider circuit breaker that doubles as the provider's health record
//! (consecutive failures, last success / failure, rolling latency).
//!
//! ## Circuit Breaker
//!
//! - **Closed**: normal operation
//! - **Open**: failure threshold reached and the last failure is within the cooldown;
//!   routing moves the provider behind every usable one
//! - **Half-Open**: cooldown elapsed; the next attempt is let through and either closes
//!   the circuit (success) or re-opens it (failure)
//!
//! ```rust
//! use ai_nihongo_router::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::new()
//!     .with_failure_threshold(3)
//!     .with_cooldown(Duration::from_secs(30));
//! let breaker = CircuitBreaker::new(config);
//!
//! if breaker.allow() {
//!     // call the provider...
//!     breaker.on_success(Duration::from_millis(120));
//! }
//! ```

pub mod circuit_breaker;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, HealthSnapshot, HealthState,
};
