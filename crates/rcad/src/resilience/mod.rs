//! Guards around the AI provider call path.
//!
//! Features:
//! - Reservoir rate limiter (full refill at each window boundary, concurrency ceiling)
//! - Circuit breaker shared by every caller of the provider
//! - `ResilientCaller`: breaker gate → limiter → deadline-bounded call
//!
//! One set of guards is built at process bootstrap and handed to every
//! orchestrator by `Arc`, so failure accounting is global per provider.

pub mod caller;
pub mod circuit;
pub mod rate_limiter;

pub use caller::ResilientCaller;
pub use circuit::{CircuitBreaker, CircuitSnapshot, CircuitState};
pub use rate_limiter::{RateLimiter, RateLimiterState};
