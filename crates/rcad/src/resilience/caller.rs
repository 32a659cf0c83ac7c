//! Resilient provider calls: breaker gate → rate limiter → deadline.

use super::circuit::CircuitBreaker;
use super::rate_limiter::RateLimiter;
use rca_common::{CallError, RcaConfig};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The only path through which the AI provider is invoked
pub struct ResilientCaller {
    breaker: Arc<CircuitBreaker>,
    call_timeout: Duration,
}

impl ResilientCaller {
    pub fn new(breaker: Arc<CircuitBreaker>, call_timeout: Duration) -> Self {
        Self {
            breaker,
            call_timeout,
        }
    }

    /// Build the limiter and breaker for one provider
    pub fn from_config(config: &RcaConfig) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let breaker = Arc::new(CircuitBreaker::from_config(&config.breaker, limiter));
        Self::new(breaker, config.deadlines.ai_call())
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Invoke `call` under the guards
    ///
    /// A provider error or a missed call deadline counts as a breaker
    /// failure; a success resets the failure count.
    pub async fn call<F, Fut, T, E>(&self, call: F) -> Result<T, CallError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.breaker.check()?;

        let deadline = self.call_timeout;
        let outcome = self
            .breaker
            .limiter()
            .schedule(|| async move { tokio::time::timeout(deadline, call()).await })
            .await;

        match outcome {
            Ok(Ok(payload)) => {
                self.breaker.record_success();
                Ok(payload)
            }
            Ok(Err(e)) => {
                self.breaker.record_failure();
                debug!("Guarded call failed: {:#}", e);
                Err(CallError::Provider(format!("{:#}", e)))
            }
            Err(_) => {
                self.breaker.record_failure();
                debug!("Guarded call exceeded {}ms", deadline.as_millis());
                Err(CallError::Timeout(deadline))
            }
        }
    }
}
