//! Circuit breaker for the AI provider
//!
//! Closed → Open after `failure_threshold` consecutive failures. While open,
//! `check()` rejects immediately. The open transition schedules a reset task
//! that closes the breaker after the cooldown; there is no half-open probe.

use super::rate_limiter::RateLimiter;
use rca_common::{BreakerConfig, CallError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
}

/// Read-only view for status output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub open: bool,
    pub failure_count: u32,
    pub queued: usize,
    pub running: usize,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Consecutive failures since the last success or reset
    failure_count: u32,
    /// Set while open
    reopens_at: Option<Instant>,
}

impl BreakerInner {
    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.reopens_at = None;
    }

    /// Close the circuit if the cooldown has elapsed
    fn expire(&mut self, now: Instant) -> bool {
        match (self.state, self.reopens_at) {
            (CircuitState::Open, Some(at)) if now >= at => {
                self.close();
                true
            }
            _ => false,
        }
    }
}

/// Process-wide breaker around one provider; wraps that provider's rate limiter
pub struct CircuitBreaker {
    inner: Arc<Mutex<BreakerInner>>,
    /// Threshold for opening circuit
    failure_threshold: u32,
    /// Time the circuit stays open
    cooldown: Duration,
    limiter: Arc<RateLimiter>,
    reset_task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration, limiter: Arc<RateLimiter>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                reopens_at: None,
            })),
            failure_threshold: failure_threshold.max(1),
            cooldown,
            limiter,
            reset_task: Mutex::new(None),
        }
    }

    pub fn from_config(config: &BreakerConfig, limiter: Arc<RateLimiter>) -> Self {
        Self::new(config.failure_threshold, config.cooldown(), limiter)
    }

    /// Gate a call; never suspends
    pub fn check(&self) -> Result<(), CallError> {
        let mut inner = lock(&self.inner);
        if inner.expire(Instant::now()) {
            info!("Circuit breaker cooldown elapsed, closing");
        }
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => Err(CallError::CircuitOpen),
        }
    }

    /// Record a success
    pub fn record_success(&self) {
        let mut inner = lock(&self.inner);
        // Success while open comes from a call admitted before the trip; ignore it
        if inner.state == CircuitState::Closed {
            inner.failure_count = 0;
        }
    }

    /// Record a failure
    pub fn record_failure(&self) {
        let reopens_at = {
            let mut inner = lock(&self.inner);
            if inner.state == CircuitState::Open {
                return;
            }
            inner.failure_count += 1;
            if inner.failure_count < self.failure_threshold {
                return;
            }
            let reopens_at = Instant::now() + self.cooldown;
            inner.state = CircuitState::Open;
            inner.reopens_at = Some(reopens_at);
            warn!(
                "Circuit breaker opened after {} consecutive failures; closing in {}s",
                inner.failure_count,
                self.cooldown.as_secs()
            );
            reopens_at
        };
        self.schedule_reset(reopens_at);
    }

    fn schedule_reset(&self, reopens_at: Instant) {
        // Without a runtime the gate's own expiry check still closes the circuit
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let task = handle.spawn(async move {
            tokio::time::sleep_until(reopens_at).await;
            if lock(&inner).expire(Instant::now()) {
                info!("Circuit breaker reset after cooldown");
            }
        });
        if let Some(previous) = lock(&self.reset_task).replace(task) {
            previous.abort();
        }
    }

    /// Cancel a pending reset task
    pub fn shutdown(&self) {
        if let Some(task) = lock(&self.reset_task).take() {
            task.abort();
        }
    }

    /// Get current state
    pub fn state(&self) -> CircuitState {
        let mut inner = lock(&self.inner);
        inner.expire(Instant::now());
        inner.state
    }

    pub fn failure_count(&self) -> u32 {
        lock(&self.inner).failure_count
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let (open, failure_count) = {
            let mut inner = lock(&self.inner);
            inner.expire(Instant::now());
            (inner.state == CircuitState::Open, inner.failure_count)
        };
        CircuitSnapshot {
            open,
            failure_count,
            queued: self.limiter.queued(),
            running: self.limiter.running(),
        }
    }
}

impl Drop for CircuitBreaker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60), 2));
        CircuitBreaker::new(threshold, cooldown, limiter)
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_opens() {
        let cb = breaker(3, Duration::from_secs(60));

        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.check(), Err(CallError::CircuitOpen));
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_closes_after_cooldown() {
        let cb = breaker(2, Duration::from_secs(60));

        cb.record_failure();
        cb.record_failure();
        assert!(cb.snapshot().open);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cb.check(), Err(CallError::CircuitOpen));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cb.check().is_ok());
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_task_closes_without_traffic() {
        let cb = breaker(1, Duration::from_secs(5));
        cb.record_failure();

        tokio::time::sleep(Duration::from_secs(6)).await;
        // Inspect the raw state so the gate's own expiry check does not mask the task
        assert_eq!(lock(&cb.inner).state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(60));

        cb.record_failure();
        assert_eq!(cb.failure_count(), 1);

        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_while_open_are_ignored() {
        let cb = breaker(2, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.failure_count(), 2);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_reset_task() {
        let cb = breaker(1, Duration::from_secs(5));
        cb.record_failure();
        cb.shutdown();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(lock(&cb.inner).state, CircuitState::Open);
        // The gate still honours the deadline
        assert!(cb.check().is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_reports_limiter_counters() {
        let cb = breaker(3, Duration::from_secs(60));
        let snapshot = cb.snapshot();
        assert_eq!(
            snapshot,
            CircuitSnapshot {
                open: false,
                failure_count: 0,
                queued: 0,
                running: 0,
            }
        );
    }
}
