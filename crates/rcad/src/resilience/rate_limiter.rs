//! Reservoir rate limiter
//!
//! Tokens do not trickle back: the full `window_capacity` is restored at each
//! window deadline, which then advances by whole windows. Calls are never
//! rejected; callers wait in FIFO order for a concurrency slot, then take a
//! token while holding it. A caller abandoned while waiting for its slot has
//! not consumed a token.

use rca_common::RateLimitConfig;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Point-in-time view of the limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterState {
    pub window_capacity: u32,
    pub tokens_remaining: u32,
    pub max_concurrent: usize,
    pub window_deadline: Instant,
    pub queued: usize,
    pub running: usize,
}

#[derive(Debug)]
struct Reservoir {
    tokens: u32,
    window_deadline: Instant,
}

pub struct RateLimiter {
    window_capacity: u32,
    window: Duration,
    max_concurrent: usize,
    reservoir: Mutex<Reservoir>,
    /// Serializes token waiters so they are served in arrival order
    turn: tokio::sync::Mutex<()>,
    slots: Semaphore,
    queued: AtomicUsize,
    running: AtomicUsize,
}

/// Decrements a counter when dropped, including when the caller's future is abandoned
struct CounterGuard<'a>(&'a AtomicUsize);

impl<'a> CounterGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RateLimiter {
    /// Zero values are raised to the smallest usable setting
    pub fn new(window_capacity: u32, window: Duration, max_concurrent: usize) -> Self {
        let window_capacity = window_capacity.max(1);
        let window = window.max(Duration::from_millis(1));
        let max_concurrent = max_concurrent.max(1);

        Self {
            window_capacity,
            window,
            max_concurrent,
            reservoir: Mutex::new(Reservoir {
                tokens: window_capacity,
                window_deadline: Instant::now() + window,
            }),
            turn: tokio::sync::Mutex::new(()),
            slots: Semaphore::new(max_concurrent),
            queued: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.window_capacity, config.window(), config.max_concurrent)
    }

    /// Run `task` once a token and a concurrency slot are both available
    ///
    /// Returns whatever the task returns; the limiter adds no error of its own.
    pub async fn schedule<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let waiting = CounterGuard::enter(&self.queued);
        // The semaphore is owned by the limiter and never closed
        let _permit = self.slots.acquire().await.ok();
        self.take_token().await;
        drop(waiting);

        let _running = CounterGuard::enter(&self.running);
        task().await
    }

    async fn take_token(&self) {
        let _turn = self.turn.lock().await;
        loop {
            let refill_at = {
                let mut reservoir = self.lock_reservoir();
                self.refill(&mut reservoir, Instant::now());
                if reservoir.tokens > 0 {
                    reservoir.tokens -= 1;
                    return;
                }
                reservoir.window_deadline
            };
            debug!("Rate limiter exhausted, waiting for window refill");
            sleep_until(refill_at).await;
        }
    }

    fn refill(&self, reservoir: &mut Reservoir, now: Instant) {
        if now < reservoir.window_deadline {
            return;
        }
        let behind = now.duration_since(reservoir.window_deadline);
        let windows = u32::try_from(behind.as_nanos() / self.window.as_nanos())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        reservoir.tokens = self.window_capacity;
        let advanced = self
            .window
            .checked_mul(windows)
            .and_then(|advance| reservoir.window_deadline.checked_add(advance));
        reservoir.window_deadline = match advanced {
            Some(deadline) if deadline > now => deadline,
            _ => now + self.window,
        };
    }

    fn lock_reservoir(&self) -> MutexGuard<'_, Reservoir> {
        self.reservoir.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> RateLimiterState {
        let mut reservoir = self.lock_reservoir();
        self.refill(&mut reservoir, Instant::now());
        RateLimiterState {
            window_capacity: self.window_capacity,
            tokens_remaining: reservoir.tokens,
            max_concurrent: self.max_concurrent,
            window_deadline: reservoir.window_deadline,
            queued: self.queued(),
            running: self.running(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_excess_calls_wait_for_refill() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(1), 10));
        let start = Instant::now();

        let mut handles = Vec::new();
        for i in 0..3u32 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.schedule(|| async move { (i, Instant::now()) }).await
            }));
        }

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap());
        }

        // Nothing dropped
        assert_eq!(finished.len(), 3);
        let late: Vec<_> = finished
            .iter()
            .filter(|(_, at)| at.duration_since(start) >= Duration::from_secs(1))
            .collect();
        assert_eq!(late.len(), 1, "exactly one call should wait for the next window");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_restores_full_capacity() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1), 3);
        for _ in 0..3 {
            limiter.schedule(|| async {}).await;
        }
        assert_eq!(limiter.state().tokens_remaining, 0);

        tokio::time::advance(Duration::from_millis(2500)).await;
        let state = limiter.state();
        assert_eq!(state.tokens_remaining, 3);
        // Deadline advanced by whole windows past now
        assert!(state.window_deadline > Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_ceiling() {
        let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(60), 1));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                limiter
                    .schedule(|| async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(limiter.running(), 0);
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_waiter_keeps_its_token() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(60), 1));
        let start = Instant::now();

        let holder = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter
                    .schedule(|| tokio::time::sleep(Duration::from_secs(10)))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(limiter.running(), 1);

        // Gives up while queued behind the only slot
        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), limiter.schedule(|| async {})).await;
        assert!(abandoned.is_err());
        assert_eq!(limiter.queued(), 0);
        assert_eq!(limiter.state().tokens_remaining, 1);

        let ran_at = limiter.schedule(|| async { Instant::now() }).await;
        assert!(
            ran_at.duration_since(start) < Duration::from_secs(11),
            "second real call must not wait for the next window"
        );
        assert_eq!(limiter.state().tokens_remaining, 0);
        holder.await.unwrap();
    }

    #[test]
    fn test_refill_after_long_idle_does_not_overflow() {
        let limiter = RateLimiter {
            window_capacity: 1,
            window: Duration::from_nanos(1),
            max_concurrent: 1,
            reservoir: Mutex::new(Reservoir {
                tokens: 0,
                window_deadline: Instant::now(),
            }),
            turn: tokio::sync::Mutex::new(()),
            slots: Semaphore::new(1),
            queued: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
        };
        let mut reservoir = limiter.lock_reservoir();
        let later = reservoir.window_deadline + Duration::from_secs(10);
        limiter.refill(&mut reservoir, later);

        assert_eq!(reservoir.tokens, 1);
        assert!(reservoir.window_deadline > later);
    }

    #[tokio::test]
    async fn test_task_error_passes_through() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1), 1);
        let result: Result<(), &str> = limiter.schedule(|| async { Err("boom") }).await;
        assert_eq!(result, Err("boom"));
    }

    #[tokio::test]
    async fn test_zero_config_is_clamped() {
        let limiter = RateLimiter::new(0, Duration::ZERO, 0);
        let state = limiter.state();
        assert_eq!(state.window_capacity, 1);
        assert_eq!(state.max_concurrent, 1);
    }
}
