//! Circuit breaker guarding calls to the primary payout provider.
//!
//! ```text
//! Closed    -> Open      : consecutive failures reach the threshold
//! Open      -> HalfOpen  : reset timeout elapsed, one probe admitted
//! HalfOpen  -> Closed    : probe succeeded
//! HalfOpen  -> Open      : probe failed, timer restarted
//! ```
//!
//! One instance per provider, shared by every worker through an `Arc`. All
//! transitions happen under a single internal lock, so callers need no
//! synchronization of their own.
//!
//! Every transition bumps a generation counter. An admitted call carries the
//! generation it was admitted under, and its outcome is only applied if that
//! generation is still current. A call admitted while closed that finishes after
//! the circuit opened therefore cannot close it again.

use crate::config::BreakerConfig;
use crate::error::{CallError, ProviderError};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<Instant>,
    pub reset_timeout: Duration,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    generation: u64,
}

impl BreakerInner {
    fn transition(&mut self, state: CircuitState) {
        self.state = state;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Proof that a call was admitted, tagged with the breaker phase that admitted it.
#[derive(Debug, Clone, Copy)]
struct Admission {
    generation: u64,
    probe: bool,
}

impl Default for BreakerInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            opened_at: None,
            probe_in_flight: false,
            generation: 0,
        }
    }
}

pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &BreakerConfig) -> Self {
        Self {
            name: name.into(),
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: config.reset_timeout(),
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_time: inner.last_failure_time,
            reset_timeout: self.reset_timeout,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Runs `op` if the circuit admits it.
    ///
    /// Rejected calls return [`CallError::CircuitOpen`] without invoking `op`.
    /// Provider API failures count toward the threshold; configuration errors
    /// say nothing about provider health and leave the counters untouched.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, CallError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let admission = self.try_acquire()?;

        match op().await {
            Ok(value) => {
                self.on_success(admission);
                Ok(value)
            }
            Err(err @ ProviderError::Config { .. }) => {
                self.release_probe(admission);
                Err(CallError::Provider(err))
            }
            Err(err) => {
                self.on_failure(admission);
                Err(CallError::Provider(err))
            }
        }
    }

    fn try_acquire(&self) -> Result<Admission, CallError> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(Admission {
                generation: inner.generation,
                probe: false,
            }),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|opened_at| opened_at.elapsed())
                    .unwrap_or_default();
                if elapsed < self.reset_timeout {
                    return Err(CallError::CircuitOpen(self.name.clone()));
                }
                inner.transition(CircuitState::HalfOpen);
                inner.probe_in_flight = true;
                tracing::info!(breaker = %self.name, "circuit_half_open_probe");
                Ok(Admission {
                    generation: inner.generation,
                    probe: true,
                })
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    return Err(CallError::CircuitOpen(self.name.clone()));
                }
                inner.probe_in_flight = true;
                Ok(Admission {
                    generation: inner.generation,
                    probe: true,
                })
            }
        }
    }

    fn on_success(&self, admission: Admission) {
        let mut inner = self.lock();
        if admission.probe {
            if inner.state == CircuitState::HalfOpen && inner.generation == admission.generation {
                inner.transition(CircuitState::Closed);
                inner.failure_count = 0;
                inner.opened_at = None;
                inner.probe_in_flight = false;
                tracing::info!(breaker = %self.name, "circuit_closed");
            }
        } else if inner.state == CircuitState::Closed {
            // Late successes only reset the streak.
            inner.failure_count = 0;
        }
    }

    fn on_failure(&self, admission: Admission) {
        let now = Instant::now();
        let mut inner = self.lock();
        if inner.generation != admission.generation {
            tracing::debug!(breaker = %self.name, state = ?inner.state, "stale_failure_ignored");
            return;
        }
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_time = Some(now);

        let trips = match inner.state {
            CircuitState::HalfOpen => admission.probe,
            CircuitState::Closed => inner.failure_count >= self.failure_threshold,
            CircuitState::Open => false,
        };
        if trips {
            inner.transition(CircuitState::Open);
            inner.opened_at = Some(now);
            inner.probe_in_flight = false;
            tracing::warn!(
                breaker = %self.name,
                failure_count = inner.failure_count,
                reset_timeout_ms = self.reset_timeout.as_millis() as u64,
                "circuit_opened"
            );
        }
    }

    fn release_probe(&self, admission: Admission) {
        let mut inner = self.lock();
        if admission.probe && inner.generation == admission.generation {
            inner.probe_in_flight = false;
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
