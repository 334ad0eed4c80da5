//! Circuit breaker for provider calls.
//!
//! Each call is tried up to `retry_attempts` times with a linear backoff
//! (`attempt × backoff_unit`) between tries. A call that still fails counts
//! as one failure. Once `max_failures` failures pile up, calls are rejected
//! without running until `cool_down` has passed since the last failure. The
//! next call then goes through as the only probe; other calls are rejected
//! until it finishes. Any success clears the count.
//!
//! Time comes from `tokio::time`, so tests can drive it with paused time.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;
use tokio::time::{sleep, Instant};

/// Breaker tuning. Fixed for the lifetime of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub max_failures: u32,
    pub retry_attempts: u32,
    pub cool_down: Duration,
    pub backoff_unit: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            max_failures: 5,
            retry_attempts: 3,
            cool_down: Duration::from_secs(30),
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    /// Calls are rejected for `retry_in` more.
    Open { retry_in: Duration },
    /// Cool-down is over; one call at a time may probe.
    HalfOpen,
}

#[derive(Error, Debug)]
pub enum BreakerError<E> {
    /// Rejected without running the operation.
    #[error("Circuit open, retry in {}ms", retry_in.as_millis())]
    Open { retry_in: Duration },

    /// The operation ran and failed.
    #[error("Failed after {attempts} attempt(s): {source}")]
    Failed {
        attempts: u32,
        #[source]
        source: E,
    },
}

#[derive(Debug, Default)]
struct Counters {
    failures: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

/// Marks the half-open probe in flight. Dropping it, including when the
/// caller's future is cancelled, lets the next call probe.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        self.breaker.counters().trial_in_flight = false;
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    counters: Mutex<Counters>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    // The counters stay consistent even if a holder panicked.
    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> BreakerState {
        let counters = self.counters();
        self.state_of(&counters)
    }

    fn state_of(&self, counters: &Counters) -> BreakerState {
        if counters.failures < self.settings.max_failures {
            return BreakerState::Closed;
        }
        let Some(last_failure) = counters.last_failure else {
            return BreakerState::HalfOpen;
        };
        let elapsed = last_failure.elapsed();
        if elapsed < self.settings.cool_down {
            BreakerState::Open {
                retry_in: self.settings.cool_down - elapsed,
            }
        } else {
            BreakerState::HalfOpen
        }
    }

    /// Decides whether a call may run. A half-open breaker admits one probe;
    /// callers arriving while it runs are told to retry after one backoff unit.
    fn admit(&self) -> Result<Option<TrialGuard<'_>>, Duration> {
        let mut counters = self.counters();
        match self.state_of(&counters) {
            BreakerState::Closed => Ok(None),
            BreakerState::Open { retry_in } => Err(retry_in),
            BreakerState::HalfOpen if counters.trial_in_flight => Err(self.settings.backoff_unit),
            BreakerState::HalfOpen => {
                counters.trial_in_flight = true;
                Ok(Some(TrialGuard { breaker: self }))
            }
        }
    }

    /// Runs `operation`, retrying every error.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_if(operation, |_| true).await
    }

    /// Runs `operation`, retrying only errors `is_transient` accepts. Other
    /// errors return at once and leave the failure count alone.
    pub async fn execute_if<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        is_transient: P,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let _trial = self
            .admit()
            .map_err(|retry_in| BreakerError::Open { retry_in })?;

        let attempts = self.settings.retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    self.record_success();
                    return Ok(value);
                }
                Err(e) if !is_transient(&e) => {
                    return Err(BreakerError::Failed {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) if attempt >= attempts => {
                    self.record_failure();
                    return Err(BreakerError::Failed {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(_) => {
                    sleep(self.settings.backoff_unit * attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    fn record_success(&self) {
        let mut counters = self.counters();
        if counters.failures >= self.settings.max_failures {
            info!("Circuit '{}' closed again", self.name);
        }
        *counters = Counters::default();
    }

    fn record_failure(&self) {
        let mut counters = self.counters();
        counters.failures = counters.failures.saturating_add(1);
        counters.last_failure = Some(Instant::now());
        if counters.failures == self.settings.max_failures {
            warn!(
                "Circuit '{}' opened after {} failures, cooling down for {}ms",
                self.name,
                counters.failures,
                self.settings.cool_down.as_millis()
            );
        }
    }
}
