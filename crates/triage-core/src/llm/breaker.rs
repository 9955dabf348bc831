//! Per-backend circuit breaker.
//!
//! After `fail_max` consecutive failed calls the circuit opens and further
//! calls are rejected immediately, without touching the network or spawning
//! a process. Once `reset_timeout` has elapsed the circuit moves to
//! half-open and lets a single probe call through; the probe's outcome
//! decides whether the circuit closes again or re-opens.
//!
//! The breaker wraps the *whole* retry-guarded call: an exhausted retry
//! sequence counts as exactly one failure, a recovered one as exactly one
//! success. Permanent and configuration errors also count as failures;
//! the breaker has no error-type filter of its own.

use crate::error::LlmError;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Failing fast, calls are rejected immediately.
    Open,
    /// Testing recovery, one probe call is allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Breaker thresholds, supplied at construction.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Consecutive failures before the circuit opens.
    pub fail_max: u32,
    /// How long the circuit stays open before allowing a probe.
    pub reset_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            fail_max: 3,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    status: CircuitState,
    fail_counter: u32,
    opened_at: Option<Instant>,
    // While half-open, exactly one probe may be outstanding; concurrent
    // callers are rejected as if the circuit were still open.
    probe_in_flight: bool,
}

/// Circuit breaker guarding one backend.
///
/// One instance per backend, owned by the facade and alive for the whole
/// run, so failures observed across projects accumulate instead of being
/// reset per project. State mutations are mutex-serialized so the
/// transition invariants hold even under concurrent callers.
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            inner: Mutex::new(BreakerInner {
                status: CircuitState::Closed,
                fail_counter: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        // A poisoned lock means a panic mid-transition; the state itself is
        // still a valid enum value, so take it as-is.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current state, applying the Open → HalfOpen timeout transition lazily.
    pub fn state(&self) -> CircuitState {
        let inner = self.lock();
        match inner.status {
            CircuitState::Open if self.reset_elapsed(&inner) => CircuitState::HalfOpen,
            status => status,
        }
    }

    /// Consecutive failures recorded so far.
    pub fn fail_counter(&self) -> u32 {
        self.lock().fail_counter
    }

    fn reset_elapsed(&self, inner: &BreakerInner) -> bool {
        inner
            .opened_at
            .is_some_and(|at| at.elapsed() >= self.settings.reset_timeout)
    }

    /// Admit or reject the next call. Rejection happens before `op` runs.
    ///
    /// While half-open only the first caller is admitted as the probe;
    /// anyone arriving before the probe resolves is rejected.
    fn before_call(&self) -> std::result::Result<(), LlmError> {
        let mut inner = self.lock();
        match inner.status {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(LlmError::CircuitOpen {
                        backend: self.name.clone(),
                    })
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
            CircuitState::Open => {
                if self.reset_elapsed(&inner) {
                    inner.status = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::warn!(
                        backend = %self.name,
                        old = %CircuitState::Open,
                        new = %CircuitState::HalfOpen,
                        "circuit.state_change"
                    );
                    Ok(())
                } else {
                    Err(LlmError::CircuitOpen {
                        backend: self.name.clone(),
                    })
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        if inner.status == CircuitState::HalfOpen {
            tracing::warn!(
                backend = %self.name,
                old = %CircuitState::HalfOpen,
                new = %CircuitState::Closed,
                "circuit.state_change"
            );
        } else {
            tracing::debug!(backend = %self.name, "circuit.success");
        }
        inner.status = CircuitState::Closed;
        inner.fail_counter = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    fn on_failure(&self, error: &LlmError) {
        let mut inner = self.lock();
        inner.fail_counter += 1;
        inner.probe_in_flight = false;
        tracing::warn!(
            backend = %self.name,
            fail_count = inner.fail_counter,
            fail_max = self.settings.fail_max,
            error = %error,
            "circuit.failure"
        );

        let reopen = inner.status == CircuitState::HalfOpen;
        if reopen || inner.fail_counter >= self.settings.fail_max {
            let old = inner.status;
            inner.status = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            if old != CircuitState::Open {
                tracing::warn!(
                    backend = %self.name,
                    old = %old,
                    new = %CircuitState::Open,
                    "circuit.state_change"
                );
            }
        }
    }

    /// Invoke `op` under the breaker.
    ///
    /// While open and before the reset timeout, fails with
    /// [`LlmError::CircuitOpen`] without invoking `op`. Otherwise the final
    /// outcome of `op` (the entire retry sequence, not each individual
    /// attempt) is recorded as one success or one failure.
    pub async fn call<T, F, Fut>(&self, op: F) -> std::result::Result<T, LlmError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, LlmError>>,
    {
        self.before_call()?;
        match op().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure(&err);
                Err(err)
            }
        }
    }
}
