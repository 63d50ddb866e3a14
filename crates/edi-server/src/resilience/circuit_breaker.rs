use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Thresholds of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerSettings {
    /// Length of the counting window while closed
    pub interval: Duration,
    /// Requests in a window before the ratio is considered
    pub min_requests: u32,
    pub failure_ratio: f64,
    /// Time spent open before probing
    pub open_timeout: Duration,
    /// Probes admitted while half-open
    pub half_open_max: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            min_requests: 3,
            failure_ratio: 0.6,
            open_timeout: Duration::from_secs(30),
            half_open_max: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted on every state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub name: String,
    pub from: BreakerState,
    pub to: BreakerState,
}

/// Ticket for a request the breaker let through, tied to the state it was admitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "every admission must be recorded"]
pub struct Admission {
    generation: u64,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    /// Bumped on every transition
    generation: u64,
    window_started: Instant,
    requests: u32,
    failures: u32,
    opened_at: Instant,
    probes: u32,
    probe_successes: u32,
}

/// Closed → open when the failure ratio trips, open → half-open after a timeout,
/// half-open → closed after enough successful probes or back to open on any failure.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
    changes: Option<mpsc::UnboundedSender<StateChange>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        let now = Instant::now();
        Self {
            name: name.into(),
            settings,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                generation: 0,
                window_started: now,
                requests: 0,
                failures: 0,
                opened_at: now,
                probes: 0,
                probe_successes: 0,
            }),
            changes: None,
        }
    }

    /// Report transitions on `sender`.
    pub fn with_notifier(mut self, sender: mpsc::UnboundedSender<StateChange>) -> Self {
        self.changes = Some(sender);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.advance(&mut inner);
        inner.state
    }

    /// Admit a request, or `None` when it must be refused. Every admission must be
    /// passed back to [`record`](Self::record).
    pub fn allow(&self) -> Option<Admission> {
        let mut inner = self.lock();
        self.advance(&mut inner);
        let admitted = match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen => {
                let free = inner.probes < self.settings.half_open_max;
                if free {
                    inner.probes += 1;
                }
                free
            }
        };
        admitted.then_some(Admission {
            generation: inner.generation,
        })
    }

    /// Record the outcome of an admitted request. Outcomes of requests admitted before
    /// the last transition are ignored.
    pub fn record(&self, admission: Admission, success: bool) {
        let mut inner = self.lock();
        self.advance(&mut inner);
        if admission.generation != inner.generation {
            return;
        }
        match inner.state {
            BreakerState::Closed => {
                inner.requests += 1;
                if !success {
                    inner.failures += 1;
                }
                let ratio = f64::from(inner.failures) / f64::from(inner.requests);
                if inner.requests >= self.settings.min_requests && ratio >= self.settings.failure_ratio {
                    self.transition(&mut inner, BreakerState::Open);
                }
            }
            BreakerState::HalfOpen => {
                if !success {
                    self.transition(&mut inner, BreakerState::Open);
                } else {
                    inner.probe_successes += 1;
                    if inner.probe_successes >= self.settings.half_open_max {
                        self.transition(&mut inner, BreakerState::Closed);
                    }
                }
            }
            BreakerState::Open => {}
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the time-driven transitions.
    fn advance(&self, inner: &mut Inner) {
        let now = Instant::now();
        match inner.state {
            BreakerState::Closed => {
                if now.duration_since(inner.window_started) >= self.settings.interval {
                    inner.window_started = now;
                    inner.requests = 0;
                    inner.failures = 0;
                }
            }
            BreakerState::Open => {
                if now.duration_since(inner.opened_at) >= self.settings.open_timeout {
                    self.transition(inner, BreakerState::HalfOpen);
                }
            }
            BreakerState::HalfOpen => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState) {
        let from = inner.state;
        let now = Instant::now();
        inner.state = to;
        inner.generation += 1;
        inner.window_started = now;
        inner.requests = 0;
        inner.failures = 0;
        inner.probes = 0;
        inner.probe_successes = 0;
        if to == BreakerState::Open {
            inner.opened_at = now;
        }

        if let Some(changes) = &self.changes {
            // the drain task is gone only during shutdown
            let _ = changes.send(StateChange {
                name: self.name.clone(),
                from,
                to,
            });
        }
    }
}

/// Log breaker transitions until every sender is dropped.
pub async fn log_state_changes(mut changes: mpsc::UnboundedReceiver<StateChange>) {
    while let Some(change) = changes.recv().await {
        if change.to == BreakerState::Open {
            warn!(breaker = %change.name, from = %change.from, to = %change.to, "circuit breaker state changed");
        } else {
            info!(breaker = %change.name, from = %change.from, to = %change.to, "circuit breaker state changed");
        }
    }
}
