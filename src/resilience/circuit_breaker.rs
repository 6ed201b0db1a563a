//! Fail-closed circuit breaker for the counter store.
//!
//! # States
//! - Closed: admission checks reach the store
//! - Open: every admission check is denied without touching the store
//!
//! # State Transitions
//! ```text
//! Closed → Open: error_count >= failure_threshold (consecutive store errors)
//! Open → Closed: reset timer fires after the cooldown (error_count = 0)
//! any success: error_count = 0
//! ```
//!
//! # Design Decisions
//! - One breaker per process, shared by every bucket (global, api, auth)
//! - Counters are atomics; concurrent failures may open it one error late,
//!   which only ever widens the deny window
//! - At most one reset timer is pending: a new trip aborts the old one

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Point-in-time view of the breaker, for status endpoints and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub error_count: u32,
    pub open: bool,
    /// Number of times the breaker has closed via its reset timer.
    pub resets: u64,
}

/// Process-wide breaker shared by all in-flight requests.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    error_count: AtomicU32,
    open: AtomicBool,
    resets: AtomicU64,
    reset_timer: Mutex<Option<JoinHandle<()>>>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Arc<Self> {
        Arc::new(Self {
            failure_threshold: config.failure_threshold.max(1),
            cooldown: Duration::from_secs(config.cooldown_secs),
            error_count: AtomicU32::new(0),
            open: AtomicBool::new(false),
            resets: AtomicU64::new(0),
            reset_timer: Mutex::new(None),
        })
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            error_count: self.error_count.load(Ordering::Acquire),
            open: self.is_open(),
            resets: self.resets.load(Ordering::Acquire),
        }
    }

    /// A store call succeeded; consecutive errors start over.
    pub fn record_success(&self) {
        self.error_count.store(0, Ordering::Release);
    }

    /// A store call failed. Opens the breaker once the threshold is reached.
    ///
    /// Must be called from within a Tokio runtime: opening schedules the reset.
    pub fn record_failure(self: &Arc<Self>) {
        let count = self.error_count.fetch_add(1, Ordering::AcqRel) + 1;
        if count >= self.failure_threshold {
            self.trip(count);
        }
    }

    fn trip(self: &Arc<Self>, count: u32) {
        let was_open = self.open.swap(true, Ordering::AcqRel);
        if !was_open {
            tracing::error!(
                error_count = count,
                cooldown_secs = self.cooldown.as_secs(),
                "Rate limit circuit breaker opened; denying all admission checks"
            );
            metrics::record_breaker_trip();
        }
        metrics::record_breaker_state(true);

        let breaker = Arc::clone(self);
        let cooldown = self.cooldown;
        let mut pending = self.reset_timer.lock().expect("breaker timer mutex poisoned");
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            breaker.reset();
        }));
    }

    fn reset(&self) {
        self.error_count.store(0, Ordering::Release);
        self.open.store(false, Ordering::Release);
        self.resets.fetch_add(1, Ordering::AcqRel);
        metrics::record_breaker_state(false);
        tracing::info!("Rate limit circuit breaker closed; admission checks resumed");
    }
}
