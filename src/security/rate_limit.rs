//! Rate-limit admission control against the shared counter store.
//!
//! Buckets:
//! - `global`: every gated request, keyed by client IP (100 / 1 min)
//! - `api`: API routes, keyed by client IP (30 / 1 min)
//! - `auth`: login endpoints, via the store's dedicated RPC (5 / 15 min)
//!
//! Every path fails closed: an open breaker, a store error, or a malformed
//! reply all deny.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::backend::{BackendResult, CounterReply, CounterStore};
use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::resilience::CircuitBreaker;

pub const GLOBAL_BUCKET: &str = "global";
pub const API_BUCKET: &str = "api";
pub const AUTH_BUCKET: &str = "auth";

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Window reset as milliseconds since the epoch (the `X-RateLimit-Reset` value).
    pub fn reset_millis(&self) -> i64 {
        self.reset_at.timestamp_millis()
    }

    /// Whole seconds until the reset, rounded up, never less than one.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds();
        let secs = (millis + 999).div_euclid(1000);
        secs.max(1) as u64
    }

    fn denied(limit: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at,
        }
    }
}

/// A named bucket policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPolicy {
    pub max_requests: u32,
    pub window_minutes: u32,
}

impl BucketPolicy {
    fn window(&self) -> ChronoDuration {
        ChronoDuration::minutes(i64::from(self.window_minutes))
    }
}

/// Admission controller shared by the gate and the route guards.
#[derive(Clone)]
pub struct AdmissionController {
    store: Arc<dyn CounterStore>,
    breaker: Arc<CircuitBreaker>,
    global: BucketPolicy,
    api: BucketPolicy,
    auth: BucketPolicy,
}

impl AdmissionController {
    pub fn new(
        store: Arc<dyn CounterStore>,
        breaker: Arc<CircuitBreaker>,
        config: &RateLimitConfig,
    ) -> Self {
        Self {
            store,
            breaker,
            global: BucketPolicy {
                max_requests: config.global_max,
                window_minutes: config.global_window_minutes,
            },
            api: BucketPolicy {
                max_requests: config.api_max,
                window_minutes: config.api_window_minutes,
            },
            auth: BucketPolicy {
                max_requests: config.auth_max,
                window_minutes: config.auth_window_minutes,
            },
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Generic admission check for `identifier` against a named bucket.
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        endpoint: &str,
        max_requests: u32,
        window_minutes: u32,
    ) -> RateLimitDecision {
        let policy = BucketPolicy {
            max_requests,
            window_minutes,
        };
        self.admit(
            identifier,
            endpoint,
            policy,
            self.store
                .check_rate_limit(identifier, endpoint, max_requests, window_minutes),
        )
        .await
    }

    /// Global bucket: every gated request.
    pub async fn global_rate_limit(&self, identifier: &str) -> RateLimitDecision {
        let p = self.global;
        self.check_rate_limit(identifier, GLOBAL_BUCKET, p.max_requests, p.window_minutes)
            .await
    }

    /// API bucket.
    pub async fn api_rate_limit(&self, identifier: &str) -> RateLimitDecision {
        let p = self.api;
        self.check_rate_limit(identifier, API_BUCKET, p.max_requests, p.window_minutes)
            .await
    }

    /// Authentication bucket, through the store's dedicated RPC.
    pub async fn auth_rate_limit(&self, identifier: &str) -> RateLimitDecision {
        self.admit(
            identifier,
            AUTH_BUCKET,
            self.auth,
            self.store.check_auth_rate_limit(identifier),
        )
        .await
    }

    async fn admit<F>(
        &self,
        identifier: &str,
        endpoint: &str,
        policy: BucketPolicy,
        call: F,
    ) -> RateLimitDecision
    where
        F: std::future::Future<Output = BackendResult<CounterReply>>,
    {
        let now = Utc::now();

        if self.breaker.is_open() {
            metrics::record_breaker_short_circuit(endpoint);
            tracing::debug!(
                identifier = %identifier,
                endpoint = %endpoint,
                "Circuit breaker open; admission denied without store call"
            );
            let cooldown = ChronoDuration::from_std(self.breaker.cooldown())
                .unwrap_or_else(|_| ChronoDuration::seconds(60));
            return RateLimitDecision::denied(policy.max_requests, now + cooldown);
        }

        match call.await {
            Ok(reply) => {
                self.breaker.record_success();
                normalize(reply, policy, now)
            }
            Err(e) => {
                tracing::error!(
                    identifier = %identifier,
                    endpoint = %endpoint,
                    error = %e,
                    "Rate limit store error; failing closed"
                );
                self.breaker.record_failure();
                RateLimitDecision::denied(policy.max_requests, now + policy.window())
            }
        }
    }
}

/// Turn a store reply into a decision, filling missing fields fail-closed.
fn normalize(reply: CounterReply, policy: BucketPolicy, now: DateTime<Utc>) -> RateLimitDecision {
    let reset_at = reply
        .reset_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now + policy.window());

    RateLimitDecision {
        allowed: reply.allowed.unwrap_or(false),
        limit: reply
            .limit
            .map(clamp_u32)
            .unwrap_or(policy.max_requests),
        remaining: reply.remaining.map(clamp_u32).unwrap_or(0),
        reset_at,
    }
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("global", &self.global)
            .field("api", &self.api)
            .field("auth", &self.auth)
            .field("breaker", &self.breaker.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MemoryBackend};
    use crate::config::CircuitBreakerConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Store whose health can be toggled and whose calls are counted.
    #[derive(Default)]
    struct FlakyStore {
        failing: AtomicBool,
        calls: AtomicUsize,
        reply: std::sync::Mutex<Option<CounterReply>>,
    }

    impl FlakyStore {
        fn next_reply(&self) -> BackendResult<CounterReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(BackendError::Transport("connection refused".into()));
            }
            Ok(self.reply.lock().unwrap().clone().unwrap_or(CounterReply {
                allowed: Some(true),
                limit: Some(100),
                remaining: Some(99),
                reset_at: None,
            }))
        }
    }

    #[async_trait]
    impl CounterStore for FlakyStore {
        async fn check_rate_limit(&self, _: &str, _: &str, _: u32, _: u32) -> BackendResult<CounterReply> {
            self.next_reply()
        }

        async fn check_auth_rate_limit(&self, _: &str) -> BackendResult<CounterReply> {
            self.next_reply()
        }
    }

    fn controller(store: Arc<dyn CounterStore>) -> AdmissionController {
        let breaker = CircuitBreaker::new(&CircuitBreakerConfig::default());
        AdmissionController::new(store, breaker, &RateLimitConfig::default())
    }

    #[tokio::test]
    async fn test_window_passes_through() {
        let ctl = controller(Arc::new(MemoryBackend::new(5, 15)));
        for _ in 0..100 {
            assert!(ctl.global_rate_limit("41.138.128.1").await.allowed);
        }
        let denied = ctl.global_rate_limit("41.138.128.1").await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.limit, 100);
    }

    #[tokio::test]
    async fn test_api_bucket_policy() {
        let ctl = controller(Arc::new(MemoryBackend::new(5, 15)));
        for _ in 0..30 {
            assert!(ctl.api_rate_limit("ip").await.allowed);
        }
        assert!(!ctl.api_rate_limit("ip").await.allowed);
        // The global bucket is untouched by API traffic.
        assert!(ctl.global_rate_limit("ip").await.allowed);
    }

    #[tokio::test]
    async fn test_auth_bucket_policy() {
        let ctl = controller(Arc::new(MemoryBackend::new(5, 15)));
        for _ in 0..5 {
            assert!(ctl.auth_rate_limit("login:ip").await.allowed);
        }
        let denied = ctl.auth_rate_limit("login:ip").await;
        assert!(!denied.allowed);
        assert_eq!(denied.limit, 5);
    }

    #[tokio::test]
    async fn test_malformed_reply_fails_closed() {
        let store = Arc::new(FlakyStore::default());
        *store.reply.lock().unwrap() = Some(CounterReply::default());
        let ctl = controller(store);

        let before = Utc::now();
        let decision = ctl.check_rate_limit("ip", "global", 100, 1).await;
        assert!(!decision.allowed);
        assert_eq!(decision.limit, 100);
        assert_eq!(decision.remaining, 0);
        assert!(decision.reset_at > before);
    }

    #[tokio::test]
    async fn test_negative_fields_are_clamped() {
        let store = Arc::new(FlakyStore::default());
        *store.reply.lock().unwrap() = Some(CounterReply {
            allowed: Some(false),
            limit: Some(100),
            remaining: Some(-3),
            reset_at: Some("2030-01-01T00:00:00+00:00".into()),
        });
        let ctl = controller(store);

        let decision = ctl.global_rate_limit("ip").await;
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_at.to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_trips_after_five_errors() {
        let store = Arc::new(FlakyStore::default());
        store.failing.store(true, Ordering::SeqCst);
        let ctl = controller(store.clone());

        for i in 0..5 {
            let d = ctl.global_rate_limit(&format!("10.0.0.{i}")).await;
            assert!(!d.allowed, "store errors must deny");
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 5);
        assert!(ctl.breaker().is_open());

        // Sixth call, different identifier and bucket: short-circuited.
        let d = ctl.auth_rate_limit("someone-else").await;
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 5);

        // After the cooldown the store is reached again.
        store.failing.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(61)).await;
        let d = ctl.global_rate_limit("10.0.0.1").await;
        assert!(d.allowed);
        assert_eq!(store.calls.load(Ordering::SeqCst), 6);
        assert_eq!(ctl.breaker().snapshot().error_count, 0);
    }

    #[tokio::test]
    async fn test_success_resets_error_streak() {
        let store = Arc::new(FlakyStore::default());
        let ctl = controller(store.clone());

        store.failing.store(true, Ordering::SeqCst);
        for _ in 0..4 {
            ctl.global_rate_limit("ip").await;
        }
        store.failing.store(false, Ordering::SeqCst);
        ctl.global_rate_limit("ip").await;
        store.failing.store(true, Ordering::SeqCst);
        for _ in 0..4 {
            ctl.global_rate_limit("ip").await;
        }
        assert!(!ctl.breaker().is_open());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let now = Utc::now();
        let decision = RateLimitDecision::denied(100, now + ChronoDuration::milliseconds(1500));
        assert_eq!(decision.retry_after_secs(now), 2);

        let past = RateLimitDecision::denied(100, now - ChronoDuration::seconds(5));
        assert_eq!(past.retry_after_secs(now), 1);
    }
}
