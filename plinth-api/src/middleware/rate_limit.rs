/// Rate limiting middleware for data-plane endpoints
///
/// Implements token bucket rate limiting keyed by project ID. Each project's
/// `api_rate_limit` column (requests/hour) sets both the bucket capacity and
/// the refill rate.
///
/// # Algorithm
///
/// Token bucket:
/// - Tokens refill at constant rate (`api_rate_limit / 3600` per second)
/// - Each request consumes 1 token
/// - Request rejected with 429 if bucket empty
///
/// # Storage
///
/// Buckets live in an in-process map shared via `AppState`. A single API
/// instance owns all traffic for its projects, so no external store is
/// needed; buckets for idle projects are dropped during periodic sweeps.
///
/// # Headers
///
/// Responses include rate limit headers:
/// - `X-RateLimit-Limit`: Requests allowed per hour
/// - `X-RateLimit-Remaining`: Tokens remaining
/// - `X-RateLimit-Reset`: Unix timestamp when the bucket is full again
/// - `Retry-After`: Seconds to wait (429 responses only)

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Path, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use plinth_shared::models::project::Project;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Buckets older than this are dropped during sweeps
const IDLE_BUCKET_SECONDS: u64 = 7200;

/// How many entries the store may hold before a sweep runs
const SWEEP_THRESHOLD: usize = 4096;

/// In-process token bucket store, keyed by project ID
#[derive(Clone, Default)]
pub struct RateLimiterStore {
    buckets: Arc<Mutex<HashMap<Uuid, TokenBucket>>>,
}

/// Token bucket state for one project
#[derive(Debug, Clone)]
struct TokenBucket {
    /// Current number of tokens
    tokens: f64,

    /// Last refill timestamp (Unix seconds)
    last_refill: u64,
}

impl TokenBucket {
    fn new(capacity: f64, now: u64) -> Self {
        TokenBucket {
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Refills tokens based on elapsed time
    fn refill(&mut self, rate: f64, capacity: f64, now: u64) {
        let elapsed_secs = now.saturating_sub(self.last_refill) as f64;
        self.tokens = (self.tokens + elapsed_secs * rate).min(capacity);
        self.last_refill = now;
    }

    /// Attempts to consume one token
    fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Seconds until one token is available
    fn seconds_until_available(&self, rate: f64) -> u64 {
        let deficit = 1.0 - self.tokens;
        if deficit <= 0.0 || rate <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }

    /// Seconds until the bucket is full again
    fn seconds_until_full(&self, rate: f64, capacity: f64) -> u64 {
        let deficit = capacity - self.tokens;
        if deficit <= 0.0 || rate <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,

    /// Requests allowed per hour
    pub limit: i64,

    /// Tokens remaining after this request
    pub remaining: u32,

    /// Unix timestamp when the bucket is full again
    pub reset_at: u64,

    /// Seconds to wait before retrying (when rejected)
    pub retry_after: u64,
}

impl RateLimiterStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks and consumes one token for a project
    ///
    /// `requests_per_hour` sets bucket capacity; refill rate is
    /// `requests_per_hour / 3600` tokens per second.
    pub fn check(&self, project_id: Uuid, requests_per_hour: i64) -> RateLimitDecision {
        let now = unix_now();
        self.check_at(project_id, requests_per_hour, now)
    }

    fn check_at(&self, project_id: Uuid, requests_per_hour: i64, now: u64) -> RateLimitDecision {
        let capacity = requests_per_hour.max(1) as f64;
        let rate = capacity / 3600.0;

        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            // A poisoned lock means a panic mid-update; start a fresh map
            // rather than refusing all traffic
            Err(poisoned) => poisoned.into_inner(),
        };

        if buckets.len() >= SWEEP_THRESHOLD {
            buckets.retain(|_, b| now.saturating_sub(b.last_refill) < IDLE_BUCKET_SECONDS);
        }

        let bucket = buckets
            .entry(project_id)
            .or_insert_with(|| TokenBucket::new(capacity, now));

        bucket.refill(rate, capacity, now);

        let allowed = bucket.try_consume();
        let remaining = bucket.tokens.floor().max(0.0) as u32;
        let reset_at = now + bucket.seconds_until_full(rate, capacity);
        let retry_after = if allowed {
            0
        } else {
            bucket.seconds_until_available(rate)
        };

        RateLimitDecision {
            allowed,
            limit: requests_per_hour,
            remaining,
            reset_at,
            retry_after,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Rate limiting middleware for routes nested under `/:project_id`
///
/// Resolves the project to read its `api_rate_limit`, then checks the
/// in-process bucket. Rejected requests get 429 with Retry-After; allowed
/// requests get the X-RateLimit-* headers.
///
/// The resolved [`Project`] is stored as a request extension so data-plane
/// handlers don't repeat the lookup.
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let project_id = params
        .get("project_id")
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| ApiError::BadRequest("Invalid project ID".to_string()))?;

    let project = Project::find_by_id(&state.db, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    let decision = state.rate_limiter.check(project.id, project.api_rate_limit);

    if !decision.allowed {
        tracing::warn!(
            project_id = %project.id,
            limit = decision.limit,
            retry_after = decision.retry_after,
            "Rate limit exceeded"
        );

        return Err(ApiError::RateLimitExceeded {
            retry_after: decision.retry_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                decision.retry_after
            ),
        });
    }

    // Replaces any project the API key middleware resolved; handlers always
    // see the project addressed by the path.
    request.extensions_mut().insert(project);

    let mut response = next.run(request).await;
    apply_headers(&mut response, &decision);

    Ok(response)
}

fn apply_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset_at.to_string()) {
        headers.insert("X-RateLimit-Reset", value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_starts_full() {
        let store = RateLimiterStore::new();
        let id = Uuid::new_v4();

        let decision = store.check_at(id, 3600, 1_000_000);
        assert!(decision.allowed);
        assert_eq!(decision.limit, 3600);
        assert_eq!(decision.remaining, 3599);
    }

    #[test]
    fn test_bucket_exhaustion() {
        let store = RateLimiterStore::new();
        let id = Uuid::new_v4();

        for _ in 0..5 {
            assert!(store.check_at(id, 5, 1_000_000).allowed);
        }

        let decision = store.check_at(id, 5, 1_000_000);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.retry_after > 0);
    }

    #[test]
    fn test_bucket_refills_over_time() {
        let store = RateLimiterStore::new();
        let id = Uuid::new_v4();

        for _ in 0..5 {
            store.check_at(id, 5, 1_000_000);
        }
        assert!(!store.check_at(id, 5, 1_000_000).allowed);

        // 5/hour refills one token every 720 seconds
        let decision = store.check_at(id, 5, 1_000_000 + 720);
        assert!(decision.allowed);
    }

    #[test]
    fn test_refill_capped_at_capacity() {
        let store = RateLimiterStore::new();
        let id = Uuid::new_v4();

        store.check_at(id, 10, 1_000_000);

        // A week later the bucket is full, not overflowing
        let decision = store.check_at(id, 10, 1_000_000 + 604_800);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 9);
    }

    #[test]
    fn test_projects_have_independent_buckets() {
        let store = RateLimiterStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        for _ in 0..3 {
            store.check_at(a, 3, 1_000_000);
        }
        assert!(!store.check_at(a, 3, 1_000_000).allowed);
        assert!(store.check_at(b, 3, 1_000_000).allowed);
    }

    #[test]
    fn test_retry_after_reflects_refill_rate() {
        let store = RateLimiterStore::new();
        let id = Uuid::new_v4();

        store.check_at(id, 1, 1_000_000);
        let decision = store.check_at(id, 1, 1_000_000);
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, 3600);
    }

    #[test]
    fn test_zero_limit_treated_as_one() {
        let store = RateLimiterStore::new();
        let id = Uuid::new_v4();

        let decision = store.check_at(id, 0, 1_000_000);
        assert!(decision.allowed);
        assert!(!store.check_at(id, 0, 1_000_000).allowed);
    }
}
