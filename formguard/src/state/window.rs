// formguard/src/state/window.rs
//
// Per-identifier rate limiting.
//
// Two independent views over the same identifier:
//   - fixed window counter: at most N admissions per window, resets lazily on
//     the first request after the window ends
//   - cadence trail: the last minute of request timestamps, used to catch
//     scripts that stay under the counter but fire with clockwork regularity
//
// Every update is get → compute → compare_and_swap against the store, retried
// on conflict. Two requests racing on the same identifier can never both
// consume the last slot. Store failures deny.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::RateLimitConfig;
use crate::error::StoreError;
use crate::events::{PatternDecision, RateLimitDecision};
use crate::state::store::{Expiring, MemoryStore, StateStore};

// ── Thresholds ───────────────────────────────────────────────────────────────

pub const PATTERN_WINDOW_MS:        i64   = 60_000;
pub const PATTERN_MAX_IN_WINDOW:    usize = 5;
pub const CADENCE_MIN_SAMPLES:      usize = 3;
pub const CADENCE_MAX_VARIANCE_MS2: f64   = 1_000.0;
pub const CADENCE_MAX_MEAN_MS:      f64   = 10_000.0;
pub const TRAIL_CAPACITY:           usize = 32;
pub const CAS_MAX_ATTEMPTS:         u32   = 1_024;

/// Bucket for requests that arrive without an identifier. Shared on purpose:
/// anonymous traffic is limited as one client, never left unlimited.
pub const SHARED_BUCKET: &str = "__anonymous__";

pub const REASON_TOO_MANY: &str = "too many submissions";
pub const REASON_CADENCE:  &str = "suspicious cadence";
pub const REASON_STORE:    &str = "rate-limit state unavailable";

// ── Stored values ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub count:      u32,
    pub reset_time: i64,   // epoch ms
    pub window_ms:  u64,
    pub violations: u32,   // cumulative denied requests
}

impl RateLimitRecord {
    pub fn is_expired(&self, now_ms: i64) -> bool { now_ms >= self.reset_time }
}

impl Expiring for RateLimitRecord {
    // Untouched for a full window after its own window ended.
    fn is_stale(&self, now_ms: i64) -> bool {
        now_ms >= self.reset_time.saturating_add(window_span(self.window_ms))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTrail {
    pub timestamps: Vec<i64>,
}

impl Expiring for RequestTrail {
    fn is_stale(&self, now_ms: i64) -> bool {
        self.timestamps.iter().all(|&ts| now_ms - ts >= PATTERN_WINDOW_MS)
    }
}

// ── Limiter ──────────────────────────────────────────────────────────────────

pub struct RateLimiter {
    records: Arc<dyn StateStore<RateLimitRecord>>,
    trails:  Arc<dyn StateStore<RequestTrail>>,
    config:  RateLimitConfig,
    store_errors: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_stores(config, Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    pub fn with_stores(
        config:  RateLimitConfig,
        records: Arc<dyn StateStore<RateLimitRecord>>,
        trails:  Arc<dyn StateStore<RequestTrail>>,
    ) -> Self {
        Self { records, trails, config, store_errors: AtomicU64::new(0) }
    }

    pub fn config(&self) -> RateLimitConfig { self.config }

    pub fn n_identifiers(&self) -> usize { self.records.len() }

    /// Checks denied because the backing store failed.
    pub fn store_errors(&self) -> u64 { self.store_errors.load(Ordering::Relaxed) }

    /// Fixed-window check with the configured window and limit.
    pub async fn check(&self, identifier: &str) -> RateLimitDecision {
        self.check_basic(identifier, self.config.window_ms, self.config.max_requests).await
    }

    pub async fn check_basic(
        &self,
        identifier:   &str,
        window_ms:    u64,
        max_requests: u32,
    ) -> RateLimitDecision {
        self.check_basic_at(identifier, window_ms, max_requests, now_ms()).await
    }

    pub async fn check_basic_at(
        &self,
        identifier:   &str,
        window_ms:    u64,
        max_requests: u32,
        now:          i64,
    ) -> RateLimitDecision {
        let key = bucket_key(identifier);
        match self.try_basic(key, window_ms, max_requests, now).await {
            Ok(decision) => decision,
            Err(e) => {
                self.store_errors.fetch_add(1, Ordering::Relaxed);
                error!(identifier = key, error = %e, "rate-limit store failed, denying");
                RateLimitDecision {
                    allowed:    false,
                    reset_time: now.saturating_add(window_span(window_ms)),
                    remaining:  0,
                }
            }
        }
    }

    async fn try_basic(
        &self,
        key:          &str,
        window_ms:    u64,
        max_requests: u32,
        now:          i64,
    ) -> Result<RateLimitDecision, StoreError> {
        for _ in 0..CAS_MAX_ATTEMPTS {
            let current = self.records.get(key).await?;
            let (next, decision) = advance(current.as_ref(), window_ms, max_requests, now);
            if self.records.compare_and_swap(key, current.as_ref(), next.clone()).await? {
                if !decision.allowed {
                    debug!(identifier = key, violations = next.violations, "fixed window exhausted");
                }
                return Ok(decision);
            }
            tokio::task::yield_now().await;
        }
        Err(StoreError::Contention { key: key.to_string(), attempts: CAS_MAX_ATTEMPTS })
    }

    /// Cadence check over the identifier's last minute of requests.
    pub async fn check_pattern(&self, identifier: &str) -> PatternDecision {
        self.check_pattern_at(identifier, now_ms()).await
    }

    pub async fn check_pattern_at(&self, identifier: &str, now: i64) -> PatternDecision {
        let key = bucket_key(identifier);
        match self.try_pattern(key, now).await {
            Ok(decision) => decision,
            Err(e) => {
                self.store_errors.fetch_add(1, Ordering::Relaxed);
                error!(identifier = key, error = %e, "cadence store failed, denying");
                PatternDecision { allowed: false, reason: Some(REASON_STORE.into()) }
            }
        }
    }

    async fn try_pattern(&self, key: &str, now: i64) -> Result<PatternDecision, StoreError> {
        for _ in 0..CAS_MAX_ATTEMPTS {
            let current = self.trails.get(key).await?;
            let mut recent: Vec<i64> = current
                .as_ref()
                .map(|t| {
                    t.timestamps.iter().copied()
                        .filter(|&ts| now - ts < PATTERN_WINDOW_MS)
                        .collect()
                })
                .unwrap_or_default();

            // Denied attempts are not recorded.
            let decision = if recent.len() >= PATTERN_MAX_IN_WINDOW {
                PatternDecision { allowed: false, reason: Some(REASON_TOO_MANY.into()) }
            } else {
                recent.push(now);
                if recent.len() > TRAIL_CAPACITY {
                    let excess = recent.len() - TRAIL_CAPACITY;
                    recent.drain(..excess);
                }
                cadence(&recent)
            };

            let next = RequestTrail { timestamps: recent };
            if self.trails.compare_and_swap(key, current.as_ref(), next).await? {
                if let Some(ref reason) = decision.reason {
                    debug!(identifier = key, reason = %reason, "cadence check denied");
                }
                return Ok(decision);
            }
            tokio::task::yield_now().await;
        }
        Err(StoreError::Contention { key: key.to_string(), attempts: CAS_MAX_ATTEMPTS })
    }

    // ── Housekeeping ─────────────────────────────────────────────────────────

    /// Purge entries that no longer affect any decision. Memory bound only;
    /// correctness never depends on it running.
    pub async fn sweep(&self, now: i64) -> usize {
        let mut removed = 0;
        match self.records.purge_stale(now).await {
            Ok(n) => removed += n,
            Err(e) => error!(error = %e, "record sweep failed"),
        }
        match self.trails.purge_stale(now).await {
            Ok(n) => removed += n,
            Err(e) => error!(error = %e, "trail sweep failed"),
        }
        removed
    }

    pub async fn housekeeping_loop(self: Arc<Self>, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;
            let removed = self.sweep(now_ms()).await;
            if removed > 0 {
                info!(removed, remaining = self.n_identifiers(), "rate-limit sweep");
            }
        }
    }
}

// ── Pure helpers ─────────────────────────────────────────────────────────────

pub fn now_ms() -> i64 { Utc::now().timestamp_millis() }

/// Store key for an identifier; blank identifiers share one bucket.
pub fn bucket_key(identifier: &str) -> &str {
    let id = identifier.trim();
    if id.is_empty() { SHARED_BUCKET } else { id }
}

// A window too long for i64 never ends rather than wrapping into the past.
fn window_span(window_ms: u64) -> i64 {
    i64::try_from(window_ms).unwrap_or(i64::MAX)
}

/// Next record and the decision it implies.
fn advance(
    current:      Option<&RateLimitRecord>,
    window_ms:    u64,
    max_requests: u32,
    now:          i64,
) -> (RateLimitRecord, RateLimitDecision) {
    match current {
        Some(rec) if !rec.is_expired(now) => {
            if rec.count >= max_requests {
                let next = RateLimitRecord { violations: rec.violations.saturating_add(1), ..rec.clone() };
                let decision = RateLimitDecision { allowed: false, reset_time: rec.reset_time, remaining: 0 };
                (next, decision)
            } else {
                let count = rec.count + 1;
                let next = RateLimitRecord { count, ..rec.clone() };
                let decision = RateLimitDecision {
                    allowed:    true,
                    reset_time: rec.reset_time,
                    remaining:  max_requests.saturating_sub(count),
                };
                (next, decision)
            }
        }
        previous => {
            let reset_time = now.saturating_add(window_span(window_ms));
            let next = RateLimitRecord {
                count: 1,
                reset_time,
                window_ms,
                violations: previous.map(|r| r.violations).unwrap_or(0),
            };
            let decision = RateLimitDecision {
                allowed:   true,
                reset_time,
                remaining: max_requests.saturating_sub(1),
            };
            (next, decision)
        }
    }
}

/// Deny when recent requests are both fast and near-perfectly regular.
fn cadence(timestamps: &[i64]) -> PatternDecision {
    let allow = PatternDecision { allowed: true, reason: None };
    if timestamps.len() < CADENCE_MIN_SAMPLES { return allow; }

    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();
    let gaps: Vec<f64> = sorted.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;

    if variance < CADENCE_MAX_VARIANCE_MS2 && mean < CADENCE_MAX_MEAN_MS {
        PatternDecision { allowed: false, reason: Some(REASON_CADENCE.into()) }
    } else {
        allow
    }
}
