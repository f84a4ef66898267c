//! Advisory quota manager for the wearable vendor API.
//!
//! The limiter tracks three independent constraints: a sliding window of
//! requests in the trailing minute, a request counter for the current local
//! calendar day, and the quota last reported by the vendor in its response
//! headers. It never blocks a caller; `can_make_request` only reports whether
//! a call is advisable and how long to wait otherwise.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::{clock::next_local_midnight, config::WearableConfig};

const MINUTE_WINDOW: Duration = Duration::from_secs(60);

/// Quota as last reported by the vendor.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RateLimitHeaders {
    /// `X-RateLimit-Limit`
    pub limit: i64,
    /// `X-RateLimit-Remaining`
    pub remaining: i64,
    /// `X-RateLimit-Reset`, as a unix epoch in seconds.
    pub reset: i64,
}

impl RateLimitHeaders {
    /// Parses the three quota headers. All three must be present and numeric.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let read = |name: &str| -> Option<i64> { headers.get(name)?.to_str().ok()?.trim().parse().ok() };
        Some(Self {
            limit: read("x-ratelimit-limit")?,
            remaining: read("x-ratelimit-remaining")?,
            reset: read("x-ratelimit-reset")?,
        })
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    /// Whether a vendor call is advisable right now.
    pub allowed: bool,
    /// Estimated time until the binding constraint clears.
    pub wait: Option<Duration>,
    /// Which constraint refused the call.
    pub reason: Option<String>,
}

impl QuotaDecision {
    fn allow() -> Self {
        Self { allowed: true, wait: None, reason: None }
    }

    fn deny(wait: Duration, reason: String) -> Self {
        Self { allowed: false, wait: Some(wait), reason: Some(reason) }
    }
}

/// Usage of one quota window.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WindowUsage {
    /// Requests recorded in the window.
    pub used: u32,
    /// Configured ceiling.
    pub limit: u32,
    /// Milliseconds until the window frees capacity.
    pub reset_in_ms: u64,
}

/// Snapshot of the limiter, as reported on the status endpoint.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    /// Trailing-minute usage.
    pub per_minute: WindowUsage,
    /// Calendar-day usage.
    pub per_day: WindowUsage,
    /// Last quota reported by the vendor.
    pub api_reported: Option<RateLimitHeaders>,
}

#[derive(Debug)]
struct LimiterState {
    minute_window: VecDeque<Instant>,
    day_count: u32,
    day_resets_at: DateTime<Utc>,
    vendor: Option<RateLimitHeaders>,
}

impl LimiterState {
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.minute_window.front() {
            if now.duration_since(*oldest) >= MINUTE_WINDOW {
                self.minute_window.pop_front();
            } else {
                break;
            }
        }
    }

    fn roll_day(&mut self, wall_now: DateTime<Utc>) {
        if self.day_resets_at <= wall_now {
            self.day_count = 0;
            self.day_resets_at = next_local_midnight(wall_now);
        }
    }

    fn minute_reset_in(&self, now: Instant) -> Duration {
        self.minute_window
            .front()
            .map(|oldest| MINUTE_WINDOW.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or_default()
    }
}

/// Shared quota manager for every vendor call made by the process.
#[derive(Debug)]
pub struct RateLimiter {
    per_minute: u32,
    per_day: u32,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Creates a limiter with explicit ceilings.
    pub fn new(per_minute: u32, per_day: u32) -> Self {
        Self {
            per_minute,
            per_day,
            state: Mutex::new(LimiterState {
                minute_window: VecDeque::new(),
                day_count: 0,
                day_resets_at: next_local_midnight(Utc::now()),
                vendor: None,
            }),
        }
    }

    /// Creates a limiter from the wearable configuration.
    pub fn from_config(config: &WearableConfig) -> Self {
        Self::new(config.requests_per_minute, config.requests_per_day)
    }

    fn state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reports whether a vendor call is advisable right now.
    pub fn can_make_request(&self) -> QuotaDecision {
        self.can_make_request_at(Instant::now(), Utc::now())
    }

    pub(crate) fn can_make_request_at(&self, now: Instant, wall_now: DateTime<Utc>) -> QuotaDecision {
        let mut state = self.state();

        state.roll_day(wall_now);
        if state.day_count >= self.per_day {
            let wait = (state.day_resets_at - wall_now).to_std().unwrap_or_default();
            return QuotaDecision::deny(
                wait,
                format!("Daily rate limit exceeded ({} requests/day)", self.per_day),
            );
        }

        state.prune(now);
        if state.minute_window.len() >= self.per_minute as usize {
            return QuotaDecision::deny(
                state.minute_reset_in(now),
                format!("Per-minute rate limit exceeded ({} requests/minute)", self.per_minute),
            );
        }

        if let Some(vendor) = state.vendor {
            let reset_in = vendor.reset - wall_now.timestamp();
            if vendor.remaining <= 0 && reset_in > 0 {
                return QuotaDecision::deny(
                    Duration::from_secs(reset_in.unsigned_abs()),
                    "API rate limit reached (from response headers)".to_string(),
                );
            }
        }

        QuotaDecision::allow()
    }

    /// Records that a vendor call was issued, whatever its outcome.
    pub fn record_request(&self) {
        self.record_request_at(Instant::now(), Utc::now());
    }

    pub(crate) fn record_request_at(&self, now: Instant, wall_now: DateTime<Utc>) {
        let mut state = self.state();
        state.roll_day(wall_now);
        state.prune(now);
        state.minute_window.push_back(now);
        state.day_count = state.day_count.saturating_add(1);
    }

    /// Stores the vendor-reported quota from a response.
    pub fn update_from_headers(&self, headers: RateLimitHeaders) {
        tracing::debug!(
            limit = headers.limit,
            remaining = headers.remaining,
            reset = headers.reset,
            "Vendor quota updated."
        );
        self.state().vendor = Some(headers);
    }

    /// Current usage of every quota window.
    pub fn status(&self) -> RateLimitStatus {
        let now = Instant::now();
        let wall_now = Utc::now();
        let mut state = self.state();
        state.roll_day(wall_now);
        state.prune(now);

        RateLimitStatus {
            per_minute: WindowUsage {
                used: state.minute_window.len() as u32,
                limit: self.per_minute,
                reset_in_ms: state.minute_reset_in(now).as_millis() as u64,
            },
            per_day: WindowUsage {
                used: state.day_count,
                limit: self.per_day,
                reset_in_ms: (state.day_resets_at - wall_now).num_milliseconds().max(0) as u64,
            },
            api_reported: state.vendor,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_day_count(&self, count: u32) {
        self.state().day_count = count;
    }
}
