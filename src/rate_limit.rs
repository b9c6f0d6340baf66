//! Client-side enforcement of the server's call quota.
//!
//! Every response may carry `x-ratelimit-remaining` and `x-ratelimit-reset` headers. The
//! [`RateGate`] remembers them between calls on the same client and, once the quota is used
//! up, holds the next call back until the advertised reset time.
//!
//! The reset header is read as a Unix timestamp in **milliseconds**.

use crate::time::Clock;
use crate::{Error, Result};
use http::HeaderMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Header carrying the number of calls left in the current window.
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Header carrying the end of the current window, in epoch milliseconds.
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Rate-limit information extracted from one response's headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Calls remaining in the current window.
    pub remaining: Option<i64>,
    /// When the current window resets.
    pub reset_at: Option<SystemTime>,
}

impl RateLimitInfo {
    /// Extracts rate-limit information from response headers.
    ///
    /// Missing or unparsable headers yield `None` fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use postmen::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("x-ratelimit-remaining", "10".parse().unwrap());
    /// headers.insert("x-ratelimit-reset", "1453435538946".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert_eq!(info.remaining, Some(10));
    /// assert!(info.reset_at.is_some());
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: parse_remaining(headers),
            reset_at: parse_reset(headers),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

fn parse_remaining(headers: &HeaderMap) -> Option<i64> {
    header_str(headers, REMAINING_HEADER)?.parse().ok()
}

fn parse_reset(headers: &HeaderMap) -> Option<SystemTime> {
    let millis: u64 = header_str(headers, RESET_HEADER)?.parse().ok()?;
    Some(UNIX_EPOCH + Duration::from_millis(millis))
}

/// Quota state remembered across calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateState {
    /// Calls remaining, or `None` until a response reported it.
    pub calls_remaining: Option<i64>,
    /// Latest reset time reported.
    pub reset_at: Option<SystemTime>,
}

impl RateState {
    /// Folds newly observed information into the state.
    ///
    /// The reset time only moves forward; the remaining count is replaced when reported.
    pub fn observe(&mut self, info: RateLimitInfo) {
        if let Some(reset_at) = info.reset_at {
            self.reset_at = Some(self.reset_at.map_or(reset_at, |current| current.max(reset_at)));
        }
        if let Some(remaining) = info.remaining {
            self.calls_remaining = Some(remaining);
        }
    }

    /// Returns how long to wait before the next call, if the quota is exhausted.
    ///
    /// Unknown quota never blocks.
    pub fn wait_time(&self, now: SystemTime) -> Option<Duration> {
        let remaining = self.calls_remaining?;
        if remaining > 0 {
            return None;
        }
        let delay = self.reset_at?.duration_since(now).ok()?;
        (!delay.is_zero()).then_some(delay)
    }
}

/// Synchronized rate-limit gate owned by a client.
pub struct RateGate {
    state: Mutex<RateState>,
    clock: Arc<dyn Clock>,
}

impl RateGate {
    /// Creates a gate with unknown quota.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(RateState::default()),
            clock,
        }
    }

    /// Decides whether the next call must wait.
    ///
    /// Returns the delay to sleep when the quota is exhausted and `wait` is set. The lock is
    /// released before returning, so callers sleep without holding it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::rate_limited`] when the quota is exhausted and `wait` is not set.
    pub fn check(&self, wait: bool) -> Result<Option<Duration>> {
        let now = self.clock.now();
        let delay = self.lock().wait_time(now);
        match delay {
            Some(_) if !wait => Err(Error::rate_limited()),
            delay => Ok(delay),
        }
    }

    /// Records the rate-limit headers of a response.
    pub fn update(&self, headers: &HeaderMap) {
        let info = RateLimitInfo::from_headers(headers);
        if info == RateLimitInfo::default() {
            return;
        }
        let mut state = self.lock();
        state.observe(info);
        tracing::debug!(
            calls_remaining = ?state.calls_remaining,
            "Rate limit state updated"
        );
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> RateState {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate")
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}
