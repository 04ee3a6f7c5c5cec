//! Process-wide request throttling.
//!
//! Three nested policies gate every remote request: a global minimum spacing
//! between any two requests, a sliding burst window, and a per-video attempt
//! ceiling that resets once the video has been left alone for the reset window.
//! Checking and reserving happen under one lock so concurrent extractions for
//! different videos cannot both pass the global gate.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::signals;

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitReason {
    GlobalRateLimit,
    BurstPrevention,
    VideoRateLimit,
}

impl RateLimitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitReason::GlobalRateLimit => "global_rate_limit",
            RateLimitReason::BurstPrevention => "burst_prevention",
            RateLimitReason::VideoRateLimit => "video_rate_limit",
        }
    }
}

impl fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which policies a gate enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateScope {
    /// Global spacing, burst window and the per-video ceiling and penalty
    Full,
    /// Global spacing and burst window only; the attempt is still recorded
    /// against the video
    Shared,
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub wait_time: Duration,
    pub reason: Option<RateLimitReason>,
}

impl RateLimitDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            wait_time: Duration::ZERO,
            reason: None,
        }
    }

    fn deny(reason: RateLimitReason, wait: ChronoDuration) -> Self {
        Self {
            allowed: false,
            wait_time: wait.to_std().unwrap_or_default(),
            reason: Some(reason),
        }
    }
}

/// Per-video attempt bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub attempts: u32,
    pub first_attempt: DateTime<Utc>,
    pub last_attempt: DateTime<Utc>,
}

/// One allowed request, kept for burst accounting
#[derive(Debug, Clone)]
pub struct RequestHistoryEntry {
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
}

#[derive(Debug, Default)]
struct LimiterState {
    records: HashMap<String, RateLimitRecord>,
    history: VecDeque<RequestHistoryEntry>,
    last_request: Option<DateTime<Utc>>,
}

pub struct RateLimiter {
    global_min_interval: ChronoDuration,
    burst_window: ChronoDuration,
    burst_max_requests: usize,
    max_attempts_per_video: u32,
    reset_window: ChronoDuration,
    bot_penalty: ChronoDuration,
    state: Mutex<LimiterState>,
}

fn millis(ms: u64) -> ChronoDuration {
    ChronoDuration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX / 1_000_000))
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            global_min_interval: millis(config.global_min_interval_ms),
            burst_window: millis(config.burst_window_ms),
            burst_max_requests: config.burst_max_requests,
            max_attempts_per_video: config.max_attempts_per_video,
            reset_window: millis(config.reset_window_ms),
            bot_penalty: millis(config.bot_penalty_ms),
            state: Mutex::new(LimiterState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check whether a request for `subject` may go out now, reserving it if so
    pub fn check_rate_limit(&self, subject: &str, kind: &str) -> RateLimitDecision {
        self.check_rate_limit_at(subject, kind, Utc::now())
    }

    /// Same as [`check_rate_limit`](Self::check_rate_limit) with an explicit clock
    pub fn check_rate_limit_at(&self, subject: &str, kind: &str, now: DateTime<Utc>) -> RateLimitDecision {
        self.check_scoped_at(subject, kind, GateScope::Full, now)
    }

    /// Check with an explicit scope and clock, reserving on success
    pub fn check_scoped_at(
        &self,
        subject: &str,
        kind: &str,
        scope: GateScope,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let mut state = self.lock();
        self.prune(&mut state, now);

        if let Some(last) = state.last_request {
            let elapsed = now - last;
            if elapsed < self.global_min_interval {
                return RateLimitDecision::deny(
                    RateLimitReason::GlobalRateLimit,
                    self.global_min_interval - elapsed,
                );
            }
        }

        let window_start = now - self.burst_window;
        let in_window: Vec<DateTime<Utc>> = state
            .history
            .iter()
            .filter(|entry| entry.timestamp > window_start)
            .map(|entry| entry.timestamp)
            .collect();
        if in_window.len() >= self.burst_max_requests {
            if let Some(oldest) = in_window.iter().min() {
                return RateLimitDecision::deny(
                    RateLimitReason::BurstPrevention,
                    *oldest + self.burst_window - now,
                );
            }
        }

        if let Some(record) = state.records.get_mut(subject) {
            if scope == GateScope::Full && now < record.last_attempt {
                return RateLimitDecision::deny(RateLimitReason::VideoRateLimit, record.last_attempt - now);
            }
            if now - record.last_attempt >= self.reset_window {
                record.attempts = 0;
                record.first_attempt = now;
            }
            if scope == GateScope::Full && record.attempts >= self.max_attempts_per_video {
                return RateLimitDecision::deny(
                    RateLimitReason::VideoRateLimit,
                    record.last_attempt + self.reset_window - now,
                );
            }
        }

        let record = state
            .records
            .entry(subject.to_string())
            .or_insert_with(|| RateLimitRecord {
                attempts: 0,
                first_attempt: now,
                last_attempt: now,
            });
        record.attempts = record.attempts.saturating_add(1);
        // A pending penalty outlives shared-scope reservations.
        if now > record.last_attempt {
            record.last_attempt = now;
        }

        state.last_request = Some(now);
        state.history.push_back(RequestHistoryEntry {
            subject: subject.to_string(),
            timestamp: now,
            kind: kind.to_string(),
        });

        tracing::debug!("Rate limiter reserved {} request for {}", kind, subject);
        RateLimitDecision::allow()
    }

    /// Push a video's next allowed attempt into the future after a bot-detection failure.
    ///
    /// Returns whether a penalty was applied.
    pub fn record_failure(&self, subject: &str, error: &str) -> bool {
        self.record_failure_at(subject, error, Utc::now())
    }

    pub fn record_failure_at(&self, subject: &str, error: &str, now: DateTime<Utc>) -> bool {
        let is_block = signals::classify(error).iter().any(|signal| signal.is_block());
        if !is_block {
            return false;
        }

        let penalty_until = now + self.bot_penalty;
        let mut state = self.lock();
        let record = state
            .records
            .entry(subject.to_string())
            .or_insert_with(|| RateLimitRecord {
                attempts: 0,
                first_attempt: now,
                last_attempt: now,
            });
        if penalty_until > record.last_attempt {
            record.last_attempt = penalty_until;
        }

        tracing::warn!(
            "Bot-detection failure for {}; next attempt not before {}",
            subject,
            record.last_attempt
        );
        true
    }

    /// Wait until a request is allowed, giving up when the wait would exceed `max_wait`.
    ///
    /// Per-video denials are returned immediately since waiting them out would
    /// take the whole reset window.
    pub async fn acquire(
        &self,
        subject: &str,
        kind: &str,
        scope: GateScope,
        max_wait: Duration,
    ) -> Result<(), RateLimitDecision> {
        let mut waited = Duration::ZERO;
        loop {
            let decision = self.check_scoped_at(subject, kind, scope, Utc::now());
            if decision.allowed {
                return Ok(());
            }
            if decision.reason == Some(RateLimitReason::VideoRateLimit) || waited + decision.wait_time > max_wait {
                return Err(decision);
            }

            tracing::info!(
                "Rate limit ({}) for {}: waiting {}ms",
                decision.reason.map(|r| r.as_str()).unwrap_or("unknown"),
                subject,
                decision.wait_time.as_millis()
            );
            // A zero wait can only come from clock granularity; nudge forward.
            let pause = decision.wait_time.max(Duration::from_millis(1));
            tokio::time::sleep(pause).await;
            waited += pause;
        }
    }

    /// Snapshot of a video's record
    pub fn record(&self, subject: &str) -> Option<RateLimitRecord> {
        self.lock().records.get(subject).cloned()
    }

    /// Number of retained history entries
    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    fn prune(&self, state: &mut LimiterState, now: DateTime<Utc>) {
        let horizon = now - self.reset_window;
        while state
            .history
            .front()
            .map_or(false, |entry| entry.timestamp <= horizon)
        {
            state.history.pop_front();
        }

        let stale_after = self.reset_window * 2;
        state
            .records
            .retain(|_, record| now - record.last_attempt <= stale_after);
    }
}
