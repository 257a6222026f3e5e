//! Rate Limiter (C1, `spec.md` §4.1). Every write the core performs against
//! the forge goes through `check` first and is recorded with `record`
//! afterwards. All counters are computed by scanning the Rate-Limit Event
//! ring buffer rather than kept as separate running totals, so they are
//! always recomputable from the log (`spec.md` §6) and never drift from it.
//!
//! Grounded on the teacher's `infrastructure/claude/rate_limiter.rs`
//! (`TokenBucketRateLimiter`), generalized from a single blocking token
//! bucket into a non-blocking multi-window admission check, because the
//! core never wants to sleep inside a forge call — it wants a same-tick
//! `Allow`/`Deny` verdict it can act on (skip, retry later, escalate).

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::RwLock;

use crate::domain::models::config::{OpWindowLimits, RateLimitConfig};
use crate::domain::models::{OpKind, RateLimitEvent};
use crate::domain::ports::Clock;
use crate::infrastructure::persistence::RateLogMirror;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny {
        reason: String,
        retry_after_secs: Option<u64>,
    },
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RateLimiterStats {
    pub events_in_log: usize,
    pub forge_remaining: u32,
    pub forge_limit: u32,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    events: RwLock<VecDeque<RateLimitEvent>>,
    mirror: RateLogMirror,
    forge_remaining: AtomicU32,
    forge_limit: AtomicU32,
}

fn digest(content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>, mirror: RateLogMirror) -> Self {
        Self {
            config,
            clock,
            events: RwLock::new(VecDeque::new()),
            mirror,
            forge_remaining: AtomicU32::new(u32::MAX),
            forge_limit: AtomicU32::new(u32::MAX),
        }
    }

    /// Called by C2 after each forge response carries fresh rate-limit
    /// headers, so the safety-threshold check stays current without polling.
    pub fn update_forge_budget(&self, remaining: u32, limit: u32) {
        self.forge_remaining.store(remaining, Ordering::Relaxed);
        self.forge_limit.store(limit, Ordering::Relaxed);
    }

    pub async fn check(&self, op_kind: OpKind, target: &str, content: &str) -> Decision {
        let now = self.clock.now();
        let remaining = self.forge_remaining.load(Ordering::Relaxed);
        if remaining <= self.config.forge_budget_safety_threshold {
            return Decision::Deny {
                reason: format!(
                    "forge budget near exhaustion: {remaining} remaining (safety threshold {})",
                    self.config.forge_budget_safety_threshold
                ),
                retry_after_secs: None,
            };
        }

        if !op_kind.is_write() {
            // Reads only consult the forge-budget safety threshold above.
            return Decision::Allow;
        }

        let events = self.events.read().await;
        let limits = self.config.limits_for(op_kind);

        if let Some(last) = events
            .iter()
            .rev()
            .find(|e| e.op_kind == op_kind && e.success)
        {
            let elapsed = (now - last.timestamp).num_seconds().max(0) as u64;
            if elapsed < limits.cooldown_secs {
                return Decision::Deny {
                    reason: format!("cooldown active for {op_kind:?}"),
                    retry_after_secs: Some(limits.cooldown_secs - elapsed),
                };
            }
        }

        let minute_count = count_since(&events, now, ChronoDuration::seconds(60), |e| {
            e.success && e.op_kind == op_kind
        });
        if minute_count >= limits.per_minute {
            return Decision::Deny {
                reason: format!("{op_kind:?} rate exceeded: {minute_count}/min"),
                retry_after_secs: Some(60),
            };
        }

        let hour_count = count_since(&events, now, ChronoDuration::hours(1), |e| {
            e.success && e.op_kind == op_kind
        });
        if hour_count >= limits.per_hour {
            return Decision::Deny {
                reason: format!("{op_kind:?} hourly budget exceeded: {hour_count}/hr"),
                retry_after_secs: Some(3600),
            };
        }

        let day_count = count_since(&events, now, ChronoDuration::days(1), |e| {
            e.success && e.op_kind == op_kind
        });
        if day_count >= limits.per_day {
            return Decision::Deny {
                reason: format!("{op_kind:?} daily budget exceeded: {day_count}/day"),
                retry_after_secs: Some(86_400),
            };
        }

        let burst_window = ChronoDuration::seconds(self.config.burst_window_secs as i64);
        let burst_count = count_since(&events, now, burst_window, |e| e.success);
        if burst_count >= self.config.burst_cap {
            return Decision::Deny {
                reason: format!("burst cap exceeded: {burst_count}/{}s", self.config.burst_window_secs),
                retry_after_secs: Some(self.config.burst_window_secs),
            };
        }

        let content_digest = digest(content);
        let dup_window = ChronoDuration::seconds(self.config.duplicate_window_secs as i64);
        let dup_count = count_since(&events, now, dup_window, |e| {
            e.success && e.target == target && e.content_digest == content_digest
        });
        if dup_count >= self.config.max_duplicate_operations {
            return Decision::Deny {
                reason: format!("duplicate operation on {target} seen {dup_count} times"),
                retry_after_secs: None,
            };
        }

        Decision::Allow
    }

    /// Idempotency sentinel for create-comment/create-label (`spec.md`
    /// §4.2): `true` if a *successful* write with this exact op-kind,
    /// target, and content digest already appears in the log, regardless
    /// of window — the caller should treat the write as already done and
    /// skip it rather than retry it.
    pub async fn already_succeeded(&self, op_kind: OpKind, target: &str, content: &str) -> bool {
        let content_digest = digest(content);
        self.events
            .read()
            .await
            .iter()
            .any(|e| e.success && e.op_kind == op_kind && e.target == target && e.content_digest == content_digest)
    }

    /// Always appends, whether the caller's check was `Allow` or it went
    /// ahead anyway (e.g. recording a failed attempt for diagnostics).
    pub async fn record(&self, op_kind: OpKind, target: &str, content: &str, success: bool) {
        let event = RateLimitEvent {
            timestamp: self.clock.now(),
            op_kind,
            target: target.to_string(),
            content_digest: digest(content),
            success,
        };

        if let Err(err) = self.mirror.append(&event) {
            tracing::warn!(error = %err, "rate log mirror append failed");
        }

        let mut events = self.events.write().await;
        events.push_back(event);
        while events.len() > self.config.event_log_capacity {
            events.pop_front();
        }
    }

    pub async fn stats(&self) -> RateLimiterStats {
        let events = self.events.read().await;
        RateLimiterStats {
            events_in_log: events.len(),
            forge_remaining: self.forge_remaining.load(Ordering::Relaxed),
            forge_limit: self.forge_limit.load(Ordering::Relaxed),
        }
    }
}

fn count_since(
    events: &VecDeque<RateLimitEvent>,
    now: DateTime<Utc>,
    window: ChronoDuration,
    pred: impl Fn(&RateLimitEvent) -> bool,
) -> u32 {
    let cutoff = now - window;
    events
        .iter()
        .filter(|e| e.timestamp > cutoff && pred(e))
        .count() as u32
}
