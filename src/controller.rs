// src/controller.rs
//! Debounced delivery: push a snapshot only when its content changed and the
//! minimum push interval has passed since the last delivery.

use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::config::{DebounceConfig, RateLimitBy};
use crate::delivery::{DeliveryError, Transport};
use crate::snapshot::{ContentFingerprint, Snapshot};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("relay_delivery_attempts_total", "Delivery attempts.");
        describe_counter!("relay_deliveries_total", "Successful deliveries.");
        describe_counter!(
            "relay_delivery_failures_total",
            "Failed deliveries, labelled by failure kind."
        );
        describe_counter!(
            "relay_skipped_total",
            "Cycles without an attempt, labelled by reason."
        );
        describe_gauge!(
            "relay_last_delivery_ts",
            "Unix ts of the last successful delivery."
        );
    });
}

/// Memory of what the device last received. Empty at startup, which forces a
/// push on the first cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryState {
    pub last_fingerprint: Option<ContentFingerprint>,
    pub last_delivery_at: Option<DateTime<Utc>>,
}

/// Why no attempt was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Same content as the last successful delivery.
    Unchanged,
    /// Content changed but the minimum interval has not elapsed.
    Debounced,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Unchanged => "unchanged",
            SkipReason::Debounced => "debounced",
        }
    }
}

#[derive(Debug)]
pub enum TickDecision {
    Skipped(SkipReason),
    Delivered,
    Failed(DeliveryError),
}

#[derive(Debug)]
pub struct TickOutcome {
    pub state: DeliveryState,
    pub decision: TickDecision,
}

/// Debounce parameters for [`tick`].
#[derive(Debug, Clone, Copy)]
pub struct Debounce {
    pub min_interval: Duration,
    pub delivery_timeout: Duration,
    pub rate_limit_by: RateLimitBy,
}

impl Debounce {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            delivery_timeout: Duration::from_secs(30),
            rate_limit_by: RateLimitBy::Attempt,
        }
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    pub fn with_rate_limit_by(mut self, by: RateLimitBy) -> Self {
        self.rate_limit_by = by;
        self
    }
}

impl From<&DebounceConfig> for Debounce {
    fn from(cfg: &DebounceConfig) -> Self {
        Self {
            min_interval: cfg.min_interval(),
            delivery_timeout: cfg.delivery_timeout(),
            rate_limit_by: cfg.rate_limit_by,
        }
    }
}

impl DeliveryState {
    /// Decide whether `fp` should be pushed at `now`. Does NOT mutate state.
    pub fn should_attempt(
        &self,
        fp: &ContentFingerprint,
        now: DateTime<Utc>,
        min_interval: Duration,
    ) -> Result<(), SkipReason> {
        let Some(last_fp) = &self.last_fingerprint else {
            // Nothing delivered yet: never rate-limited.
            return Ok(());
        };
        if last_fp == fp {
            return Err(SkipReason::Unchanged);
        }
        match self.last_delivery_at {
            None => Ok(()),
            Some(last_at) => {
                let elapsed = now.signed_duration_since(last_at);
                // Clock stepping backwards reads as "not elapsed".
                let elapsed = elapsed.to_std().unwrap_or(Duration::ZERO);
                if elapsed > min_interval {
                    Ok(())
                } else {
                    Err(SkipReason::Debounced)
                }
            }
        }
    }
}

/// Run one decision step for `snapshot` and return the next state.
///
/// The delivery call is bounded by `debounce.delivery_timeout`; a timeout is a
/// failure like any other. Failures never advance `last_fingerprint`, so the
/// same content is retried once the interval reopens.
pub async fn tick(
    state: DeliveryState,
    snapshot: &Snapshot,
    transport: &dyn Transport,
    now: DateTime<Utc>,
    debounce: &Debounce,
) -> TickOutcome {
    ensure_metrics_described();

    let fp = snapshot.fingerprint();

    if let Err(reason) = state.should_attempt(&fp, now, debounce.min_interval) {
        tracing::debug!(target: "delivery", fp = fp.short(), reason = reason.as_str(), "push skipped");
        counter!("relay_skipped_total", "reason" => reason.as_str()).increment(1);
        return TickOutcome {
            state,
            decision: TickDecision::Skipped(reason),
        };
    }

    counter!("relay_delivery_attempts_total").increment(1);
    let res = match tokio::time::timeout(debounce.delivery_timeout, transport.deliver(snapshot)).await
    {
        Ok(r) => r,
        Err(_) => Err(DeliveryError::Timeout(debounce.delivery_timeout)),
    };

    match res {
        Ok(()) => {
            tracing::info!(
                target: "delivery",
                transport = transport.name(),
                fp = fp.short(),
                "headlines delivered"
            );
            counter!("relay_deliveries_total").increment(1);
            gauge!("relay_last_delivery_ts").set(now.timestamp() as f64);
            TickOutcome {
                state: DeliveryState {
                    last_fingerprint: Some(fp),
                    last_delivery_at: Some(now),
                },
                decision: TickDecision::Delivered,
            }
        }
        Err(e) => {
            tracing::warn!(
                target: "delivery",
                transport = transport.name(),
                kind = e.kind(),
                error = %e,
                fp = fp.short(),
                "delivery failed; will retry"
            );
            counter!("relay_delivery_failures_total", "kind" => e.kind()).increment(1);
            let last_delivery_at = match debounce.rate_limit_by {
                RateLimitBy::Attempt => Some(now),
                RateLimitBy::Success => state.last_delivery_at,
            };
            TickOutcome {
                state: DeliveryState {
                    last_fingerprint: state.last_fingerprint,
                    last_delivery_at,
                },
                decision: TickDecision::Failed(e),
            }
        }
    }
}
