// src/scheduler.rs
//! The poll loop: one build + tick cycle per period, never overlapping.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::controller::{self, Debounce, DeliveryState, TickDecision};
use crate::delivery::Transport;
use crate::ingest::{self, types::FeedSource};
use crate::snapshot::Snapshot;

/// Last built snapshot, shared read-only with the query API.
#[derive(Clone, Default)]
pub struct LatestSnapshot {
    inner: Arc<RwLock<Option<Snapshot>>>,
}

impl LatestSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Snapshot> {
        match self.inner.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, snapshot: Snapshot) {
        match self.inner.write() {
            Ok(mut g) => *g = Some(snapshot),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PollCfg {
    pub interval: Duration,
    pub headline_slots: usize,
    pub fetch_timeout: Duration,
    pub debounce: Debounce,
}

/// Everything one cycle needs; the loop owns the `DeliveryState`.
pub struct PollLoop {
    pub cfg: PollCfg,
    pub sources: Vec<Box<dyn FeedSource>>,
    pub transport: Box<dyn Transport>,
    pub latest: LatestSnapshot,
}

impl PollLoop {
    /// Build one snapshot, publish it, and run the delivery decision.
    pub async fn run_cycle(&self, state: DeliveryState) -> DeliveryState {
        let snapshot = ingest::build_snapshot(
            &self.sources,
            self.cfg.headline_slots,
            self.cfg.fetch_timeout,
        )
        .await;
        self.latest.set(snapshot.clone());

        let out = controller::tick(
            state,
            &snapshot,
            self.transport.as_ref(),
            Utc::now(),
            &self.cfg.debounce,
        )
        .await;

        counter!("relay_cycles_total").increment(1);
        if let TickDecision::Failed(e) = &out.decision {
            tracing::debug!(target: "delivery", error = ?e, "cycle ended with delivery failure");
        }
        out.state
    }

    /// Run cycles until `shutdown` flips to true (or its sender is dropped).
    ///
    /// Shutdown is only observed between cycles; an in-flight delivery always
    /// completes or times out first. The transport is closed before returning.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> DeliveryState {
        let mut ticker = tokio::time::interval(self.cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.cfg.interval.as_secs(),
            sources = self.sources.len(),
            transport = self.transport.name(),
            "poll loop started"
        );

        let mut state = DeliveryState::default();
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }
            state = self.run_cycle(state).await;
        }

        self.transport.close().await;
        tracing::info!("poll loop stopped");
        state
    }
}
