// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod controller;
pub mod delivery;
pub mod ingest;
pub mod mdns;
pub mod metrics;
pub mod scheduler;
pub mod snapshot;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::controller::{tick, Debounce, DeliveryState, TickDecision, TickOutcome};
pub use crate::delivery::{DeliveryError, Transport};
pub use crate::ingest::build_snapshot;
pub use crate::snapshot::{ContentFingerprint, Headlines, Snapshot};

use anyhow::Result;

use crate::config::AppConfig;
use crate::ingest::{providers::rss::RssFeed, types::FeedSource};

/// One HTTP-backed RSS source per configured feed, sharing a client.
pub fn sources_from_config(cfg: &AppConfig) -> Result<Vec<Box<dyn FeedSource>>> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("headline-relay/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(cfg
        .feeds
        .iter()
        .map(|f| {
            Box::new(RssFeed::with_client(&f.category, &f.url, client.clone()))
                as Box<dyn FeedSource>
        })
        .collect())
}

/// Poll-loop settings derived from the loaded config.
pub fn poll_cfg(cfg: &AppConfig) -> scheduler::PollCfg {
    scheduler::PollCfg {
        interval: cfg.poll_interval(),
        headline_slots: cfg.headline_slots,
        fetch_timeout: cfg.fetch_timeout(),
        debounce: Debounce::from(&cfg.debounce),
    }
}
