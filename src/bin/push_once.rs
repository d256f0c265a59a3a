//! Fetch every configured feed once and push the snapshot straight to the
//! configured transport, bypassing the debounce. Handy when pairing a device.
//!
//! `push-once [--fixture <rss.xml>]` — with a fixture, every category is
//! filled from that file instead of the network.

use anyhow::{Context, Result};
use headline_relay::config::AppConfig;
use headline_relay::ingest::{build_snapshot, providers::rss::RssFeed, types::FeedSource};
use headline_relay::{delivery, sources_from_config};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = AppConfig::load_default()?;

    let mut args = std::env::args().skip(1);
    let sources: Vec<Box<dyn FeedSource>> = match (args.next().as_deref(), args.next()) {
        (Some("--fixture"), Some(path)) => {
            let xml = std::fs::read_to_string(&path)
                .with_context(|| format!("reading fixture {path}"))?;
            cfg.feeds
                .iter()
                .map(|f| {
                    Box::new(RssFeed::from_fixture(&f.category, &xml)) as Box<dyn FeedSource>
                })
                .collect()
        }
        (None, _) => sources_from_config(&cfg)?,
        _ => anyhow::bail!("usage: push-once [--fixture <rss.xml>]"),
    };

    let snapshot = build_snapshot(&sources, cfg.headline_slots, cfg.fetch_timeout()).await;
    for (category, titles) in snapshot.headlines.iter() {
        let filled = titles.iter().filter(|t| !t.is_empty()).count();
        println!("{category}: {filled}/{} headlines", titles.len());
    }

    let transport = delivery::from_config(&cfg.transport)?;
    let res = tokio::time::timeout(
        cfg.debounce.delivery_timeout(),
        transport.deliver(&snapshot),
    )
    .await;
    transport.close().await;

    match res {
        Ok(Ok(())) => println!(
            "pushed via {} (fp {})",
            transport.name(),
            snapshot.fingerprint().short()
        ),
        Ok(Err(e)) => anyhow::bail!("push via {} failed ({}): {e}", transport.name(), e.kind()),
        Err(_) => anyhow::bail!("push via {} timed out", transport.name()),
    }
    Ok(())
}
