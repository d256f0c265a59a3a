// tests/snapshot_builder.rs
use std::time::Duration;

use anyhow::{anyhow, Result};
use headline_relay::ingest::{build_snapshot, providers::rss::RssFeed, types::FeedSource};

const LOCAL_XML: &str = include_str!("fixtures/rthk_local.xml");
const SHORT_XML: &str = include_str!("fixtures/short_feed.xml");

struct Broken(&'static str);

#[async_trait::async_trait]
impl FeedSource for Broken {
    async fn fetch_titles(&self) -> Result<Vec<String>> {
        Err(anyhow!("connection reset"))
    }
    fn category(&self) -> &str {
        self.0
    }
}

struct Hung(&'static str);

#[async_trait::async_trait]
impl FeedSource for Hung {
    async fn fetch_titles(&self) -> Result<Vec<String>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec!["never".into()])
    }
    fn category(&self) -> &str {
        self.0
    }
}

fn timeout() -> Duration {
    Duration::from_secs(5)
}

#[tokio::test]
async fn short_feed_is_padded_to_ten() {
    let sources: Vec<Box<dyn FeedSource>> = vec![Box::new(RssFeed::from_fixture("A", SHORT_XML))];
    let snap = build_snapshot(&sources, 10, timeout()).await;

    let a = snap.headlines.get("A").expect("category A present");
    assert_eq!(a.len(), 10);
    assert_eq!(a[0], "Hang Seng closes 1.2% higher");
    assert_eq!(a[1], "HKMA keeps base rate unchanged at 4.75%");
    assert_eq!(a[2], "Exchange fund posts quarterly gain");
    assert!(a[3..].iter().all(|t| t.is_empty()), "{a:?}");
}

#[tokio::test]
async fn long_feed_is_truncated_in_source_order() {
    let sources: Vec<Box<dyn FeedSource>> =
        vec![Box::new(RssFeed::from_fixture("本港新聞", LOCAL_XML))];
    let snap = build_snapshot(&sources, 10, timeout()).await;

    let local = snap.headlines.get("本港新聞").unwrap();
    assert_eq!(local.len(), 10);
    assert_eq!(local[0], "港府公布新一輪消費券計劃");
    assert_eq!(local[9], "運輸署提醒市民留意週末道路封閉安排");
    assert!(local.iter().all(|t| !t.is_empty()));
}

#[tokio::test]
async fn failing_source_yields_empty_slots_without_blocking_others() {
    let sources: Vec<Box<dyn FeedSource>> = vec![
        Box::new(RssFeed::from_fixture("local", LOCAL_XML)),
        Box::new(Broken("broken")),
        Box::new(RssFeed::from_fixture("finance", SHORT_XML)),
        Box::new(RssFeed::from_fixture("garbage", "<rss><channel></rss>")),
    ];
    let snap = build_snapshot(&sources, 10, timeout()).await;

    let cats: Vec<&str> = snap.headlines.categories().collect();
    assert_eq!(cats, vec!["local", "broken", "finance", "garbage"]);
    for (cat, titles) in snap.headlines.iter() {
        assert_eq!(titles.len(), 10, "category {cat}");
    }
    assert!(snap.headlines.get("broken").unwrap().iter().all(|t| t.is_empty()));
    assert!(snap.headlines.get("garbage").unwrap().iter().all(|t| t.is_empty()));
    assert_eq!(snap.headlines.get("finance").unwrap()[0], "Hang Seng closes 1.2% higher");
}

#[tokio::test(start_paused = true)]
async fn hung_source_times_out_on_its_own() {
    let sources: Vec<Box<dyn FeedSource>> = vec![
        Box::new(Hung("slow")),
        Box::new(RssFeed::from_fixture("finance", SHORT_XML)),
    ];
    let snap = build_snapshot(&sources, 10, timeout()).await;

    assert!(snap.headlines.get("slow").unwrap().iter().all(|t| t.is_empty()));
    assert_eq!(
        snap.headlines.get("finance").unwrap()[0],
        "Hang Seng closes 1.2% higher"
    );
}

#[tokio::test]
async fn custom_slot_count_is_respected() {
    let sources: Vec<Box<dyn FeedSource>> = vec![Box::new(RssFeed::from_fixture("A", SHORT_XML))];
    let snap = build_snapshot(&sources, 2, timeout()).await;
    assert_eq!(snap.headlines.get("A").unwrap().len(), 2);
}

#[tokio::test]
async fn rebuilt_snapshot_has_same_fingerprint() {
    let sources: Vec<Box<dyn FeedSource>> = vec![
        Box::new(RssFeed::from_fixture("local", LOCAL_XML)),
        Box::new(RssFeed::from_fixture("finance", SHORT_XML)),
    ];
    let first = build_snapshot(&sources, 10, timeout()).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = build_snapshot(&sources, 10, timeout()).await;
    assert!(second.captured_at >= first.captured_at);
    assert_eq!(first.fingerprint(), second.fingerprint());
}
