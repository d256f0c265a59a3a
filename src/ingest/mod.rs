// src/ingest/mod.rs
pub mod providers;
pub mod types;

use std::time::Duration;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::ingest::types::FeedSource;
use crate::snapshot::{pad_titles, Headlines, Snapshot};

/// Upper bound on a single headline, in chars.
pub const MAX_TITLE_CHARS: usize = 200;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "relay_fetch_errors_total",
            "Feed fetch/parse errors (including timeouts)."
        );
        describe_histogram!("relay_fetch_ms", "Per-feed fetch time in milliseconds.");
        describe_histogram!("relay_parse_ms", "RSS parse time in milliseconds.");
    });
}

/// Normalize a headline: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Collapse whitespace (\s is Unicode-aware, covers NBSP)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 4) Length cap
    if out.chars().count() > MAX_TITLE_CHARS {
        out = out.chars().take(MAX_TITLE_CHARS).collect();
    }

    out
}

/// Fetch every source once and assemble a fixed-shape snapshot.
///
/// Sources are fetched in order, each under its own `fetch_timeout`. A failed
/// or hung source yields an all-empty category; it never fails the snapshot.
pub async fn build_snapshot(
    sources: &[Box<dyn FeedSource>],
    slots: usize,
    fetch_timeout: Duration,
) -> Snapshot {
    ensure_metrics_described();

    let mut headlines = Headlines::new();
    for src in sources {
        let category = src.category();
        let t0 = std::time::Instant::now();
        let titles = match tokio::time::timeout(fetch_timeout, src.fetch_titles()).await {
            Ok(Ok(titles)) => {
                tracing::debug!(
                    target: "ingest",
                    category,
                    fetched = titles.len(),
                    "feed fetched"
                );
                titles
            }
            Ok(Err(e)) => {
                tracing::warn!(target: "ingest", category, error = %format!("{e:#}"), "feed error");
                counter!("relay_fetch_errors_total").increment(1);
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    target: "ingest",
                    category,
                    timeout_ms = fetch_timeout.as_millis() as u64,
                    "feed timed out"
                );
                counter!("relay_fetch_errors_total").increment(1);
                Vec::new()
            }
        };
        histogram!("relay_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        headlines.insert(category, pad_titles(titles, slots));
    }

    Snapshot {
        captured_at: Utc::now(),
        headlines,
    }
}
