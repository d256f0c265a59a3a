use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::ingest::normalize_text;
use crate::ingest::types::FeedSource;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
}

/// RSS 2.0 feed bound to one display category.
pub struct RssFeed {
    category: String,
    mode: Mode,
}

enum Mode {
    // Owned copy so tests can build fixtures from any &str.
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFeed {
    pub fn from_fixture(category: impl Into<String>, xml: &str) -> Self {
        Self {
            category: category.into(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(category: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_client(category, url, reqwest::Client::new())
    }

    /// Share one client (and its pool) across every configured feed.
    pub fn with_client(
        category: impl Into<String>,
        url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            category: category.into(),
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    pub fn parse_titles(xml: &str) -> Result<Vec<String>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let titles = rss
            .channel
            .item
            .into_iter()
            .filter_map(|it| it.title)
            .map(|t| normalize_text(&t))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>();

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("relay_parse_ms").record(ms);
        Ok(titles)
    }
}

#[async_trait]
impl FeedSource for RssFeed {
    async fn fetch_titles(&self) -> Result<Vec<String>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_titles(s),
            Mode::Http { url, client } => {
                let resp = client
                    .get(url.as_str())
                    .send()
                    .await
                    .with_context(|| format!("GET {url}"))?;
                let status = resp.status();
                if !status.is_success() {
                    bail!("GET {url} returned {status}");
                }
                let body = resp.text().await.context("rss http .text()")?;
                Self::parse_titles(&body)
            }
        }
    }

    fn category(&self) -> &str {
        &self.category
    }
}

// quick-xml only knows the five XML entities; feeds routinely ship HTML ones.
// Every other named entity is decoded up front and re-escaped as XML text, so
// a stray `&eacute;` cannot sink the whole feed.
fn scrub_html_entities_for_xml(s: &str) -> String {
    static RE_ENTITY: OnceCell<Regex> = OnceCell::new();
    let re = RE_ENTITY.get_or_init(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap());

    re.replace_all(s, |caps: &Captures| {
        let entity = &caps[0];
        match &caps[1] {
            "amp" | "lt" | "gt" | "quot" | "apos" => entity.to_string(),
            _ => {
                let decoded = html_escape::decode_html_entities(entity);
                if decoded == entity {
                    // Unknown to HTML too: keep it as literal text.
                    format!("&amp;{}", &entity[1..])
                } else {
                    html_escape::encode_text(&decoded).into_owned()
                }
            }
        }
    })
    .into_owned()
}
