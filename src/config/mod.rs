// src/config/mod.rs
//! Relay configuration: TOML file + env overrides.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::snapshot::DEFAULT_HEADLINE_SLOTS;

pub const DEFAULT_CONFIG_PATH: &str = "config/headlines.toml";

pub const ENV_CONFIG_PATH: &str = "HEADLINES_CONFIG_PATH";
pub const ENV_POLL_INTERVAL_SECS: &str = "POLL_INTERVAL_SECS";
pub const ENV_PUSH_MIN_INTERVAL_SECS: &str = "PUSH_MIN_INTERVAL_SECS";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";

fn default_poll_interval_secs() -> u64 {
    60
}
fn default_headline_slots() -> usize {
    DEFAULT_HEADLINE_SLOTS
}
fn default_fetch_timeout_secs() -> u64 {
    10
}
fn default_min_interval_secs() -> u64 {
    300
}
fn default_delivery_timeout_secs() -> u64 {
    30
}
fn default_http_timeout_secs() -> u64 {
    5
}
fn default_http_retries() -> u8 {
    3
}
fn default_ble_scan_secs() -> u64 {
    5
}
fn default_ble_mtu() -> usize {
    23
}
fn default_bind() -> String {
    "0.0.0.0:5050".to_string()
}
fn default_true() -> bool {
    true
}
fn default_mdns_instance() -> String {
    "RTHK News Server".to_string()
}
fn default_mdns_host() -> String {
    "news.local.".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Headlines per category (K).
    #[serde(default = "default_headline_slots")]
    pub headline_slots: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mdns: MdnsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    pub category: String,
    pub url: String,
}

/// Which timestamp the minimum push interval is measured from.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBy {
    /// Last delivery attempt, successful or not.
    #[default]
    Attempt,
    /// Last successful delivery only.
    Success,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebounceConfig {
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
    #[serde(default)]
    pub rate_limit_by: RateLimitBy,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            delivery_timeout_secs: default_delivery_timeout_secs(),
            rate_limit_by: RateLimitBy::default(),
        }
    }
}

impl DebounceConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// POST the JSON body to `url`.
    Http {
        url: String,
        #[serde(default = "default_http_timeout_secs")]
        timeout_secs: u64,
        #[serde(default = "default_http_retries")]
        retries: u8,
    },
    /// Write the JSON body to a bound RFCOMM TTY (e.g. /dev/rfcomm0).
    Rfcomm { device: PathBuf },
    /// GATT characteristic write (needs the `ble` feature).
    Ble {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        address: Option<String>,
        characteristic: String,
        #[serde(default = "default_ble_scan_secs")]
        scan_secs: u64,
        #[serde(default = "default_ble_mtu")]
        mtu: usize,
    },
    /// Log only; no device.
    #[default]
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("invalid server bind address '{}'", self.bind))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MdnsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_mdns_instance")]
    pub instance: String,
    #[serde(default = "default_mdns_host")]
    pub host: String,
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            instance: default_mdns_instance(),
            host: default_mdns_host(),
        }
    }
}

/// RTHK express-news sections, as shipped by the original deployment.
pub fn default_feeds() -> Vec<FeedConfig> {
    [
        (
            "本港新聞",
            "https://rthk.hk/rthk/news/rss/c_expressnews_clocal.xml",
        ),
        (
            "內地新聞",
            "https://rthk.hk/rthk/news/rss/c_expressnews_greaterchina.xml",
        ),
        (
            "國際新聞",
            "https://rthk.hk/rthk/news/rss/c_expressnews_cinternational.xml",
        ),
        (
            "財經新聞",
            "https://rthk.hk/rthk/news/rss/c_expressnews_cfinance.xml",
        ),
    ]
    .into_iter()
    .map(|(category, url)| FeedConfig {
        category: category.to_string(),
        url: url.to_string(),
    })
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            headline_slots: default_headline_slots(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            feeds: default_feeds(),
            debounce: DebounceConfig::default(),
            transport: TransportConfig::default(),
            server: ServerConfig::default(),
            mdns: MdnsConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing relay config toml")?;
        Ok(cfg)
    }

    /// Load from an explicit path, then apply env overrides and validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading relay config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $HEADLINES_CONFIG_PATH (must exist)
    /// 2) config/headlines.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_u64(ENV_POLL_INTERVAL_SECS)? {
            self.poll_interval_secs = v;
        }
        if let Some(v) = env_u64(ENV_PUSH_MIN_INTERVAL_SECS)? {
            self.debounce.min_interval_secs = v;
        }
        if let Ok(v) = std::env::var(ENV_BIND_ADDR) {
            let v = v.trim();
            if !v.is_empty() {
                self.server.bind = v.to_string();
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.headline_slots == 0 {
            bail!("headline_slots must be at least 1");
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be at least 1");
        }
        if self.debounce.delivery_timeout_secs == 0 {
            bail!("debounce.delivery_timeout_secs must be at least 1");
        }
        if self.feeds.is_empty() {
            bail!("no feeds configured");
        }
        let mut seen = HashSet::new();
        for f in &self.feeds {
            if f.category.trim().is_empty() {
                bail!("feed with url '{}' has an empty category", f.url);
            }
            if f.url.trim().is_empty() {
                bail!("feed '{}' has an empty url", f.category);
            }
            if !seen.insert(f.category.as_str()) {
                bail!("duplicate feed category '{}'", f.category);
            }
        }
        if let TransportConfig::Http { url, .. } = &self.transport {
            if url.trim().is_empty() {
                bail!("http transport needs a url");
            }
        }
        if let TransportConfig::Ble { name, address, .. } = &self.transport {
            if name.is_none() && address.is_none() {
                bail!("ble transport needs a device name or address");
            }
        }
        if self.server.enabled {
            self.server.socket_addr()?;
        }
        Ok(())
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{key} must be a non-negative integer, got '{v}'")),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.poll_interval_secs, 60);
        assert_eq!(cfg.headline_slots, 10);
        assert_eq!(cfg.feeds.len(), 4);
        assert_eq!(cfg.debounce.min_interval_secs, 300);
        assert_eq!(cfg.debounce.rate_limit_by, RateLimitBy::Attempt);
        assert_eq!(cfg.transport, TransportConfig::Log);
        assert!(cfg.server.enabled);
        assert!(!cfg.mdns.enabled);
        cfg.validate().unwrap();
    }

    #[test]
    fn transport_variants_parse() {
        let http = r#"
[transport]
kind = "http"
url = "http://display.local/news"
"#;
        let cfg = AppConfig::from_toml_str(http).unwrap();
        assert_eq!(
            cfg.transport,
            TransportConfig::Http {
                url: "http://display.local/news".into(),
                timeout_secs: 5,
                retries: 3,
            }
        );

        let ble = r#"
[transport]
kind = "ble"
name = "NewsTicker"
characteristic = "6e400002-b5a3-f393-e0a9-e50e24dcca9e"
mtu = 185
"#;
        let cfg = AppConfig::from_toml_str(ble).unwrap();
        match cfg.transport {
            TransportConfig::Ble { name, mtu, scan_secs, .. } => {
                assert_eq!(name.as_deref(), Some("NewsTicker"));
                assert_eq!(mtu, 185);
                assert_eq!(scan_secs, 5);
            }
            other => panic!("unexpected transport {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_duplicates_and_zero_slots() {
        let dup = r#"
feeds = [
  { category = "A", url = "http://a" },
  { category = "A", url = "http://b" },
]
"#;
        let cfg = AppConfig::from_toml_str(dup).unwrap();
        assert!(cfg.validate().is_err());

        let cfg = AppConfig::from_toml_str("headline_slots = 0").unwrap();
        assert!(cfg.validate().is_err());

        let cfg = AppConfig::from_toml_str("feeds = []").unwrap();
        assert!(cfg.validate().is_err());

        let ble = "[transport]\nkind = \"ble\"\ncharacteristic = \"x\"";
        let cfg = AppConfig::from_toml_str(ble).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let cfg = AppConfig::from_toml_str("fetch_timeout_secs = 0").unwrap();
        assert!(cfg.validate().is_err());

        let cfg = AppConfig::from_toml_str("[debounce]\ndelivery_timeout_secs = 0").unwrap();
        assert!(cfg.validate().is_err());

        assert!(AppConfig::default().validate().is_ok());
    }
}
