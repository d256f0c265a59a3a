// src/snapshot.rs
//! Headline snapshot types and the content fingerprint used for change detection.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Headlines kept per category unless configured otherwise.
pub const DEFAULT_HEADLINE_SLOTS: usize = 10;

/// Display format of the payload timestamp (local time, minute precision).
pub const PAYLOAD_TS_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Headline lists per category, in configured (insertion) order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headlines {
    entries: Vec<(String, Vec<String>)>,
}

impl Headlines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a category. A repeated category replaces the earlier list in place.
    pub fn insert(&mut self, category: impl Into<String>, titles: Vec<String>) {
        let category = category.into();
        match self.entries.iter_mut().find(|(c, _)| *c == category) {
            Some((_, slot)) => *slot = titles,
            None => self.entries.push((category, titles)),
        }
    }

    pub fn get(&self, category: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, v)| v.as_slice())
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Digest over the content only, with categories in sorted order.
    pub fn fingerprint(&self) -> ContentFingerprint {
        use sha2::{Digest, Sha256};

        let canonical: BTreeMap<&str, &[String]> = self.iter().collect();
        // BTreeMap of strings always serializes; fall back to Debug just in case.
        let bytes = serde_json::to_vec(&canonical)
            .unwrap_or_else(|_| format!("{canonical:?}").into_bytes());

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hasher.finalize();

        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        ContentFingerprint(out)
    }
}

impl Serialize for Headlines {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (category, titles) in &self.entries {
            map.serialize_entry(category, titles)?;
        }
        map.end()
    }
}

/// Hex SHA-256 of the canonicalized headlines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, enough for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub headlines: Headlines,
}

/// Wire body shared by every transport and by `GET /news`.
#[derive(Debug, serde::Serialize)]
pub struct SnapshotPayload<'a> {
    pub timestamp: String,
    pub headlines: &'a Headlines,
}

impl Snapshot {
    pub fn fingerprint(&self) -> ContentFingerprint {
        self.headlines.fingerprint()
    }

    pub fn payload(&self) -> SnapshotPayload<'_> {
        SnapshotPayload {
            timestamp: self
                .captured_at
                .with_timezone(&Local)
                .format(PAYLOAD_TS_FORMAT)
                .to_string(),
            headlines: &self.headlines,
        }
    }

    /// JSON-encoded payload bytes, as written by the transports.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.payload())
    }
}

/// Truncate to `slots` and right-pad with empty strings.
pub fn pad_titles(mut titles: Vec<String>, slots: usize) -> Vec<String> {
    titles.truncate(slots);
    titles.resize(slots, String::new());
    titles
}
