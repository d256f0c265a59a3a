// src/ingest/types.rs
use anyhow::Result;

/// One configured feed, bound to the display category it fills.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Item titles in source order (newest first for the feeds we poll).
    async fn fetch_titles(&self) -> Result<Vec<String>>;
    fn category(&self) -> &str;
}
