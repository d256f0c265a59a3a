use super::{DeliveryError, Transport};
use crate::snapshot::Snapshot;

/// Dry-run transport: logs what would be pushed.
pub struct LogTransport;

#[async_trait::async_trait]
impl Transport for LogTransport {
    async fn deliver(&self, snapshot: &Snapshot) -> Result<(), DeliveryError> {
        let body = snapshot
            .to_json_bytes()
            .map_err(|e| DeliveryError::Other(anyhow::Error::new(e).context("encode payload")))?;
        tracing::info!(
            target: "delivery",
            bytes = body.len(),
            categories = snapshot.headlines.len(),
            "dry-run push (log transport)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
