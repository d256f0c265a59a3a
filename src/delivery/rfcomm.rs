use std::path::PathBuf;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{DeliveryError, Transport};
use crate::snapshot::Snapshot;

/// Bluetooth classic serial link, exposed by the kernel as a TTY once bound
/// (`rfcomm bind 0 <addr> <channel>` → `/dev/rfcomm0`).
///
/// Each delivery writes one newline-terminated JSON document. The handle is
/// kept open between deliveries and dropped after any error so the next
/// attempt reconnects.
pub struct RfcommTransport {
    device: PathBuf,
    conn: Mutex<Option<File>>,
}

impl RfcommTransport {
    pub fn new(device: PathBuf) -> Self {
        Self {
            device,
            conn: Mutex::new(None),
        }
    }

    async fn open(&self) -> Result<File, DeliveryError> {
        OpenOptions::new()
            .append(true)
            .open(&self.device)
            .await
            .map_err(|e| {
                DeliveryError::Unreachable(format!("open {}: {e}", self.device.display()))
            })
    }
}

#[async_trait::async_trait]
impl Transport for RfcommTransport {
    async fn deliver(&self, snapshot: &Snapshot) -> Result<(), DeliveryError> {
        let mut body = snapshot
            .to_json_bytes()
            .map_err(|e| DeliveryError::Other(anyhow::Error::new(e).context("encode payload")))?;
        body.push(b'\n');

        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.open().await?);
            tracing::debug!(target: "delivery", device = %self.device.display(), "rfcomm connected");
        }

        let res = match guard.as_mut() {
            Some(file) => match file.write_all(&body).await {
                Ok(()) => file.flush().await,
                Err(e) => Err(e),
            },
            None => return Err(DeliveryError::Unreachable("rfcomm link not open".into())),
        };

        if let Err(e) = res {
            // Stale link; reopen on the next attempt.
            *guard = None;
            return Err(DeliveryError::Protocol(format!(
                "write {}: {e}",
                self.device.display()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rfcomm"
    }

    async fn close(&self) {
        if self.conn.lock().await.take().is_some() {
            tracing::info!(target: "delivery", device = %self.device.display(), "rfcomm link closed");
        }
    }
}
