use reqwest::Client;
use std::time::Duration;

use super::{DeliveryError, Transport};
use crate::snapshot::Snapshot;

/// POSTs the snapshot JSON to a fixed device endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    url: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl HttpTransport {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Total attempts per delivery; 0 is treated as 1.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    fn classify(e: reqwest::Error) -> DeliveryError {
        if e.is_timeout() || e.is_connect() {
            DeliveryError::Unreachable(e.to_string())
        } else if e.is_status() {
            DeliveryError::Protocol(e.to_string())
        } else {
            DeliveryError::Other(anyhow::Error::new(e).context("http delivery"))
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, snapshot: &Snapshot) -> Result<(), DeliveryError> {
        let payload = snapshot.payload();

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await
                .and_then(|rsp| rsp.error_for_status());

            match res {
                Ok(_) => return Ok(()),
                Err(e) => {
                    if attempt < self.max_retries {
                        tracing::debug!(
                            target: "delivery",
                            attempt,
                            error = %e,
                            "http push failed, retrying"
                        );
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(Self::classify(e));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
