// src/delivery/mod.rs
//! Device transports. Exactly one is active per deployment; the controller
//! only sees the `Transport` trait.

pub mod http;
pub mod log;
pub mod rfcomm;

#[cfg(feature = "ble")]
pub mod ble;

use std::time::Duration;

use anyhow::Result;

use crate::config::TransportConfig;
use crate::snapshot::Snapshot;

pub use self::http::HttpTransport;
pub use self::log::LogTransport;
pub use self::rfcomm::RfcommTransport;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("device unreachable: {0}")]
    Unreachable(String),
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeliveryError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Unreachable(_) => "unreachable",
            DeliveryError::Timeout(_) => "timeout",
            DeliveryError::Protocol(_) => "protocol",
            DeliveryError::Other(_) => "other",
        }
    }
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Push one snapshot to the device. May block on network/radio I/O.
    async fn deliver(&self, snapshot: &Snapshot) -> Result<(), DeliveryError>;

    fn name(&self) -> &'static str;

    /// Release any held connection. Called once at shutdown.
    async fn close(&self) {}
}

/// Build the configured transport.
pub fn from_config(cfg: &TransportConfig) -> Result<Box<dyn Transport>> {
    match cfg {
        TransportConfig::Http {
            url,
            timeout_secs,
            retries,
        } => Ok(Box::new(
            HttpTransport::new(url.clone())
                .with_timeout(*timeout_secs)
                .with_retries(*retries),
        )),
        TransportConfig::Rfcomm { device } => Ok(Box::new(RfcommTransport::new(device.clone()))),
        TransportConfig::Log => Ok(Box::new(LogTransport)),
        #[cfg(feature = "ble")]
        TransportConfig::Ble {
            name,
            address,
            characteristic,
            scan_secs,
            mtu,
        } => {
            let t = ble::BleTransport::new(
                name.clone(),
                address.clone(),
                characteristic,
                Duration::from_secs(*scan_secs),
                *mtu,
            )?;
            Ok(Box::new(t))
        }
        #[cfg(not(feature = "ble"))]
        TransportConfig::Ble { .. } => {
            anyhow::bail!("ble transport configured but headline-relay was built without feature `ble`")
        }
    }
}
