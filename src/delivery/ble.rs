// src/delivery/ble.rs
//! BLE GATT transport: discover by name/address, connect, chunked characteristic
//! write, disconnect. Built only with feature `ble`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{DeliveryError, Transport};
use crate::snapshot::Snapshot;

/// ATT header bytes subtracted from the MTU to get the write payload size.
const ATT_HEADER: usize = 3;

pub struct BleTransport {
    name: Option<String>,
    address: Option<String>,
    characteristic: Uuid,
    scan: Duration,
    chunk: usize,
    adapter: Mutex<Option<Adapter>>,
    // Peripheral of an attempt that may have been cut off by the delivery timeout.
    in_flight: Mutex<Option<Peripheral>>,
    // Set while a scan may still be running on the adapter.
    scanning: AtomicBool,
}

impl BleTransport {
    pub fn new(
        name: Option<String>,
        address: Option<String>,
        characteristic: &str,
        scan: Duration,
        mtu: usize,
    ) -> Result<Self> {
        let characteristic = Uuid::parse_str(characteristic)
            .with_context(|| format!("invalid characteristic uuid '{characteristic}'"))?;
        Ok(Self {
            name,
            address,
            characteristic,
            scan,
            chunk: mtu.saturating_sub(ATT_HEADER).max(1),
            adapter: Mutex::new(None),
            in_flight: Mutex::new(None),
            scanning: AtomicBool::new(false),
        })
    }

    async fn adapter(&self) -> Result<Adapter, DeliveryError> {
        let mut guard = self.adapter.lock().await;
        if let Some(a) = guard.as_ref() {
            return Ok(a.clone());
        }
        let manager = Manager::new()
            .await
            .map_err(|e| DeliveryError::Unreachable(format!("ble manager: {e}")))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| DeliveryError::Unreachable(format!("ble adapters: {e}")))?
            .into_iter()
            .next()
            .ok_or_else(|| DeliveryError::Unreachable("no bluetooth adapter found".into()))?;
        *guard = Some(adapter.clone());
        Ok(adapter)
    }

    async fn matches(&self, p: &Peripheral) -> bool {
        if let Some(addr) = &self.address {
            if p.address().to_string().eq_ignore_ascii_case(addr) {
                return true;
            }
        }
        if let Some(name) = &self.name {
            if let Ok(Some(props)) = p.properties().await {
                return props.local_name.as_deref() == Some(name.as_str());
            }
        }
        false
    }

    async fn discover(&self, central: &Adapter) -> Result<Peripheral, DeliveryError> {
        self.scanning.store(true, Ordering::SeqCst);
        central
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| DeliveryError::Unreachable(format!("ble scan: {e}")))?;
        tokio::time::sleep(self.scan).await;
        let found = central.peripherals().await;
        self.stop_scan(central).await;
        let found =
            found.map_err(|e| DeliveryError::Unreachable(format!("ble peripherals: {e}")))?;

        for p in found {
            if self.matches(&p).await {
                return Ok(p);
            }
        }
        Err(DeliveryError::Unreachable(format!(
            "no peripheral matching name={:?} address={:?}",
            self.name, self.address
        )))
    }

    async fn stop_scan(&self, central: &Adapter) {
        if self.scanning.swap(false, Ordering::SeqCst) {
            let _ = central.stop_scan().await;
        }
    }

    /// Undo whatever an earlier attempt cut off by the delivery timeout left
    /// behind: a running scan and a connected peripheral.
    async fn release_stale(&self) {
        if self.scanning.load(Ordering::SeqCst) {
            let central = self.adapter.lock().await.clone();
            match central {
                Some(c) => self.stop_scan(&c).await,
                None => self.scanning.store(false, Ordering::SeqCst),
            }
        }
        if let Some(p) = self.in_flight.lock().await.take() {
            let _ = p.disconnect().await;
        }
    }
}

#[async_trait::async_trait]
impl Transport for BleTransport {
    async fn deliver(&self, snapshot: &Snapshot) -> Result<(), DeliveryError> {
        let body = snapshot
            .to_json_bytes()
            .map_err(|e| DeliveryError::Other(anyhow::Error::new(e).context("encode payload")))?;

        self.release_stale().await;
        let central = self.adapter().await?;
        let peripheral = self.discover(&central).await?;

        *self.in_flight.lock().await = Some(peripheral.clone());
        peripheral
            .connect()
            .await
            .map_err(|e| DeliveryError::Unreachable(format!("ble connect: {e}")))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| DeliveryError::Protocol(format!("ble service discovery: {e}")))?;

        let ch = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == self.characteristic)
            .ok_or_else(|| {
                DeliveryError::Protocol(format!(
                    "characteristic {} not found on peripheral",
                    self.characteristic
                ))
            })?;

        for part in body.chunks(self.chunk) {
            peripheral
                .write(&ch, part, WriteType::WithResponse)
                .await
                .map_err(|e| DeliveryError::Protocol(format!("ble write: {e}")))?;
        }

        tracing::debug!(
            target: "delivery",
            bytes = body.len(),
            chunks = body.len().div_ceil(self.chunk),
            "ble write complete"
        );
        self.release_stale().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ble"
    }

    async fn close(&self) {
        self.release_stale().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_follows_mtu() {
        let uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";
        let t = BleTransport::new(Some("x".into()), None, uuid, Duration::ZERO, 23).unwrap();
        assert_eq!(t.chunk, 20);
        let t = BleTransport::new(Some("x".into()), None, uuid, Duration::ZERO, 2).unwrap();
        assert_eq!(t.chunk, 1);
    }

    #[test]
    fn rejects_bad_uuid() {
        assert!(BleTransport::new(None, None, "nope", Duration::ZERO, 23).is_err());
    }

    #[tokio::test]
    async fn release_clears_scan_flag_without_an_adapter() {
        let uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";
        let t = BleTransport::new(Some("x".into()), None, uuid, Duration::ZERO, 23).unwrap();
        t.scanning.store(true, Ordering::SeqCst);
        t.close().await;
        assert!(!t.scanning.load(Ordering::SeqCst));
    }
}
