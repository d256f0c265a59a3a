// src/mdns.rs
//! Zeroconf advertisement of the query API (`_news._tcp.local.`).

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use anyhow::Result;

use crate::config::MdnsConfig;

pub const SERVICE_TYPE: &str = "_news._tcp.local.";

/// Best-effort LAN address: the local side of a UDP "connection" to a public
/// address. No packet is sent. Falls back to loopback.
pub fn lan_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let sock = UdpSocket::bind(("0.0.0.0", 0))?;
        sock.connect(("8.8.8.8", 80))?;
        Ok(sock.local_addr()?.ip())
    };
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Live registration; call [`Advertisement::shutdown`] to withdraw it.
#[cfg_attr(not(feature = "mdns"), allow(dead_code))]
pub struct Advertisement {
    #[cfg(feature = "mdns")]
    daemon: mdns_sd::ServiceDaemon,
    #[cfg(feature = "mdns")]
    fullname: String,
}

#[cfg(feature = "mdns")]
pub fn advertise(cfg: &MdnsConfig, port: u16) -> Result<Option<Advertisement>> {
    use anyhow::Context;
    use mdns_sd::{ServiceDaemon, ServiceInfo};

    if !cfg.enabled {
        return Ok(None);
    }
    let ip = lan_ip().to_string();
    let daemon = ServiceDaemon::new().context("mdns: start daemon")?;
    let props = [("path", "/news")];
    let info = ServiceInfo::new(
        SERVICE_TYPE,
        &cfg.instance,
        &cfg.host,
        ip.as_str(),
        port,
        &props[..],
    )
    .context("mdns: build service info")?;
    let fullname = info.get_fullname().to_string();
    daemon.register(info).context("mdns: register")?;

    tracing::info!(
        service = %fullname,
        host = %cfg.host,
        %ip,
        port,
        "mdns advertising"
    );
    Ok(Some(Advertisement { daemon, fullname }))
}

#[cfg(not(feature = "mdns"))]
pub fn advertise(cfg: &MdnsConfig, _port: u16) -> Result<Option<Advertisement>> {
    if cfg.enabled {
        tracing::warn!("mdns enabled in config but built without feature `mdns`; skipping");
    }
    Ok(None)
}

impl Advertisement {
    pub fn shutdown(self) {
        #[cfg(feature = "mdns")]
        {
            tracing::info!(service = %self.fullname, "unregistering mdns service");
            if let Err(e) = self.daemon.unregister(&self.fullname) {
                tracing::warn!(error = %e, "mdns unregister");
            }
            if let Err(e) = self.daemon.shutdown() {
                tracing::warn!(error = %e, "mdns shutdown");
            }
        }
    }
}
