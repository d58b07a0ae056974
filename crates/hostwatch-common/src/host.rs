//! Identity of the monitored host, embedded in every notification.

use std::net::{IpAddr, UdpSocket};
use sysinfo::System;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub hostname: String,
    pub primary_ip: Option<IpAddr>,
}

impl HostIdentity {
    /// Resolve the current hostname and primary outbound IP.
    pub fn detect() -> Self {
        Self {
            hostname: hostname(),
            primary_ip: primary_local_ip(),
        }
    }

    pub fn display_ip(&self) -> String {
        self.primary_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

pub fn hostname() -> String {
    System::host_name().unwrap_or_else(|| "unknown-host".to_string())
}

/// Source address the kernel would pick for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only performs route selection.
pub fn primary_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    if let Err(e) = socket.connect("8.8.8.8:80") {
        tracing::debug!(error = %e, "No IPv4 route for primary IP detection");
        return None;
    }
    socket.local_addr().ok().map(|addr| addr.ip())
}
