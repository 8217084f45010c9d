//! Local address discovery for LAN deployments

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use ipnet::IpNet;
use tokio::net::UdpSocket;
use tracing::debug;

/// Any routable address works; no packet is sent by `connect` on UDP
const ROUTE_PROBE: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(223, 5, 5, 5)), 53);

/// Address of the interface carrying the default route
pub async fn detect_lan_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.ok()?;
    if let Err(e) = socket.connect(ROUTE_PROBE).await {
        debug!("No default route for LAN address detection: {}", e);
        return None;
    }
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified() && !ip.is_loopback()).then_some(ip)
}

const PRIVATE_NETS: [&str; 4] = ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "fc00::/7"];

/// RFC1918 / unique-local check
pub fn is_private(ip: &IpAddr) -> bool {
    PRIVATE_NETS
        .iter()
        .filter_map(|net| net.parse::<IpNet>().ok())
        .any(|net| net.contains(ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_ranges() {
        for ip in ["10.1.2.3", "172.20.0.5", "192.168.1.20", "fd12::1"] {
            assert!(is_private(&ip.parse().unwrap()), "{} should be private", ip);
        }
        for ip in ["8.8.8.8", "172.32.0.1", "2001:db8::1"] {
            assert!(!is_private(&ip.parse().unwrap()), "{} should be public", ip);
        }
    }
}
