//! Socket-level collaborators for the network scanner.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use pnet::datalink;
use pnet::ipnetwork::IpNetwork;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::application::scanner::{InterfaceSource, PortProber};

/// Probes with a plain TCP connect.  The stream is dropped (closed) as soon
/// as the attempt resolves.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

#[async_trait]
impl PortProber for TcpProber {
    async fn probe(&self, target: SocketAddrV4, limit: Duration) -> bool {
        matches!(timeout(limit, TcpStream::connect(target)).await, Ok(Ok(_)))
    }
}

/// Reads interface addresses from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn ipv4_addresses(&self) -> Vec<Ipv4Addr> {
        datalink::interfaces()
            .into_iter()
            .filter(|iface| !iface.is_loopback())
            .flat_map(|iface| iface.ips)
            .filter_map(|ip| match ip {
                IpNetwork::V4(net) if !net.ip().is_loopback() => Some(net.ip()),
                _ => None,
            })
            .collect()
    }
}
