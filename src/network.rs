//! `UdpHost`: the default [`crate::host::Host`] implementation, speaking
//! the RIPv2 wire format over real UDP sockets joined to the RIP
//! multicast group on each configured interface.
//!
//! This is a host, not part of the core: the engine only ever depends on
//! the `Host` trait. Everything here is synchronous by construction,
//! matching the core's blocking-thread concurrency model —
//! `std::net::UdpSocket` rather than an async socket, with one blocking
//! receive thread per interface feeding `RipCore::handle_packet`
//! directly.

use crate::host::{Host, InterfaceInfo};
use crate::protocol::{ENTRY_LEN, HEADER_LEN, RIP_MULTICAST_ADDR};
use crate::router::RipCore;
use crate::{RustRouteError, RustRouteResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Static, on-disk shape of one interface before a socket is bound to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub name: String,
    pub ip_address: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub port: u16,
    pub cost: u32,
    pub enabled: bool,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            name: "eth0".to_string(),
            ip_address: Ipv4Addr::new(192, 168, 1, 1),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            port: crate::protocol::RIP_PORT,
            cost: 1,
            enabled: true,
        }
    }
}

struct BoundInterface {
    name: String,
    ip: Ipv4Addr,
    mask: Ipv4Addr,
    cost: u32,
    enabled: bool,
    socket: Arc<UdpSocket>,
}

/// The running transport: one bound, multicast-joined socket per
/// configured interface, indexed by position (the engine's
/// `outgoing_intf` is this index).
pub struct UdpHost {
    interfaces: RwLock<Vec<BoundInterface>>,
}

impl UdpHost {
    pub fn bind(configs: &[InterfaceConfig]) -> RustRouteResult<Arc<Self>> {
        let mut interfaces = Vec::with_capacity(configs.len());
        for cfg in configs {
            let bind_addr = SocketAddr::new(IpAddr::V4(cfg.ip_address), cfg.port);
            let socket = UdpSocket::bind(bind_addr).map_err(|e| {
                RustRouteError::NetworkError(format!(
                    "failed to bind {} on {}: {}",
                    cfg.name, bind_addr, e
                ))
            })?;
            socket
                .join_multicast_v4(&RIP_MULTICAST_ADDR, &cfg.ip_address)
                .map_err(|e| {
                    RustRouteError::NetworkError(format!(
                        "failed to join multicast on {}: {}",
                        cfg.name, e
                    ))
                })?;
            log::info!(
                "interface {} bound on {}:{}, joined {}",
                cfg.name,
                cfg.ip_address,
                cfg.port,
                RIP_MULTICAST_ADDR
            );
            interfaces.push(BoundInterface {
                name: cfg.name.clone(),
                ip: cfg.ip_address,
                mask: cfg.subnet_mask,
                cost: cfg.cost,
                enabled: cfg.enabled,
                socket: Arc::new(socket),
            });
        }
        Ok(Arc::new(Self {
            interfaces: RwLock::new(interfaces),
        }))
    }

    /// Mark an interface enabled/disabled, returning whether the state
    /// actually changed (callers use this to decide whether to invoke
    /// `RipCore::interface_changed`).
    pub fn set_enabled(&self, index: u32, enabled: bool) -> bool {
        let mut guard = self.interfaces.write();
        if let Some(intf) = guard.get_mut(index as usize) {
            let changed = intf.enabled != enabled;
            intf.enabled = enabled;
            changed
        } else {
            false
        }
    }

    pub fn set_cost(&self, index: u32, cost: u32) -> bool {
        let mut guard = self.interfaces.write();
        if let Some(intf) = guard.get_mut(index as usize) {
            let changed = intf.cost != cost;
            intf.cost = cost;
            changed
        } else {
            false
        }
    }

    /// Spawn one blocking receive thread per interface, feeding decoded
    /// datagrams into `core.handle_packet`.
    pub fn spawn_receive_threads(self: &Arc<Self>, core: Arc<RipCore>) -> Vec<JoinHandle<()>> {
        let sockets: Vec<(u32, String, Arc<UdpSocket>)> = self
            .interfaces
            .read()
            .iter()
            .enumerate()
            .map(|(i, intf)| (i as u32, intf.name.clone(), Arc::clone(&intf.socket)))
            .collect();

        sockets
            .into_iter()
            .map(|(index, name, socket)| {
                let core = Arc::clone(&core);
                std::thread::Builder::new()
                    .name(format!("rip-recv-{name}"))
                    .spawn(move || {
                        let mut buf = [0u8; HEADER_LEN + ENTRY_LEN + 4 + 32];
                        loop {
                            match socket.recv_from(&mut buf) {
                                Ok((n, SocketAddr::V4(src))) => {
                                    core.handle_packet(*src.ip(), index, &buf[..n]);
                                }
                                Ok((_, SocketAddr::V6(_))) => {
                                    log::warn!("ignoring IPv6 sender on interface {name}");
                                }
                                Err(e) => {
                                    log::warn!("recv error on interface {name}: {e}");
                                    break;
                                }
                            }
                        }
                    })
                    .expect("failed to spawn receive thread")
            })
            .collect()
    }
}

impl Host for UdpHost {
    fn interface_count(&self) -> u32 {
        self.interfaces.read().len() as u32
    }

    fn get_interface(&self, index: u32) -> InterfaceInfo {
        self.interfaces
            .read()
            .get(index as usize)
            .map(|intf| InterfaceInfo {
                ip: intf.ip,
                mask: intf.mask,
                cost: intf.cost,
                enabled: intf.enabled,
            })
            .unwrap_or_default()
    }

    fn send_payload(&self, dst_ip: Ipv4Addr, _next_hop_ip: Ipv4Addr, outgoing_intf: u32, buf: &[u8]) {
        let guard = self.interfaces.read();
        let Some(intf) = guard.get(outgoing_intf as usize) else {
            return;
        };
        let target = SocketAddr::new(IpAddr::V4(dst_ip), intf.socket.local_addr().map(|a| a.port()).unwrap_or(crate::protocol::RIP_PORT));
        if let Err(e) = intf.socket.send_to(buf, target) {
            log::warn!("send_payload failed on interface {}: {}", intf.name, e);
        }
    }
}

/// Utility functions for mask/prefix conversions, used by the CLI and
/// config validation.
pub mod utils {
    use std::net::Ipv4Addr;

    pub fn mask_to_prefix_length(mask: Ipv4Addr) -> u8 {
        u32::from(mask).count_ones() as u8
    }

    pub fn prefix_length_to_mask(prefix_len: u8) -> Ipv4Addr {
        if prefix_len == 0 {
            Ipv4Addr::new(0, 0, 0, 0)
        } else if prefix_len >= 32 {
            Ipv4Addr::new(255, 255, 255, 255)
        } else {
            let mask = !((1u32 << (32 - prefix_len)) - 1);
            Ipv4Addr::from(mask)
        }
    }

    pub fn in_same_subnet(ip1: Ipv4Addr, ip2: Ipv4Addr, mask: Ipv4Addr) -> bool {
        (u32::from(ip1) & u32::from(mask)) == (u32::from(ip2) & u32::from(mask))
    }
}

#[cfg(test)]
mod tests {
    use super::utils::*;
    use std::net::Ipv4Addr;

    #[test]
    fn prefix_conversion_round_trips() {
        assert_eq!(mask_to_prefix_length(Ipv4Addr::new(255, 255, 255, 0)), 24);
        assert_eq!(prefix_length_to_mask(24), Ipv4Addr::new(255, 255, 255, 0));
    }

    #[test]
    fn same_subnet_check() {
        let mask = Ipv4Addr::new(255, 255, 255, 0);
        assert!(in_same_subnet(
            Ipv4Addr::new(192, 168, 1, 10),
            Ipv4Addr::new(192, 168, 1, 20),
            mask
        ));
        assert!(!in_same_subnet(
            Ipv4Addr::new(192, 168, 1, 10),
            Ipv4Addr::new(192, 168, 2, 20),
            mask
        ));
    }
}
