//! Host-provided callbacks the engine depends on but does not implement:
//! interface enumeration and the link-layer send primitive.
//!
//! A concrete implementation (for real UDP sockets) lives in
//! [`crate::network::UdpHost`]; tests use a scripted fake instead.

use std::net::Ipv4Addr;

/// A local interface as the host reports it. All fields are zero for an
/// invalid index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterfaceInfo {
    pub ip: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub cost: u32,
    pub enabled: bool,
}

impl InterfaceInfo {
    pub fn subnet(&self) -> Ipv4Addr {
        let ip = u32::from(self.ip);
        let mask = u32::from(self.mask);
        Ipv4Addr::from(ip & mask)
    }
}

/// The callbacks the routing engine invokes under the lock. Every
/// method here must not call back into the core: these are leaf calls
/// from the engine's point of view.
pub trait Host: Send + Sync {
    /// Number of local interfaces.
    fn interface_count(&self) -> u32;

    /// Interface at `index`, or a zeroed/disabled [`InterfaceInfo`] if the
    /// index is out of range.
    fn get_interface(&self, index: u32) -> InterfaceInfo;

    /// Fire-and-forget send. `buf` is borrowed; implementations must copy
    /// it before returning if they need it past the call.
    fn send_payload(&self, dst_ip: Ipv4Addr, next_hop_ip: Ipv4Addr, outgoing_intf: u32, buf: &[u8]);
}

/// A scripted [`Host`] for engine and integration tests. Not behind
/// `#[cfg(test)]` since `tests/` compiles `ripd` as an ordinary
/// dependency and needs access to it too (mirrors `clock::test_support`).
pub mod test_support {
    use super::{Host, InterfaceInfo};
    use parking_lot::Mutex;
    use std::net::Ipv4Addr;

    /// A captured outbound datagram, for assertions in engine tests.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentDatagram {
        pub dst_ip: Ipv4Addr,
        pub next_hop_ip: Ipv4Addr,
        pub outgoing_intf: u32,
        pub buf: Vec<u8>,
    }

    /// A scripted host: a fixed interface table plus a record of every
    /// `send_payload` call, for scenario-style engine tests.
    pub struct FakeHost {
        interfaces: Vec<InterfaceInfo>,
        sent: Mutex<Vec<SentDatagram>>,
    }

    impl FakeHost {
        pub fn new(interfaces: Vec<InterfaceInfo>) -> Self {
            Self {
                interfaces,
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn sent(&self) -> Vec<SentDatagram> {
            self.sent.lock().clone()
        }

        pub fn clear_sent(&self) {
            self.sent.lock().clear();
        }

        pub fn set_interface(&mut self, index: u32, info: InterfaceInfo) {
            if let Some(slot) = self.interfaces.get_mut(index as usize) {
                *slot = info;
            }
        }
    }

    impl Host for FakeHost {
        fn interface_count(&self) -> u32 {
            self.interfaces.len() as u32
        }

        fn get_interface(&self, index: u32) -> InterfaceInfo {
            self.interfaces
                .get(index as usize)
                .copied()
                .unwrap_or_default()
        }

        fn send_payload(&self, dst_ip: Ipv4Addr, next_hop_ip: Ipv4Addr, outgoing_intf: u32, buf: &[u8]) {
            self.sent.lock().push(SentDatagram {
                dst_ip,
                next_hop_ip,
                outgoing_intf,
                buf: buf.to_vec(),
            });
        }
    }
}
