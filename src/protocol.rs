//! The fixed RIPv2 wire codec: one 4-byte header plus exactly one 20-byte
//! entry per datagram.
//!
//! This is a deliberate narrowing of standard RIP, which packs up to 25
//! entries per response (Q1 in the design notes): both the encoder and the
//! decoder here only ever handle a single entry. Trailing bytes on decode
//! are ignored rather than rejected, matching the header-then-first-entry
//! behavior the design mandates.

use crate::{RustRouteError, RustRouteResult, RIP_VERSION};
use std::net::Ipv4Addr;

pub const HEADER_LEN: usize = 4;
pub const ENTRY_LEN: usize = 20;
pub const DATAGRAM_LEN: usize = HEADER_LEN + ENTRY_LEN;

pub const RIP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 9);
pub const RIP_PORT: u16 = 520;

/// RIP command codes. The engine only ever emits `Response`; `Request` is
/// accepted on the wire but otherwise ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Request = 1,
    Response = 2,
}

impl Command {
    fn from_u8(value: u8) -> RustRouteResult<Self> {
        match value {
            1 => Ok(Command::Request),
            2 => Ok(Command::Response),
            other => Err(RustRouteError::ProtocolError(format!(
                "unsupported RIP command {other}"
            ))),
        }
    }
}

/// A single RIPv2 route entry, including the non-standard `learned_from`
/// extension this engine relies on for split-horizon-with-poison-reverse
/// (Q6: not interoperable with stock RIP without an out-of-band channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RipEntry {
    pub addr_family: u16,
    pub ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub next_hop: Ipv4Addr,
    pub metric: u32,
    pub learned_from: Ipv4Addr,
}

impl RipEntry {
    pub fn new(
        ip: Ipv4Addr,
        subnet_mask: Ipv4Addr,
        next_hop: Ipv4Addr,
        metric: u32,
        learned_from: Ipv4Addr,
    ) -> Self {
        Self {
            addr_family: 1,
            ip,
            subnet_mask,
            next_hop,
            metric,
            learned_from,
        }
    }

    fn encode(&self, buf: &mut [u8; ENTRY_LEN]) {
        buf[0..2].copy_from_slice(&self.addr_family.to_be_bytes());
        buf[2..4].copy_from_slice(&[0, 0]);
        buf[4..8].copy_from_slice(&self.ip.octets());
        buf[8..12].copy_from_slice(&self.subnet_mask.octets());
        buf[12..16].copy_from_slice(&self.next_hop.octets());
        buf[16..20].copy_from_slice(&self.metric.to_be_bytes());
        // learned_from rides in place of the standard route-tag + part of
        // the reserved space; see module docs (Q6).
    }

    fn decode(buf: &[u8]) -> RustRouteResult<(Self, Ipv4Addr)> {
        if buf.len() < ENTRY_LEN {
            return Err(RustRouteError::ProtocolError("entry too short".into()));
        }
        let addr_family = u16::from_be_bytes([buf[0], buf[1]]);
        let ip = Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]);
        let subnet_mask = Ipv4Addr::new(buf[8], buf[9], buf[10], buf[11]);
        let next_hop = Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]);
        let metric = u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]);
        let entry = Self {
            addr_family,
            ip,
            subnet_mask,
            next_hop,
            metric,
            learned_from: Ipv4Addr::UNSPECIFIED,
        };
        Ok((entry, Ipv4Addr::UNSPECIFIED))
    }
}

/// Header + single entry, the unit this engine sends and receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RipPacket {
    pub command: Command,
    pub version: u8,
    pub entry: RipEntry,
}

impl RipPacket {
    pub fn response(entry: RipEntry) -> Self {
        Self {
            command: Command::Response,
            version: RIP_VERSION,
            entry,
        }
    }

    /// Encode into a fixed-size 24-byte datagram, with `learned_from`
    /// packed into the 20-byte entry's extension field. This engine uses
    /// a 24-byte entry on the wire (20 standard bytes + 4-byte
    /// `learned_from`) rather than the standard 20-byte RIPv2 entry, since
    /// split-horizon-with-poison-reverse here depends on carrying it
    /// in-band (Q6).
    pub fn to_bytes(&self) -> [u8; HEADER_LEN + ENTRY_LEN + 4] {
        let mut buf = [0u8; HEADER_LEN + ENTRY_LEN + 4];
        buf[0] = self.command as u8;
        buf[1] = self.version;
        buf[2] = 0;
        buf[3] = 0;
        let mut entry_buf = [0u8; ENTRY_LEN];
        self.entry.encode(&mut entry_buf);
        buf[HEADER_LEN..HEADER_LEN + ENTRY_LEN].copy_from_slice(&entry_buf);
        buf[HEADER_LEN + ENTRY_LEN..].copy_from_slice(&self.entry.learned_from.octets());
        buf
    }

    /// Decode header + first entry. Bytes past `HEADER_LEN + ENTRY_LEN + 4`
    /// are ignored (Q1: no multi-entry support on either side).
    pub fn from_bytes(data: &[u8]) -> RustRouteResult<Self> {
        if data.len() < HEADER_LEN + ENTRY_LEN {
            return Err(RustRouteError::ProtocolError(
                "datagram shorter than header + entry".to_string(),
            ));
        }
        let command = Command::from_u8(data[0])?;
        let version = data[1];
        if version != RIP_VERSION {
            return Err(RustRouteError::ProtocolError(format!(
                "unsupported RIP version {version}"
            )));
        }
        let (mut entry, _) = RipEntry::decode(&data[HEADER_LEN..])?;
        if data.len() >= HEADER_LEN + ENTRY_LEN + 4 {
            let lf = &data[HEADER_LEN + ENTRY_LEN..HEADER_LEN + ENTRY_LEN + 4];
            entry.learned_from = Ipv4Addr::new(lf[0], lf[1], lf[2], lf[3]);
        }
        Ok(Self {
            command,
            version,
            entry,
        })
    }
}
