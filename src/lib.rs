//! ripd: a RIPv2 distance-vector routing engine core for a host router.
//!
//! This crate owns the routing table, the RIP input-processing state
//! machine, the periodic advertisement/timeout scheduler, and the
//! interface-change reactor. It does not own the link-layer transport:
//! that is supplied by a host implementing [`host::Host`].

pub mod clock;
pub mod cli;
pub mod config_manager;
pub mod engine;
pub mod host;
pub mod metrics;
pub mod network;
pub mod protocol;
pub mod router;
pub mod routing_table;

use std::error::Error;
use std::fmt;

/// Crate-wide error type for the protocol-facing surface.
#[derive(Debug)]
pub enum RustRouteError {
    NetworkError(String),
    RoutingError(String),
    ConfigError(String),
    ProtocolError(String),
    InvalidInput(String),
}

impl fmt::Display for RustRouteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustRouteError::NetworkError(msg) => write!(f, "Network Error: {}", msg),
            RustRouteError::RoutingError(msg) => write!(f, "Routing Error: {}", msg),
            RustRouteError::ConfigError(msg) => write!(f, "Config Error: {}", msg),
            RustRouteError::ProtocolError(msg) => write!(f, "Protocol Error: {}", msg),
            RustRouteError::InvalidInput(msg) => write!(f, "Invalid Input: {}", msg),
        }
    }
}

impl Error for RustRouteError {}

/// Result type for the protocol-facing surface.
pub type RustRouteResult<T> = Result<T, RustRouteError>;

/// RIP metric representing an unreachable destination.
pub const INFINITY: u32 = 16;
/// Default interval between periodic ticks.
pub const ADVERT_INTERVAL_SECS: u64 = 1;
/// Age past which a route is swept as stale.
pub const RIP_TIMEOUT_SECS: u64 = 20;
/// RIP protocol version this engine speaks.
pub const RIP_VERSION: u8 = 2;
