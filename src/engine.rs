//! The Protocol Engine: the state machine driving the routing table.
//!
//! Every function here is a free function over `&mut RoutingTable` and a
//! `&dyn Host`, so it carries no locking concerns of its own — `router.rs`
//! is the only place that acquires the engine's serialization primitive
//! before calling in. The rule lettering (A-F) and the periodic
//! advertise/age ordering are a direct, structure-preserving port of the
//! `safe_dr_handle_packet`, `safe_dr_handle_periodic`, and
//! `safe_dr_interface_changed` state machine this distance-vector logic
//! is descended from.

use crate::clock::Clock;
use crate::host::{Host, InterfaceInfo};
use crate::protocol::{RipEntry, RipPacket};
use crate::routing_table::{Route, RoutingTable};
use crate::INFINITY;
use log::{debug, trace, warn};
use std::net::Ipv4Addr;

/// Emit a single-entry RESPONSE for `entry` on every enabled interface,
/// addressed to the RIP multicast group for both destination and next hop.
fn broadcast(host: &dyn Host, entry: RipEntry) {
    let packet = RipPacket::response(entry);
    let bytes = packet.to_bytes();
    for i in 0..host.interface_count() {
        let intf = host.get_interface(i);
        if !intf.enabled {
            continue;
        }
        host.send_payload(
            crate::protocol::RIP_MULTICAST_ADDR,
            crate::protocol::RIP_MULTICAST_ADDR,
            i,
            &bytes,
        );
    }
}

fn route_entry(route: &Route, metric_override: Option<u32>) -> RipEntry {
    RipEntry::new(
        route.subnet,
        route.mask,
        route.next_hop_ip,
        metric_override.unwrap_or(route.cost),
        route.learned_from.unwrap_or(Ipv4Addr::UNSPECIFIED),
    )
}

/// An interface-down notice: `ip == next_hop == failed_ip`, metric
/// infinity. This is the distinguished sentinel rule D's receiver
/// recognizes as a link failure rather than an ordinary route.
fn interface_down_entry(failed_ip: Ipv4Addr) -> RipEntry {
    RipEntry::new(failed_ip, Ipv4Addr::UNSPECIFIED, failed_ip, INFINITY, Ipv4Addr::UNSPECIFIED)
}

fn local_interfaces(host: &dyn Host) -> Vec<(u32, InterfaceInfo)> {
    (0..host.interface_count())
        .map(|i| (i, host.get_interface(i)))
        .collect()
}

fn find_enabled_interface_for(host: &dyn Host, ip: Ipv4Addr) -> Option<(u32, InterfaceInfo)> {
    local_interfaces(host)
        .into_iter()
        .find(|(_, intf)| intf.enabled && intf.subnet() == mask_to(ip, intf.mask))
}

fn mask_to(ip: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) & u32::from(mask))
}

fn is_local_interface_ip(host: &dyn Host, ip: Ipv4Addr) -> bool {
    local_interfaces(host).iter().any(|(_, intf)| intf.ip == ip)
}

/// Seed the table from every currently enabled interface. Called once
/// from `RipCore::init`.
pub fn init(table: &mut RoutingTable, host: &dyn Host, clock: &dyn Clock) {
    let now = clock.now_ms();
    for (i, intf) in local_interfaces(host) {
        if !intf.enabled {
            continue;
        }
        table.insert_or_update(Route::origin(intf.subnet(), intf.mask, i, intf.cost, now));
    }
}

/// Look up the outgoing interface and next hop for a destination IP.
pub fn get_next_hop(table: &RoutingTable, ip: Ipv4Addr) -> (u32, Ipv4Addr) {
    table.get_next_hop(ip)
}

/// Advertise the current table, then sweep out stale routes.
pub fn handle_periodic(table: &mut RoutingTable, host: &dyn Host, clock: &dyn Clock, timeout_ms: u64) {
    advertise(table, host);
    age(table, host, clock, timeout_ms);
}

fn advertise(table: &RoutingTable, host: &dyn Host) {
    for route in table.iter() {
        let metric = if route.is_garbage { INFINITY } else { route.cost };
        broadcast(host, route_entry(route, Some(metric)));
    }
    // Disabled interfaces induce an interface-down broadcast on every
    // still-enabled interface, not just the one that went down, so every
    // neighbor learns about the failure regardless of which link it sits on.
    for (_, intf) in local_interfaces(host) {
        if !intf.enabled {
            broadcast(host, interface_down_entry(intf.ip));
        }
    }
}

fn age(table: &mut RoutingTable, host: &dyn Host, clock: &dyn Clock, timeout_ms: u64) {
    let removed = table.sweep_stale(clock, timeout_ms);
    for route in removed {
        debug!("route to {} aged out, broadcasting garbage", route.subnet);
        broadcast(host, route_entry(&route, Some(INFINITY)));
    }
}

/// Process one inbound RIP datagram, applying rules A-F in order.
pub fn handle_packet(
    table: &mut RoutingTable,
    host: &dyn Host,
    clock: &dyn Clock,
    src_ip: Ipv4Addr,
    _intf: u32,
    buf: &[u8],
) {
    let packet = match RipPacket::from_bytes(buf) {
        Ok(p) => p,
        Err(e) => {
            warn!("dropping malformed RIP datagram: {e}");
            return;
        }
    };
    if packet.command == crate::protocol::Command::Request {
        trace!("ignoring RIP request");
        return;
    }

    let u = src_ip;
    let v = packet.entry.ip;
    let mask_v = packet.entry.subnet_mask;
    let mut c_uv = packet.entry.metric;
    let now = clock.now_ms();

    // Rule A: split-horizon-with-poison-reverse.
    if is_local_interface_ip(host, packet.entry.learned_from) {
        c_uv = INFINITY;
    }

    // Rule B: interface-down notice.
    if packet.entry.ip == packet.entry.next_hop {
        let to_remove: Vec<Ipv4Addr> = table
            .iter()
            .filter(|r| r.next_hop_ip == v || r.subnet == v)
            .map(|r| r.subnet)
            .collect();
        for subnet in to_remove {
            if let Some(mut r) = table.find_by_subnet(subnet).cloned() {
                r.cost = INFINITY;
                broadcast(host, route_entry(&r, Some(INFINITY)));
                table.remove(subnet);
            }
        }
        broadcast(host, interface_down_entry(v));
        return;
    }

    // Rule C: locate here->u.
    let mut here_u: Option<Route>;
    if let Some(r) = table.find_by_subnet_mut(u) {
        r.last_updated = now;
        here_u = Some(r.clone());
    } else {
        here_u = None;
    }
    if here_u.is_none() && !is_local_interface_ip(host, v) {
        if let Some((intf_idx, intf)) = find_enabled_interface_for(host, u) {
            if intf.cost <= 15 {
                let synthesized = Route::origin(u, intf.mask, intf_idx, intf.cost, now);
                table.insert_or_update(synthesized.clone());
                broadcast(host, route_entry(&synthesized, None));
                here_u = Some(synthesized);
            }
        }
    }

    let u_intf = here_u.as_ref().map(|r| r.outgoing_intf);

    // Rule D: locate here->v.
    if let Some(r) = table.find_by_subnet_mut(v) {
        r.last_updated = now;
        if r.next_hop_ip == u && c_uv > 15 {
            let mut dead = r.clone();
            dead.cost = INFINITY;
            broadcast(host, route_entry(&dead, Some(INFINITY)));
            table.remove(v);
            return;
        }
    }

    if is_local_interface_ip(host, v) {
        return;
    }

    let here_u = match here_u {
        Some(r) => r,
        None => return,
    };
    let u_intf = match u_intf {
        Some(i) => i,
        None => return,
    };
    let c_here_u = here_u.cost;

    match table.find_by_subnet(v).cloned() {
        // Rule E: new destination.
        None => {
            let total = c_here_u.saturating_add(c_uv);
            if total <= 15 {
                let route = Route::learned(v, mask_v, u, u_intf, total, u, now);
                table.insert_or_update(route.clone());
                broadcast(host, route_entry(&route, None));
            }
        }
        // Rule F: Bellman-Ford relaxation, strict improvement only.
        Some(existing) => {
            let total = c_here_u.saturating_add(c_uv);
            if existing.cost > total {
                if let Some(r) = table.find_by_subnet_mut(v) {
                    r.cost = total;
                    r.outgoing_intf = u_intf;
                    r.next_hop_ip = u;
                    r.mask = here_u.mask;
                    r.learned_from = Some(u);
                    r.last_updated = now;
                    let updated = r.clone();
                    broadcast(host, route_entry(&updated, None));
                }
            }
        }
    }
}

/// React to a local interface being enabled, disabled, or re-costed.
pub fn interface_changed(
    table: &mut RoutingTable,
    host: &dyn Host,
    clock: &dyn Clock,
    intf: u32,
    state_changed: bool,
    cost_changed: bool,
) {
    let info = host.get_interface(intf);
    let now = clock.now_ms();

    if state_changed && info.enabled {
        let route = Route::origin(info.subnet(), info.mask, intf, info.cost, now);
        table.insert_or_update(route.clone());
        broadcast(host, route_entry(&route, None));
        return;
    }

    if state_changed && !info.enabled {
        broadcast(host, interface_down_entry(info.ip));
        for mut r in table.drain_by_interface(intf) {
            r.cost = INFINITY;
            broadcast(host, route_entry(&r, Some(INFINITY)));
        }
        return;
    }

    if cost_changed {
        for mut r in table.drain_by_interface(intf) {
            r.is_garbage = true;
            r.cost = INFINITY;
            broadcast(host, route_entry(&r, Some(INFINITY)));
        }
        let route = Route::origin(info.subnet(), info.mask, intf, info.cost, now);
        table.insert_or_update(route.clone());
        broadcast(host, route_entry(&route, None));
    }
}
