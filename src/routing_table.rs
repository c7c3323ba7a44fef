//! The routing table: a keyed collection of [`Route`] records plus the
//! lifecycle rules (insert-or-update, removal, longest-prefix lookup)
//! that the Protocol Engine drives.

use crate::clock::Clock;
use crate::INFINITY;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// A single routing table entry.
///
/// Field names and semantics follow the data model directly: a route with
/// `learned_from == None` is an origin (directly connected) record, with
/// `next_hop_ip == 0.0.0.0` and `outgoing_intf` naming the interface that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub subnet: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub next_hop_ip: Ipv4Addr,
    pub outgoing_intf: u32,
    pub cost: u32,
    pub learned_from: Option<Ipv4Addr>,
    pub last_updated: u64,
    pub is_garbage: bool,
}

impl Route {
    /// A directly connected ("origin") route: `next_hop_ip` and
    /// `learned_from` are both the zero value per invariant I3.
    pub fn origin(subnet: Ipv4Addr, mask: Ipv4Addr, outgoing_intf: u32, cost: u32, now_ms: u64) -> Self {
        Self {
            subnet,
            mask,
            next_hop_ip: Ipv4Addr::UNSPECIFIED,
            outgoing_intf,
            cost,
            learned_from: None,
            last_updated: now_ms,
            is_garbage: false,
        }
    }

    /// A route learned from a neighbor advertisement.
    pub fn learned(
        subnet: Ipv4Addr,
        mask: Ipv4Addr,
        next_hop_ip: Ipv4Addr,
        outgoing_intf: u32,
        cost: u32,
        learned_from: Ipv4Addr,
        now_ms: u64,
    ) -> Self {
        Self {
            subnet,
            mask,
            next_hop_ip,
            outgoing_intf,
            cost,
            learned_from: Some(learned_from),
            last_updated: now_ms,
            is_garbage: false,
        }
    }

    pub fn prefix_length(&self) -> u32 {
        u32::from(self.mask).count_ones()
    }

    pub fn matches(&self, ip: Ipv4Addr) -> bool {
        let ip = u32::from(ip);
        let mask = u32::from(self.mask);
        (ip & mask) == u32::from(self.subnet)
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_updated)
    }

    pub fn to_snapshot(&self) -> RouteSnapshot {
        RouteSnapshot {
            subnet: self.subnet.to_string(),
            mask: self.mask.to_string(),
            next_hop_ip: self.next_hop_ip.to_string(),
            outgoing_intf: self.outgoing_intf,
            cost: self.cost,
            learned_from: self.learned_from.map(|ip| ip.to_string()),
            is_garbage: self.is_garbage,
        }
    }
}

/// Serializable view of a [`Route`], used by metrics/CLI reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub subnet: String,
    pub mask: String,
    pub next_hop_ip: String,
    pub outgoing_intf: u32,
    pub cost: u32,
    pub learned_from: Option<String>,
    pub is_garbage: bool,
}

/// Sentinel returned by [`RoutingTable::longest_match`] and
/// [`RoutingTable::get_next_hop`] when no route matches.
pub const NO_ROUTE: (u32, Ipv4Addr) = (0, Ipv4Addr::new(255, 255, 255, 255));

/// The routing table. Keyed by `subnet` alone (invariant I4: no two
/// records share a subnet).
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: HashMap<Ipv4Addr, Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Insert a record, or overwrite every field of an existing record
    /// with the same subnet. Returns `true` if the subnet was new.
    pub fn insert_or_update(&mut self, route: Route) -> bool {
        self.routes.insert(route.subnet, route).is_none()
    }

    /// Remove the record for this subnet, if present. Idempotent.
    pub fn remove(&mut self, subnet: Ipv4Addr) -> bool {
        self.routes.remove(&subnet).is_some()
    }

    pub fn find_by_subnet(&self, subnet: Ipv4Addr) -> Option<&Route> {
        self.routes.get(&subnet)
    }

    pub fn find_by_subnet_mut(&mut self, subnet: Ipv4Addr) -> Option<&mut Route> {
        self.routes.get_mut(&subnet)
    }

    /// Longest-prefix match over every record whose `(ip & mask) == subnet`.
    /// Ties broken arbitrarily but consistently (by `HashMap` iteration,
    /// which is stable within an unmutated table).
    pub fn longest_match(&self, ip: Ipv4Addr) -> Option<&Route> {
        self.routes
            .values()
            .filter(|r| r.matches(ip))
            .max_by_key(|r| r.prefix_length())
    }

    /// `(outgoing_intf, next_hop_ip)` for the longest match, or the
    /// "no route" sentinel `(0, 255.255.255.255)`.
    pub fn get_next_hop(&self, ip: Ipv4Addr) -> (u32, Ipv4Addr) {
        match self.longest_match(ip) {
            Some(r) => (r.outgoing_intf, r.next_hop_ip),
            None => NO_ROUTE,
        }
    }

    /// Visit every record. Safe to combine with [`RoutingTable::remove`]
    /// on the id just yielded, since this collects keys up front rather
    /// than holding a live iterator into the map.
    pub fn subnets(&self) -> Vec<Ipv4Addr> {
        self.routes.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn snapshot(&self) -> Vec<RouteSnapshot> {
        self.routes.values().map(Route::to_snapshot).collect()
    }

    pub fn stats(&self) -> RoutingTableStatistics {
        let mut stats = RoutingTableStatistics::default();
        stats.total_routes = self.routes.len();
        for route in self.routes.values() {
            if route.learned_from.is_none() {
                stats.origin_routes += 1;
            } else {
                stats.learned_routes += 1;
            }
            if route.is_garbage || route.cost >= INFINITY {
                stats.garbage_routes += 1;
            }
        }
        stats
    }

    /// Remove every route whose `outgoing_intf` matches, returning the
    /// removed records. Used by `interface_changed`'s disable/cost-change
    /// branches; collects subnets first so the map is never mutated while
    /// an iterator over it is live (Q4: removal-safe traversal).
    pub fn drain_by_interface(&mut self, intf: u32) -> Vec<Route> {
        let subnets: Vec<Ipv4Addr> = self
            .routes
            .iter()
            .filter(|(_, r)| r.outgoing_intf == intf)
            .map(|(s, _)| *s)
            .collect();
        subnets
            .into_iter()
            .filter_map(|s| self.routes.remove(&s))
            .collect()
    }

    pub fn print_table(&self) -> comfy_table::Table {
        use comfy_table::{presets::UTF8_FULL, Cell, Table};
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Subnet", "Mask", "Next Hop", "Cost", "Interface", "Learned From"]);
        for route in self.routes.values() {
            table.add_row(vec![
                Cell::new(route.subnet),
                Cell::new(route.mask),
                Cell::new(route.next_hop_ip),
                Cell::new(route.cost),
                Cell::new(route.outgoing_intf),
                Cell::new(
                    route
                        .learned_from
                        .map(|ip| ip.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ]);
        }
        table
    }

    /// Sweep the table for routes older than `timeout_ms`, marking each
    /// garbage and returning the removed records so the caller can
    /// broadcast them with metric = infinity before they are gone.
    pub fn sweep_stale(&mut self, clock: &dyn Clock, timeout_ms: u64) -> Vec<Route> {
        let now = clock.now_ms();
        let stale: Vec<Ipv4Addr> = self
            .routes
            .iter()
            .filter(|(_, r)| r.age_ms(now) > timeout_ms)
            .map(|(s, _)| *s)
            .collect();
        let mut removed = Vec::with_capacity(stale.len());
        for subnet in stale {
            if let Some(mut r) = self.routes.remove(&subnet) {
                r.is_garbage = true;
                r.cost = INFINITY;
                removed.push(r);
            }
        }
        removed
    }
}

/// Aggregate counts used by metrics reporting and the CLI.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RoutingTableStatistics {
    pub total_routes: usize,
    pub origin_routes: usize,
    pub learned_routes: usize,
    pub garbage_routes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::MockClock;

    fn net(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
        Ipv4Addr::new(a, b, c, d)
    }

    #[test]
    fn insert_or_update_reports_newness() {
        let mut table = RoutingTable::new();
        let route = Route::origin(net(10, 0, 0, 0), net(255, 255, 255, 0), 1, 1, 0);
        assert!(table.insert_or_update(route.clone()));
        assert!(!table.insert_or_update(route));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn overwrite_replaces_every_field() {
        let mut table = RoutingTable::new();
        table.insert_or_update(Route::origin(net(10, 0, 0, 0), net(255, 255, 255, 0), 1, 1, 0));
        table.insert_or_update(Route::learned(
            net(10, 0, 0, 0),
            net(255, 255, 255, 0),
            net(10, 0, 0, 2),
            2,
            4,
            net(10, 0, 0, 2),
            100,
        ));
        let r = table.find_by_subnet(net(10, 0, 0, 0)).unwrap();
        assert_eq!(r.cost, 4);
        assert_eq!(r.outgoing_intf, 2);
        assert_eq!(r.learned_from, Some(net(10, 0, 0, 2)));
    }

    #[test]
    fn longest_prefix_wins_over_shorter_match() {
        let mut table = RoutingTable::new();
        table.insert_or_update(Route::origin(net(10, 0, 0, 0), net(255, 0, 0, 0), 1, 1, 0));
        table.insert_or_update(Route::origin(net(10, 0, 1, 0), net(255, 255, 255, 0), 2, 1, 0));
        let best = table.longest_match(net(10, 0, 1, 5)).unwrap();
        assert_eq!(best.subnet, net(10, 0, 1, 0));
        assert_eq!(best.prefix_length(), 24);
    }

    #[test]
    fn no_match_returns_sentinel() {
        let table = RoutingTable::new();
        assert_eq!(table.get_next_hop(net(192, 168, 1, 1)), NO_ROUTE);
    }

    #[test]
    fn drain_by_interface_removes_only_matching_routes() {
        let mut table = RoutingTable::new();
        table.insert_or_update(Route::origin(net(10, 0, 0, 0), net(255, 255, 255, 0), 1, 1, 0));
        table.insert_or_update(Route::origin(net(10, 0, 1, 0), net(255, 255, 255, 0), 2, 1, 0));
        let drained = table.drain_by_interface(1);
        assert_eq!(drained.len(), 1);
        assert_eq!(table.len(), 1);
        assert!(table.find_by_subnet(net(10, 0, 1, 0)).is_some());
    }

    #[test]
    fn sweep_stale_marks_and_removes_aged_routes() {
        let clock = MockClock::new();
        let mut table = RoutingTable::new();
        table.insert_or_update(Route::origin(net(10, 0, 0, 0), net(255, 255, 255, 0), 1, 1, 0));
        clock.advance_ms(25_000);
        let removed = table.sweep_stale(&clock, 20_000);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].cost, INFINITY);
        assert!(removed[0].is_garbage);
        assert!(table.is_empty());
    }

    #[test]
    fn sweep_stale_leaves_fresh_routes_untouched() {
        let clock = MockClock::new();
        let mut table = RoutingTable::new();
        table.insert_or_update(Route::origin(net(10, 0, 0, 0), net(255, 255, 255, 0), 1, 1, 0));
        clock.advance_ms(5_000);
        let removed = table.sweep_stale(&clock, 20_000);
        assert!(removed.is_empty());
        assert_eq!(table.len(), 1);
    }
}
