//! End-to-end convergence scenarios over a simulated three-router line:
//!
//!   A ---- B ---- C
//!   10.0.0.0/24   10.0.1.0/24   10.0.2.0/24 (stub at C)
//!
//! All link costs are 1. Each router is driven directly through
//! `ripd::engine`'s free functions against its own `RoutingTable` and a
//! scripted `FakeHost`; datagrams a router broadcasts are forwarded by
//! hand between the simulated links, since there is no real transport in
//! this test.

use ripd::clock::test_support::MockClock;
use ripd::engine;
use ripd::host::test_support::{FakeHost, SentDatagram};
use ripd::host::InterfaceInfo;
use ripd::routing_table::RoutingTable;
use std::net::Ipv4Addr;

fn intf(ip: [u8; 4], mask: [u8; 4], cost: u32, enabled: bool) -> InterfaceInfo {
    InterfaceInfo {
        ip: Ipv4Addr::from(ip),
        mask: Ipv4Addr::from(mask),
        cost,
        enabled,
    }
}

/// One simulated router: its own table, host, and clock. Clocks are kept
/// separate per router (as they would be on separate machines) but
/// advanced in lockstep by the test driver.
struct Node {
    table: RoutingTable,
    host: FakeHost,
    clock: MockClock,
}

impl Node {
    fn new(interfaces: Vec<InterfaceInfo>) -> Self {
        let clock = MockClock::new();
        let mut table = RoutingTable::new();
        let host = FakeHost::new(interfaces);
        engine::init(&mut table, &host, &clock);
        Self { table, host, clock }
    }

    fn tick(&mut self, timeout_ms: u64) {
        engine::handle_periodic(&mut self.table, &self.host, &self.clock, timeout_ms);
    }

    fn sent(&self) -> Vec<SentDatagram> {
        self.host.sent()
    }

    fn clear_sent(&self) {
        self.host.clear_sent();
    }
}

/// Deliver every datagram `from` broadcast on `from_out_intf` into `to`,
/// arriving on `to_in_intf` from `sender_ip`.
fn forward(from: &[SentDatagram], from_out_intf: u32, to: &mut Node, to_in_intf: u32, sender_ip: Ipv4Addr) {
    for dgram in from.iter().filter(|d| d.outgoing_intf == from_out_intf) {
        engine::handle_packet(&mut to.table, &to.host, &to.clock, sender_ip, to_in_intf, &dgram.buf);
    }
}

const TIMEOUT_MS: u64 = 20_000;

fn net(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
    Ipv4Addr::new(a, b, c, d)
}

/// Build the A-B-C line. Interface indices:
///   A: 0 -> B
///   B: 0 -> A, 1 -> C
///   C: 0 -> B, 1 -> stub (10.0.2.0/24)
fn build_line() -> (Node, Node, Node) {
    let a = Node::new(vec![intf([10, 0, 0, 1], [255, 255, 255, 0], 1, true)]);
    let b = Node::new(vec![
        intf([10, 0, 0, 2], [255, 255, 255, 0], 1, true),
        intf([10, 0, 1, 1], [255, 255, 255, 0], 1, true),
    ]);
    let c = Node::new(vec![
        intf([10, 0, 1, 2], [255, 255, 255, 0], 1, true),
        intf([10, 0, 2, 1], [255, 255, 255, 0], 1, true),
    ]);
    (a, b, c)
}

/// Run one synchronized tick across all three routers, then exchange
/// every resulting datagram across both links.
fn tick_and_exchange(a: &mut Node, b: &mut Node, c: &mut Node) {
    a.clear_sent();
    b.clear_sent();
    c.clear_sent();
    a.tick(TIMEOUT_MS);
    b.tick(TIMEOUT_MS);
    c.tick(TIMEOUT_MS);

    let a_sent = a.sent();
    let b_sent = b.sent();
    let c_sent = c.sent();

    forward(&a_sent, 0, b, 0, net(10, 0, 0, 1));
    forward(&b_sent, 0, a, 0, net(10, 0, 0, 2));
    forward(&b_sent, 1, c, 0, net(10, 0, 1, 1));
    forward(&c_sent, 0, b, 1, net(10, 0, 1, 2));
}

#[test]
fn s1_cold_convergence() {
    let (mut a, mut b, mut c) = build_line();

    for _ in 0..3 {
        tick_and_exchange(&mut a, &mut b, &mut c);
    }

    let to_bc = a.table.find_by_subnet(net(10, 0, 1, 0)).expect("route to B-C subnet");
    assert_eq!(to_bc.cost, 2);
    assert_eq!(to_bc.next_hop_ip, net(10, 0, 0, 2));

    let to_stub = a.table.find_by_subnet(net(10, 0, 2, 0)).expect("route to C's stub");
    assert_eq!(to_stub.cost, 3);
    assert_eq!(to_stub.next_hop_ip, net(10, 0, 0, 2));
}

#[test]
fn s2_link_failure_removes_far_side_routes() {
    let (mut a, mut b, mut c) = build_line();
    for _ in 0..3 {
        tick_and_exchange(&mut a, &mut b, &mut c);
    }
    assert!(a.table.find_by_subnet(net(10, 0, 1, 0)).is_some());

    // Sever A-B: disable A's interface toward B and tell the engine.
    let mut disabled_host = FakeHost::new(vec![intf([10, 0, 0, 1], [255, 255, 255, 0], 1, false)]);
    std::mem::swap(&mut a.host, &mut disabled_host);
    engine::interface_changed(&mut a.table, &a.host, &a.clock, 0, true, false);

    assert!(a.table.find_by_subnet(net(10, 0, 1, 0)).is_none());
    assert_eq!(
        engine::get_next_hop(&a.table, net(10, 0, 1, 1)),
        ripd::routing_table::NO_ROUTE
    );
}

#[test]
fn s3_count_to_infinity_guard_via_split_horizon() {
    let (mut a, mut b, mut c) = build_line();
    for _ in 0..3 {
        tick_and_exchange(&mut a, &mut b, &mut c);
    }

    // C re-advertises a route to A's subnet back toward B, claiming it
    // learned it from B (which is true — but split horizon must poison it
    // at B's receiver regardless of what C's metric says).
    let entry = ripd::protocol::RipEntry::new(
        net(10, 0, 0, 0),
        net(255, 255, 255, 0),
        Ipv4Addr::UNSPECIFIED,
        2,
        net(10, 0, 1, 1), // B's own interface IP: poison trigger
    );
    let bytes = ripd::protocol::RipPacket::response(entry).to_bytes();
    engine::handle_packet(&mut b.table, &b.host, &b.clock, net(10, 0, 1, 2), 1, &bytes);

    let route = b.table.find_by_subnet(net(10, 0, 0, 0)).expect("B must still have a route to A's subnet");
    assert_eq!(route.cost, 1, "B's existing direct route must not be displaced by the poisoned offer");
}

#[test]
fn s4_triggered_update_on_cost_change() {
    // Two routers: A <-> B, where B also originates a stub subnet on a
    // second interface at cost 5. A learns that stub through B. Lowering
    // B's interface cost to 1 must purge and re-broadcast within one
    // tick, and A must relax to the cheaper path in the same exchange.
    let mut a = Node::new(vec![intf([10, 0, 0, 1], [255, 255, 255, 0], 1, true)]);
    let mut b = Node::new(vec![
        intf([10, 0, 0, 2], [255, 255, 255, 0], 1, true),
        intf([10, 0, 9, 1], [255, 255, 255, 0], 5, true),
    ]);

    for _ in 0..3 {
        tick_and_exchange_two(&mut a, &mut b);
    }
    let before = a.table.find_by_subnet(net(10, 0, 9, 0)).expect("A must have learned B's stub");
    assert_eq!(before.cost, 6, "1 (A-B link) + 5 (B's stub interface cost)");

    let mut cheaper_host = FakeHost::new(vec![
        intf([10, 0, 0, 2], [255, 255, 255, 0], 1, true),
        intf([10, 0, 9, 1], [255, 255, 255, 0], 1, true),
    ]);
    std::mem::swap(&mut b.host, &mut cheaper_host);
    b.clear_sent();
    engine::interface_changed(&mut b.table, &b.host, &b.clock, 1, false, true);
    assert!(!b.sent().is_empty(), "a cost change must trigger at least one broadcast");

    let b_sent = b.sent();
    a.clear_sent();
    forward(&b_sent, 0, &mut a, 0, net(10, 0, 0, 2));

    let relaxed = a.table.find_by_subnet(net(10, 0, 9, 0)).unwrap();
    assert_eq!(relaxed.cost, 2, "A must relax to the cheaper path within the same exchange");
}

fn tick_and_exchange_two(a: &mut Node, b: &mut Node) {
    a.clear_sent();
    b.clear_sent();
    a.tick(TIMEOUT_MS);
    b.tick(TIMEOUT_MS);
    let a_sent = a.sent();
    let b_sent = b.sent();
    forward(&a_sent, 0, b, 0, net(10, 0, 0, 1));
    forward(&b_sent, 0, a, 0, net(10, 0, 0, 2));
}

#[test]
fn s6_equal_cost_offers_do_not_flap() {
    // A has two neighbors, B on interface 0 and C on interface 1, both at
    // link cost 1. Both advertise the same stub subnet at cost 1, so the
    // total cost via either is 2. Whichever arrives first must stick.
    let mut a = Node::new(vec![
        intf([10, 0, 0, 1], [255, 255, 255, 0], 1, true),
        intf([10, 0, 1, 1], [255, 255, 255, 0], 1, true),
    ]);

    let entry = ripd::protocol::RipEntry::new(
        net(10, 0, 9, 0),
        net(255, 255, 255, 0),
        Ipv4Addr::UNSPECIFIED,
        1,
        Ipv4Addr::UNSPECIFIED,
    );
    let bytes = ripd::protocol::RipPacket::response(entry).to_bytes();

    // B, on interface 0, is accepted first.
    engine::handle_packet(&mut a.table, &a.host, &a.clock, net(10, 0, 0, 2), 0, &bytes);
    let first = a.table.find_by_subnet(net(10, 0, 9, 0)).expect("route learned via B");
    assert_eq!(first.cost, 2);
    assert_eq!(first.next_hop_ip, net(10, 0, 0, 2));

    // C, on interface 1, offers the same destination at the same total
    // cost and must not displace B's route (strict `>` in rule F).
    engine::handle_packet(&mut a.table, &a.host, &a.clock, net(10, 0, 1, 2), 1, &bytes);
    let still = a.table.find_by_subnet(net(10, 0, 9, 0)).unwrap();
    assert_eq!(still.cost, 2);
    assert_eq!(still.next_hop_ip, net(10, 0, 0, 2), "C's equal-cost offer must not flap the route");
}

#[test]
fn s5_staleness_eviction_after_silence() {
    let mut node = Node::new(vec![intf([10, 0, 0, 1], [255, 255, 255, 0], 1, true)]);
    node.table.insert_or_update(ripd::routing_table::Route::learned(
        net(10, 0, 5, 0),
        net(255, 255, 255, 0),
        net(10, 0, 0, 9),
        0,
        2,
        net(10, 0, 0, 9),
        0,
    ));
    node.clock.advance_ms(25_000);
    node.clear_sent();
    node.tick(TIMEOUT_MS);

    assert!(node.table.find_by_subnet(net(10, 0, 5, 0)).is_none());
    let garbage_broadcast = node
        .sent()
        .into_iter()
        .any(|d| ripd::protocol::RipPacket::from_bytes(&d.buf).map(|p| p.entry.ip == net(10, 0, 5, 0) && p.entry.metric == 16).unwrap_or(false));
    assert!(garbage_broadcast, "aging out a route must broadcast it once with metric 16");
}
