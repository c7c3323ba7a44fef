//! `RipCore`: the concurrency envelope around the routing engine.
//!
//! This is the single owning object: it holds the routing table behind
//! the crate's one serialization primitive, the host callback object,
//! and the periodic tick thread. Every public entry point acquires the
//! lock, delegates to [`crate::engine`], and releases before returning.
//! The lock is re-entrant because the engine's broadcast helpers loop
//! back over interfaces from inside a call that already holds it.

use crate::clock::{Clock, SystemClock};
use crate::engine;
use crate::host::Host;
use crate::metrics::Metrics;
use crate::routing_table::RoutingTable;
use log::info;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Timing knobs for the scheduler and the aging sweep.
#[derive(Debug, Clone, Copy)]
pub struct RipTimers {
    pub advertise_interval: Duration,
    pub timeout: Duration,
}

impl Default for RipTimers {
    fn default() -> Self {
        Self {
            advertise_interval: Duration::from_secs(crate::ADVERT_INTERVAL_SECS),
            timeout: Duration::from_secs(crate::RIP_TIMEOUT_SECS),
        }
    }
}

/// The engine's sole shared mutable resource, guarded by the re-entrant
/// lock. `RefCell` supplies interior mutability since a `ReentrantMutex`
/// only ever yields a shared reference (re-entrance means the same
/// thread could otherwise obtain two `&mut` borrows).
struct EngineState {
    table: RoutingTable,
}

/// The RIPv2 engine core. `Arc<RipCore>` is the shape callers hold: the
/// host's packet-delivery thread, interface-event thread, and next-hop
/// query thread can all call in concurrently, serialized by the internal
/// lock.
pub struct RipCore {
    state: ReentrantMutex<RefCell<EngineState>>,
    host: Arc<dyn Host>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    timers: RipTimers,
    scheduler: parking_lot::Mutex<Option<SchedulerHandle>>,
}

struct SchedulerHandle {
    shutdown: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl RipCore {
    /// Seed the table from currently enabled interfaces and start the
    /// periodic thread.
    pub fn init(host: Arc<dyn Host>, metrics: Metrics, timers: RipTimers) -> Arc<Self> {
        Self::init_with_clock(host, metrics, timers, Arc::new(SystemClock::new()))
    }

    pub fn init_with_clock(
        host: Arc<dyn Host>,
        metrics: Metrics,
        timers: RipTimers,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let core = Arc::new(Self {
            state: ReentrantMutex::new(RefCell::new(EngineState {
                table: RoutingTable::new(),
            })),
            host,
            clock,
            metrics,
            timers,
            scheduler: parking_lot::Mutex::new(None),
        });

        {
            let guard = core.state.lock();
            let mut state = guard.borrow_mut();
            engine::init(&mut state.table, core.host.as_ref(), core.clock.as_ref());
            core.metrics.update_route_count(state.table.len());
        }

        core.start_scheduler();
        info!("RIP core initialized with {} route(s)", core.route_count());
        core
    }

    fn start_scheduler(self: &Arc<Self>) {
        let (tx, rx) = mpsc::channel();
        let core = Arc::clone(self);
        let interval = self.timers.advertise_interval;
        let join = std::thread::Builder::new()
            .name("rip-scheduler".into())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Ok(()) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => core.handle_periodic(),
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            })
            .expect("failed to spawn rip-scheduler thread");
        *self.scheduler.lock() = Some(SchedulerHandle { shutdown: tx, join });
    }

    /// Stop the periodic thread so the binary can shut down cleanly
    /// instead of leaking it for process lifetime.
    pub fn shutdown(&self) {
        if let Some(handle) = self.scheduler.lock().take() {
            let _ = handle.shutdown.send(());
            let _ = handle.join.join();
        }
    }

    /// `get_next_hop`.
    pub fn get_next_hop(&self, ip: Ipv4Addr) -> (u32, Ipv4Addr) {
        let guard = self.state.lock();
        let state = guard.borrow();
        engine::get_next_hop(&state.table, ip)
    }

    /// `handle_packet`.
    pub fn handle_packet(&self, src_ip: Ipv4Addr, intf: u32, buf: &[u8]) {
        self.metrics.increment_packets_received();
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let before = state.table.len();
        engine::handle_packet(&mut state.table, self.host.as_ref(), self.clock.as_ref(), src_ip, intf, buf);
        if state.table.len() != before {
            self.metrics.increment_routing_updates_received();
        }
        self.metrics.update_route_count(state.table.len());
    }

    /// `handle_periodic`.
    pub fn handle_periodic(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        engine::handle_periodic(
            &mut state.table,
            self.host.as_ref(),
            self.clock.as_ref(),
            self.timers.timeout.as_millis() as u64,
        );
        self.metrics.increment_routing_updates_sent();
        self.metrics.update_route_count(state.table.len());
    }

    /// `interface_changed`.
    pub fn interface_changed(&self, intf: u32, state_changed: bool, cost_changed: bool) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        engine::interface_changed(
            &mut state.table,
            self.host.as_ref(),
            self.clock.as_ref(),
            intf,
            state_changed,
            cost_changed,
        );
        self.metrics.update_route_count(state.table.len());
    }

    pub fn route_count(&self) -> usize {
        let guard = self.state.lock();
        guard.borrow().table.len()
    }

    pub fn snapshot(&self) -> Vec<crate::routing_table::RouteSnapshot> {
        let guard = self.state.lock();
        guard.borrow().table.snapshot()
    }

    pub fn stats(&self) -> crate::routing_table::RoutingTableStatistics {
        let guard = self.state.lock();
        guard.borrow().table.stats()
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }
}

impl Drop for RipCore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::MockClock;
    use crate::host::test_support::FakeHost;
    use crate::host::InterfaceInfo;

    fn intf(ip: [u8; 4], mask: [u8; 4], cost: u32, enabled: bool) -> InterfaceInfo {
        InterfaceInfo {
            ip: Ipv4Addr::from(ip),
            mask: Ipv4Addr::from(mask),
            cost,
            enabled,
        }
    }

    #[test]
    fn init_seeds_table_and_can_shut_down_cleanly() {
        let host: Arc<dyn Host> = Arc::new(FakeHost::new(vec![intf(
            [10, 0, 0, 1],
            [255, 255, 255, 0],
            1,
            true,
        )]));
        let clock: Arc<dyn Clock> = Arc::new(MockClock::new());
        let core = RipCore::init_with_clock(host, Metrics::new(), RipTimers::default(), clock);
        assert_eq!(core.route_count(), 1);
        core.shutdown();
    }

    #[test]
    fn get_next_hop_returns_sentinel_when_unmatched() {
        let host: Arc<dyn Host> = Arc::new(FakeHost::new(vec![]));
        let clock: Arc<dyn Clock> = Arc::new(MockClock::new());
        let core = RipCore::init_with_clock(host, Metrics::new(), RipTimers::default(), clock);
        assert_eq!(
            core.get_next_hop(Ipv4Addr::new(1, 2, 3, 4)),
            crate::routing_table::NO_ROUTE
        );
        core.shutdown();
    }
}
