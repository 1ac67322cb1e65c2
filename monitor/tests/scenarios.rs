// Copyright (C) 2019-2021 Aleo Systems Inc.
// This file is part of the snarkOS library.

// The snarkOS library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// The snarkOS library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with the snarkOS library. If not, see <https://www.gnu.org/licenses/>.

//! The numbered scenarios from the monitor's testable-properties section,
//! driven end to end through the public `Monitor` handle with a
//! `FixedClock` and a `RecordingDispatcher` standing in for the RPC
//! transport and wall-clock time.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};

use monitor::config::PEER_REQUIRED_MSGS;
use monitor::dispatcher::RecordingDispatcher;
use monitor::stats::InMemoryStatsSink;
use monitor::{Dispatcher, FixedClock, MessageKind, Monitor, MonitorConfig, PeerRole, PeerState};

fn addr(n: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, n))
}

fn epoch() -> chrono::DateTime<Utc> {
    Utc.timestamp(1_700_000_000, 0)
}

fn new_monitor() -> (Monitor, Arc<FixedClock>, Arc<RecordingDispatcher>) {
    let clock = Arc::new(FixedClock::new(epoch()));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let stats = Arc::new(InMemoryStatsSink::default());
    let monitor = Monitor::with_collaborators(
        MonitorConfig::default(),
        clock.clone() as Arc<dyn monitor::Clock>,
        dispatcher.clone() as Arc<dyn Dispatcher>,
        stats,
    );
    (monitor, clock, dispatcher)
}

fn state_of(monitor: &Monitor, id: &str) -> PeerState {
    monitor.get_monitored_peers().into_iter().find(|p| p.key.id == id).expect("peer must be registered").state
}

/// Scenario 1: lifecycle walk through every state in sequence.
#[tokio::test]
async fn scenario_1_lifecycle_walk() {
    let (monitor, clock, _dispatcher) = new_monitor();
    monitor.register_peer("p1", addr(1), 6000, PeerRole::Leecher).unwrap();

    monitor.receive_peer_message("p1", MessageKind::SupportRequired);
    assert_eq!(state_of(&monitor, "p1"), PeerState::Watched);

    monitor.receive_peer_message("p1", MessageKind::SupportNotNeeded);
    assert_eq!(state_of(&monitor, "p1"), PeerState::Default);

    monitor.receive_peer_message("p1", MessageKind::SupportRequired);
    assert_eq!(state_of(&monitor, "p1"), PeerState::Watched);

    // Five more support_required messages, all within one second: escalates
    // to Starving (the sliding window keeps the last four, well within the
    // approval bound).
    for _ in 0..5 {
        clock.advance(ChronoDuration::milliseconds(100));
        monitor.receive_peer_message("p1", MessageKind::SupportRequired);
    }
    assert_eq!(state_of(&monitor, "p1"), PeerState::Starving);

    monitor.receive_peer_message("p1", MessageKind::PeerSupported);
    assert_eq!(state_of(&monitor, "p1"), PeerState::Supported);

    monitor.receive_peer_message("p1", MessageKind::SupportNotNeeded);
    clock.advance(ChronoDuration::seconds(5));
    monitor.tick_once().await;
    assert_eq!(state_of(&monitor, "p1"), PeerState::Default);
}

/// Scenario 2: the approval window prevents escalation until the window
/// has fully slid past the previously-too-old entries.
#[tokio::test]
async fn scenario_2_approval_window_enforcement() {
    let (monitor, clock, _dispatcher) = new_monitor();
    monitor.register_peer("p1", addr(1), 6000, PeerRole::Leecher).unwrap();

    for _ in 0..(PEER_REQUIRED_MSGS - 1) {
        monitor.receive_peer_message("p1", MessageKind::SupportRequired);
    }
    assert_eq!(state_of(&monitor, "p1"), PeerState::Watched);

    clock.advance(ChronoDuration::milliseconds(5_600));
    monitor.receive_peer_message("p1", MessageKind::SupportRequired);
    // The oldest timestamp (t=0) hasn't been evicted yet, so the window's
    // span now exceeds PEER_STATUS_APPROVAL_TIME: no escalation.
    assert_eq!(state_of(&monitor, "p1"), PeerState::Watched);

    for _ in 0..PEER_REQUIRED_MSGS {
        clock.advance(ChronoDuration::milliseconds(100));
        monitor.receive_peer_message("p1", MessageKind::SupportRequired);
    }
    assert_eq!(state_of(&monitor, "p1"), PeerState::Starving);
}

async fn drive_to_starving(monitor: &Monitor, clock: &FixedClock, id: &str, n: u8) {
    monitor.register_peer(id, addr(n), 6000 + n as u16, PeerRole::Leecher).unwrap();
    for _ in 0..PEER_REQUIRED_MSGS {
        clock.advance(ChronoDuration::milliseconds(100));
        monitor.receive_peer_message(id, MessageKind::SupportRequired);
    }
}

/// Scenario 3: not enough starving peers to meet any supporter's `min_peer`
/// leaves every supporter inactive.
#[tokio::test]
async fn scenario_3_starving_without_supporter() {
    let (monitor, clock, _dispatcher) = new_monitor();
    drive_to_starving(&monitor, &clock, "p1", 1).await;
    drive_to_starving(&monitor, &clock, "p2", 2).await;
    monitor.register_supporter("s1", "host", 9000, 3, 5).await.unwrap();

    monitor.tick_once().await;

    assert_eq!(state_of(&monitor, "p1"), PeerState::Starving);
    assert_eq!(state_of(&monitor, "p2"), PeerState::Starving);
    assert!(monitor.get_active_supporters().is_empty());
}

/// Scenario 4: two supporters with small capacities both activate in the
/// same tick to cover three starving peers.
#[tokio::test]
async fn scenario_4_multi_supporter_activation_in_one_tick() {
    let (monitor, clock, _dispatcher) = new_monitor();
    monitor.register_supporter("s1", "host", 9000, 2, 2).await.unwrap();
    monitor.register_supporter("s2", "host", 9100, 1, 1).await.unwrap();

    drive_to_starving(&monitor, &clock, "p1", 1).await;
    drive_to_starving(&monitor, &clock, "p2", 2).await;
    drive_to_starving(&monitor, &clock, "p3", 3).await;

    monitor.tick_once().await;

    assert_eq!(monitor.get_active_supporters().len(), 2);
    assert_eq!(state_of(&monitor, "p1"), PeerState::Supported);
    assert_eq!(state_of(&monitor, "p2"), PeerState::Supported);
    assert_eq!(state_of(&monitor, "p3"), PeerState::Supported);
}

/// Scenario 5: one supporter's available slots already cover the whole
/// starving set, so the activation phase stops after it.
#[tokio::test]
async fn scenario_5_min_and_max_together() {
    let (monitor, clock, _dispatcher) = new_monitor();
    monitor.register_supporter("s1", "host", 9000, 2, 3).await.unwrap();
    monitor.register_supporter("s2", "host", 9100, 1, 3).await.unwrap();

    drive_to_starving(&monitor, &clock, "p1", 1).await;
    drive_to_starving(&monitor, &clock, "p2", 2).await;
    drive_to_starving(&monitor, &clock, "p3", 3).await;

    monitor.tick_once().await;

    let active = monitor.get_active_supporters();
    assert_eq!(active.len(), 1);
    // s2 has the smaller min_peer (1 < 2), so ascending-min_peer order picks
    // it first, and its three slots are enough to absorb the whole set.
    assert_eq!(active[0].key.id, "s2");
    assert_eq!(state_of(&monitor, "p1"), PeerState::Supported);
    assert_eq!(state_of(&monitor, "p2"), PeerState::Supported);
    assert_eq!(state_of(&monitor, "p3"), PeerState::Supported);
}

/// Scenario 6: the active-supporter list is sorted by descending available
/// slots after assignment, not by registration or activation order.
#[tokio::test]
async fn scenario_6_active_list_ordering() {
    let (monitor, clock, _dispatcher) = new_monitor();
    monitor.register_supporter("s1", "host", 9000, 1, 1).await.unwrap();
    monitor.register_supporter("s2", "host", 9100, 1, 6).await.unwrap();

    drive_to_starving(&monitor, &clock, "p1", 1).await;
    drive_to_starving(&monitor, &clock, "p2", 2).await;

    monitor.tick_once().await;

    let active = monitor.get_active_supporters();
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].key.id, "s2");
    assert_eq!(active[1].key.id, "s1");
}

/// Scenario 7: an empty tick (no peers, no supporters) completes cleanly.
#[tokio::test]
async fn scenario_7_empty_tick() {
    let (monitor, _clock, _dispatcher) = new_monitor();
    monitor.tick_once().await;
    assert!(monitor.get_monitored_peers().is_empty());
    assert!(monitor.get_monitored_supporters().is_empty());
}

/// Scenario 8: a supporter's dirty flag is cleared exactly once per roster
/// change, and a tick with no roster changes makes no dispatch call.
#[tokio::test]
async fn scenario_8_dispatcher_dirty_flag_discipline() {
    let (monitor, clock, dispatcher) = new_monitor();
    monitor.register_supporter("s1", "host", 9000, 1, 1).await.unwrap();
    drive_to_starving(&monitor, &clock, "p1", 1).await;

    monitor.tick_once().await;
    assert!(dispatcher.dispatched.lock().values().next().is_some());

    dispatcher.dispatched.lock().clear();
    monitor.tick_once().await;
    assert!(dispatcher.dispatched.lock().is_empty());
}
