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

//! `Monitor` is the public, cloneable handle around a `Coordinator`: the
//! same relationship `snarkos_network::Node` has to its `PeerBook`. Cloning
//! a `Monitor` clones an `Arc`, not the coordinator state.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::clock::{Clock, SystemClock};
use crate::config::MonitorConfig;
use crate::coordinator::{Coordinator, PeerSnapshot, SupporterSnapshot};
use crate::dispatcher::Dispatcher;
use crate::errors::MonitorError;
use crate::message::{MessageKind, PeerRole};
use crate::peer::{PeerKey, PeerState};
use crate::stats::{NullStatsSink, StatsSink};
use crate::supporter::SupporterKey;

/// The monitor core plus the shutdown flag its periodic tick task watches.
#[derive(Clone)]
pub struct Monitor {
    coordinator: Arc<Coordinator>,
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Monitor {
    pub fn new(config: MonitorConfig, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self::with_collaborators(config, Arc::new(SystemClock), dispatcher, Arc::new(NullStatsSink))
    }

    /// Constructs a monitor with explicit clock/dispatcher/stats collaborators,
    /// the seam scenario tests use to substitute a `FixedClock` and test
    /// doubles in place of the production ones.
    pub fn with_collaborators(
        config: MonitorConfig,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn Dispatcher>,
        stats_sink: Arc<dyn StatsSink>,
    ) -> Self {
        Self {
            coordinator: Arc::new(Coordinator::new(config, clock, dispatcher, stats_sink)),
            shutdown: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn register_peer(&self, id: impl Into<String>, addr: IpAddr, port: u16, role: PeerRole) -> Result<PeerKey, MonitorError> {
        self.coordinator.register_peer(id, addr, port, role)
    }

    pub fn unregister_peer(&self, key: &PeerKey) {
        self.coordinator.unregister_peer(key)
    }

    pub async fn register_supporter(
        &self,
        id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        min_peer: u32,
        max_peer: u32,
    ) -> Result<SupporterKey, MonitorError> {
        self.coordinator.register_supporter(id, host, port, min_peer, max_peer).await
    }

    pub async fn unregister_supporter(&self, key: &SupporterKey) {
        self.coordinator.unregister_supporter(key).await
    }

    pub fn receive_peer_message(&self, peer_id: &str, msg_kind: MessageKind) {
        self.coordinator.receive_peer_message(peer_id, msg_kind)
    }

    pub fn get_monitored_peers(&self) -> Vec<PeerSnapshot> {
        self.coordinator.get_monitored_peers()
    }

    pub fn filter_peers_by_state(&self, state: PeerState) -> Vec<PeerSnapshot> {
        self.coordinator.filter_peers_by_state(state)
    }

    pub fn get_monitored_supporters(&self) -> Vec<SupporterSnapshot> {
        self.coordinator.get_monitored_supporters()
    }

    pub fn get_active_supporters(&self) -> Vec<SupporterSnapshot> {
        self.coordinator.get_active_supporters()
    }

    /// Runs exactly one coordinator pass; exposed for tests that want to
    /// drive the tick algorithm without the periodic task loop.
    pub async fn tick_once(&self) {
        self.coordinator.tick().await;
    }

    /// Spawns the long-lived periodic tick task, the way
    /// `Node::start_services` spawns its peer-sync loop. Returns a join
    /// handle the caller can await after calling `shutdown()`.
    pub fn spawn(&self) -> JoinHandle<()> {
        let monitor = self.clone();
        let tick_interval = monitor.coordinator.config().tick_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sleep(tick_interval) => {
                        monitor.coordinator.tick().await;
                    }
                    _ = monitor.notify.notified() => {
                        break;
                    }
                }
                if monitor.shutdown.load(Ordering::Acquire) {
                    break;
                }
            }
        })
    }

    /// Signals the tick task to stop after its current iteration; does not
    /// block on it actually finishing. Callers wanting that should await the
    /// `JoinHandle` returned by `spawn`.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}
