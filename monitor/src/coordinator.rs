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

//! The coordinator is the monitor's core: it owns every peer and supporter
//! record, and its `tick()` is the only place peers get assigned to
//! supporters. Registration/ingress methods take the same lock a running
//! tick holds, so a tick always observes a consistent snapshot of the
//! registries for its bookkeeping phases; the two phases that need to talk
//! to the dispatcher (liveness probing, roster dispatch) run with the lock
//! released, since the dispatcher contract (see `dispatcher.rs`) forbids
//! holding the coordinator's lock across I/O.

use std::cell::RefCell;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::ReentrantMutex;

use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::dispatcher::{Dispatcher, SupporteeEntry};
use crate::errors::MonitorError;
use crate::message::{MessageKind, PeerRole};
use crate::peer::{Peer, PeerKey, PeerState};
use crate::stats::{StateCounts, StatsSink};
use crate::supporter::{Supporter, SupporterKey};

fn std_duration_to_chrono(d: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).expect("configured durations fit in chrono::Duration")
}

/// A read-only view of a peer record, cloned out of the lock for callers
/// that only want to inspect state (e.g. an external HTML/JSON renderer).
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    pub key: PeerKey,
    pub role: PeerRole,
    pub state: PeerState,
    pub last_message_kind: Option<MessageKind>,
    pub support_request_count: u32,
}

/// A read-only view of a supporter record.
#[derive(Debug, Clone)]
pub struct SupporterSnapshot {
    pub key: SupporterKey,
    pub assigned_slots: u32,
    pub available_slots: u32,
}

struct CoordinatorInner {
    peers: IndexMap<PeerKey, Peer>,
    supporters: IndexMap<SupporterKey, Supporter>,
    active: Vec<SupporterKey>,
    assignment_counts: HashMap<PeerKey, u64>,
    dead_supporters: Vec<SupporterKey>,
}

impl CoordinatorInner {
    fn new() -> Self {
        Self {
            peers: IndexMap::new(),
            supporters: IndexMap::new(),
            active: Vec::new(),
            assignment_counts: HashMap::new(),
            dead_supporters: Vec::new(),
        }
    }
}

/// Sorts `active` by descending available slots, breaking ties by the
/// existing (stable) order — spec §4.4's "re-sort the active list after
/// every assignment batch".
fn resort_active(active: &mut [SupporterKey], supporters: &IndexMap<SupporterKey, Supporter>) {
    active.sort_by(|a, b| {
        let slots_a = supporters.get(a).map(|s| s.available_slots()).unwrap_or(0);
        let slots_b = supporters.get(b).map(|s| s.available_slots()).unwrap_or(0);
        slots_b.cmp(&slots_a)
    });
}

/// The monitor's core bookkeeping, guarded by one reentrant mutex. See
/// `crate::Monitor` for the cloneable handle wrapping this.
pub struct Coordinator {
    inner: ReentrantMutex<RefCell<CoordinatorInner>>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn Dispatcher>,
    stats_sink: Arc<dyn StatsSink>,
    config: MonitorConfig,
}

impl Coordinator {
    pub fn new(config: MonitorConfig, clock: Arc<dyn Clock>, dispatcher: Arc<dyn Dispatcher>, stats_sink: Arc<dyn StatsSink>) -> Self {
        Self { inner: ReentrantMutex::new(RefCell::new(CoordinatorInner::new())), clock, dispatcher, stats_sink, config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Registers a new peer. Idempotent registrations (same identity) are
    /// reported as `PeerAlreadyRegistered`, matching spec §4.4's "duplicate
    /// registration is rejected, not silently merged" rule.
    pub fn register_peer(&self, id: impl Into<String>, addr: IpAddr, port: u16, role: PeerRole) -> Result<PeerKey, MonitorError> {
        if port < 1024 {
            return Err(MonitorError::InvalidPort(port));
        }
        let id = id.into();
        let key = PeerKey { id: id.clone(), addr, port };

        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if inner.peers.contains_key(&key) {
            return Err(MonitorError::PeerAlreadyRegistered);
        }

        let now = self.clock.now();
        let mut peer = Peer::new(id, addr, port, role, self.config.is_alive_timeout, self.config.peer_timeout);
        peer.receive(MessageKind::PeerRegistered, now);
        inner.peers.insert(key.clone(), peer);
        Ok(key)
    }

    /// Removes a peer from the registry. Idempotent: unregistering an
    /// unknown key is a no-op. Any supporter roster still naming this peer
    /// is cleaned up lazily on the next tick (`refresh_roster` treats a
    /// missing peer the same as one that reverted to `Default`).
    pub fn unregister_peer(&self, key: &PeerKey) {
        let guard = self.inner.lock();
        guard.borrow_mut().peers.shift_remove(key);
    }

    /// Registers a new supporter and asks the dispatcher to establish
    /// whatever transport handle it needs.
    pub async fn register_supporter(
        &self,
        id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        min_peer: u32,
        max_peer: u32,
    ) -> Result<SupporterKey, MonitorError> {
        if port < 1024 {
            return Err(MonitorError::InvalidPort(port));
        }
        if min_peer < 1 || min_peer > max_peer {
            return Err(MonitorError::InvalidCapacityBounds { min_peer, max_peer });
        }

        let supporter = Supporter::new(id, host, port, min_peer, max_peer);
        let key = supporter.key();

        {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            if inner.supporters.contains_key(&key) {
                return Err(MonitorError::SupporterAlreadyRegistered);
            }
            inner.supporters.insert(key.clone(), supporter.clone());
        }

        self.dispatcher.register_proxy(&supporter).await;
        Ok(key)
    }

    /// Removes a supporter, forcing every peer it was supporting back to
    /// `Starving`, then tells the dispatcher to tear down its transport
    /// handle.
    pub async fn unregister_supporter(&self, key: &SupporterKey) {
        {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            let CoordinatorInner { peers, supporters, active, .. } = &mut *inner;
            if let Some(mut supporter) = supporters.shift_remove(key) {
                supporter.cancel_all(|peer_key| {
                    if let Some(peer) = peers.get_mut(peer_key) {
                        peer.abort_support();
                    }
                });
                active.retain(|k| k != key);
            }
        }
        self.dispatcher.unregister_proxy(key).await;
    }

    /// Routes a message from an overlay peer into its record. Unknown peer
    /// IDs are logged and dropped (spec §7: ingress failures are never
    /// fatal).
    pub fn receive_peer_message(&self, peer_id: &str, msg_kind: MessageKind) {
        let now = self.clock.now();
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        match inner.peers.values_mut().find(|p| p.id() == peer_id) {
            Some(peer) => peer.receive(msg_kind, now),
            None => tracing::warn!("Got a message from an unregistered peer: {}", peer_id),
        }
    }

    pub fn get_monitored_peers(&self) -> Vec<PeerSnapshot> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner.peers.values().map(peer_snapshot).collect()
    }

    pub fn filter_peers_by_state(&self, state: PeerState) -> Vec<PeerSnapshot> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner.peers.values().filter(|p| p.state() == state).map(peer_snapshot).collect()
    }

    pub fn get_monitored_supporters(&self) -> Vec<SupporterSnapshot> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner.supporters.values().map(supporter_snapshot).collect()
    }

    pub fn get_active_supporters(&self) -> Vec<SupporterSnapshot> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner.active.iter().filter_map(|k| inner.supporters.get(k)).map(supporter_snapshot).collect()
    }

    /// Runs one coordinator pass: spec §4.4's ten steps. Steps 2 (liveness
    /// probing) and 9 (roster dispatch) are the only ones that touch the
    /// dispatcher and run with the lock released; every other step runs
    /// inside a single lock acquisition so concurrent registrations can't
    /// observe a half-updated tick.
    pub async fn tick(&self) {
        let now = self.clock.now();

        let probe_targets: Vec<Supporter> = {
            let guard = self.inner.lock();
            let inner = guard.borrow();
            inner.supporters.values().cloned().collect()
        };
        let freshly_dead = self.dispatcher.query_all_supporters(&probe_targets).await;

        let mut dispatch_payloads: Vec<(SupporterKey, Vec<SupporteeEntry>)> = Vec::new();
        let mut torn_down_proxies: Vec<SupporterKey> = Vec::new();

        {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            let CoordinatorInner { peers, supporters, active, assignment_counts, dead_supporters } = &mut *inner;

            // Step 1: reap peers that haven't sent anything in `peer_removal_time`.
            let removal_bound = std_duration_to_chrono(self.config.peer_removal_time);
            let stale: Vec<PeerKey> = peers
                .iter()
                .filter_map(|(key, peer)| match peer.last_message_at() {
                    Some(last) if now - last >= removal_bound => Some(key.clone()),
                    _ => None,
                })
                .collect();
            for key in &stale {
                peers.shift_remove(key);
            }

            // Step 2/3: reap supporters that failed this tick's probe, plus
            // any left over from a previous tick whose teardown didn't
            // finish (shouldn't normally happen, kept for robustness).
            dead_supporters.extend(freshly_dead);
            for key in dead_supporters.drain(..).collect::<Vec<_>>() {
                if let Some(mut supporter) = supporters.shift_remove(&key) {
                    supporter.cancel_all(|peer_key| {
                        if let Some(peer) = peers.get_mut(peer_key) {
                            peer.abort_support();
                        }
                    });
                    active.retain(|k| k != &key);
                    torn_down_proxies.push(key);
                }
            }

            // Step 4: per-peer transition refresh, forcing a peer with a
            // stale request window straight to Default.
            let forced_default_bound = std_duration_to_chrono(crate::config::TICK_FORCED_DEFAULT_THRESHOLD);
            for peer in peers.values_mut() {
                let forced = match peer.last_request_timestamp() {
                    Some(ts) => now - ts > forced_default_bound,
                    None => false,
                };
                if forced {
                    peer.force_default();
                } else {
                    peer.tick_transition(now);
                }
            }

            // Step 5: per-supporter roster refresh; a peer missing from the
            // registry is treated as Default (it was removed elsewhere).
            for supporter in supporters.values_mut() {
                supporter.refresh_roster(|peer_key| peers.get(peer_key).map(|p| p.state() == PeerState::Default).unwrap_or(true));
            }
            active.retain(|k| supporters.get(k).map(|s| s.is_active()).unwrap_or(false));

            // Step 6: statistics snapshot, taken unconditionally every tick.
            let mut counts = StateCounts::default();
            for peer in peers.values() {
                match peer.state() {
                    PeerState::Default => counts.default += 1,
                    PeerState::Watched => counts.watched += 1,
                    PeerState::Starving => counts.starving += 1,
                    PeerState::Supported => counts.supported += 1,
                }
            }
            let unix_time = now.timestamp() as f64 + now.timestamp_subsec_millis() as f64 / 1000.0;
            self.stats_sink.record(unix_time, counts);

            // Step 7: assignment phase — hand starving peers to already-active
            // supporters, most-frequently-restarved peer first, always to the
            // active supporter with the most free slots.
            let mut starving: Vec<PeerKey> =
                peers.iter().filter(|(_, p)| p.state() == PeerState::Starving).map(|(k, _)| k.clone()).collect();
            starving.sort_by(|a, b| {
                let count_a = assignment_counts.get(a).copied().unwrap_or(0);
                let count_b = assignment_counts.get(b).copied().unwrap_or(0);
                count_b.cmp(&count_a)
            });

            while !starving.is_empty() {
                let has_capacity =
                    active.first().and_then(|k| supporters.get(k)).map(|s| s.available_slots() > 0).unwrap_or(false);
                if !has_capacity {
                    break;
                }
                let peer_key = starving.remove(0);
                let supporter_key = active[0].clone();
                if let Some(supporter) = supporters.get_mut(&supporter_key) {
                    supporter.add(peer_key.clone());
                }
                if let Some(peer) = peers.get_mut(&peer_key) {
                    peer.receive(MessageKind::PeerSupported, now);
                }
                *assignment_counts.entry(peer_key).or_insert(0) += 1;
                resort_active(active, supporters);
            }

            // Step 8: activation phase — bring up just enough currently
            // inactive supporters (ascending min_peer) to cover the
            // remaining starving peers, then fill each newly active
            // supporter to capacity before moving to the next.
            let mut inactive: Vec<SupporterKey> = supporters.keys().filter(|k| !active.contains(k)).cloned().collect();
            inactive.sort_by_key(|k| supporters.get(k).map(|s| s.min_peer()).unwrap_or(0));

            let mut remaining = starving.len() as u32;
            let mut activation_count = 0usize;
            for key in &inactive {
                let min_peer = supporters.get(key).map(|s| s.min_peer()).unwrap_or(0);
                if remaining == 0 || remaining < min_peer {
                    break;
                }
                let avail = supporters.get(key).map(|s| s.available_slots()).unwrap_or(0);
                remaining = remaining.saturating_sub(avail);
                activation_count += 1;
            }

            for key in inactive.into_iter().take(activation_count) {
                active.push(key.clone());
                while !starving.is_empty() {
                    let avail = supporters.get(&key).map(|s| s.available_slots()).unwrap_or(0);
                    if avail == 0 {
                        break;
                    }
                    let peer_key = starving.remove(0);
                    if let Some(supporter) = supporters.get_mut(&key) {
                        supporter.add(peer_key.clone());
                    }
                    if let Some(peer) = peers.get_mut(&peer_key) {
                        peer.receive(MessageKind::PeerSupported, now);
                    }
                    *assignment_counts.entry(peer_key).or_insert(0) += 1;
                }
            }
            resort_active(active, supporters);

            // Collect what step 9 needs to send, without holding the lock
            // while it does so.
            for (key, supporter) in supporters.iter_mut() {
                if supporter.consume_dirty() {
                    let roster: Vec<SupporteeEntry> = supporter
                        .roster()
                        .iter()
                        .filter_map(|pk| peers.get(pk).map(|p| (p.id().to_string(), p.addr(), p.port())))
                        .collect();
                    dispatch_payloads.push((key.clone(), roster));
                }
            }
        }

        // Step 9: dispatch every dirty roster, and finish tearing down any
        // supporter the probe found dead.
        for (key, roster) in dispatch_payloads {
            self.dispatcher.dispatch_peer_list(&key, roster).await;
        }
        for key in torn_down_proxies {
            self.dispatcher.unregister_proxy(&key).await;
        }

        // Step 10 (scheduling the next tick) is the caller's responsibility —
        // see `crate::Monitor::spawn`.
    }
}

fn peer_snapshot(peer: &Peer) -> PeerSnapshot {
    PeerSnapshot {
        key: peer.key(),
        role: peer.role(),
        state: peer.state(),
        last_message_kind: peer.last_message_kind(),
        support_request_count: peer.support_request_count(),
    }
}

fn supporter_snapshot(supporter: &Supporter) -> SupporterSnapshot {
    SupporterSnapshot { key: supporter.key(), assigned_slots: supporter.assigned_slots(), available_slots: supporter.available_slots() }
}
