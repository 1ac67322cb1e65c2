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

pub mod state;

pub use state::PeerState;

use std::collections::VecDeque;
use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::{peer_status_approval_time, PEER_REQUIRED_MSGS};
use crate::message::{MessageKind, PeerRole};

/// Identity of a peer as seen by the monitor: a peer record's equality and
/// hashing are a function of this tuple only, per spec §3.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PeerKey {
    pub id: String,
    pub addr: IpAddr,
    pub port: u16,
}

/// The monitor's local record of a single overlay peer: its identity, its
/// position in the {Default, Watched, Starving, Supported} state machine,
/// and the bookkeeping that state machine depends on.
#[derive(Debug, Clone)]
pub struct Peer {
    id: String,
    addr: IpAddr,
    port: u16,
    role: PeerRole,

    pub(crate) state: PeerState,
    pub(crate) request_window: VecDeque<DateTime<Utc>>,
    pub(crate) last_message_at: Option<DateTime<Utc>>,
    pub(crate) last_message_kind: Option<MessageKind>,
    pub(crate) support_request_count: u32,
    pub(crate) cooldown_started_at: Option<DateTime<Utc>>,

    is_alive_timeout: Duration,
    peer_timeout: Duration,
}

impl Peer {
    pub fn new(id: impl Into<String>, addr: IpAddr, port: u16, role: PeerRole, is_alive_timeout: Duration, peer_timeout: Duration) -> Self {
        Self {
            id: id.into(),
            addr,
            port,
            role,
            state: PeerState::Default,
            request_window: VecDeque::with_capacity(PEER_REQUIRED_MSGS),
            last_message_at: None,
            last_message_kind: None,
            support_request_count: 0,
            cooldown_started_at: None,
            is_alive_timeout,
            peer_timeout,
        }
    }

    pub fn key(&self) -> PeerKey {
        PeerKey { id: self.id.clone(), addr: self.addr, port: self.port }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn last_message_kind(&self) -> Option<MessageKind> {
        self.last_message_kind
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at
    }

    pub fn support_request_count(&self) -> u32 {
        self.support_request_count
    }

    /// Handles an incoming message: records bookkeeping, applies the
    /// message-specific side effects of spec §4.1, then runs one
    /// synchronous transition step.
    pub fn receive(&mut self, msg_kind: MessageKind, now: DateTime<Utc>) {
        self.last_message_kind = Some(msg_kind);
        self.last_message_at = Some(now);

        match msg_kind {
            MessageKind::SupportRequired => {
                self.support_request_count += 1;
                self.cooldown_started_at = None;
                self.request_window.push_back(now);
                if self.request_window.len() > PEER_REQUIRED_MSGS {
                    self.request_window.pop_front();
                }
            }
            MessageKind::SupportNotNeeded => {
                self.reset_cycle();
                if self.cooldown_started_at.is_none() {
                    self.cooldown_started_at = Some(now);
                }
            }
            MessageKind::PeerSupported | MessageKind::PeerRegistered => {}
        }

        state::transition(self, now);
    }

    /// Re-evaluates the current state against wall time with no new
    /// message; used by the coordinator's tick.
    pub fn tick_transition(&mut self, now: DateTime<Utc>) {
        state::transition(self, now);
    }

    /// Clears the request window and zeroes the support-request counter.
    pub fn reset_cycle(&mut self) {
        self.request_window.clear();
        self.support_request_count = 0;
    }

    /// Forces the state to Starving; used when the supporting supporter is
    /// removed out from under this peer.
    pub fn abort_support(&mut self) {
        self.state = PeerState::Starving;
    }

    /// True if the request window is empty (grace period for a newly
    /// registered peer) or the most recent request is still within
    /// `is_alive_timeout`. Deliberately uses the request-window clock, not
    /// the any-message clock.
    pub fn peer_is_alive(&self, now: DateTime<Utc>) -> bool {
        match self.request_window.back() {
            None => true,
            Some(last) => (now - *last) < chrono::Duration::from_std(self.is_alive_timeout).unwrap(),
        }
    }

    /// True iff the cooldown timer is running and has been running for at
    /// least `peer_timeout`.
    pub fn peer_timed_out(&self, now: DateTime<Utc>) -> bool {
        match self.cooldown_started_at {
            None => false,
            Some(started) => (now - started) >= chrono::Duration::from_std(self.peer_timeout).unwrap(),
        }
    }

    /// True iff the span between the first and last timestamp in the
    /// request window fits inside `PEER_STATUS_APPROVAL_TIME`.
    pub fn within_approval_window(&self) -> bool {
        match (self.request_window.front(), self.request_window.back()) {
            (Some(first), Some(last)) => (*last - *first) <= peer_status_approval_time(),
            _ => false,
        }
    }

    /// True iff the support-request counter has reached `PEER_REQUIRED_MSGS`.
    pub fn enough_requests(&self) -> bool {
        self.support_request_count >= PEER_REQUIRED_MSGS as u32
    }

    /// The timestamp of the most recent entry in the request window, if any.
    pub fn last_request_timestamp(&self) -> Option<DateTime<Utc>> {
        self.request_window.back().copied()
    }

    /// Forces the peer into `Default` without resetting the admission
    /// cycle; used by the coordinator's tick when a peer's request window
    /// has gone stale (spec §4.4, step 4).
    pub fn force_default(&mut self) {
        self.state = PeerState::Default;
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use chrono::{TimeZone, Utc};

    use super::*;

    fn addr() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
    }

    fn new_peer() -> Peer {
        Peer::new("peer-1", addr(), 6000, PeerRole::Leecher, Duration::from_secs(10), Duration::from_secs(5))
    }

    #[test]
    fn key_is_only_id_addr_port() {
        let peer = new_peer();
        let key = peer.key();
        assert_eq!(key, PeerKey { id: "peer-1".into(), addr: addr(), port: 6000 });
    }

    #[test]
    fn request_window_caps_at_required_msgs_and_evicts_oldest() {
        let mut peer = new_peer();
        let base = Utc.timestamp(1_700_000_000, 0);
        for i in 0..(PEER_REQUIRED_MSGS as i64 + 3) {
            peer.receive(MessageKind::SupportRequired, base + chrono::Duration::milliseconds(i * 100));
        }
        assert_eq!(peer.request_window.len(), PEER_REQUIRED_MSGS);
        // The oldest three entries (i = 0, 1, 2) must have been evicted.
        assert_eq!(peer.request_window.front().copied(), Some(base + chrono::Duration::milliseconds(300)));
    }

    #[test]
    fn support_not_needed_resets_cycle_and_starts_cooldown_once() {
        let mut peer = new_peer();
        let base = Utc.timestamp(1_700_000_000, 0);
        peer.receive(MessageKind::SupportRequired, base);
        peer.receive(MessageKind::SupportNotNeeded, base + chrono::Duration::seconds(1));
        assert_eq!(peer.support_request_count(), 0);
        assert!(peer.request_window.is_empty());
        let started = peer.cooldown_started_at;
        assert_eq!(started, Some(base + chrono::Duration::seconds(1)));

        // A second support_not_needed must not restart the cooldown clock.
        peer.receive(MessageKind::SupportNotNeeded, base + chrono::Duration::seconds(2));
        assert_eq!(peer.cooldown_started_at, started);
    }

    #[test]
    fn peer_is_alive_has_grace_period_before_first_request() {
        let peer = new_peer();
        assert!(peer.peer_is_alive(Utc.timestamp(1_700_000_000, 0)));
    }

    #[test]
    fn peer_is_alive_uses_request_window_clock_not_any_message_clock() {
        let mut peer = new_peer();
        let base = Utc.timestamp(1_700_000_000, 0);
        peer.receive(MessageKind::SupportRequired, base);
        // A later PEER_SUPPORTED message bumps last_message_at but not the
        // request window, so liveness is still judged off the older request.
        peer.receive(MessageKind::PeerSupported, base + chrono::Duration::seconds(9));
        assert!(peer.peer_is_alive(base + chrono::Duration::seconds(9)));
        assert!(!peer.peer_is_alive(base + chrono::Duration::seconds(11)));
    }

    #[test]
    fn enough_requests_requires_full_window_count() {
        let mut peer = new_peer();
        let base = Utc.timestamp(1_700_000_000, 0);
        for _ in 0..(PEER_REQUIRED_MSGS - 1) {
            peer.receive(MessageKind::SupportRequired, base);
        }
        assert!(!peer.enough_requests());
        peer.receive(MessageKind::SupportRequired, base);
        assert!(peer.enough_requests());
    }

    #[test]
    fn abort_support_forces_starving_regardless_of_prior_state() {
        let mut peer = new_peer();
        peer.state = PeerState::Supported;
        peer.abort_support();
        assert_eq!(peer.state(), PeerState::Starving);
    }
}
