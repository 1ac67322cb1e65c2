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

//! A closed sum type standing in for the four-state peer lifecycle, with a
//! single `transition` function rather than one virtual method per state
//! class. Every state knew its own successor states in the original
//! implementation; here the match arms play that role instead.

use chrono::{DateTime, Utc};

use crate::message::MessageKind;
use crate::peer::Peer;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PeerState {
    Default,
    Watched,
    Starving,
    Supported,
}

impl Default for PeerState {
    fn default() -> Self {
        PeerState::Default
    }
}

/// Re-evaluates `peer`'s current state against `now`, mutating it in place.
/// Called both synchronously after every `receive()` and asynchronously by
/// the coordinator's tick.
pub fn transition(peer: &mut Peer, now: DateTime<Utc>) {
    match peer.state {
        PeerState::Default => transition_default(peer),
        PeerState::Watched => transition_watched(peer, now),
        PeerState::Starving => transition_starving(peer, now),
        PeerState::Supported => transition_supported(peer, now),
    }
}

fn transition_default(peer: &mut Peer) {
    // The very first request of a new admission cycle: Default -> Watched.
    if peer.request_window.front().is_some() && peer.support_request_count == 1 {
        peer.state = PeerState::Watched;
    }
}

fn transition_watched(peer: &mut Peer, now: DateTime<Utc>) {
    if !peer.peer_is_alive(now) {
        peer.state = PeerState::Default;
        peer.reset_cycle();
    } else if peer.last_message_kind == Some(MessageKind::SupportNotNeeded) {
        // Watched -> Default does not depend on the cooldown timeout.
        peer.state = PeerState::Default;
    } else if peer.last_message_kind == Some(MessageKind::SupportRequired)
        && peer.within_approval_window()
        && peer.enough_requests()
    {
        peer.state = PeerState::Starving;
    }
}

fn transition_starving(peer: &mut Peer, now: DateTime<Utc>) {
    if !peer.peer_is_alive(now) {
        peer.state = PeerState::Default;
        peer.reset_cycle();
    } else if peer.last_message_kind == Some(MessageKind::SupportNotNeeded) {
        peer.state = PeerState::Default;
    } else if peer.last_message_kind == Some(MessageKind::PeerSupported) {
        peer.state = PeerState::Supported;
    }
}

fn transition_supported(peer: &mut Peer, now: DateTime<Utc>) {
    if !peer.peer_is_alive(now) {
        peer.state = PeerState::Default;
        peer.reset_cycle();
    } else if peer.last_message_kind == Some(MessageKind::SupportNotNeeded) && peer.peer_timed_out(now) {
        // The malformed `and`/`or` guard in the original implementation is
        // resolved per spec §4.2: `peer_is_alive()` already covers the
        // "otherwise stay alive" branch, so only the timed-out case remains.
        peer.state = PeerState::Default;
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use chrono::TimeZone;

    use crate::message::PeerRole;

    use super::*;

    fn addr() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
    }

    fn new_peer() -> Peer {
        Peer::new("peer-1", addr(), 6000, PeerRole::Leecher, Duration::from_secs(10), Duration::from_secs(5))
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp(1_700_000_000 + secs, 0)
    }

    #[test]
    fn default_escalates_to_watched_on_first_request_of_a_cycle() {
        let mut peer = new_peer();
        peer.receive(MessageKind::SupportRequired, t(0));
        assert_eq!(peer.state(), PeerState::Watched);
    }

    #[test]
    fn default_stays_default_without_any_request() {
        let mut peer = new_peer();
        peer.receive(MessageKind::PeerSupported, t(0));
        assert_eq!(peer.state(), PeerState::Default);
    }

    #[test]
    fn watched_returns_to_default_when_not_alive() {
        let mut peer = new_peer();
        peer.receive(MessageKind::SupportRequired, t(0));
        assert_eq!(peer.state(), PeerState::Watched);
        peer.tick_transition(t(11));
        assert_eq!(peer.state(), PeerState::Default);
        assert_eq!(peer.support_request_count(), 0);
    }

    #[test]
    fn watched_returns_to_default_on_support_not_needed_without_cooldown() {
        let mut peer = new_peer();
        peer.receive(MessageKind::SupportRequired, t(0));
        peer.receive(MessageKind::SupportNotNeeded, t(1));
        assert_eq!(peer.state(), PeerState::Default);
        assert!(peer.cooldown_started_at.is_none());
    }

    #[test]
    fn watched_escalates_to_starving_within_approval_window() {
        let mut peer = new_peer();
        for i in 0..PEER_REQUIRED_MSGS as i64 {
            peer.receive(MessageKind::SupportRequired, t(i));
        }
        assert_eq!(peer.state(), PeerState::Starving);
    }

    #[test]
    fn watched_stays_watched_when_approval_window_exceeded() {
        let mut peer = new_peer();
        // Three requests at t=0, then a fourth well past the approval
        // window: the span from the oldest surviving timestamp exceeds
        // PEER_STATUS_APPROVAL_TIME, so no escalation happens yet.
        for _ in 0..(PEER_REQUIRED_MSGS - 1) {
            peer.receive(MessageKind::SupportRequired, t(0));
        }
        peer.receive(MessageKind::SupportRequired, t(10));
        assert_eq!(peer.state(), PeerState::Watched);
    }

    #[test]
    fn starving_moves_to_supported_on_peer_supported() {
        let mut peer = new_peer();
        for i in 0..PEER_REQUIRED_MSGS as i64 {
            peer.receive(MessageKind::SupportRequired, t(i));
        }
        assert_eq!(peer.state(), PeerState::Starving);
        peer.receive(MessageKind::PeerSupported, t(4));
        assert_eq!(peer.state(), PeerState::Supported);
    }

    #[test]
    fn starving_returns_to_default_on_support_not_needed() {
        let mut peer = new_peer();
        for i in 0..PEER_REQUIRED_MSGS as i64 {
            peer.receive(MessageKind::SupportRequired, t(i));
        }
        peer.receive(MessageKind::SupportNotNeeded, t(4));
        assert_eq!(peer.state(), PeerState::Default);
    }

    #[test]
    fn supported_requires_both_not_needed_and_timeout_elapsed() {
        let mut peer = new_peer();
        for i in 0..PEER_REQUIRED_MSGS as i64 {
            peer.receive(MessageKind::SupportRequired, t(i));
        }
        peer.receive(MessageKind::PeerSupported, t(4));
        peer.receive(MessageKind::SupportNotNeeded, t(5));
        assert_eq!(peer.state(), PeerState::Supported);

        // Not enough time has passed yet for peer_timeout (5s) to fire.
        peer.tick_transition(t(8));
        assert_eq!(peer.state(), PeerState::Supported);

        peer.tick_transition(t(10));
        assert_eq!(peer.state(), PeerState::Default);
    }

    #[test]
    fn supported_returns_to_default_when_not_alive_even_without_cooldown() {
        let mut peer = new_peer();
        for i in 0..PEER_REQUIRED_MSGS as i64 {
            peer.receive(MessageKind::SupportRequired, t(i));
        }
        peer.receive(MessageKind::PeerSupported, t(4));
        assert_eq!(peer.state(), PeerState::Supported);
        peer.tick_transition(t(20));
        assert_eq!(peer.state(), PeerState::Default);
    }
}
