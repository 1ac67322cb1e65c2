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

//! A supporter only ever stores the *identities* of the peers it supports;
//! the peer records themselves live exclusively in the coordinator's
//! registry. This sidesteps the aliasing bug design note (§9) calls out in
//! the original implementation, where a module-level variable was made to
//! alias whichever supporter's list was constructed most recently.

use crate::peer::PeerKey;

/// Identity of a supporter server: equality and hashing are a function of
/// `(id, host, port, min_peer, max_peer)` only, per spec §3.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SupporterKey {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub min_peer: u32,
    pub max_peer: u32,
}

/// The monitor's local record of a supporter server: its capacity bounds
/// and the private roster of peers currently assigned to it.
#[derive(Debug, Clone)]
pub struct Supporter {
    id: String,
    host: String,
    port: u16,
    min_peer: u32,
    max_peer: u32,

    roster: Vec<PeerKey>,
    dirty: bool,
}

impl Supporter {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16, min_peer: u32, max_peer: u32) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            min_peer,
            max_peer,
            roster: Vec::new(),
            dirty: true,
        }
    }

    pub fn key(&self) -> SupporterKey {
        SupporterKey {
            id: self.id.clone(),
            host: self.host.clone(),
            port: self.port,
            min_peer: self.min_peer,
            max_peer: self.max_peer,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The RPC endpoint the dispatcher must call, per the `port + 1` wire
    /// contract in spec §6.
    pub fn rpc_port(&self) -> u16 {
        self.port + 1
    }

    pub fn min_peer(&self) -> u32 {
        self.min_peer
    }

    pub fn max_peer(&self) -> u32 {
        self.max_peer
    }

    pub fn roster(&self) -> &[PeerKey] {
        &self.roster
    }

    /// Idempotent. Sets the dirty flag if the peer was newly added. Callers
    /// must have already checked `available_slots() > 0`.
    pub fn add(&mut self, peer: PeerKey) {
        if !self.roster.contains(&peer) {
            self.roster.push(peer);
            self.dirty = true;
        }
    }

    /// Idempotent. Sets the dirty flag if the peer was present.
    pub fn remove(&mut self, peer: &PeerKey) {
        let before = self.roster.len();
        self.roster.retain(|p| p != peer);
        if self.roster.len() != before {
            self.dirty = true;
        }
    }

    /// Removes every peer from the roster, invoking `on_removed` for each
    /// (the caller uses this to force the peer back to Starving).
    pub fn cancel_all(&mut self, mut on_removed: impl FnMut(&PeerKey)) {
        for peer in self.roster.drain(..) {
            on_removed(&peer);
        }
        self.dirty = true;
    }

    /// Removes every peer for which `is_default` returns true. Default is
    /// the only state reachable out of Supported, so no other state needs
    /// checking (spec §4.3).
    pub fn refresh_roster(&mut self, is_default: impl Fn(&PeerKey) -> bool) {
        let before = self.roster.len();
        self.roster.retain(|p| !is_default(p));
        if self.roster.len() != before {
            self.dirty = true;
        }
    }

    pub fn available_slots(&self) -> u32 {
        self.max_peer.saturating_sub(self.roster.len() as u32)
    }

    pub fn assigned_slots(&self) -> u32 {
        self.roster.len() as u32
    }

    /// A supporter is active iff its roster is non-empty.
    pub fn is_active(&self) -> bool {
        !self.roster.is_empty()
    }

    /// Atomically returns the dirty flag's value and clears it.
    pub fn consume_dirty(&mut self) -> bool {
        let value = self.dirty;
        self.dirty = false;
        value
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}
