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

use std::time::Duration;

/// The number of support-required messages kept in a peer's sliding request
/// window, and the threshold at which `Watched` escalates to `Starving`.
pub const PEER_REQUIRED_MSGS: usize = 4;

/// Grace period a `Supported` peer is allowed after a `support_not_needed`
/// message before it is forced back to `Default`.
pub const PEER_TIMEOUT_BOUND: Duration = Duration::from_secs(5);

/// A peer transitions back to `Default` if it hasn't sent a support request
/// within this bound (derived from the request window, not the any-message
/// timestamp).
pub const IS_ALIVE_TIMEOUT_BOUND: Duration = Duration::from_secs(10);

/// A monitored peer is forgotten entirely if it hasn't sent any message
/// (of any kind) for this long.
pub const PEER_REMOVAL_TIME: Duration = Duration::from_secs(45);

/// Cadence of the periodic coordinator pass.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// In-tick forced-default threshold; intentionally equal to
/// `IS_ALIVE_TIMEOUT_BOUND` (see design note in spec §9) rather than a
/// second, independently tunable policy.
pub const TICK_FORCED_DEFAULT_THRESHOLD: Duration = Duration::from_secs(10);

/// Approval window span, in seconds, within which `PEER_REQUIRED_MSGS`
/// support requests must arrive for `Watched` to escalate to `Starving`.
/// `W * (1 + 0.150)` seconds, i.e. one second per request plus a typical
/// round-trip allowance.
pub fn peer_status_approval_time() -> chrono::Duration {
    let millis = (PEER_REQUIRED_MSGS as f64 * 1.150 * 1000.0).round() as i64;
    chrono::Duration::milliseconds(millis)
}

/// Tunable bounds for a [`crate::coordinator::Coordinator`], overridable at
/// construction the way `snarkos_network::Environment` carries overridable
/// peer-count bounds.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub is_alive_timeout: Duration,
    pub peer_timeout: Duration,
    pub peer_removal_time: Duration,
    pub tick_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            is_alive_timeout: IS_ALIVE_TIMEOUT_BOUND,
            peer_timeout: PEER_TIMEOUT_BOUND,
            peer_removal_time: PEER_REMOVAL_TIME,
            tick_interval: TICK_INTERVAL,
        }
    }
}

impl MonitorConfig {
    pub fn with_is_alive_timeout(mut self, timeout: Duration) -> Self {
        self.is_alive_timeout = timeout;
        self
    }

    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }
}
