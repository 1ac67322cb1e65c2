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

use std::net::AddrParseError;

/// Errors that can be returned from the monitor's public, synchronous API.
///
/// Ingress failures that the spec calls out as "never fatal" (unknown peer
/// IDs, dispatcher I/O failures during a tick) are not represented here —
/// they are logged and swallowed at the call site instead.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("port {0} is reserved; ports must be >= 1024")]
    InvalidPort(u16),

    #[error("invalid capacity bounds: min_peer ({min_peer}) must be >= 1 and <= max_peer ({max_peer})")]
    InvalidCapacityBounds { min_peer: u32, max_peer: u32 },

    #[error("invalid peer address: {0}")]
    InvalidAddress(#[from] AddrParseError),

    #[error("peer is already registered")]
    PeerAlreadyRegistered,

    #[error("supporter is already registered")]
    SupporterAlreadyRegistered,

    #[error("dispatcher I/O failure: {0}")]
    DispatcherIo(#[source] anyhow::Error),
}
