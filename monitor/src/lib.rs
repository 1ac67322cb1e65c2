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

// Compilation
#![forbid(unsafe_code)]
#![warn(unused_extern_crates)]

#[macro_use]
extern crate tracing;

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod errors;
pub mod message;
pub mod monitor;
pub mod peer;
pub mod stats;
pub mod supporter;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::MonitorConfig;
pub use coordinator::{Coordinator, PeerSnapshot, SupporterSnapshot};
pub use dispatcher::{Dispatcher, JsonRpcDispatcher, NoopDispatcher, SupporteeEntry};
pub use errors::MonitorError;
pub use message::{MessageKind, PeerRole};
pub use monitor::Monitor;
pub use peer::{Peer, PeerKey, PeerState};
pub use stats::{NullStatsSink, StateCounts, StatsSink};
pub use supporter::{Supporter, SupporterKey};
