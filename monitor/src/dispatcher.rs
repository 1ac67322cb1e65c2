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

//! The dispatcher is the monitor's only point of contact with the outside
//! world: it establishes and tears down RPC handles for supporters, probes
//! them for liveness, and pushes roster updates. The RPC transport itself
//! is out of scope for the monitor core (spec §1); this module defines the
//! interface the coordinator programs against, a no-op/recording double for
//! tests, and a reference JSON-RPC implementation.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::supporter::{Supporter, SupporterKey};

/// One entry of a roster push: `(peer_id, ip, port)`, per spec §6.
pub type SupporteeEntry = (String, IpAddr, u16);

/// The four operations the coordinator needs from a supporter-facing RPC
/// transport. Implementations MAY perform I/O concurrently across
/// supporters but MUST NOT hold the coordinator's lock while doing so.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Invoked when a supporter is registered; establishes whatever
    /// transport handle the dispatcher needs.
    async fn register_proxy(&self, supporter: &Supporter);

    /// Invoked when a supporter is unregistered.
    async fn unregister_proxy(&self, supporter: &SupporterKey);

    /// Probes every given supporter for liveness; returns the keys of the
    /// ones that did not respond, so the coordinator can mark them dead.
    async fn query_all_supporters(&self, supporters: &[Supporter]) -> Vec<SupporterKey>;

    /// Pushes one roster to its supporter. Failures are logged by the
    /// implementation and reported back as `false`; they never mark the
    /// supporter dead (only a failed liveness probe does that).
    async fn dispatch_peer_list(&self, supporter: &SupporterKey, roster: Vec<SupporteeEntry>) -> bool;
}

/// A dispatcher that does nothing; used by tests that only exercise the
/// state machine and coordinator bookkeeping.
#[derive(Debug, Default)]
pub struct NoopDispatcher;

#[async_trait]
impl Dispatcher for NoopDispatcher {
    async fn register_proxy(&self, _supporter: &Supporter) {}

    async fn unregister_proxy(&self, _supporter: &SupporterKey) {}

    async fn query_all_supporters(&self, _supporters: &[Supporter]) -> Vec<SupporterKey> {
        Vec::new()
    }

    async fn dispatch_peer_list(&self, _supporter: &SupporterKey, _roster: Vec<SupporteeEntry>) -> bool {
        true
    }
}

/// A dispatcher that records every dispatched roster, for assertions in
/// tests that verify the dirty-flag discipline (spec §8, scenario 8).
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    pub dispatched: Mutex<HashMap<SupporterKey, Vec<SupporteeEntry>>>,
    pub dead: Mutex<Vec<SupporterKey>>,
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn register_proxy(&self, _supporter: &Supporter) {}

    async fn unregister_proxy(&self, _supporter: &SupporterKey) {}

    async fn query_all_supporters(&self, _supporters: &[Supporter]) -> Vec<SupporterKey> {
        self.dead.lock().clone()
    }

    async fn dispatch_peer_list(&self, supporter: &SupporterKey, roster: Vec<SupporteeEntry>) -> bool {
        self.dispatched.lock().insert(supporter.clone(), roster);
        true
    }
}

/// Reference JSON-RPC dispatcher, built on the same `jsonrpc-core-client`
/// stack `snarkos-rpc` already depends on. The supporter's RPC endpoint is
/// `(host, port + 1)` per spec §6.
pub struct JsonRpcDispatcher {
    clients: Mutex<HashMap<SupporterKey, jsonrpc_core_client::TypedClient>>,
}

impl Default for JsonRpcDispatcher {
    fn default() -> Self {
        Self { clients: Mutex::new(HashMap::new()) }
    }
}

impl JsonRpcDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn endpoint(supporter_host: &str, rpc_port: u16) -> String {
        format!("http://{}:{}", supporter_host, rpc_port)
    }

    async fn connect(host: &str, rpc_port: u16) -> Result<jsonrpc_core_client::TypedClient, jsonrpc_core_client::RpcError> {
        let uri = Self::endpoint(host, rpc_port);
        let channel: jsonrpc_core_client::RpcChannel = jsonrpc_core_client::transports::http::connect(&uri).await?;
        Ok(channel.into())
    }
}

#[async_trait]
impl Dispatcher for JsonRpcDispatcher {
    async fn register_proxy(&self, supporter: &Supporter) {
        match Self::connect(supporter.host(), supporter.rpc_port()).await {
            Ok(client) => {
                self.clients.lock().insert(supporter.key(), client);
            }
            Err(e) => {
                tracing::warn!("Failed to establish an RPC proxy for supporter {}: {}", supporter.id(), e);
            }
        }
    }

    async fn unregister_proxy(&self, supporter: &SupporterKey) {
        self.clients.lock().remove(supporter);
    }

    async fn query_all_supporters(&self, supporters: &[Supporter]) -> Vec<SupporterKey> {
        let mut dead = Vec::new();
        for supporter in supporters {
            let key = supporter.key();
            let client = self.clients.lock().get(&key).cloned();
            let responded = match client {
                Some(client) => client.call_method::<(), bool>("is_alive", "bool", ()).await.is_ok(),
                None => false,
            };
            if !responded {
                tracing::info!("Supporter {} is not responding; marking it for unregistering", supporter.id());
                dead.push(key);
            }
        }
        dead
    }

    async fn dispatch_peer_list(&self, supporter: &SupporterKey, roster: Vec<SupporteeEntry>) -> bool {
        let client = self.clients.lock().get(supporter).cloned();
        match client {
            Some(client) => match client.call_method::<(Vec<SupporteeEntry>,), ()>("receive_peer_list", "()", (roster,)).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Failed to dispatch peer list to supporter {}: {}", supporter.id, e);
                    false
                }
            },
            None => false,
        }
    }
}
