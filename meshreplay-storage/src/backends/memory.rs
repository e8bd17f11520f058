// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! In-process storage nodes.
//!
//! Every (backend, node) pair gets its own key/value map, so a topology of
//! routers sharing one `MemoryConnector` sees the same data a deployment
//! with real storage containers would. Used for local runs and tests.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use meshreplay_core::{Backend, NodeId, OpType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::connection::{StorageConnection, StorageConnector};
use crate::error::StorageError;

type Store = Arc<DashMap<String, String>>;

#[derive(Default)]
pub struct MemoryConnector {
    stores: DashMap<(Backend, NodeId), Store>,
    unreachable: DashSet<NodeId>,
    rejecting: DashSet<NodeId>,
    op_latency: Option<Duration>,
    connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation sleeps for `latency` before touching the map.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            op_latency: Some(latency),
            ..Self::default()
        }
    }

    /// Connect attempts so far, failed ones included.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }

    /// Make connects to `node` fail as if the host were down.
    pub fn set_unreachable(&self, node: &NodeId, unreachable: bool) {
        if unreachable {
            self.unreachable.insert(node.clone());
        } else {
            self.unreachable.remove(node);
        }
    }

    /// Make every operation on `node` fail with a backend error.
    pub fn set_rejecting(&self, node: &NodeId, rejecting: bool) {
        if rejecting {
            self.rejecting.insert(node.clone());
        } else {
            self.rejecting.remove(node);
        }
    }

    /// Direct lookup, bypassing the connection path.
    pub fn get(&self, backend: Backend, node: &str, key: &str) -> Option<String> {
        self.stores
            .get(&(backend, NodeId::from(node)))
            .and_then(|store| store.get(key).map(|v| v.value().clone()))
    }

    pub fn len(&self, backend: Backend, node: &str) -> usize {
        self.stores
            .get(&(backend, NodeId::from(node)))
            .map(|store| store.len())
            .unwrap_or(0)
    }

    fn store(&self, backend: Backend, node: &NodeId) -> Store {
        self.stores
            .entry((backend, node.clone()))
            .or_default()
            .clone()
    }
}

#[async_trait]
impl StorageConnector for MemoryConnector {
    async fn connect(
        &self,
        backend: Backend,
        node: &NodeId,
    ) -> Result<Arc<dyn StorageConnection>, StorageError> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        if self.unreachable.contains(node) {
            return Err(StorageError::connect(backend, node, "connection refused"));
        }
        Ok(Arc::new(MemoryConnection {
            backend,
            node: node.clone(),
            store: self.store(backend, node),
            rejecting: self.rejecting.contains(node),
            latency: self.op_latency,
        }))
    }
}

struct MemoryConnection {
    backend: Backend,
    node: NodeId,
    store: Store,
    rejecting: bool,
    latency: Option<Duration>,
}

impl MemoryConnection {
    async fn simulate(&self, op: OpType) -> Result<(), StorageError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.rejecting {
            return Err(StorageError::operation(
                self.backend,
                op,
                &self.node,
                "rejected by node",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageConnection for MemoryConnection {
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.simulate(OpType::Write).await?;
        self.store.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn read(&self, key: &str, _value: Option<&str>) -> Result<Option<String>, StorageError> {
        self.simulate(OpType::Read).await?;
        Ok(self.store.get(key).map(|v| v.value().clone()))
    }
}
