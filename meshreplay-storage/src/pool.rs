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

//! Per-router connection cache.
//!
//! One slot per (backend, storage node). A slot is a `OnceCell`, so
//! concurrent first uses of the same pair share a single connect attempt,
//! and a failed attempt leaves the slot empty for the next caller to retry.

use dashmap::DashMap;
use meshreplay_core::{Backend, NodeId};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::connection::{StorageConnection, StorageConnector};
use crate::error::StorageError;

type Slot = Arc<OnceCell<Arc<dyn StorageConnection>>>;

#[derive(Default)]
pub struct ConnectionPool {
    slots: DashMap<(Backend, NodeId), Slot>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached connection for the pair, connecting on first use.
    pub async fn get_or_connect(
        &self,
        backend: Backend,
        node: &NodeId,
        connector: &dyn StorageConnector,
    ) -> Result<Arc<dyn StorageConnection>, StorageError> {
        // Clone the slot out so no map guard is held across the connect.
        let slot = self
            .slots
            .entry((backend, node.clone()))
            .or_default()
            .clone();

        let conn = slot
            .get_or_try_init(|| connector.connect(backend, node))
            .await?;
        Ok(Arc::clone(conn))
    }

    /// Number of established connections.
    pub fn connected(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().initialized())
            .count()
    }

    pub fn is_connected(&self, backend: Backend, node: &NodeId) -> bool {
        self.slots
            .get(&(backend, node.clone()))
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }
}
