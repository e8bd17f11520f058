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

pub mod memory;
pub mod mongo;
pub mod postgres;
pub mod redis;

use async_trait::async_trait;
use meshreplay_core::{Backend, NodeId, PeerDirectory};
use std::sync::Arc;
use tracing::debug;

use crate::config::StorageConfig;
use crate::connection::{StorageConnection, StorageConnector};
use crate::error::StorageError;

/// Connects to real storage nodes, addressed through the peer directory.
pub struct NativeConnector {
    config: StorageConfig,
    peers: PeerDirectory,
}

impl NativeConnector {
    pub fn new(config: StorageConfig, peers: PeerDirectory) -> Self {
        Self { config, peers }
    }
}

#[async_trait]
impl StorageConnector for NativeConnector {
    async fn connect(
        &self,
        backend: Backend,
        node: &NodeId,
    ) -> Result<Arc<dyn StorageConnection>, StorageError> {
        let addr = self.peers.address(node.as_str(), backend.node_kind());
        let timeout = self.config.connect_timeout();
        debug!(%backend, %node, %addr, "opening storage connection");

        let conn: Arc<dyn StorageConnection> = match backend {
            Backend::Mongo => Arc::new(
                mongo::MongoConnection::connect(node, &addr, &self.config.mongo, timeout).await?,
            ),
            Backend::Redis => Arc::new(redis::RedisConnection::connect(node, &addr, timeout).await?),
            Backend::Postgres => Arc::new(
                postgres::PostgresConnection::connect(node, &addr, &self.config.postgres, timeout)
                    .await?,
            ),
        };
        Ok(conn)
    }
}
