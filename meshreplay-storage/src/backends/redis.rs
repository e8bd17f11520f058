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

//! Redis shim: plain `SET` / `GET` on the object key.

use async_trait::async_trait;
use meshreplay_core::{Backend, NodeId, OpType};
use ::redis::aio::ConnectionManager;
use ::redis::AsyncCommands;
use std::time::Duration;

use crate::connection::StorageConnection;
use crate::error::StorageError;

pub struct RedisConnection {
    node: NodeId,
    manager: ConnectionManager,
}

impl RedisConnection {
    pub async fn connect(
        node: &NodeId,
        addr: &str,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = ::redis::Client::open(format!("redis://{addr}/"))
            .map_err(|e| StorageError::connect(Backend::Redis, node, e))?;

        let manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StorageError::Timeout {
                backend: Backend::Redis,
                node: node.clone(),
                after: timeout,
            })?
            .map_err(|e| StorageError::connect(Backend::Redis, node, e))?;

        Ok(Self {
            node: node.clone(),
            manager,
        })
    }
}

#[async_trait]
impl StorageConnection for RedisConnection {
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // ConnectionManager clones share one multiplexed connection
        let mut conn = self.manager.clone();
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| StorageError::operation(Backend::Redis, OpType::Write, &self.node, e))
    }

    async fn read(&self, key: &str, _value: Option<&str>) -> Result<Option<String>, StorageError> {
        let mut conn = self.manager.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| StorageError::operation(Backend::Redis, OpType::Read, &self.node, e))
    }
}
