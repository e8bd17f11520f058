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

//! Uniform read/write entry point over the three backends.

use meshreplay_core::{Backend, NodeId, OpType};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::connection::{OpOutcome, StorageConnection, StorageConnector};
use crate::error::StorageError;
use crate::pool::ConnectionPool;

pub struct ShimLayer {
    pool: ConnectionPool,
    connector: Arc<dyn StorageConnector>,
    connect_timeout: Duration,
    op_timeout: Duration,
    slow_op_warn: Duration,
}

impl ShimLayer {
    pub fn new(connector: Arc<dyn StorageConnector>, config: &StorageConfig) -> Self {
        Self {
            pool: ConnectionPool::new(),
            connector,
            connect_timeout: config.connect_timeout(),
            op_timeout: config.op_timeout(),
            slow_op_warn: config.slow_op_warn(),
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Run one data operation against storage node `node`.
    ///
    /// Writes require `value`. Reads pass it through for backends that
    /// match on content.
    pub async fn execute(
        &self,
        backend: Backend,
        op: OpType,
        key: &str,
        value: Option<&str>,
        node: &NodeId,
    ) -> Result<OpOutcome, StorageError> {
        let started = Instant::now();

        let conn = tokio::time::timeout(
            self.connect_timeout,
            self.pool
                .get_or_connect(backend, node, self.connector.as_ref()),
        )
        .await
        .map_err(|_| StorageError::Timeout {
            backend,
            node: node.clone(),
            after: self.connect_timeout,
        })??;

        let outcome = tokio::time::timeout(self.op_timeout, run_op(conn.as_ref(), op, key, value))
            .await
            .map_err(|_| StorageError::Timeout {
                backend,
                node: node.clone(),
                after: self.op_timeout,
            })??;

        let elapsed = started.elapsed();
        if elapsed > self.slow_op_warn {
            warn!(%backend, %node, %op, ?elapsed, "slow storage call");
        } else {
            debug!(%backend, %node, %op, ?elapsed, "storage call");
        }
        Ok(outcome)
    }
}

async fn run_op(
    conn: &dyn StorageConnection,
    op: OpType,
    key: &str,
    value: Option<&str>,
) -> Result<OpOutcome, StorageError> {
    match op {
        OpType::Write => {
            let value = value.ok_or_else(|| {
                StorageError::InvalidRequest(format!("write of '{key}' without a value"))
            })?;
            conn.write(key, value).await?;
            Ok(OpOutcome::Written)
        }
        OpType::Read => Ok(match conn.read(key, value).await? {
            Some(found) => OpOutcome::Found(found),
            None => OpOutcome::NotFound,
        }),
    }
}
