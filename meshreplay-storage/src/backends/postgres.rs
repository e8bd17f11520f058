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

//! Postgres shim over a two-column `(key, value)` table.

use async_trait::async_trait;
use meshreplay_core::{Backend, NodeId, OpType};
use std::time::Duration;
use tokio_postgres::{Client, NoTls};
use tracing::warn;

use crate::config::PostgresConfig;
use crate::connection::StorageConnection;
use crate::error::StorageError;

pub struct PostgresConnection {
    node: NodeId,
    client: Client,
    insert_sql: String,
    select_sql: String,
}

impl PostgresConnection {
    /// Connect and create the table if it does not exist yet.
    ///
    /// `config.table` must already be validated as an identifier.
    pub async fn connect(
        node: &NodeId,
        addr: &str,
        config: &PostgresConfig,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let (host, port) = split_host_port(addr)
            .ok_or_else(|| StorageError::InvalidConfig(format!("bad postgres address '{addr}'")))?;

        let mut pg = tokio_postgres::Config::new();
        pg.host(host)
            .port(port)
            .user(&config.user)
            .password(&config.password)
            .dbname(&config.database)
            .connect_timeout(timeout);

        let (client, connection) = pg
            .connect(NoTls)
            .await
            .map_err(|e| StorageError::connect(Backend::Postgres, node, e))?;

        let conn_node = node.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(node = %conn_node, error = %e, "postgres connection closed");
            }
        });

        let table = &config.table;
        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (key TEXT PRIMARY KEY, value TEXT)"
            ))
            .await
            .map_err(|e| StorageError::connect(Backend::Postgres, node, e))?;

        Ok(Self {
            node: node.clone(),
            client,
            insert_sql: format!(
                "INSERT INTO {table} (key, value) VALUES ($1, $2) \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value"
            ),
            select_sql: format!("SELECT value FROM {table} WHERE key = $1"),
        })
    }
}

fn split_host_port(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    Some((host, port.parse().ok()?))
}

#[async_trait]
impl StorageConnection for PostgresConnection {
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.client
            .execute(self.insert_sql.as_str(), &[&key, &value])
            .await
            .map(|_| ())
            .map_err(|e| StorageError::operation(Backend::Postgres, OpType::Write, &self.node, e))
    }

    async fn read(&self, key: &str, _value: Option<&str>) -> Result<Option<String>, StorageError> {
        let row = self
            .client
            .query_opt(self.select_sql.as_str(), &[&key])
            .await
            .map_err(|e| StorageError::operation(Backend::Postgres, OpType::Read, &self.node, e))?;

        match row {
            Some(row) => {
                let value: Option<String> = row.try_get(0).map_err(|e| {
                    StorageError::operation(Backend::Postgres, OpType::Read, &self.node, e)
                })?;
                Ok(Some(value.unwrap_or_default()))
            }
            None => Ok(None),
        }
    }
}
