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

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::StorageError;

/// Which connector backs the shim layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Real MongoDB, Redis and Postgres nodes.
    #[default]
    Native,
    /// In-process maps, for local runs.
    Memory,
}

/// How the MongoDB shim resolves a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MongoReadMode {
    /// Match the whole `{key: value}` document.
    #[default]
    Document,
    /// Match any document carrying `key`.
    Key,
}

impl std::str::FromStr for MongoReadMode {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "key" => Ok(Self::Key),
            other => Err(StorageError::InvalidConfig(format!(
                "unknown mongo read mode '{other}' (expected document or key)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub driver: DriverKind,

    /// Connect timeout per storage node, in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Timeout for a single read or write, in milliseconds
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,

    /// Operations slower than this are logged as warnings
    #[serde(default = "default_slow_op_warn_ms")]
    pub slow_op_warn_ms: u64,

    #[serde(default)]
    pub mongo: MongoConfig,

    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MongoConfig {
    #[serde(default = "default_mongo_database")]
    pub database: String,

    #[serde(default = "default_mongo_collection")]
    pub collection: String,

    #[serde(default)]
    pub read_mode: MongoReadMode,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresConfig {
    #[serde(default = "default_pg_user")]
    pub user: String,

    #[serde(default = "default_pg_password")]
    pub password: String,

    #[serde(default = "default_pg_database")]
    pub database: String,

    /// Two-column `(key, value)` table, created on first connect
    #[serde(default = "default_pg_table")]
    pub table: String,
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_op_timeout_ms() -> u64 {
    30_000
}

fn default_slow_op_warn_ms() -> u64 {
    20
}

fn default_mongo_database() -> String {
    "meshreplay".to_string()
}

fn default_mongo_collection() -> String {
    "objects".to_string()
}

fn default_pg_user() -> String {
    "pguser".to_string()
}

fn default_pg_password() -> String {
    "pgpass".to_string()
}

fn default_pg_database() -> String {
    "pg_db".to_string()
}

fn default_pg_table() -> String {
    "meshreplay_kv".to_string()
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            database: default_mongo_database(),
            collection: default_mongo_collection(),
            read_mode: MongoReadMode::default(),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            user: default_pg_user(),
            password: default_pg_password(),
            database: default_pg_database(),
            table: default_pg_table(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            connect_timeout_ms: default_connect_timeout_ms(),
            op_timeout_ms: default_op_timeout_ms(),
            slow_op_warn_ms: default_slow_op_warn_ms(),
            mongo: MongoConfig::default(),
            postgres: PostgresConfig::default(),
        }
    }
}

impl StorageConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    pub fn slow_op_warn(&self) -> Duration {
        Duration::from_millis(self.slow_op_warn_ms)
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        if self.op_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(StorageError::InvalidConfig(
                "storage timeouts must be greater than 0".to_string(),
            ));
        }
        if !is_identifier(&self.postgres.table) {
            return Err(StorageError::InvalidConfig(format!(
                "postgres table '{}' is not a plain identifier",
                self.postgres.table
            )));
        }
        if self.mongo.database.is_empty() || self.mongo.collection.is_empty() {
            return Err(StorageError::InvalidConfig(
                "mongo database and collection must be set".to_string(),
            ));
        }
        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`; the table name is spliced into SQL text.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = StorageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.slow_op_warn(), Duration::from_millis(20));
        assert_eq!(config.mongo.read_mode, MongoReadMode::Document);
    }

    #[test]
    fn test_rejects_unsafe_table() {
        let mut config = StorageConfig::default();
        config.postgres.table = "kv; DROP TABLE users".to_string();
        assert!(config.validate().is_err());
        config.postgres.table = "_kv2".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_read_mode_parse() {
        assert_eq!("KEY".parse::<MongoReadMode>().unwrap(), MongoReadMode::Key);
        assert!("fuzzy".parse::<MongoReadMode>().is_err());
    }

    #[test]
    fn test_partial_deserialize() {
        let config: StorageConfig =
            serde_json::from_str(r#"{"driver": "memory", "mongo": {"read_mode": "key"}}"#)
                .unwrap();
        assert_eq!(config.driver, DriverKind::Memory);
        assert_eq!(config.mongo.read_mode, MongoReadMode::Key);
        assert_eq!(config.mongo.collection, "objects");
        assert_eq!(config.postgres.user, "pguser");
    }
}
