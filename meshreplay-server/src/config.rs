// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Result;
use meshreplay_core::{
    LatencyDistribution, NodeId, PeerDirectory, ReplayError, DEFAULT_PAYLOAD_BYTES,
};
use meshreplay_storage::{DriverKind, MongoReadMode, StorageConfig};
use meshreplay_telemetry::LogFormat;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Meshreplay Node Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSettings,
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub peers: PeerDirectory,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeSettings {
    /// This node's identity in the call graph (required)
    #[serde(default)]
    pub id: Option<String>,

    /// Self-cost table in milliseconds (default: production-shaped table)
    #[serde(default)]
    pub latency_table_ms: Option<Vec<u64>>,

    /// Nodes that skip the sampled self-cost and sleep `fixed_delay_ms`
    #[serde(default)]
    pub fixed_delay_nodes: Vec<String>,

    #[serde(default = "default_fixed_delay_ms")]
    pub fixed_delay_ms: u64,

    /// Raw bytes per synthetic value, unless the operation carries a size
    #[serde(default = "default_payload_bytes")]
    pub payload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP listen address (e.g., "0.0.0.0:5000")
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    /// Timeout for calls to peer nodes, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Directory for the per-node CSV streams
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Record a Sync/Async row for every data operation
    #[serde(default = "default_record_data_ops")]
    pub record_data_ops: bool,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub log_format: LogFormat,
}

// Default values
fn default_fixed_delay_ms() -> u64 {
    10
}

fn default_payload_bytes() -> usize {
    DEFAULT_PAYLOAD_BYTES
}

fn default_http_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_request_timeout() -> u64 {
    80
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_record_data_ops() -> bool {
    true
}

fn default_channel_capacity() -> usize {
    8192
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            id: None,
            latency_table_ms: None,
            fixed_delay_nodes: vec![],
            fixed_delay_ms: default_fixed_delay_ms(),
            payload_bytes: default_payload_bytes(),
        }
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_http_addr(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            record_data_ops: default_record_data_ops(),
            channel_capacity: default_channel_capacity(),
            log_format: LogFormat::default(),
        }
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}", name, raw);
            None
        }
    }
}

impl NodeConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - MESHREPLAY_NODE_ID, or CONTAINER_NAME: node identity (required)
    /// - MESHREPLAY_HTTP_ADDR: listen address (default: 0.0.0.0:5000)
    /// - MESHREPLAY_LOG_DIR: telemetry directory (default: ./logs)
    /// - MESHREPLAY_PEER_PORT: port of peer service-logic nodes (default: 5000)
    /// - MESHREPLAY_REQUEST_TIMEOUT: peer call timeout in seconds (default: 80)
    /// - MESHREPLAY_PAYLOAD_BYTES: synthetic value size (default: 100)
    /// - MESHREPLAY_STORAGE_DRIVER: native or memory (default: native)
    /// - MESHREPLAY_PG_USER / MESHREPLAY_PG_PASSWORD / MESHREPLAY_PG_DATABASE
    /// - MESHREPLAY_MONGO_DATABASE, MESHREPLAY_MONGO_READ_MODE (document or key)
    /// - MESHREPLAY_LOG_FORMAT: json for JSON process logs
    pub fn from_env() -> Self {
        Self::merge_with_env(Self::default())
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let Some(path) = config_file else {
            return Ok(Self::from_env());
        };

        let config = if path.exists() {
            tracing::info!("Loading configuration from file: {:?}", path);
            Self::from_file(&path)?
        } else {
            tracing::warn!("Config file not found: {:?}, using defaults", path);
            Self::default()
        };

        Ok(Self::merge_with_env(config))
    }

    /// Overlay every environment variable that is set
    fn merge_with_env(mut config: Self) -> Self {
        if let Some(id) = env("MESHREPLAY_NODE_ID").or_else(|| env("CONTAINER_NAME")) {
            config.node.id = Some(id);
        }
        if let Some(addr) = env("MESHREPLAY_HTTP_ADDR") {
            config.server.listen_addr = addr;
        }
        if let Some(dir) = env("MESHREPLAY_LOG_DIR") {
            config.telemetry.log_dir = PathBuf::from(dir);
        }
        if let Some(port) = env_parse("MESHREPLAY_PEER_PORT") {
            config.peers.service_port = port;
        }
        if let Some(timeout) = env_parse("MESHREPLAY_REQUEST_TIMEOUT") {
            config.server.request_timeout_secs = timeout;
        }
        if let Some(bytes) = env_parse("MESHREPLAY_PAYLOAD_BYTES") {
            config.node.payload_bytes = bytes;
        }
        if let Some(driver) = env("MESHREPLAY_STORAGE_DRIVER") {
            config.storage.driver = if driver.eq_ignore_ascii_case("memory") {
                DriverKind::Memory
            } else {
                DriverKind::Native
            };
        }
        if let Some(user) = env("MESHREPLAY_PG_USER") {
            config.storage.postgres.user = user;
        }
        if let Some(password) = env("MESHREPLAY_PG_PASSWORD") {
            config.storage.postgres.password = password;
        }
        if let Some(database) = env("MESHREPLAY_PG_DATABASE") {
            config.storage.postgres.database = database;
        }
        if let Some(database) = env("MESHREPLAY_MONGO_DATABASE") {
            config.storage.mongo.database = database;
        }
        if let Some(mode) = env_parse::<MongoReadMode>("MESHREPLAY_MONGO_READ_MODE") {
            config.storage.mongo.read_mode = mode;
        }
        if let Some(format) = env("MESHREPLAY_LOG_FORMAT") {
            config.telemetry.log_format = LogFormat::from_env_value(&format);
        }

        config
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> meshreplay_core::Result<SocketAddr> {
        self.server.listen_addr.parse().map_err(|e| {
            ReplayError::config(format!(
                "invalid listen address '{}': {e}",
                self.server.listen_addr
            ))
        })
    }

    pub fn node_id(&self) -> meshreplay_core::Result<NodeId> {
        match self.node.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(NodeId::from(id)),
            _ => Err(ReplayError::config(
                "node identity missing: set CONTAINER_NAME or MESHREPLAY_NODE_ID",
            )),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Self-cost distribution for this node.
    pub fn self_cost(&self) -> meshreplay_core::Result<LatencyDistribution> {
        let id = self.node_id()?;
        if self
            .node
            .fixed_delay_nodes
            .iter()
            .any(|n| n.as_str() == id.as_str())
        {
            return Ok(LatencyDistribution::fixed(Duration::from_millis(
                self.node.fixed_delay_ms,
            )));
        }
        match &self.node.latency_table_ms {
            Some(table) => LatencyDistribution::new(table),
            None => Ok(LatencyDistribution::production()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> meshreplay_core::Result<()> {
        self.node_id()?;
        self.socket_addr()?;
        let self_cost = self.self_cost()?;

        if self.server.request_timeout_secs == 0 {
            return Err(ReplayError::config("request timeout must be greater than 0"));
        }
        // callers give up on a hop before it could finish sleeping
        if self_cost.max() >= self.request_timeout() {
            return Err(ReplayError::config(format!(
                "self-cost of up to {:?} does not fit the {}s request timeout",
                self_cost.max(),
                self.server.request_timeout_secs
            )));
        }
        if self.telemetry.channel_capacity == 0 {
            return Err(ReplayError::config(
                "telemetry channel capacity must be greater than 0",
            ));
        }
        self.storage
            .validate()
            .map_err(|e| ReplayError::config(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_id(id: &str) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.node.id = Some(id.to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.server.listen_addr, "0.0.0.0:5000");
        assert_eq!(config.node.payload_bytes, 100);
        assert_eq!(config.telemetry.log_dir, PathBuf::from("./logs"));
        assert!(config.telemetry.record_data_ops);
    }

    #[test]
    fn test_missing_identity_is_configuration_error() {
        let err = NodeConfig::default().validate().unwrap_err();
        assert!(matches!(err, ReplayError::Configuration(_)));
        assert!(with_id("n1").validate().is_ok());
        assert!(with_id("   ").validate().is_err());
    }

    #[test]
    fn test_fixed_delay_node() {
        let mut config = with_id("n2146");
        config.node.fixed_delay_nodes = vec!["n2146".into()];
        let cost = config.self_cost().unwrap();
        assert_eq!(cost.sample(), Duration::from_millis(10));

        let other = with_id("n1");
        assert_eq!(other.self_cost().unwrap(), LatencyDistribution::production());
    }

    #[test]
    fn test_empty_latency_table_rejected() {
        let mut config = with_id("n1");
        config.node.latency_table_ms = Some(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_self_cost_must_fit_request_timeout() {
        let mut config = with_id("n1");
        config.server.request_timeout_secs = 1;
        config.node.latency_table_ms = Some(vec![10, 1_500]);
        assert!(matches!(
            config.validate().unwrap_err(),
            ReplayError::Configuration(_)
        ));

        config.node.latency_table_ms = Some(vec![10, 900]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config: NodeConfig = toml::from_str(
            r#"
            [node]
            id = "A"
            latency_table_ms = [0, 1]

            [storage]
            driver = "memory"

            [peers.overrides]
            B = "127.0.0.1:6001"
            "#,
        )
        .unwrap();
        assert_eq!(config.node_id().unwrap().as_str(), "A");
        assert_eq!(config.storage.driver, DriverKind::Memory);
        assert_eq!(config.peers.packet_url("B"), "http://127.0.0.1:6001/");
        assert_eq!(config.server.request_timeout_secs, 80);
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("MESHREPLAY_NODE_ID", "n77");
        std::env::set_var("MESHREPLAY_HTTP_ADDR", "127.0.0.1:5999");
        std::env::set_var("MESHREPLAY_MONGO_READ_MODE", "key");

        let config = NodeConfig::from_env();
        assert_eq!(config.node.id.as_deref(), Some("n77"));
        assert_eq!(config.server.listen_addr, "127.0.0.1:5999");
        assert_eq!(config.storage.mongo.read_mode, MongoReadMode::Key);

        let loaded = NodeConfig::load(None).unwrap();
        assert_eq!(loaded.node_id().unwrap().as_str(), "n77");

        std::env::remove_var("MESHREPLAY_NODE_ID");
        std::env::remove_var("MESHREPLAY_HTTP_ADDR");
        std::env::remove_var("MESHREPLAY_MONGO_READ_MODE");
    }
}
