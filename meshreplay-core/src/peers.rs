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

//! Node addressing.
//!
//! In a deployed topology every node id is also a resolvable hostname and
//! each node kind listens on its conventional port. Overrides map a node id
//! to an explicit `host:port`, which is how local runs and tests place
//! several nodes on one machine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::packet::NodeKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDirectory {
    #[serde(default = "default_service_port")]
    pub service_port: u16,
    #[serde(default = "default_mongo_port")]
    pub mongo_port: u16,
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,
    /// node id -> `host:port`
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_service_port() -> u16 {
    NodeKind::ServiceLogic.default_port()
}

fn default_mongo_port() -> u16 {
    NodeKind::Mongo.default_port()
}

fn default_redis_port() -> u16 {
    NodeKind::Redis.default_port()
}

fn default_postgres_port() -> u16 {
    NodeKind::Postgres.default_port()
}

impl Default for PeerDirectory {
    fn default() -> Self {
        Self {
            service_port: default_service_port(),
            mongo_port: default_mongo_port(),
            redis_port: default_redis_port(),
            postgres_port: default_postgres_port(),
            overrides: HashMap::new(),
        }
    }
}

impl PeerDirectory {
    pub fn with_override(mut self, node: impl Into<String>, addr: impl Into<String>) -> Self {
        self.overrides.insert(node.into(), addr.into());
        self
    }

    pub fn port_for(&self, kind: NodeKind) -> u16 {
        match kind {
            NodeKind::ServiceLogic => self.service_port,
            NodeKind::Mongo => self.mongo_port,
            NodeKind::Redis => self.redis_port,
            NodeKind::Postgres => self.postgres_port,
        }
    }

    /// `host:port` for `node` when reached as a `kind` node.
    pub fn address(&self, node: &str, kind: NodeKind) -> String {
        match self.overrides.get(node) {
            Some(addr) => addr.clone(),
            None => format!("{}:{}", node, self.port_for(kind)),
        }
    }

    pub fn base_url(&self, node: &str) -> String {
        format!("http://{}", self.address(node, NodeKind::ServiceLogic))
    }

    /// Packet entry point of a service-logic node.
    pub fn packet_url(&self, node: &str) -> String {
        format!("{}/", self.base_url(node))
    }

    pub fn status_url(&self, node: &str) -> String {
        format!("{}/status", self.base_url(node))
    }
}
