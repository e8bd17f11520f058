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

//! Best-effort drain check over the nodes' `/status` endpoints.
//!
//! Nodes are polled one after another; each is re-polled until it reports
//! zero in-flight packets. A node that was checked at zero may still get new
//! asynchronous work from a node polled later, so this is an end-of-run
//! signal and not a barrier.

use meshreplay_core::{NodeId, PeerDirectory};
use regex::Regex;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::DispatchError;

#[derive(Debug, Clone)]
pub struct DrainConfig {
    pub poll_interval: Duration,
    /// Consecutive failed polls before a node is reported unreachable
    pub max_poll_failures: u32,
    pub request_timeout: Duration,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_poll_failures: 3,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DrainOutcome {
    Drained { polls: u32 },
    Unreachable { last_error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDrain {
    pub node: NodeId,
    #[serde(flatten)]
    pub outcome: DrainOutcome,
}

impl NodeDrain {
    pub fn is_drained(&self) -> bool {
        matches!(self.outcome, DrainOutcome::Drained { .. })
    }
}

pub struct StatusPoller {
    http: reqwest::Client,
    peers: PeerDirectory,
    config: DrainConfig,
    pattern: Regex,
}

impl StatusPoller {
    pub fn new(peers: PeerDirectory, config: DrainConfig) -> Result<Self, DispatchError> {
        if config.max_poll_failures == 0 {
            return Err(DispatchError::InvalidConfig(
                "max poll failures must be greater than 0".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DispatchError::Client(e.to_string()))?;
        let pattern = Regex::new(r"Alive request count: (\d+)")
            .map_err(|e| DispatchError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http,
            peers,
            config,
            pattern,
        })
    }

    /// In-flight count from a status body.
    pub fn parse_status(&self, body: &str) -> Option<u64> {
        self.pattern
            .captures(body)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    async fn poll(&self, node: &NodeId) -> Result<u64, String> {
        let body = self
            .http
            .get(self.peers.status_url(node.as_str()))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?
            .text()
            .await
            .map_err(|e| e.to_string())?;

        self.parse_status(&body)
            .ok_or_else(|| format!("unexpected status body {body:?}"))
    }

    /// Re-poll `node` until it reports zero or keeps failing.
    pub async fn wait_for_node(&self, node: &NodeId) -> NodeDrain {
        let mut polls = 0u32;
        let mut failures = 0u32;

        loop {
            polls += 1;
            match self.poll(node).await {
                Ok(0) => {
                    debug!(%node, polls, "node drained");
                    return NodeDrain {
                        node: node.clone(),
                        outcome: DrainOutcome::Drained { polls },
                    };
                }
                Ok(in_flight) => {
                    failures = 0;
                    debug!(%node, in_flight, "node still busy");
                }
                Err(e) => {
                    failures += 1;
                    warn!(%node, error = %e, failures, "status poll failed");
                    if failures >= self.config.max_poll_failures {
                        return NodeDrain {
                            node: node.clone(),
                            outcome: DrainOutcome::Unreachable { last_error: e },
                        };
                    }
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Check every node in turn.
    pub async fn drain_all(&self, nodes: &[NodeId]) -> Vec<NodeDrain> {
        info!(nodes = nodes.len(), "Waiting for topology to drain");
        let mut results = Vec::with_capacity(nodes.len());
        for node in nodes {
            results.push(self.wait_for_node(node).await);
        }
        results
    }
}
