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

//! HTTP client for service calls between nodes.

use bytes::Bytes;
use meshreplay_core::{NodeId, PeerDirectory, ReplayError};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct PeerClient {
    /// Shared client with connection pooling
    http: reqwest::Client,
    peers: Arc<PeerDirectory>,
}

impl PeerClient {
    pub fn new(peers: PeerDirectory, timeout: Duration) -> Result<Self, ReplayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| ReplayError::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            peers: Arc::new(peers),
        })
    }

    /// POST the encoded packet to `target`'s packet endpoint.
    ///
    /// Resolves once the peer has answered, which for a sync edge means the
    /// peer finished its own synchronous work.
    pub async fn forward(&self, target: &NodeId, body: Bytes) -> Result<(), ReplayError> {
        let url = self.peers.packet_url(target.as_str());

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ReplayError::transport(target.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReplayError::transport(
                target.as_str(),
                format!("peer answered {status}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_peer_is_transport_error() {
        // Port 9 on loopback is closed in test environments.
        let peers = PeerDirectory::default().with_override("B", "127.0.0.1:9");
        let client = PeerClient::new(peers, Duration::from_secs(2)).unwrap();

        let err = client
            .forward(&NodeId::from("B"), Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReplayError::Transport { ref target, .. } if target == "B"));
    }
}
