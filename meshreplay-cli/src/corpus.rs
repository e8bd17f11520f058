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

//! Trace corpus loading.
//!
//! A corpus is one JSON object mapping trace ids to packets. Entries are
//! replayed in file order; entries that do not decode or validate are
//! skipped and counted.

use bytes::Bytes;
use meshreplay_core::{NodeId, TracePacket};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

use crate::error::DispatchError;

#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub packet: TracePacket,
    /// The entry as it appeared in the corpus, sent as the request body
    pub body: Bytes,
}

#[derive(Debug, Default)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
    skipped: usize,
}

impl Corpus {
    pub fn load(path: &Path) -> Result<Self, DispatchError> {
        let raw = std::fs::read(path).map_err(|e| DispatchError::corpus(path, e))?;
        Self::from_slice(&raw).map_err(|e| DispatchError::corpus(path, e))
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(raw)?;
        let mut corpus = Corpus::default();

        for (key, value) in map {
            let body = serde_json::to_vec(&value)?;
            match TracePacket::from_slice(&body).and_then(|p| p.validate().map(|_| p)) {
                Ok(packet) => corpus.entries.push(CorpusEntry {
                    packet,
                    body: Bytes::from(body),
                }),
                Err(e) => {
                    warn!(entry = %key, error = %e, "skipping corpus entry");
                    corpus.skipped += 1;
                }
            }
        }
        Ok(corpus)
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Every service-logic node any packet can reach.
    pub fn service_nodes(&self) -> Vec<NodeId> {
        let nodes: BTreeSet<&NodeId> = self
            .entries
            .iter()
            .flat_map(|e| e.packet.service_nodes())
            .collect();
        nodes.into_iter().cloned().collect()
    }
}

/// Read a JSON array of node ids.
pub fn load_node_list(path: &Path) -> Result<Vec<NodeId>, DispatchError> {
    let raw = std::fs::read(path).map_err(|e| DispatchError::corpus(path, e))?;
    serde_json::from_slice(&raw).map_err(|e| DispatchError::corpus(path, e))
}
