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

//! Replay error taxonomy.
//!
//! | Variant            | Raised by                         | Handling                          |
//! |--------------------|-----------------------------------|-----------------------------------|
//! | `Transport`        | peer calls, storage connects      | logged, edge becomes a no-op      |
//! | `BackendOperation` | a storage driver rejecting an op  | logged, edge becomes a no-op      |
//! | `MalformedPacket`  | packet decoding, self lookup      | aborts that packet only           |
//! | `Configuration`    | startup validation                | fatal before serving              |
//!
//! A data edge naming an operation the packet does not carry is reported as
//! `MalformedPacket` too, but only that edge is skipped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("transport error reaching {target}: {reason}")]
    Transport { target: String, reason: String },

    #[error("{backend} rejected {op} on {target}: {reason}")]
    BackendOperation {
        backend: String,
        op: String,
        target: String,
        reason: String,
    },

    #[error("malformed trace packet: {0}")]
    MalformedPacket(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, ReplayError>;

impl ReplayError {
    pub fn transport(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPacket(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Transport and backend failures only cost the edge that produced them.
    pub fn is_edge_local(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::BackendOperation { .. })
    }
}
