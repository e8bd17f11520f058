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

use meshreplay_core::{Backend, NodeId, OpType, ReplayError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cannot connect to {backend} node {node}: {reason}")]
    Connect {
        backend: Backend,
        node: NodeId,
        reason: String,
    },

    #[error("{backend} {op} on {node} failed: {reason}")]
    Operation {
        backend: Backend,
        op: OpType,
        node: NodeId,
        reason: String,
    },

    #[error("{backend} call to {node} timed out after {after:?}")]
    Timeout {
        backend: Backend,
        node: NodeId,
        after: Duration,
    },

    #[error("invalid storage request: {0}")]
    InvalidRequest(String),

    #[error("invalid storage configuration: {0}")]
    InvalidConfig(String),
}

impl StorageError {
    pub fn connect(backend: Backend, node: &NodeId, reason: impl ToString) -> Self {
        Self::Connect {
            backend,
            node: node.clone(),
            reason: reason.to_string(),
        }
    }

    pub fn operation(backend: Backend, op: OpType, node: &NodeId, reason: impl ToString) -> Self {
        Self::Operation {
            backend,
            op,
            node: node.clone(),
            reason: reason.to_string(),
        }
    }
}

impl From<StorageError> for ReplayError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Connect { node, reason, .. } => ReplayError::Transport {
                target: node.to_string(),
                reason,
            },
            StorageError::Timeout { node, after, .. } => ReplayError::Transport {
                target: node.to_string(),
                reason: format!("timed out after {after:?}"),
            },
            StorageError::Operation {
                backend,
                op,
                node,
                reason,
            } => ReplayError::BackendOperation {
                backend: backend.to_string(),
                op: op.to_string(),
                target: node.to_string(),
                reason,
            },
            StorageError::InvalidRequest(msg) => ReplayError::MalformedPacket(msg),
            StorageError::InvalidConfig(msg) => ReplayError::Configuration(msg),
        }
    }
}
