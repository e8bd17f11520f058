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

//! Backend seam.
//!
//! A [`StorageConnector`] opens one [`StorageConnection`] per
//! (backend, storage node) pair. Connections are long lived and shared
//! between concurrent operations, so implementations take `&self`.

use async_trait::async_trait;
use meshreplay_core::{Backend, NodeId};
use std::sync::Arc;

use crate::error::StorageError;

/// Result of one shim call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    Written,
    /// The stored value, as text.
    Found(String),
    /// A read that matched nothing. Not an error.
    NotFound,
}

#[async_trait]
pub trait StorageConnection: Send + Sync {
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Look up `key`. `value` is the synthetic value generated at the call
    /// site; backends that match on content use it, the rest ignore it.
    async fn read(&self, key: &str, value: Option<&str>) -> Result<Option<String>, StorageError>;
}

#[async_trait]
pub trait StorageConnector: Send + Sync {
    async fn connect(
        &self,
        backend: Backend,
        node: &NodeId,
    ) -> Result<Arc<dyn StorageConnection>, StorageError>;
}
