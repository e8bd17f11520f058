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

//! Meshreplay Storage Shim Layer
//!
//! Uniform `execute(backend, op, key, value, node)` over MongoDB, Redis and
//! Postgres storage nodes.
//!
//! ## Architecture
//!
//! ```text
//! NodeRouter ──► ShimLayer::execute ──► ConnectionPool ──► StorageConnector
//!                     │ (timeouts,          (one slot per      ├─ NativeConnector
//!                     │  slow-op warn)       backend, node)    └─ MemoryConnector
//!                     ▼
//!                StorageConnection::{write, read}
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meshreplay_storage::{MemoryConnector, ShimLayer, StorageConfig};
//!
//! let shim = ShimLayer::new(Arc::new(MemoryConnector::new()), &StorageConfig::default());
//! shim.execute(Backend::Redis, OpType::Write, "k1", Some("v"), &"r1".into()).await?;
//! ```

pub mod backends;
pub mod config;
pub mod connection;
pub mod error;
pub mod pool;
pub mod shim;

pub use backends::memory::MemoryConnector;
pub use backends::NativeConnector;
pub use config::{DriverKind, MongoConfig, MongoReadMode, PostgresConfig, StorageConfig};
pub use connection::{OpOutcome, StorageConnection, StorageConnector};
pub use error::StorageError;
pub use pool::ConnectionPool;
pub use shim::ShimLayer;
