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

//! Meshreplay Trace Dispatcher
//!
//! Replays a trace corpus into a running topology of meshreplay nodes and
//! waits for the topology to drain.
//!
//! ```rust,ignore
//! let corpus = Corpus::load(Path::new("traces.json"))?;
//! let dispatcher = Dispatcher::new(DispatcherConfig::default(), peers.clone(), sink)?;
//! let stats = dispatcher.run(&corpus).await?;
//! let drain = StatusPoller::new(peers, DrainConfig::default())?
//!     .drain_all(&corpus.service_nodes())
//!     .await;
//! ```

pub mod corpus;
pub mod dispatcher;
pub mod drain;
pub mod error;
pub mod report;

pub use corpus::{load_node_list, Corpus, CorpusEntry};
pub use dispatcher::{Dispatcher, DispatcherConfig, InjectionStats, DISPATCHER_NODE_ID};
pub use drain::{DrainConfig, DrainOutcome, NodeDrain, StatusPoller};
pub use error::DispatchError;
pub use report::DispatchReport;
