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

//! Liveness Tracker
//!
//! Counts packets this node has accepted and not yet finished, including
//! asynchronous work spawned on their behalf. The dispatcher polls the
//! status line to learn when the topology has drained.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Prefix of the status body; pollers match on it.
pub const STATUS_PREFIX: &str = "Alive request count: ";

#[derive(Debug, Clone, Default)]
pub struct LivenessTracker {
    in_flight: Arc<AtomicU64>,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one packet as in flight until every clone of the returned
    /// guard is dropped.
    ///
    /// Detached tasks for asynchronous edges hold their own clone, so the
    /// count stays up until the last of them finishes. The decrement runs in
    /// `Drop`, so a panicking task still releases its share.
    pub fn acquire(&self) -> Arc<LivenessGuard> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Arc::new(LivenessGuard {
            in_flight: self.in_flight.clone(),
        })
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn status_line(&self) -> String {
        format!("{STATUS_PREFIX}{}", self.in_flight())
    }
}

#[derive(Debug)]
pub struct LivenessGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
