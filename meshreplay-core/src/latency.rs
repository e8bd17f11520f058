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

//! Simulated per-hop processing cost.
//!
//! The self-cost of a node is drawn uniformly from a discrete table of
//! millisecond values. The default table follows the percentile shape of
//! production service latencies: most hops cost nothing measurable and a
//! thin tail runs into hundreds of milliseconds.

use rand::Rng;
use std::time::Duration;

use crate::error::{ReplayError, Result};

/// Production-shaped self-cost table, in milliseconds.
pub const DEFAULT_LATENCY_TABLE_MS: [u64; 99] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, //
    2, 2, 2, 2, 2, 3, 3, 3, 3, 3, 4, 4, 4, 5, 5, 5, 6, 6, 6, 7, //
    7, 8, 8, 9, 9, 10, 11, 11, 12, 13, 15, 16, 18, 20, 22, 25, //
    29, 33, 39, 45, 52, 62, 70, 78, 87, 97, 111, 126, 143, 164, //
    188, 220, 254, 289, 331, 379, 546,
];

#[derive(Debug, Clone, PartialEq)]
pub struct LatencyDistribution {
    table: Vec<Duration>,
}

impl LatencyDistribution {
    pub fn new(table_ms: &[u64]) -> Result<Self> {
        if table_ms.is_empty() {
            return Err(ReplayError::config("latency table must not be empty"));
        }
        Ok(Self {
            table: table_ms.iter().copied().map(Duration::from_millis).collect(),
        })
    }

    pub fn production() -> Self {
        Self {
            table: DEFAULT_LATENCY_TABLE_MS
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        }
    }

    /// Always yields `delay`.
    pub fn fixed(delay: Duration) -> Self {
        Self { table: vec![delay] }
    }

    pub fn sample(&self) -> Duration {
        self.sample_with(&mut rand::thread_rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        self.table[rng.gen_range(0..self.table.len())]
    }

    /// Longest delay the distribution can yield.
    pub fn max(&self) -> Duration {
        self.table.iter().copied().max().unwrap_or_default()
    }
}

impl Default for LatencyDistribution {
    fn default() -> Self {
        Self::production()
    }
}
