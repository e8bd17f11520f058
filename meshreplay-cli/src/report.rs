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

use serde::Serialize;

use crate::dispatcher::InjectionStats;
use crate::drain::{DrainOutcome, NodeDrain};

/// End-of-run summary printed by the dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub submitted: u64,
    pub skipped: u64,
    pub send_failures: u64,
    pub runtime_secs: f64,
    pub target_rate: f64,
    pub achieved_rate: f64,
    /// Empty when the drain check was skipped
    pub drain: Vec<NodeDrain>,
}

impl DispatchReport {
    pub fn new(
        stats: &InjectionStats,
        skipped: usize,
        target_rate: f64,
        drain: Vec<NodeDrain>,
    ) -> Self {
        Self {
            submitted: stats.submitted,
            skipped: skipped as u64,
            send_failures: stats.send_failures,
            runtime_secs: stats.runtime.as_secs_f64(),
            target_rate,
            achieved_rate: stats.achieved_rate(),
            drain,
        }
    }

    pub fn all_drained(&self) -> bool {
        self.drain.iter().all(NodeDrain::is_drained)
    }

    /// Human-readable report lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("✓ Submitted {} packets", self.submitted));
        if self.skipped > 0 {
            out.push_str(&format!(" ({} skipped)", self.skipped));
        }
        out.push('\n');
        out.push_str(&format!("  Runtime: {:.2}s\n", self.runtime_secs));
        out.push_str(&format!(
            "  Rate: {:.2} req/s (target {:.2})\n",
            self.achieved_rate, self.target_rate
        ));
        if self.send_failures > 0 {
            out.push_str(&format!("✗ {} sends failed\n", self.send_failures));
        }
        for node in &self.drain {
            match &node.outcome {
                DrainOutcome::Drained { polls } => {
                    out.push_str(&format!("✓ {} drained after {} polls\n", node.node, polls))
                }
                DrainOutcome::Unreachable { last_error } => {
                    out.push_str(&format!("✗ {} unreachable: {}\n", node.node, last_error))
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshreplay_core::NodeId;
    use std::time::Duration;

    #[test]
    fn test_render() {
        let stats = InjectionStats {
            submitted: 4,
            send_failures: 1,
            runtime: Duration::from_secs(2),
        };
        let report = DispatchReport::new(
            &stats,
            1,
            2.0,
            vec![
                NodeDrain {
                    node: NodeId::from("A"),
                    outcome: DrainOutcome::Drained { polls: 1 },
                },
                NodeDrain {
                    node: NodeId::from("B"),
                    outcome: DrainOutcome::Unreachable {
                        last_error: "connection refused".into(),
                    },
                },
            ],
        );

        let text = report.render();
        assert!(text.starts_with("✓ Submitted 4 packets (1 skipped)\n"));
        assert!(text.contains("Rate: 2.00 req/s (target 2.00)"));
        assert!(text.contains("✗ 1 sends failed"));
        assert!(text.contains("✓ A drained after 1 polls"));
        assert!(text.contains("✗ B unreachable: connection refused"));
        assert!(!report.all_drained());
    }
}
