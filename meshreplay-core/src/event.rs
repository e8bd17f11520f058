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

//! Telemetry events recorded by routers and the dispatcher.
//!
//! Each event becomes one CSV row `trace_id,node_id,timestamp_us,kind,message`
//! in the per-node stream. Rows are never read back at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TelemetryEventKind {
    /// A terminal node finished its self-cost for this trace.
    Leaf,
    /// A data operation was issued and awaited.
    Sync,
    /// A data operation was issued as detached work.
    Async,
    /// The dispatcher submitted the packet to its entry node.
    Dispatch,
    /// An edge failed; the message carries the reason.
    Error,
}

impl TelemetryEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Leaf => "Leaf",
            Self::Sync => "Sync",
            Self::Async => "Async",
            Self::Dispatch => "Dispatch",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub trace_id: String,
    pub node_id: String,
    /// Wall clock, microseconds since the Unix epoch.
    pub timestamp_us: i64,
    pub kind: TelemetryEventKind,
    pub message: String,
}

impl TelemetryEvent {
    /// Build an event stamped with the current wall clock.
    pub fn new(
        trace_id: impl Into<String>,
        node_id: impl Into<String>,
        kind: TelemetryEventKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            node_id: node_id.into(),
            timestamp_us: chrono::Utc::now().timestamp_micros(),
            kind,
            message: message.into(),
        }
    }

    /// Render as one CSV line, newline included.
    pub fn to_csv_row(&self) -> String {
        let timestamp = self.timestamp_us.to_string();
        let fields = [
            self.trace_id.as_str(),
            self.node_id.as_str(),
            timestamp.as_str(),
            self.kind.as_str(),
            self.message.as_str(),
        ];
        let mut row = fields
            .iter()
            .map(|f| escape_csv_field(f))
            .collect::<Vec<_>>()
            .join(",");
        row.push('\n');
        row
    }
}

fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
