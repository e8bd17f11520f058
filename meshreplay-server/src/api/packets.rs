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

use axum::{body::Bytes, extract::State};
use meshreplay_core::TracePacket;
use tracing::warn;

use crate::api::{ApiError, AppState};

/// POST / - Accept a trace packet for this node
///
/// Answers as soon as the packet is queued. A body that is not JSON is a
/// 400; a JSON document that is not a valid packet is logged and dropped
/// with a 200, since the caller only waits for the hand-off. The body
/// itself travels on to the node's service edges untouched.
pub async fn accept_packet(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("body is not JSON: {e}")))?;

    let packet = match TracePacket::from_value(value).and_then(|p| p.validate().map(|_| p)) {
        Ok(packet) => packet,
        Err(e) => {
            warn!(node = %state.router.node_id(), error = %e, "dropping packet");
            return Ok("ok");
        }
    };

    state.router.accept(packet, body);
    Ok("ok")
}
