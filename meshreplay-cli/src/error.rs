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

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("cannot read {path:?}: {reason}")]
    Corpus { path: PathBuf, reason: String },

    #[error("invalid dispatcher configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("send pool shut down before the corpus was exhausted")]
    PoolClosed,
}

impl DispatchError {
    pub fn corpus(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Corpus {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
