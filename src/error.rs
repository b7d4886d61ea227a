// Copyright 2026 Daniel Pelikan
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

//! Error types shared by the transport and the connection manager.

use std::time::Duration;
use thiserror::Error;

pub use crate::protocol::DecodeError;

/// Why a connection attempt did not reach `Connected`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("connection refused: {0}")]
    Refused(String),

    #[error("unknown host: {0}")]
    UnknownHost(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// Another attempt is still in flight.
    #[error("a connection attempt is already in progress")]
    InProgress,

    /// The attempt was abandoned by a disconnect.
    #[error("connection attempt cancelled")]
    Cancelled,
}

impl ConnectError {
    /// Whether this failure moves the session into the error state.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::InProgress | Self::Cancelled)
    }
}

/// Failure while delivering a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("link closed")]
    Closed,
}
