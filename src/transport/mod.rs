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

//! Link to the robot.
//!
//! The session only needs to open a link and push frames down it; a real
//! WiFi socket or Bluetooth serial port implements [`Transport`] outside
//! this crate.

mod simulated;

pub use simulated::SimulatedTransport;

use async_trait::async_trait;

use crate::connection::ConnectionType;
use crate::error::{ConnectError, SendError};

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    Wifi { address: String },
    Bluetooth,
}

impl ConnectTarget {
    pub fn connection_type(&self) -> ConnectionType {
        match self {
            ConnectTarget::Wifi { .. } => ConnectionType::Wifi,
            ConnectTarget::Bluetooth => ConnectionType::Bluetooth,
        }
    }
}

/// What the remote end reports about itself on connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub address: String,
    pub signal_strength: Option<i32>,
}

/// Transport capability supplied to the session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the link.
    async fn connect(&self, target: &ConnectTarget) -> Result<DeviceInfo, ConnectError>;

    /// Deliver one encoded frame.
    async fn send(&self, frame: &str) -> Result<(), SendError>;

    /// Close the link. Best effort.
    async fn disconnect(&self) -> Result<(), SendError> {
        Ok(())
    }
}
