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

//! Connection status, state and device values.

use serde::{Deserialize, Serialize};

/// How the robot is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionType {
    Wifi,
    Bluetooth,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Wifi => "WiFi",
            ConnectionType::Bluetooth => "Bluetooth",
        }
    }
}

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Error => "Error",
        }
    }
}

/// A connected robot. Replaced, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub address: String,
    pub connection_type: ConnectionType,
    pub is_connected: bool,
    pub signal_strength: Option<i32>,
}

/// Connection state as seen by observers.
///
/// A device is present only while connected and an error message only in the
/// error state; the constructors are the only way to build one, and
/// deserializing goes through the same checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConnectionStateRecord")]
pub struct ConnectionState {
    status: ConnectionStatus,
    device: Option<Device>,
    error_message: Option<String>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::disconnected()
    }
}

impl ConnectionState {
    pub fn disconnected() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            device: None,
            error_message: None,
        }
    }

    pub fn connecting() -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            device: None,
            error_message: None,
        }
    }

    pub fn connected(device: Device) -> Self {
        Self {
            status: ConnectionStatus::Connected,
            device: Some(device),
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Error,
            device: None,
            error_message: Some(message.into()),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

/// Unchecked wire shape of [`ConnectionState`].
#[derive(Deserialize)]
struct ConnectionStateRecord {
    status: ConnectionStatus,
    #[serde(default)]
    device: Option<Device>,
    #[serde(default)]
    error_message: Option<String>,
}

impl TryFrom<ConnectionStateRecord> for ConnectionState {
    type Error = String;

    fn try_from(record: ConnectionStateRecord) -> Result<Self, Self::Error> {
        match (record.status, record.device, record.error_message) {
            (ConnectionStatus::Disconnected, None, None) => Ok(Self::disconnected()),
            (ConnectionStatus::Connecting, None, None) => Ok(Self::connecting()),
            (ConnectionStatus::Connected, Some(device), None) => Ok(Self::connected(device)),
            (ConnectionStatus::Error, None, Some(message)) => Ok(Self::error(message)),
            (status, device, message) => Err(format!(
                "inconsistent {} state (device: {}, error message: {})",
                status.as_str(),
                device.is_some(),
                message.is_some()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        Device {
            id: "wifi_10.0.0.2".into(),
            name: "CarroBot WiFi".into(),
            address: "10.0.0.2".into(),
            connection_type: ConnectionType::Wifi,
            is_connected: true,
            signal_strength: None,
        }
    }

    #[test]
    fn test_constructors_hold_invariants() {
        let state = ConnectionState::disconnected();
        assert!(state.device().is_none() && state.error_message().is_none());

        let state = ConnectionState::connecting();
        assert_eq!(state.status(), ConnectionStatus::Connecting);
        assert!(state.device().is_none());

        let state = ConnectionState::connected(device());
        assert!(state.is_connected());
        assert_eq!(state.device().unwrap().address, "10.0.0.2");
        assert!(state.error_message().is_none());

        let state = ConnectionState::error("boom");
        assert_eq!(state.error_message(), Some("boom"));
        assert!(state.device().is_none());
    }

    #[test]
    fn test_serializes_for_the_ui() {
        let json = serde_json::to_value(ConnectionState::connected(device())).unwrap();
        assert_eq!(json["status"], "CONNECTED");
        assert_eq!(json["device"]["connection_type"], "WIFI");

        let back: ConnectionState = serde_json::from_value(json).unwrap();
        assert_eq!(back, ConnectionState::connected(device()));
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_state() {
        let connected_without_device =
            r#"{"status":"CONNECTED","device":null,"error_message":"x"}"#;
        assert!(serde_json::from_str::<ConnectionState>(connected_without_device).is_err());

        let error_without_message = r#"{"status":"ERROR"}"#;
        assert!(serde_json::from_str::<ConnectionState>(error_without_message).is_err());

        let state: ConnectionState =
            serde_json::from_str(r#"{"status":"ERROR","error_message":"timed out"}"#).unwrap();
        assert_eq!(state, ConnectionState::error("timed out"));
    }
}
