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

//! In-process stand-in for the robot link.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::{ConnectTarget, DeviceInfo, Transport};
use crate::config::SimulationConfig;
use crate::error::{ConnectError, SendError};

/// Simulated transport.
///
/// Connects after a fixed latency, records every frame it is asked to send
/// and lets callers inject failures.
pub struct SimulatedTransport {
    settings: SimulationConfig,
    connected: AtomicBool,
    frames: Mutex<Vec<String>>,
    connect_failure: Mutex<Option<ConnectError>>,
    send_failure: Mutex<Option<SendError>>,
}

impl SimulatedTransport {
    pub fn new(settings: SimulationConfig) -> Self {
        Self {
            settings,
            connected: AtomicBool::new(false),
            frames: Mutex::new(Vec::new()),
            connect_failure: Mutex::new(None),
            send_failure: Mutex::new(None),
        }
    }

    /// Make every following connect attempt fail with `error`.
    pub fn fail_connects_with(&self, error: Option<ConnectError>) {
        *self.connect_failure.lock() = error;
    }

    /// Make every following send fail with `error`.
    pub fn fail_sends_with(&self, error: Option<SendError>) {
        *self.send_failure.lock() = error;
    }

    /// Frames delivered so far, oldest first.
    pub fn sent_frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    pub fn clear_frames(&self) {
        self.frames.lock().clear();
    }

    pub fn is_link_open(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn resolve(address: &str) -> Result<(), ConnectError> {
        let address = address.trim();
        if address.parse::<IpAddr>().is_ok() {
            return Ok(());
        }
        let plausible_host = !address.is_empty()
            && address
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if plausible_host {
            Ok(())
        } else {
            Err(ConnectError::UnknownHost(address.to_string()))
        }
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn connect(&self, target: &ConnectTarget) -> Result<DeviceInfo, ConnectError> {
        let latency = match target {
            ConnectTarget::Wifi { .. } => self.settings.wifi_latency_ms,
            ConnectTarget::Bluetooth => self.settings.bluetooth_latency_ms,
        };
        debug!("Simulating {} ms connect latency", latency);
        tokio::time::sleep(Duration::from_millis(latency)).await;

        if let Some(error) = self.connect_failure.lock().clone() {
            return Err(error);
        }

        let info = match target {
            ConnectTarget::Wifi { address } => {
                Self::resolve(address)?;
                DeviceInfo {
                    id: format!("wifi_{}", address),
                    name: "CarroBot WiFi".to_string(),
                    address: address.clone(),
                    signal_strength: None,
                }
            }
            ConnectTarget::Bluetooth => DeviceInfo {
                id: "bt_carrobot".to_string(),
                name: "CarroBot BT".to_string(),
                address: self.settings.bluetooth_address.clone(),
                signal_strength: None,
            },
        };

        self.connected.store(true, Ordering::SeqCst);
        info!("Simulated link open to {}", info.address);
        Ok(info)
    }

    async fn send(&self, frame: &str) -> Result<(), SendError> {
        tokio::time::sleep(Duration::from_millis(self.settings.send_latency_ms)).await;

        if let Some(error) = self.send_failure.lock().clone() {
            return Err(error);
        }
        if !self.is_link_open() {
            return Err(SendError::Closed);
        }

        self.frames.lock().push(frame.to_string());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SendError> {
        self.connected.store(false, Ordering::SeqCst);
        info!("Simulated link closed");
        Ok(())
    }
}
