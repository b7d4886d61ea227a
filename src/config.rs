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

//! Configuration module.
//!
//! Handles loading and saving session settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::connection::ConnectionType;

/// Directory name under the platform config dir.
const APP_DIR: &str = "carrobot";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection settings.
    pub connection: ConnectionConfig,

    /// Timed sequence settings.
    pub sequences: SequenceConfig,

    /// Driving settings.
    pub control: ControlConfig,

    /// Simulated transport settings.
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Give up on a WiFi connect after this long.
    pub wifi_timeout_ms: u64,

    /// Give up on a Bluetooth connect after this long.
    pub bluetooth_timeout_ms: u64,

    /// Address used when none is given.
    pub default_wifi_address: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            wifi_timeout_ms: 5000,
            bluetooth_timeout_ms: 8000,
            default_wifi_address: "192.168.1.100".to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Connect timeout for the given link type.
    pub fn timeout_for(&self, connection_type: ConnectionType) -> Duration {
        match connection_type {
            ConnectionType::Wifi => Duration::from_millis(self.wifi_timeout_ms),
            ConnectionType::Bluetooth => Duration::from_millis(self.bluetooth_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// How long the horn sounds.
    pub horn_pulse_ms: u64,

    /// Duration of the sensor sweep.
    pub calibration_ms: u64,

    /// Sampling latency of the ultrasonic sensor.
    pub ultrasonic_latency_ms: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            horn_pulse_ms: 1000,
            calibration_ms: 3000,
            ultrasonic_latency_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Speed selected when a session starts (0-100).
    pub default_speed: u8,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { default_speed: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub wifi_latency_ms: u64,
    pub bluetooth_latency_ms: u64,
    pub send_latency_ms: u64,

    /// Address reported by the simulated Bluetooth robot.
    pub bluetooth_address: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            wifi_latency_ms: 2000,
            bluetooth_latency_ms: 3000,
            send_latency_ms: 50,
            bluetooth_address: "00:11:22:33:44:55".to_string(),
        }
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from the default location or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults there if missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.control.default_speed = 80;
        config.connection.default_wifi_address = "10.0.0.7".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.control.default_speed, 80);
        assert_eq!(loaded.connection.default_wifi_address, "10.0.0.7");
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sequences]\nhorn_pulse_ms = 250\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.sequences.horn_pulse_ms, 250);
        assert_eq!(config.sequences.calibration_ms, 3000);
        assert_eq!(config.connection.wifi_timeout_ms, 5000);
    }

    #[test]
    fn test_timeout_for() {
        let connection = ConnectionConfig::default();
        assert_eq!(
            connection.timeout_for(ConnectionType::Wifi),
            Duration::from_millis(5000)
        );
        assert_eq!(
            connection.timeout_for(ConnectionType::Bluetooth),
            Duration::from_millis(8000)
        );
    }
}
