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

//! Connection state machine and the outbound command gate.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::types::{ConnectionState, ConnectionStatus, ConnectionType, Device};
use crate::config::ConnectionConfig;
use crate::error::{ConnectError, SendError};
use crate::events::{EventBus, SessionEvent};
use crate::protocol::{encode, RobotCommand};
use crate::state::RobotStateStore;
use crate::transport::{ConnectTarget, DeviceInfo, Transport};

/// What happened to an outbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the transport.
    Sent,
    /// Dropped at the gate because no robot is connected.
    Gated,
}

struct Link {
    state: ConnectionState,
    /// Token of the in-flight connect attempt.
    attempt: Option<CancellationToken>,
    /// Token that lives exactly as long as the current connection.
    lifetime: Option<CancellationToken>,
}

/// Owns the connection state and everything tied to its lifetime.
///
/// Lock order is link, then store.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    store: Arc<RobotStateStore>,
    events: Arc<EventBus>,
    settings: ConnectionConfig,
    link: Mutex<Link>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<RobotStateStore>,
        events: Arc<EventBus>,
        settings: ConnectionConfig,
    ) -> Self {
        Self {
            transport,
            store,
            events,
            settings,
            link: Mutex::new(Link {
                state: ConnectionState::disconnected(),
                attempt: None,
                lifetime: None,
            }),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.link.lock().state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.link.lock().state.is_connected()
    }

    /// Token cancelled when the current connection ends; `None` when not
    /// connected.
    pub fn lifetime(&self) -> Option<CancellationToken> {
        self.link.lock().lifetime.clone()
    }

    /// Connect to `target`.
    ///
    /// Rejected with [`ConnectError::InProgress`] while another attempt is in
    /// flight. An existing connection is torn down first.
    pub async fn connect(&self, target: ConnectTarget) -> Result<Device, ConnectError> {
        if self.is_connected() {
            info!("Replacing the current connection");
            self.disconnect().await;
        }

        let attempt = self.begin_attempt()?;
        let connection_type = target.connection_type();
        let timeout = self.settings.timeout_for(connection_type);
        info!("Connecting via {} (timeout {:?})", connection_type.as_str(), timeout);

        let outcome = tokio::select! {
            _ = attempt.cancelled() => Err(ConnectError::Cancelled),
            result = tokio::time::timeout(timeout, self.transport.connect(&target)) => {
                match result {
                    Ok(result) => result,
                    Err(_) => Err(ConnectError::Timeout(timeout)),
                }
            }
        };

        let opened = outcome.is_ok();
        let result = self.finish_attempt(&attempt, connection_type, outcome);

        if opened && matches!(result, Err(ConnectError::Cancelled)) {
            // The link came up after we had already given up on it
            if let Err(e) = self.transport.disconnect().await {
                warn!("Failed to close abandoned link: {}", e);
            }
        }
        result
    }

    /// Drop the connection (or the attempt in flight).
    ///
    /// Cancels the connection lifetime, which ends every running sequence,
    /// resets the robot state and lands in `Disconnected`.
    pub async fn disconnect(&self) {
        let was_connected = {
            let mut link = self.link.lock();
            if let Some(attempt) = link.attempt.take() {
                info!("Abandoning connection attempt");
                attempt.cancel();
            }
            let lifetime = link.lifetime.take();
            if let Some(lifetime) = &lifetime {
                lifetime.cancel();
            }
            self.store.reset();
            self.set_state(&mut link, ConnectionState::disconnected());
            lifetime.is_some()
        };

        if was_connected {
            if let Err(e) = self.transport.disconnect().await {
                warn!("Transport disconnect failed: {}", e);
            }
            info!("Disconnected");
        }
    }

    /// Send a command if connected.
    ///
    /// Commands issued while disconnected are dropped silently; the UI
    /// disables those controls anyway.
    pub async fn send(&self, command: &RobotCommand) -> Result<Dispatch, SendError> {
        if !self.is_connected() {
            debug!("Not connected, dropping {}", command.action());
            return Ok(Dispatch::Gated);
        }

        let frame = encode(command);
        debug!("Sending frame: {}", frame);

        match self.transport.send(&frame).await {
            Ok(()) => {
                self.events
                    .publish(SessionEvent::CommandResult(format!("✓ {}", command.action())));
                Ok(Dispatch::Sent)
            }
            Err(e) => {
                warn!("Failed to send {}: {}", command.action(), e);
                self.events.publish(SessionEvent::CommandResult(format!(
                    "✗ {}: {}",
                    command.action(),
                    e
                )));
                Err(e)
            }
        }
    }

    fn begin_attempt(&self) -> Result<CancellationToken, ConnectError> {
        let mut link = self.link.lock();
        match link.state.status() {
            ConnectionStatus::Connecting | ConnectionStatus::Connected => {
                warn!("Connect requested while {}", link.state.status().as_str());
                return Err(ConnectError::InProgress);
            }
            ConnectionStatus::Disconnected | ConnectionStatus::Error => {}
        }

        let attempt = CancellationToken::new();
        link.attempt = Some(attempt.clone());
        self.set_state(&mut link, ConnectionState::connecting());
        Ok(attempt)
    }

    fn finish_attempt(
        &self,
        attempt: &CancellationToken,
        connection_type: ConnectionType,
        outcome: Result<DeviceInfo, ConnectError>,
    ) -> Result<Device, ConnectError> {
        let mut link = self.link.lock();
        if attempt.is_cancelled() {
            debug!("Connection attempt was abandoned");
            return Err(ConnectError::Cancelled);
        }
        link.attempt = None;

        match outcome {
            Ok(info) => {
                let device = Device {
                    id: info.id,
                    name: info.name,
                    address: info.address,
                    connection_type,
                    is_connected: true,
                    signal_strength: info.signal_strength,
                };
                info!("Connected to {} ({})", device.name, device.address);
                link.lifetime = Some(CancellationToken::new());
                self.set_state(&mut link, ConnectionState::connected(device.clone()));
                Ok(device)
            }
            Err(e) => {
                let message = format!("{} connection failed: {}", connection_type.as_str(), e);
                warn!("{}", message);
                self.store.reset();
                self.set_state(&mut link, ConnectionState::error(message));
                Err(e)
            }
        }
    }

    fn set_state(&self, link: &mut Link, state: ConnectionState) {
        if link.state != state {
            debug!("Connection: {} -> {}", link.state.status().as_str(), state.status().as_str());
            link.state = state.clone();
            self.events.publish(SessionEvent::ConnectionChanged(state));
        }
    }
}
