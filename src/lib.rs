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

//! CarroBot remote-control session.
//!
//! Connects to a wheeled robot over WiFi or Bluetooth, speaks its textual
//! command protocol and keeps a consistent picture of the robot's state for a
//! presentation layer to render.

pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod protocol;
pub mod sensor;
pub mod sequencer;
pub mod session;
pub mod state;
pub mod transport;

pub use config::Config;
pub use connection::{ConnectionState, ConnectionStatus, ConnectionType, Device, Dispatch};
pub use error::{ConnectError, DecodeError, SendError};
pub use events::{SessionEvent, StateObserver};
pub use protocol::{CommandValue, RobotAction, RobotCommand};
pub use session::RobotSession;
pub use state::RobotState;
