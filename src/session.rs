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

//! Remote-control session.
//!
//! [`RobotSession`] is the one entry point for a presentation layer: one
//! method per user intent, plus snapshots and an event stream to render from.
//! Device intents do nothing unless a robot is connected.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::connection::{ConnectionManager, ConnectionState, Device, Dispatch};
use crate::error::{ConnectError, DecodeError, SendError};
use crate::events::{spawn_observer, EventBus, SessionEvent, StateObserver};
use crate::protocol::{clamp_speed, decode_with_clock, CommandValue, RobotAction, RobotCommand};
use crate::sensor::DistanceSensor;
use crate::sequencer::{ActionSequencer, SequenceHandle};
use crate::state::{AutomationMode, Led, RobotState, RobotStateStore, StateDelta};
use crate::transport::{ConnectTarget, Transport};

struct Inner {
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    store: Arc<RobotStateStore>,
    connection: Arc<ConnectionManager>,
    sequencer: Arc<ActionSequencer>,
    speed: Mutex<u8>,
}

/// Handle to the session. Clones share the same session.
#[derive(Clone)]
pub struct RobotSession {
    inner: Arc<Inner>,
}

impl RobotSession {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        sensor: Arc<dyn DistanceSensor>,
    ) -> Self {
        let events = EventBus::new();
        let store = Arc::new(RobotStateStore::new(events.clone()));
        let connection = Arc::new(ConnectionManager::new(
            transport,
            store.clone(),
            events.clone(),
            config.connection,
        ));
        let sequencer = Arc::new(ActionSequencer::new(
            connection.clone(),
            store.clone(),
            events.clone(),
            clock.clone(),
            sensor,
            config.sequences,
        ));

        Self {
            inner: Arc::new(Inner {
                clock,
                events,
                store,
                connection,
                sequencer,
                speed: Mutex::new(clamp_speed(i64::from(config.control.default_speed))),
            }),
        }
    }

    // Observation

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn robot_state(&self) -> RobotState {
        self.inner.store.read()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// Selected driving speed (0-100).
    pub fn speed(&self) -> u8 {
        *self.inner.speed.lock()
    }

    /// Subscribe to every event from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Drive `observer` from a new subscription on a background task.
    pub fn observe(&self, observer: Arc<dyn StateObserver>) -> JoinHandle<()> {
        spawn_observer(self.subscribe(), observer)
    }

    // Connection

    pub async fn connect_wifi(&self, address: impl Into<String>) -> Result<Device, ConnectError> {
        let address = address.into();
        info!("WiFi connect requested: {}", address);
        self.inner
            .connection
            .connect(ConnectTarget::Wifi { address })
            .await
    }

    pub async fn connect_bluetooth(&self) -> Result<Device, ConnectError> {
        info!("Bluetooth connect requested");
        self.inner.connection.connect(ConnectTarget::Bluetooth).await
    }

    pub async fn disconnect(&self) {
        let cancelled = self.inner.sequencer.cancel_all();
        if cancelled > 0 {
            debug!("Cancelled {} sequences before disconnect", cancelled);
        }
        self.inner.connection.disconnect().await;
    }

    /// Tear the session down before the process exits.
    pub async fn shutdown(&self) {
        info!("Shutting down session");
        self.disconnect().await;
    }

    // Driving

    /// Select the driving speed, clamped to 0-100. Accepted while disconnected.
    pub fn set_speed(&self, speed: i32) {
        let speed = clamp_speed(i64::from(speed));
        let mut current = self.inner.speed.lock();
        if *current != speed {
            *current = speed;
            self.inner.events.publish(SessionEvent::SpeedChanged(speed));
        }
    }

    pub async fn move_forward(&self) -> Result<Dispatch, SendError> {
        self.drive(RobotAction::Forward).await
    }

    pub async fn move_backward(&self) -> Result<Dispatch, SendError> {
        self.drive(RobotAction::Backward).await
    }

    pub async fn turn_left(&self) -> Result<Dispatch, SendError> {
        self.drive(RobotAction::Left).await
    }

    pub async fn turn_right(&self) -> Result<Dispatch, SendError> {
        self.drive(RobotAction::Right).await
    }

    pub async fn stop_movement(&self) -> Result<Dispatch, SendError> {
        let Some(lifetime) = self.inner.connection.lifetime() else {
            return Ok(Dispatch::Gated);
        };
        self.inner.store.apply_within(&lifetime, StateDelta::Stop);
        self.send(RobotAction::Stop, 0, CommandValue::None).await
    }

    async fn drive(&self, action: RobotAction) -> Result<Dispatch, SendError> {
        let Some(lifetime) = self.inner.connection.lifetime() else {
            return Ok(Dispatch::Gated);
        };
        let speed = self.speed();
        self.inner
            .store
            .apply_within(&lifetime, StateDelta::Drive { speed });
        self.send(action, speed, CommandValue::None).await
    }

    // Lights and automation

    pub async fn toggle_front_led(&self) -> Result<Dispatch, SendError> {
        self.toggle_led(Led::Front).await
    }

    pub async fn toggle_back_led(&self) -> Result<Dispatch, SendError> {
        self.toggle_led(Led::Back).await
    }

    pub async fn toggle_left_led(&self) -> Result<Dispatch, SendError> {
        self.toggle_led(Led::Left).await
    }

    pub async fn toggle_right_led(&self) -> Result<Dispatch, SendError> {
        self.toggle_led(Led::Right).await
    }

    pub async fn toggle_led(&self, led: Led) -> Result<Dispatch, SendError> {
        let Some(state) = self.apply_if_connected(StateDelta::ToggleLed(led)) else {
            return Ok(Dispatch::Gated);
        };
        let on = state.led(led);
        debug!("{} LED {}", led.as_str(), if on { "on" } else { "off" });
        self.send(led.action(on), 0, CommandValue::Bool(on)).await
    }

    /// Toggle obstacle avoidance. Turning it on turns line following off.
    pub async fn toggle_obstacle_avoidance(&self) -> Result<Dispatch, SendError> {
        self.toggle_automation(AutomationMode::ObstacleAvoidance).await
    }

    /// Toggle line following. Turning it on turns obstacle avoidance off.
    pub async fn toggle_line_following(&self) -> Result<Dispatch, SendError> {
        self.toggle_automation(AutomationMode::LineFollowing).await
    }

    pub async fn toggle_auto_lights(&self) -> Result<Dispatch, SendError> {
        self.toggle_automation(AutomationMode::AutoLights).await
    }

    async fn toggle_automation(&self, mode: AutomationMode) -> Result<Dispatch, SendError> {
        let Some(state) = self.apply_if_connected(StateDelta::ToggleAutomation(mode)) else {
            return Ok(Dispatch::Gated);
        };
        let on = state.automation(mode);
        info!("{:?} {}", mode, if on { "enabled" } else { "disabled" });
        self.send(mode.action(on), 0, CommandValue::Bool(on)).await
    }

    // Sound and sensors

    /// Sound the horn for one pulse. Re-triggering restarts the pulse.
    pub fn activate_horn(&self) -> Option<SequenceHandle> {
        self.inner.sequencer.start_horn_pulse()
    }

    pub async fn beep(&self) -> Result<Dispatch, SendError> {
        self.send(RobotAction::Beep, 0, CommandValue::None).await
    }

    /// Start a calibration sweep; ignored while one is running.
    pub fn calibrate_sensors(&self) -> Option<SequenceHandle> {
        self.inner.sequencer.start_calibration()
    }

    pub fn read_ultrasonic(&self) -> Option<SequenceHandle> {
        self.inner.sequencer.start_ultrasonic_read()
    }

    /// Ask the robot to report its status.
    pub async fn refresh_status(&self) -> Result<Dispatch, SendError> {
        self.send(RobotAction::GetStatus, 0, CommandValue::None).await
    }

    pub async fn emergency_stop(&self) {
        self.inner.sequencer.emergency_stop().await;
    }

    // Inbound

    /// Apply a frame reported by the robot.
    ///
    /// Undecodable frames are logged and dropped without touching the state.
    pub fn handle_incoming(&self, frame: &str) -> Result<(), DecodeError> {
        let report = match decode_with_clock(frame, self.inner.clock.as_ref()) {
            Ok(report) => report,
            Err(e) => {
                warn!("Dropping frame {:?}: {}", frame, e);
                return Err(e);
            }
        };

        match StateDelta::from_report(&report) {
            Some(delta) => {
                if self.apply_if_connected(delta).is_none() {
                    debug!("Ignoring {} report while disconnected", report.action());
                }
            }
            None => debug!("Report {} carries no state", report.action()),
        }
        Ok(())
    }

    fn apply_if_connected(&self, delta: StateDelta) -> Option<RobotState> {
        let lifetime = self.inner.connection.lifetime()?;
        self.inner.store.apply_within(&lifetime, delta)
    }

    async fn send(
        &self,
        action: RobotAction,
        speed: u8,
        value: CommandValue,
    ) -> Result<Dispatch, SendError> {
        let command = RobotCommand::new(
            action,
            i64::from(speed),
            value,
            self.inner.clock.now_millis(),
        );
        self.inner.connection.send(&command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::connection::ConnectionStatus;
    use crate::sensor::FixedDistanceSensor;
    use crate::transport::SimulatedTransport;

    fn session() -> (RobotSession, Arc<SimulatedTransport>) {
        let config = Config::default();
        let transport = Arc::new(SimulatedTransport::new(config.simulation.clone()));
        let session = RobotSession::new(
            config,
            transport.clone(),
            Arc::new(ManualClock::new(1_700_000_000_000)),
            Arc::new(FixedDistanceSensor(120.0)),
        );
        (session, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_wifi_drive_scenario() {
        let (session, transport) = session();
        let mut events = session.subscribe();

        session.connect_wifi("192.168.1.100").await.unwrap();
        let statuses: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|e| match e {
                SessionEvent::ConnectionChanged(state) => Some(state.status()),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]
        );
        assert_eq!(
            session.connection_state().device().unwrap().address,
            "192.168.1.100"
        );

        session.set_speed(70);
        assert_eq!(session.move_forward().await, Ok(Dispatch::Sent));
        assert_eq!(transport.sent_frames(), vec!["FORWARD:70::1700000000000"]);
        let state = session.robot_state();
        assert!(state.is_moving);
        assert_eq!(state.current_speed, 70);

        session.stop_movement().await.unwrap();
        let state = session.robot_state();
        assert!(!state.is_moving);
        assert_eq!(state.current_speed, 0);
        assert_eq!(transport.sent_frames()[1], "STOP:0::1700000000000");
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_intents_are_gated_while_disconnected() {
        let (session, transport) = session();

        assert_eq!(session.move_forward().await, Ok(Dispatch::Gated));
        assert_eq!(session.toggle_front_led().await, Ok(Dispatch::Gated));
        assert_eq!(session.toggle_line_following().await, Ok(Dispatch::Gated));
        assert_eq!(session.beep().await, Ok(Dispatch::Gated));
        assert!(session.activate_horn().is_none());
        assert!(session.calibrate_sensors().is_none());
        session.emergency_stop().await;

        assert!(transport.sent_frames().is_empty());
        assert_eq!(session.robot_state(), RobotState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_speed_clamps_and_notifies() {
        let (session, _) = session();
        let mut events = session.subscribe();

        assert_eq!(session.speed(), 50);
        session.set_speed(150);
        assert_eq!(session.speed(), 100);
        session.set_speed(-20);
        assert_eq!(session.speed(), 0);
        session.set_speed(0);

        let speeds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert_eq!(
            speeds,
            vec![SessionEvent::SpeedChanged(100), SessionEvent::SpeedChanged(0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_led_toggle_sends_new_state() {
        let (session, transport) = session();
        session.connect_bluetooth().await.unwrap();

        session.toggle_left_led().await.unwrap();
        assert!(session.robot_state().left_led_on);
        session.toggle_left_led().await.unwrap();
        assert!(!session.robot_state().left_led_on);

        assert_eq!(
            transport.sent_frames(),
            vec![
                "LED_LEFT_ON:0:true:1700000000000",
                "LED_LEFT_OFF:0:false:1700000000000"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_automation_modes_stay_exclusive() {
        let (session, transport) = session();
        session.connect_bluetooth().await.unwrap();

        session.toggle_obstacle_avoidance().await.unwrap();
        session.toggle_line_following().await.unwrap();

        let state = session.robot_state();
        assert!(state.line_following_on);
        assert!(!state.obstacle_avoidance_on);
        assert!(transport.sent_frames()[1].starts_with("LINE_FOLLOWING_ON:0:true:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_incoming() {
        let (session, _) = session();

        // Dropped while disconnected
        session.handle_incoming("HORN_ON:0::1").unwrap();
        assert!(!session.robot_state().horn_active);

        session.connect_bluetooth().await.unwrap();
        session.handle_incoming("ULTRASONIC_READ:0:35.5:1\n").unwrap();
        assert_eq!(session.robot_state().ultrasonic_distance, Some(35.5));

        let before = session.robot_state();
        assert_eq!(
            session.handle_incoming("WARP:9"),
            Err(DecodeError::UnknownAction("WARP".into()))
        );
        assert!(session.handle_incoming("FORWARD").is_err());
        assert_eq!(session.robot_state(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ultrasonic_read_uses_sensor() {
        let (session, _) = session();
        session.connect_bluetooth().await.unwrap();

        session.read_ultrasonic().unwrap().wait().await;
        assert_eq!(session.robot_state().ultrasonic_distance, Some(120.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_resets_everything() {
        let (session, _) = session();
        session.connect_bluetooth().await.unwrap();
        session.move_forward().await.unwrap();
        let horn = session.activate_horn().unwrap();

        session.shutdown().await;
        horn.wait().await;

        assert_eq!(session.connection_state(), ConnectionState::disconnected());
        assert_eq!(session.robot_state(), RobotState::default());
    }
}
