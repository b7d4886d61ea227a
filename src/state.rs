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

//! Robot state snapshot and its single-writer store.
//!
//! Two invariants hold for every snapshot the store hands out:
//! obstacle avoidance and line following are never both on, and the current
//! speed is zero whenever the robot is not moving.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{EventBus, SessionEvent};
use crate::protocol::{CommandValue, RobotAction, RobotCommand};

/// Snapshot of everything the session knows about the robot.
///
/// Serialize-only: snapshots flow out of the store, never back in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotState {
    pub is_moving: bool,
    pub current_speed: u8,

    pub front_led_on: bool,
    pub back_led_on: bool,
    pub left_led_on: bool,
    pub right_led_on: bool,

    pub horn_active: bool,

    /// Last ultrasonic reading in centimetres.
    pub ultrasonic_distance: Option<f32>,

    pub obstacle_avoidance_on: bool,
    pub line_following_on: bool,
    pub auto_lights_on: bool,

    pub is_calibrating: bool,

    // Telemetry placeholders until the firmware reports them.
    pub battery_level: u8,
    pub temperature_celsius: Option<f32>,
    pub light_level: Option<u8>,
}

impl Default for RobotState {
    fn default() -> Self {
        Self {
            is_moving: false,
            current_speed: 0,
            front_led_on: false,
            back_led_on: false,
            left_led_on: false,
            right_led_on: false,
            horn_active: false,
            ultrasonic_distance: None,
            obstacle_avoidance_on: false,
            line_following_on: false,
            auto_lights_on: false,
            is_calibrating: false,
            battery_level: 100,
            temperature_celsius: None,
            light_level: None,
        }
    }
}

impl RobotState {
    /// Whether the given LED is lit.
    pub fn led(&self, led: Led) -> bool {
        match led {
            Led::Front => self.front_led_on,
            Led::Back => self.back_led_on,
            Led::Left => self.left_led_on,
            Led::Right => self.right_led_on,
        }
    }

    /// Whether the given automation mode is on.
    pub fn automation(&self, mode: AutomationMode) -> bool {
        match mode {
            AutomationMode::ObstacleAvoidance => self.obstacle_avoidance_on,
            AutomationMode::LineFollowing => self.line_following_on,
            AutomationMode::AutoLights => self.auto_lights_on,
        }
    }

    fn led_mut(&mut self, led: Led) -> &mut bool {
        match led {
            Led::Front => &mut self.front_led_on,
            Led::Back => &mut self.back_led_on,
            Led::Left => &mut self.left_led_on,
            Led::Right => &mut self.right_led_on,
        }
    }

    /// The only place automation flags are written.
    fn set_automation(&mut self, mode: AutomationMode, on: bool) {
        match mode {
            AutomationMode::ObstacleAvoidance => {
                self.obstacle_avoidance_on = on;
                if on {
                    self.line_following_on = false;
                }
            }
            AutomationMode::LineFollowing => {
                self.line_following_on = on;
                if on {
                    self.obstacle_avoidance_on = false;
                }
            }
            AutomationMode::AutoLights => self.auto_lights_on = on,
        }
    }

    fn stop(&mut self) {
        self.is_moving = false;
        self.current_speed = 0;
    }
}

/// LED positions on the chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Led {
    Front,
    Back,
    Left,
    Right,
}

impl Led {
    pub const ALL: [Led; 4] = [Led::Front, Led::Back, Led::Left, Led::Right];

    /// Wire action that switches this LED.
    pub fn action(self, on: bool) -> RobotAction {
        match (self, on) {
            (Led::Front, true) => RobotAction::LedFrontOn,
            (Led::Front, false) => RobotAction::LedFrontOff,
            (Led::Back, true) => RobotAction::LedBackOn,
            (Led::Back, false) => RobotAction::LedBackOff,
            (Led::Left, true) => RobotAction::LedLeftOn,
            (Led::Left, false) => RobotAction::LedLeftOff,
            (Led::Right, true) => RobotAction::LedRightOn,
            (Led::Right, false) => RobotAction::LedRightOff,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Led::Front => "front",
            Led::Back => "back",
            Led::Left => "left",
            Led::Right => "right",
        }
    }
}

/// Persistent robot behaviours toggled independently of driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutomationMode {
    ObstacleAvoidance,
    LineFollowing,
    AutoLights,
}

impl AutomationMode {
    /// Wire action that switches this mode.
    pub fn action(self, on: bool) -> RobotAction {
        match (self, on) {
            (AutomationMode::ObstacleAvoidance, true) => RobotAction::ObstacleAvoidanceOn,
            (AutomationMode::ObstacleAvoidance, false) => RobotAction::ObstacleAvoidanceOff,
            (AutomationMode::LineFollowing, true) => RobotAction::LineFollowingOn,
            (AutomationMode::LineFollowing, false) => RobotAction::LineFollowingOff,
            (AutomationMode::AutoLights, true) => RobotAction::AutoLightsOn,
            (AutomationMode::AutoLights, false) => RobotAction::AutoLightsOff,
        }
    }
}

/// A validated mutation of [`RobotState`].
#[derive(Debug, Clone, PartialEq)]
pub enum StateDelta {
    /// Start moving at `speed`.
    Drive { speed: u8 },
    /// Stop the wheels.
    Stop,
    SetLed { led: Led, on: bool },
    ToggleLed(Led),
    SetHorn(bool),
    SetAutomation { mode: AutomationMode, on: bool },
    ToggleAutomation(AutomationMode),
    SetCalibrating(bool),
    SetDistance(Option<f32>),
    /// Halt movement, silence the horn and drop the exclusive automation modes.
    EmergencyStop,
}

impl StateDelta {
    /// Map a frame reported by the robot to the state change it describes.
    ///
    /// Frames that carry no state (BEEP, GET_STATUS, camera moves, ...) map to
    /// `None`.
    pub fn from_report(command: &RobotCommand) -> Option<Self> {
        use RobotAction::*;

        let action = command.action();
        if action.is_movement() {
            return Some(match action {
                Stop => Self::Stop,
                _ => Self::Drive {
                    speed: command.speed(),
                },
            });
        }

        let delta = match action {
            LedFrontOn => Self::SetLed { led: Led::Front, on: true },
            LedFrontOff => Self::SetLed { led: Led::Front, on: false },
            LedBackOn => Self::SetLed { led: Led::Back, on: true },
            LedBackOff => Self::SetLed { led: Led::Back, on: false },
            LedLeftOn => Self::SetLed { led: Led::Left, on: true },
            LedLeftOff => Self::SetLed { led: Led::Left, on: false },
            LedRightOn => Self::SetLed { led: Led::Right, on: true },
            LedRightOff => Self::SetLed { led: Led::Right, on: false },
            HornOn => Self::SetHorn(true),
            HornOff => Self::SetHorn(false),
            ObstacleAvoidanceOn => Self::SetAutomation {
                mode: AutomationMode::ObstacleAvoidance,
                on: true,
            },
            ObstacleAvoidanceOff => Self::SetAutomation {
                mode: AutomationMode::ObstacleAvoidance,
                on: false,
            },
            LineFollowingOn => Self::SetAutomation {
                mode: AutomationMode::LineFollowing,
                on: true,
            },
            LineFollowingOff => Self::SetAutomation {
                mode: AutomationMode::LineFollowing,
                on: false,
            },
            AutoLightsOn => Self::SetAutomation {
                mode: AutomationMode::AutoLights,
                on: true,
            },
            AutoLightsOff => Self::SetAutomation {
                mode: AutomationMode::AutoLights,
                on: false,
            },
            UltrasonicRead => match command.value() {
                CommandValue::Text(raw) => {
                    Self::SetDistance(Some(raw.as_str().trim().parse().ok()?))
                }
                _ => return None,
            },
            EmergencyStop => Self::EmergencyStop,
            Forward | Backward | Left | Right | Stop => return None,
            Beep | CalibrateSensors | GetStatus | SetCruiseControl | CameraUp | CameraDown
            | CameraLeft | CameraRight | CameraCenter => return None,
        };
        Some(delta)
    }

    fn apply_to(&self, state: &mut RobotState) {
        match *self {
            Self::Drive { speed } => {
                state.is_moving = true;
                state.current_speed = speed;
            }
            Self::Stop => state.stop(),
            Self::SetLed { led, on } => *state.led_mut(led) = on,
            Self::ToggleLed(led) => {
                let led = state.led_mut(led);
                *led = !*led;
            }
            Self::SetHorn(on) => state.horn_active = on,
            Self::SetAutomation { mode, on } => state.set_automation(mode, on),
            Self::ToggleAutomation(mode) => {
                let on = !state.automation(mode);
                state.set_automation(mode, on);
            }
            Self::SetCalibrating(on) => state.is_calibrating = on,
            Self::SetDistance(distance) => state.ultrasonic_distance = distance,
            Self::EmergencyStop => {
                state.stop();
                state.horn_active = false;
                state.set_automation(AutomationMode::ObstacleAvoidance, false);
                state.set_automation(AutomationMode::LineFollowing, false);
            }
        }
    }
}

/// Owner of the current [`RobotState`].
///
/// Every mutation is one read-modify-write under a single lock, so readers
/// only ever see whole snapshots.
pub struct RobotStateStore {
    state: Mutex<RobotState>,
    events: Arc<EventBus>,
}

impl RobotStateStore {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            state: Mutex::new(RobotState::default()),
            events,
        }
    }

    /// Current snapshot.
    pub fn read(&self) -> RobotState {
        self.state.lock().clone()
    }

    /// Apply a mutation and return the resulting snapshot.
    pub fn apply(&self, delta: StateDelta) -> RobotState {
        let mut state = self.state.lock();
        self.commit(&mut state, &delta)
    }

    /// Apply a mutation only while `lifetime` is still live.
    ///
    /// The cancellation check happens under the store lock, so once the owner
    /// of `lifetime` has cancelled it and reset the store no stale task can
    /// re-assert a flag.
    pub fn apply_within(
        &self,
        lifetime: &CancellationToken,
        delta: StateDelta,
    ) -> Option<RobotState> {
        let mut state = self.state.lock();
        if lifetime.is_cancelled() {
            debug!("Discarding {:?}, lifetime cancelled", delta);
            return None;
        }
        Some(self.commit(&mut state, &delta))
    }

    /// Restore the default state.
    pub fn reset(&self) -> RobotState {
        let mut state = self.state.lock();
        let fresh = RobotState::default();
        if *state != fresh {
            *state = fresh.clone();
            self.events.publish(SessionEvent::RobotChanged(fresh.clone()));
        }
        fresh
    }

    fn commit(&self, state: &mut RobotState, delta: &StateDelta) -> RobotState {
        let mut next = state.clone();
        delta.apply_to(&mut next);
        debug_assert!(!(next.obstacle_avoidance_on && next.line_following_on));
        debug_assert!(next.is_moving || next.current_speed == 0);

        if next != *state {
            *state = next.clone();
            self.events.publish(SessionEvent::RobotChanged(next.clone()));
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RobotStateStore {
        RobotStateStore::new(EventBus::new())
    }

    #[test]
    fn test_defaults() {
        let state = RobotState::default();
        assert!(!state.is_moving);
        assert_eq!(state.current_speed, 0);
        assert_eq!(state.battery_level, 100);
        assert!(state.ultrasonic_distance.is_none());
    }

    #[test]
    fn test_snapshot_serializes_for_display() {
        let store = store();
        let state = store.apply(StateDelta::ToggleAutomation(AutomationMode::LineFollowing));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["line_following_on"], true);
        assert_eq!(json["obstacle_avoidance_on"], false);
        assert_eq!(json["battery_level"], 100);
    }

    #[test]
    fn test_drive_and_stop_keep_speed_invariant() {
        let store = store();
        let state = store.apply(StateDelta::Drive { speed: 70 });
        assert!(state.is_moving);
        assert_eq!(state.current_speed, 70);

        let state = store.apply(StateDelta::Stop);
        assert!(!state.is_moving);
        assert_eq!(state.current_speed, 0);
    }

    #[test]
    fn test_enabling_obstacle_avoidance_clears_line_following() {
        let store = store();
        store.apply(StateDelta::SetAutomation {
            mode: AutomationMode::LineFollowing,
            on: true,
        });

        let state = store.apply(StateDelta::ToggleAutomation(AutomationMode::ObstacleAvoidance));
        assert!(state.obstacle_avoidance_on);
        assert!(!state.line_following_on);
    }

    #[test]
    fn test_enabling_line_following_clears_obstacle_avoidance() {
        let store = store();
        store.apply(StateDelta::ToggleAutomation(AutomationMode::ObstacleAvoidance));
        let state = store.apply(StateDelta::ToggleAutomation(AutomationMode::LineFollowing));
        assert!(state.line_following_on);
        assert!(!state.obstacle_avoidance_on);
    }

    #[test]
    fn test_disabling_a_mode_leaves_the_other_alone() {
        let store = store();
        store.apply(StateDelta::ToggleAutomation(AutomationMode::LineFollowing));
        let state = store.apply(StateDelta::SetAutomation {
            mode: AutomationMode::ObstacleAvoidance,
            on: false,
        });
        assert!(state.line_following_on);
        assert!(!state.obstacle_avoidance_on);
    }

    #[test]
    fn test_auto_lights_are_independent() {
        let store = store();
        store.apply(StateDelta::ToggleAutomation(AutomationMode::ObstacleAvoidance));
        let state = store.apply(StateDelta::ToggleAutomation(AutomationMode::AutoLights));
        assert!(state.auto_lights_on);
        assert!(state.obstacle_avoidance_on);
    }

    #[test]
    fn test_toggle_led() {
        let store = store();
        assert!(store.apply(StateDelta::ToggleLed(Led::Back)).back_led_on);
        assert!(!store.apply(StateDelta::ToggleLed(Led::Back)).back_led_on);
        assert!(!store.read().front_led_on);
    }

    #[test]
    fn test_emergency_stop_delta() {
        let store = store();
        store.apply(StateDelta::Drive { speed: 90 });
        store.apply(StateDelta::SetHorn(true));
        store.apply(StateDelta::ToggleAutomation(AutomationMode::LineFollowing));
        store.apply(StateDelta::ToggleAutomation(AutomationMode::AutoLights));
        store.apply(StateDelta::ToggleLed(Led::Front));

        let state = store.apply(StateDelta::EmergencyStop);
        assert!(!state.is_moving);
        assert_eq!(state.current_speed, 0);
        assert!(!state.horn_active);
        assert!(!state.line_following_on);
        assert!(!state.obstacle_avoidance_on);
        // Lights are not part of the emergency stop
        assert!(state.auto_lights_on);
        assert!(state.front_led_on);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let store = store();
        store.apply(StateDelta::Drive { speed: 40 });
        store.apply(StateDelta::SetCalibrating(true));
        assert_eq!(store.reset(), RobotState::default());
        assert_eq!(store.read(), RobotState::default());
    }

    #[test]
    fn test_apply_within_cancelled_lifetime_is_discarded() {
        let store = store();
        let lifetime = CancellationToken::new();
        assert!(store.apply_within(&lifetime, StateDelta::SetHorn(true)).is_some());

        lifetime.cancel();
        store.reset();
        assert!(store.apply_within(&lifetime, StateDelta::SetHorn(true)).is_none());
        assert!(!store.read().horn_active);
    }

    #[test]
    fn test_only_real_changes_are_published() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let store = RobotStateStore::new(events);

        store.apply(StateDelta::Stop);
        assert!(rx.try_recv().is_err());

        store.apply(StateDelta::SetHorn(true));
        match rx.try_recv().unwrap() {
            SessionEvent::RobotChanged(state) => assert!(state.horn_active),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_from_report() {
        let report = RobotCommand::new(RobotAction::Left, 45, CommandValue::None, 0);
        assert_eq!(StateDelta::from_report(&report), Some(StateDelta::Drive { speed: 45 }));

        let report = RobotCommand::new(RobotAction::Stop, 45, CommandValue::None, 0);
        assert_eq!(StateDelta::from_report(&report), Some(StateDelta::Stop));

        let report = RobotCommand::new(
            RobotAction::UltrasonicRead,
            0,
            CommandValue::text("87.5").unwrap(),
            0,
        );
        assert_eq!(
            StateDelta::from_report(&report),
            Some(StateDelta::SetDistance(Some(87.5)))
        );

        let report = RobotCommand::new(RobotAction::UltrasonicRead, 0, CommandValue::None, 0);
        assert_eq!(StateDelta::from_report(&report), None);

        let report = RobotCommand::simple(RobotAction::Beep, 0);
        assert_eq!(StateDelta::from_report(&report), None);
    }

    #[test]
    fn test_concurrent_toggles_do_not_corrupt_state() {
        let store = Arc::new(store());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.apply(StateDelta::ToggleLed(Led::ALL[i % 4]));
                        if i % 2 == 0 {
                            store.apply(StateDelta::ToggleAutomation(AutomationMode::LineFollowing));
                        } else {
                            store.apply(StateDelta::ToggleAutomation(
                                AutomationMode::ObstacleAvoidance,
                            ));
                        }
                        let state = store.read();
                        assert!(!(state.obstacle_avoidance_on && state.line_following_on));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        // Every LED was toggled an even number of times (2 threads x 100 each)
        let state = store.read();
        for led in Led::ALL {
            assert!(!state.led(led));
        }
    }
}
