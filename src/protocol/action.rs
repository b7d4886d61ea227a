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

//! Robot action names as they appear on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every action the robot firmware understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RobotAction {
    // Movement
    Forward,
    Backward,
    Left,
    Right,
    Stop,

    // LEDs
    LedFrontOn,
    LedFrontOff,
    LedBackOn,
    LedBackOff,
    LedLeftOn,
    LedLeftOff,
    LedRightOn,
    LedRightOff,

    // Sound
    HornOn,
    HornOff,
    Beep,

    // Sensors
    UltrasonicRead,

    // Automation
    ObstacleAvoidanceOn,
    ObstacleAvoidanceOff,
    LineFollowingOn,
    LineFollowingOff,
    AutoLightsOn,
    AutoLightsOff,

    // System
    CalibrateSensors,
    GetStatus,
    EmergencyStop,

    // Reserved by the firmware, no session intent yet
    SetCruiseControl,
    CameraUp,
    CameraDown,
    CameraLeft,
    CameraRight,
    CameraCenter,
}

impl RobotAction {
    /// All actions in declaration order.
    pub const ALL: [RobotAction; 32] = [
        Self::Forward,
        Self::Backward,
        Self::Left,
        Self::Right,
        Self::Stop,
        Self::LedFrontOn,
        Self::LedFrontOff,
        Self::LedBackOn,
        Self::LedBackOff,
        Self::LedLeftOn,
        Self::LedLeftOff,
        Self::LedRightOn,
        Self::LedRightOff,
        Self::HornOn,
        Self::HornOff,
        Self::Beep,
        Self::UltrasonicRead,
        Self::ObstacleAvoidanceOn,
        Self::ObstacleAvoidanceOff,
        Self::LineFollowingOn,
        Self::LineFollowingOff,
        Self::AutoLightsOn,
        Self::AutoLightsOff,
        Self::CalibrateSensors,
        Self::GetStatus,
        Self::EmergencyStop,
        Self::SetCruiseControl,
        Self::CameraUp,
        Self::CameraDown,
        Self::CameraLeft,
        Self::CameraRight,
        Self::CameraCenter,
    ];

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "FORWARD",
            Self::Backward => "BACKWARD",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Stop => "STOP",
            Self::LedFrontOn => "LED_FRONT_ON",
            Self::LedFrontOff => "LED_FRONT_OFF",
            Self::LedBackOn => "LED_BACK_ON",
            Self::LedBackOff => "LED_BACK_OFF",
            Self::LedLeftOn => "LED_LEFT_ON",
            Self::LedLeftOff => "LED_LEFT_OFF",
            Self::LedRightOn => "LED_RIGHT_ON",
            Self::LedRightOff => "LED_RIGHT_OFF",
            Self::HornOn => "HORN_ON",
            Self::HornOff => "HORN_OFF",
            Self::Beep => "BEEP",
            Self::UltrasonicRead => "ULTRASONIC_READ",
            Self::ObstacleAvoidanceOn => "OBSTACLE_AVOIDANCE_ON",
            Self::ObstacleAvoidanceOff => "OBSTACLE_AVOIDANCE_OFF",
            Self::LineFollowingOn => "LINE_FOLLOWING_ON",
            Self::LineFollowingOff => "LINE_FOLLOWING_OFF",
            Self::AutoLightsOn => "AUTO_LIGHTS_ON",
            Self::AutoLightsOff => "AUTO_LIGHTS_OFF",
            Self::CalibrateSensors => "CALIBRATE_SENSORS",
            Self::GetStatus => "GET_STATUS",
            Self::EmergencyStop => "EMERGENCY_STOP",
            Self::SetCruiseControl => "SET_CRUISE_CONTROL",
            Self::CameraUp => "CAMERA_UP",
            Self::CameraDown => "CAMERA_DOWN",
            Self::CameraLeft => "CAMERA_LEFT",
            Self::CameraRight => "CAMERA_RIGHT",
            Self::CameraCenter => "CAMERA_CENTER",
        }
    }

    /// Parse a wire name. Names are case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|action| action.as_str() == s)
    }

    /// Whether this action drives the wheels.
    pub fn is_movement(&self) -> bool {
        matches!(
            self,
            Self::Forward | Self::Backward | Self::Left | Self::Right | Self::Stop
        )
    }
}

impl fmt::Display for RobotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_names() {
        assert_eq!(RobotAction::parse("FORWARD"), Some(RobotAction::Forward));
        assert_eq!(RobotAction::parse("LED_BACK_OFF"), Some(RobotAction::LedBackOff));
        assert_eq!(
            RobotAction::parse("OBSTACLE_AVOIDANCE_ON"),
            Some(RobotAction::ObstacleAvoidanceOn)
        );
        assert_eq!(RobotAction::parse("CAMERA_CENTER"), Some(RobotAction::CameraCenter));
    }

    #[test]
    fn test_parse_rejects_unknown_and_lowercase() {
        assert_eq!(RobotAction::parse("FOO"), None);
        assert_eq!(RobotAction::parse("forward"), None);
        assert_eq!(RobotAction::parse(""), None);
    }

    #[test]
    fn test_every_name_is_unique_and_parses_back() {
        for action in RobotAction::ALL {
            assert_eq!(RobotAction::parse(action.as_str()), Some(action));
        }
        let mut names: Vec<_> = RobotAction::ALL.iter().map(|a| a.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), RobotAction::ALL.len());
    }

    #[test]
    fn test_movement_actions() {
        let movement: Vec<_> = RobotAction::ALL
            .into_iter()
            .filter(RobotAction::is_movement)
            .collect();
        assert_eq!(
            movement,
            vec![
                RobotAction::Forward,
                RobotAction::Backward,
                RobotAction::Left,
                RobotAction::Right,
                RobotAction::Stop
            ]
        );
        assert!(!RobotAction::EmergencyStop.is_movement());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&RobotAction::LineFollowingOff).unwrap();
        assert_eq!(json, "\"LINE_FOLLOWING_OFF\"");
    }
}
