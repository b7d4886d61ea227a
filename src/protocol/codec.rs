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

//! Frame encoding and decoding.
//!
//! A frame is `ACTION:SPEED:VALUE:TIMESTAMP`. Decoding is forward-tolerant:
//! only the action is mandatory, everything after it falls back to a default
//! when missing or unparsable so that older and newer firmware interoperate.

use std::num::IntErrorKind;
use thiserror::Error;

use super::action::RobotAction;
use super::command::{CommandValue, RobotCommand};
use crate::clock::{Clock, SystemClock};

/// Field separator.
pub const FIELD_SEPARATOR: char = ':';

/// Errors produced while decoding a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0:?}")]
    MalformedFrame(String),

    #[error("unknown action: {0:?}")]
    UnknownAction(String),
}

/// Encode a command into its wire frame.
pub fn encode(command: &RobotCommand) -> String {
    format!(
        "{}{sep}{}{sep}{}{sep}{}",
        command.action().as_str(),
        command.speed(),
        command.value(),
        command.timestamp(),
        sep = FIELD_SEPARATOR
    )
}

/// Decode a frame, using the system clock for a missing timestamp.
pub fn decode(frame: &str) -> Result<RobotCommand, DecodeError> {
    decode_with_clock(frame, &SystemClock)
}

/// Decode a frame, using `clock` for a missing timestamp.
pub fn decode_with_clock(frame: &str, clock: &dyn Clock) -> Result<RobotCommand, DecodeError> {
    let trimmed = frame.trim();
    let parts: Vec<&str> = trimmed.split(FIELD_SEPARATOR).collect();
    if parts.len() < 2 {
        return Err(DecodeError::MalformedFrame(trimmed.to_string()));
    }

    let action = RobotAction::parse(parts[0])
        .ok_or_else(|| DecodeError::UnknownAction(parts[0].to_string()))?;

    let speed = parse_speed(parts[1]);

    let value = parts
        .get(2)
        .map(|raw| CommandValue::from_wire(raw))
        .unwrap_or_default();

    let timestamp = parts
        .get(3)
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or_else(|| clock.now_millis());

    Ok(RobotCommand::new(action, speed, value, timestamp))
}

/// Parse a SPEED field. Values too large for `i64` saturate so they clamp
/// like any other out-of-range speed; anything unparsable reads as 0.
fn parse_speed(raw: &str) -> i64 {
    match raw.trim().parse::<i64>() {
        Ok(speed) => speed,
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => i64::MAX,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_encode_with_and_without_value() {
        let cmd = RobotCommand::new(RobotAction::Forward, 70, CommandValue::None, 1_700_000_000_000);
        assert_eq!(encode(&cmd), "FORWARD:70::1700000000000");

        let cmd = RobotCommand::new(RobotAction::LedFrontOn, 0, CommandValue::Bool(true), 12);
        assert_eq!(encode(&cmd), "LED_FRONT_ON:0:true:12");
    }

    #[test]
    fn test_decode_full_frame() {
        let cmd = decode("LED_LEFT_OFF:0:false:123").unwrap();
        assert_eq!(cmd.action(), RobotAction::LedLeftOff);
        assert_eq!(cmd.speed(), 0);
        assert_eq!(cmd.value(), &CommandValue::Bool(false));
        assert_eq!(cmd.timestamp(), 123);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            decode("FOO:1:2:3"),
            Err(DecodeError::UnknownAction("FOO".to_string()))
        );
        assert_eq!(
            decode("FORWARD"),
            Err(DecodeError::MalformedFrame("FORWARD".to_string()))
        );
        assert!(matches!(decode(""), Err(DecodeError::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_defaults_missing_fields() {
        let clock = ManualClock::new(5_000);

        let cmd = decode_with_clock("STOP:", &clock).unwrap();
        assert_eq!(cmd.action(), RobotAction::Stop);
        assert_eq!(cmd.speed(), 0);
        assert!(cmd.value().is_none());
        assert_eq!(cmd.timestamp(), 5_000);

        let cmd = decode_with_clock("BACKWARD:abc:x:notanumber", &clock).unwrap();
        assert_eq!(cmd.speed(), 0);
        assert_eq!(cmd.value(), &CommandValue::text("x").unwrap());
        assert_eq!(cmd.timestamp(), 5_000);
    }

    #[test]
    fn test_decode_clamps_speed_and_trims_newline() {
        let cmd = decode("FORWARD:250::9\n").unwrap();
        assert_eq!(cmd.speed(), 100);
        assert_eq!(cmd.timestamp(), 9);
    }

    #[test]
    fn test_decode_saturates_overflowing_speed() {
        let cmd = decode("FORWARD:99999999999999999999::1").unwrap();
        assert_eq!(cmd.speed(), 100);

        let cmd = decode("FORWARD:-99999999999999999999::1").unwrap();
        assert_eq!(cmd.speed(), 0);
    }

    #[test]
    fn test_text_values_keep_the_frame_intact() {
        assert!(CommandValue::text("a:b").is_err());

        let value = CommandValue::text("a-b c").unwrap();
        let cmd = RobotCommand::new(RobotAction::Forward, 10, value.clone(), 5);
        let frame = encode(&cmd);
        assert_eq!(frame, "FORWARD:10:a-b c:5");
        assert_eq!(frame.matches(FIELD_SEPARATOR).count(), 3);

        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.value(), &value);
        assert_eq!(decoded.timestamp(), 5);
    }

    #[test]
    fn test_round_trip_preserves_action_speed_value() {
        let values = [
            CommandValue::None,
            CommandValue::Bool(true),
            CommandValue::Bool(false),
            CommandValue::text("42.0").unwrap(),
        ];
        for action in RobotAction::ALL {
            for value in &values {
                let cmd = RobotCommand::new(action, 35, value.clone(), 1_234);
                let decoded = decode(&encode(&cmd)).unwrap();
                assert_eq!(decoded, cmd);
            }
        }
    }
}
