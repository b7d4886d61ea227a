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

//! Command values sent to the robot.

use std::fmt;
use thiserror::Error;

use super::action::RobotAction;
use super::codec::FIELD_SEPARATOR;

/// Highest speed the firmware accepts.
pub const MAX_SPEED: u8 = 100;

/// Why a string cannot be carried as a text value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("text value is empty")]
    Empty,

    #[error("text value {0:?} contains the field separator")]
    ContainsSeparator(String),

    #[error("text value {0:?} would be read back as a boolean")]
    Boolean(String),
}

/// Free-form payload that survives an encode/decode round trip unchanged.
///
/// Never empty, never `true`/`false` and never containing the field
/// separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextValue(String);

impl TextValue {
    pub fn new(text: impl Into<String>) -> Result<Self, ValueError> {
        let text = text.into();
        if text.is_empty() {
            return Err(ValueError::Empty);
        }
        if text.contains(FIELD_SEPARATOR) {
            return Err(ValueError::ContainsSeparator(text));
        }
        if text == "true" || text == "false" {
            return Err(ValueError::Boolean(text));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optional payload carried in the VALUE field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommandValue {
    #[default]
    None,
    Bool(bool),
    Text(TextValue),
}

impl CommandValue {
    /// A text payload, rejected if it would not decode back to itself.
    pub fn text(text: impl Into<String>) -> Result<Self, ValueError> {
        TextValue::new(text).map(Self::Text)
    }

    /// Interpret a raw VALUE field.
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "" => Self::None,
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            other => match TextValue::new(other) {
                Ok(text) => Self::Text(text),
                // Only reachable for a raw field holding the separator
                Err(_) => Self::None,
            },
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for CommandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Text(text) => text.fmt(f),
        }
    }
}

impl From<bool> for CommandValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A single command frame. Built once per send and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotCommand {
    action: RobotAction,
    speed: u8,
    value: CommandValue,
    timestamp: i64,
}

impl RobotCommand {
    /// Create a command; `speed` is clamped to `0..=MAX_SPEED`.
    pub fn new(action: RobotAction, speed: i64, value: CommandValue, timestamp: i64) -> Self {
        Self {
            action,
            speed: clamp_speed(speed),
            value,
            timestamp,
        }
    }

    /// A command with no speed and no payload.
    pub fn simple(action: RobotAction, timestamp: i64) -> Self {
        Self::new(action, 0, CommandValue::None, timestamp)
    }

    pub fn action(&self) -> RobotAction {
        self.action
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn value(&self) -> &CommandValue {
        &self.value
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Clamp an arbitrary integer into the valid speed range.
pub fn clamp_speed(speed: i64) -> u8 {
    speed.clamp(0, MAX_SPEED as i64) as u8
}
