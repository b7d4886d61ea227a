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

//! Line-oriented console front end.

use anyhow::{anyhow, bail, Result};
use tracing::{debug, error};

use carrobot_remote::connection::ConnectionStatus;
use carrobot_remote::state::Led;
use carrobot_remote::{
    ConnectError, ConnectionState, Dispatch, RobotSession, RobotState, SendError, StateObserver,
};

pub const HELP: &str = "\
Commands:
  wifi [address]   connect over WiFi
  bt               connect over Bluetooth
  disconnect       drop the connection
  fwd | back | left | right | stop
  speed <0-100>    select driving speed
  led <front|back|left|right>
  avoid | follow | lights   toggle automation modes
  horn | beep | calibrate | ultra
  status           request a status report and print the local state
  estop            emergency stop
  help | quit";

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleIntent {
    Wifi(Option<String>),
    Bluetooth,
    Disconnect,
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    Speed(i32),
    Led(Led),
    ObstacleAvoidance,
    LineFollowing,
    AutoLights,
    Horn,
    Beep,
    Calibrate,
    Ultrasonic,
    Status,
    EmergencyStop,
    Help,
    Quit,
}

impl ConsoleIntent {
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            bail!("empty command");
        };
        let argument = words.next();

        let intent = match command.to_ascii_lowercase().as_str() {
            "wifi" => Self::Wifi(argument.map(str::to_string)),
            "bt" | "bluetooth" => Self::Bluetooth,
            "disconnect" => Self::Disconnect,
            "fwd" | "forward" => Self::Forward,
            "back" | "backward" => Self::Backward,
            "left" => Self::Left,
            "right" => Self::Right,
            "stop" => Self::Stop,
            "speed" => {
                let raw = argument.ok_or_else(|| anyhow!("usage: speed <0-100>"))?;
                let speed = raw
                    .parse::<i32>()
                    .map_err(|_| anyhow!("not a number: {}", raw))?;
                Self::Speed(speed)
            }
            "led" => Self::Led(parse_led(argument)?),
            "avoid" => Self::ObstacleAvoidance,
            "follow" => Self::LineFollowing,
            "lights" => Self::AutoLights,
            "horn" => Self::Horn,
            "beep" => Self::Beep,
            "calibrate" => Self::Calibrate,
            "ultra" => Self::Ultrasonic,
            "status" => Self::Status,
            "estop" => Self::EmergencyStop,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command: {} (try 'help')", other),
        };
        Ok(intent)
    }
}

fn parse_led(argument: Option<&str>) -> Result<Led> {
    let name = argument.ok_or_else(|| anyhow!("usage: led <front|back|left|right>"))?;
    Led::ALL
        .into_iter()
        .find(|led| led.as_str().eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow!("unknown LED: {}", name))
}

/// Carry out one intent against the session.
pub async fn execute(session: &RobotSession, intent: ConsoleIntent, default_address: &str) {
    let sent = match intent {
        ConsoleIntent::Wifi(address) => {
            let address = address.unwrap_or_else(|| default_address.to_string());
            if let Err(e) = session.connect_wifi(address).await {
                report_connect_error(e);
            }
            return;
        }
        ConsoleIntent::Bluetooth => {
            if let Err(e) = session.connect_bluetooth().await {
                report_connect_error(e);
            }
            return;
        }
        ConsoleIntent::Disconnect => {
            session.disconnect().await;
            return;
        }
        ConsoleIntent::Speed(speed) => {
            session.set_speed(speed);
            return;
        }
        ConsoleIntent::Horn => {
            report_sequence(session, session.activate_horn().is_some());
            return;
        }
        ConsoleIntent::Calibrate => {
            report_sequence(session, session.calibrate_sensors().is_some());
            return;
        }
        ConsoleIntent::Ultrasonic => {
            if let Some(read) = session.read_ultrasonic() {
                read.wait().await;
                match session.robot_state().ultrasonic_distance {
                    Some(cm) => println!("Distance: {:.0} cm", cm),
                    None => println!("Distance: --"),
                }
            } else {
                report_sequence(session, false);
            }
            return;
        }
        ConsoleIntent::Status => {
            report_dispatch(session.refresh_status().await);
            match serde_json::to_string_pretty(&session.robot_state()) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Failed to render state: {}", e),
            }
            return;
        }
        ConsoleIntent::EmergencyStop => {
            session.emergency_stop().await;
            return;
        }
        ConsoleIntent::Help | ConsoleIntent::Quit => {
            println!("{}", HELP);
            return;
        }
        ConsoleIntent::Forward => session.move_forward().await,
        ConsoleIntent::Backward => session.move_backward().await,
        ConsoleIntent::Left => session.turn_left().await,
        ConsoleIntent::Right => session.turn_right().await,
        ConsoleIntent::Stop => session.stop_movement().await,
        ConsoleIntent::Led(led) => session.toggle_led(led).await,
        ConsoleIntent::ObstacleAvoidance => session.toggle_obstacle_avoidance().await,
        ConsoleIntent::LineFollowing => session.toggle_line_following().await,
        ConsoleIntent::AutoLights => session.toggle_auto_lights().await,
        ConsoleIntent::Beep => session.beep().await,
    };
    report_dispatch(sent);
}

fn report_connect_error(error: ConnectError) {
    // Reportable failures already reach the observer as an error state
    if error.is_reportable() {
        debug!("Connect failed: {}", error);
    } else {
        println!("{}", error);
    }
}

fn report_sequence(session: &RobotSession, started: bool) {
    if !started && !session.is_connected() {
        println!("Not connected");
    }
}

fn report_dispatch(sent: std::result::Result<Dispatch, SendError>) {
    match sent {
        Ok(Dispatch::Sent) => {}
        Ok(Dispatch::Gated) => println!("Not connected"),
        Err(e) => error!("Command failed: {}", e),
    }
}

/// Prints session events to stdout.
pub struct ConsoleObserver;

impl StateObserver for ConsoleObserver {
    fn on_connection_state_changed(&self, state: &ConnectionState) {
        match (state.status(), state.device(), state.error_message()) {
            (ConnectionStatus::Connected, Some(device), _) => println!(
                "[{}] {} ({}, {})",
                state.status().as_str(),
                device.name,
                device.address,
                device.connection_type.as_str()
            ),
            (ConnectionStatus::Error, _, Some(message)) => {
                println!("[{}] {}", state.status().as_str(), message)
            }
            _ => println!("[{}]", state.status().as_str()),
        }
    }

    fn on_robot_state_changed(&self, state: &RobotState) {
        println!("{}", summarize(state));
    }

    fn on_speed_changed(&self, speed: u8) {
        println!("Speed: {}", speed);
    }

    fn on_command_result(&self, message: &str) {
        println!("{}", message);
    }

    fn on_calibration_finished(&self, completed: bool) {
        if completed {
            println!("Calibration complete");
        } else {
            println!("Calibration aborted");
        }
    }
}

fn summarize(state: &RobotState) -> String {
    let flag = |on: bool| if on { "on" } else { "off" };
    let lit: Vec<&str> = Led::ALL
        .into_iter()
        .filter(|led| state.led(*led))
        .map(|led| led.as_str())
        .collect();

    format!(
        "moving={} speed={} leds=[{}] horn={} avoid={} follow={} lights={} calibrating={}",
        state.is_moving,
        state.current_speed,
        lit.join(","),
        flag(state.horn_active),
        flag(state.obstacle_avoidance_on),
        flag(state.line_following_on),
        flag(state.auto_lights_on),
        state.is_calibrating
    )
}
