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

//! Session events and their fan-out to observers.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::connection::ConnectionState;
use crate::state::RobotState;

/// Events emitted by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Connection state replaced.
    ConnectionChanged(ConnectionState),
    /// Robot state replaced.
    RobotChanged(RobotState),
    /// Selected driving speed changed.
    SpeedChanged(u8),
    /// Human readable outcome of the last command sent.
    CommandResult(String),
    /// A calibration sequence ended.
    CalibrationFinished { completed: bool },
}

/// Callbacks for the presentation layer.
///
/// All methods default to doing nothing so implementors only override what
/// they render.
pub trait StateObserver: Send + Sync + 'static {
    fn on_connection_state_changed(&self, _state: &ConnectionState) {}

    fn on_robot_state_changed(&self, _state: &RobotState) {}

    fn on_speed_changed(&self, _speed: u8) {}

    fn on_command_result(&self, _message: &str) {}

    fn on_calibration_finished(&self, _completed: bool) {}
}

/// Fans events out to every live subscriber.
///
/// Publishing never blocks, so it is safe to call while holding a state lock;
/// that is what keeps notification order identical to mutation order.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver an event, dropping subscribers whose receiver is gone.
    pub fn publish(&self, event: SessionEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Drive `observer` from a subscription until the bus goes away.
pub fn spawn_observer(
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
    observer: Arc<dyn StateObserver>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            dispatch(observer.as_ref(), &event);
        }
        debug!("Observer subscription closed");
    })
}

fn dispatch(observer: &dyn StateObserver, event: &SessionEvent) {
    match event {
        SessionEvent::ConnectionChanged(state) => observer.on_connection_state_changed(state),
        SessionEvent::RobotChanged(state) => observer.on_robot_state_changed(state),
        SessionEvent::SpeedChanged(speed) => observer.on_speed_changed(*speed),
        SessionEvent::CommandResult(message) => observer.on_command_result(message),
        SessionEvent::CalibrationFinished { completed } => {
            observer.on_calibration_finished(*completed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        results: Mutex<Vec<String>>,
        speeds: Mutex<Vec<u8>>,
    }

    impl StateObserver for Recorder {
        fn on_command_result(&self, message: &str) {
            self.results.lock().push(message.to_string());
        }

        fn on_speed_changed(&self, speed: u8) {
            self.speeds.lock().push(speed);
        }
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(SessionEvent::SpeedChanged(30));

        assert_eq!(a.try_recv().unwrap(), SessionEvent::SpeedChanged(30));
        assert_eq!(b.try_recv().unwrap(), SessionEvent::SpeedChanged(30));
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let _keep = bus.subscribe();
        drop(rx);

        bus.publish(SessionEvent::CommandResult("x".into()));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_observer_receives_events_in_order() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        let handle = spawn_observer(bus.subscribe(), recorder.clone());

        bus.publish(SessionEvent::SpeedChanged(10));
        bus.publish(SessionEvent::CommandResult("first".into()));
        bus.publish(SessionEvent::CommandResult("second".into()));
        drop(bus);

        handle.await.unwrap();
        assert_eq!(*recorder.speeds.lock(), vec![10]);
        assert_eq!(*recorder.results.lock(), vec!["first", "second"]);
    }
}
