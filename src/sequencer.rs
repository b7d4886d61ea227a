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

//! Timed robot actions.
//!
//! Each sequence runs on its own task with a cancellation token derived from
//! the connection lifetime, so a disconnect ends every sequence at its next
//! hold. A sequence that is cut short clears whatever flag it raised.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::SequenceConfig;
use crate::connection::ConnectionManager;
use crate::events::{EventBus, SessionEvent};
use crate::protocol::{RobotAction, RobotCommand};
use crate::sensor::DistanceSensor;
use crate::state::{RobotStateStore, StateDelta};

/// Commands sent by an emergency stop, in order.
const EMERGENCY_STOP_COMMANDS: [RobotAction; 4] = [
    RobotAction::Stop,
    RobotAction::ObstacleAvoidanceOff,
    RobotAction::LineFollowingOff,
    RobotAction::HornOff,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    HornPulse,
    Calibration,
    UltrasonicRead,
}

impl SequenceKind {
    /// Whether starting this sequence again replaces the running one.
    ///
    /// Kinds that do not restart ignore the new request instead.
    pub fn restarts(&self) -> bool {
        match self {
            SequenceKind::HornPulse | SequenceKind::UltrasonicRead => true,
            SequenceKind::Calibration => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceKind::HornPulse => "horn pulse",
            SequenceKind::Calibration => "calibration",
            SequenceKind::UltrasonicRead => "ultrasonic read",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    Completed,
    Cancelled,
}

/// Handle to a running sequence.
///
/// Dropping the handle leaves the sequence running.
#[derive(Debug)]
pub struct SequenceHandle {
    id: Uuid,
    kind: SequenceKind,
    token: CancellationToken,
    task: JoinHandle<SequenceOutcome>,
}

impl SequenceHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> SequenceKind {
        self.kind
    }

    /// Request cancellation. The sequence stops at its next hold.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the sequence to end.
    pub async fn wait(self) -> SequenceOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Sequence {} task failed: {}", self.id, e);
                SequenceOutcome::Cancelled
            }
        }
    }
}

struct Running {
    kind: SequenceKind,
    token: CancellationToken,
    /// Cancelled once the task has fully finished, cleanup included.
    done: CancellationToken,
}

/// Tokens handed to a sequence body.
struct Scope {
    /// Cancelled when this sequence should stop.
    token: CancellationToken,
    /// Cancelled when the connection ends.
    lifetime: CancellationToken,
    /// Earlier sequences of the same kind still winding down.
    predecessors: Vec<CancellationToken>,
}

impl Scope {
    async fn wait_for_predecessors(&self) {
        for done in &self.predecessors {
            done.cancelled().await;
        }
    }
}

/// Runs and tracks timed sequences.
pub struct ActionSequencer {
    connection: Arc<ConnectionManager>,
    store: Arc<RobotStateStore>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    sensor: Arc<dyn DistanceSensor>,
    settings: SequenceConfig,
    running: Mutex<HashMap<Uuid, Running>>,
}

impl ActionSequencer {
    pub fn new(
        connection: Arc<ConnectionManager>,
        store: Arc<RobotStateStore>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        sensor: Arc<dyn DistanceSensor>,
        settings: SequenceConfig,
    ) -> Self {
        Self {
            connection,
            store,
            events,
            clock,
            sensor,
            settings,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Sound the horn for `horn_pulse_ms`.
    ///
    /// Returns `None` when not connected.
    pub fn start_horn_pulse(self: &Arc<Self>) -> Option<SequenceHandle> {
        self.launch(SequenceKind::HornPulse, |this, scope| this.horn_pulse(scope))
    }

    /// Run a sensor calibration sweep.
    ///
    /// Returns `None` when not connected or a calibration is already running.
    pub fn start_calibration(self: &Arc<Self>) -> Option<SequenceHandle> {
        self.launch(SequenceKind::Calibration, |this, scope| this.calibration(scope))
    }

    /// Take one ultrasonic distance reading.
    pub fn start_ultrasonic_read(self: &Arc<Self>) -> Option<SequenceHandle> {
        self.launch(SequenceKind::UltrasonicRead, |this, scope| this.ultrasonic_read(scope))
    }

    /// Halt the robot.
    ///
    /// Cancels every sequence first and never waits on a hold. The local state
    /// is cleared before the stop commands go out.
    pub async fn emergency_stop(&self) {
        let cancelled = self.cancel_all();
        let Some(lifetime) = self.connection.lifetime() else {
            debug!("Emergency stop while not connected");
            return;
        };

        warn!("Emergency stop ({} sequences cancelled)", cancelled);
        self.store.apply_within(&lifetime, StateDelta::EmergencyStop);

        for action in EMERGENCY_STOP_COMMANDS {
            self.send(action).await;
        }
    }

    /// Cancel every running sequence. Returns how many were still live.
    pub fn cancel_all(&self) -> usize {
        self.cancel_matching(|_| true)
    }

    pub fn cancel_kind(&self, kind: SequenceKind) -> usize {
        self.cancel_matching(|k| k == kind)
    }

    pub fn is_running(&self, kind: SequenceKind) -> bool {
        self.running
            .lock()
            .values()
            .any(|r| r.kind == kind && !r.token.is_cancelled())
    }

    /// Number of sequences not yet asked to stop.
    pub fn active_count(&self) -> usize {
        self.running
            .lock()
            .values()
            .filter(|r| !r.token.is_cancelled())
            .count()
    }

    fn cancel_matching(&self, matches: impl Fn(SequenceKind) -> bool) -> usize {
        let running = self.running.lock();
        let mut count = 0;
        for entry in running.values() {
            if matches(entry.kind) && !entry.token.is_cancelled() {
                entry.token.cancel();
                count += 1;
            }
        }
        count
    }

    fn launch<F, Fut>(self: &Arc<Self>, kind: SequenceKind, body: F) -> Option<SequenceHandle>
    where
        F: FnOnce(Arc<Self>, Scope) -> Fut,
        Fut: Future<Output = SequenceOutcome> + Send + 'static,
    {
        let lifetime = self.connection.lifetime()?;
        let id = Uuid::new_v4();
        let token = lifetime.child_token();
        let done = CancellationToken::new();

        let predecessors = {
            let mut running = self.running.lock();
            let same_kind: Vec<&Running> = running.values().filter(|r| r.kind == kind).collect();

            if !kind.restarts() && same_kind.iter().any(|r| !r.token.is_cancelled()) {
                debug!("Ignoring {} request, one is already running", kind.as_str());
                return None;
            }

            let predecessors: Vec<CancellationToken> = same_kind
                .iter()
                .map(|r| {
                    r.token.cancel();
                    r.done.clone()
                })
                .collect();

            running.insert(
                id,
                Running {
                    kind,
                    token: token.clone(),
                    done: done.clone(),
                },
            );
            predecessors
        };

        debug!("Starting {} ({})", kind.as_str(), id);
        let scope = Scope {
            token: token.clone(),
            lifetime,
            predecessors,
        };
        let work = body(self.clone(), scope);
        let this = self.clone();
        let task = tokio::spawn(async move {
            let _done = done.drop_guard();
            let outcome = work.await;
            this.running.lock().remove(&id);
            debug!("{} ({}) finished: {:?}", kind.as_str(), id, outcome);
            outcome
        });

        Some(SequenceHandle {
            id,
            kind,
            token,
            task,
        })
    }

    async fn horn_pulse(self: Arc<Self>, scope: Scope) -> SequenceOutcome {
        scope.wait_for_predecessors().await;
        if self.store.apply_within(&scope.token, StateDelta::SetHorn(true)).is_none() {
            return SequenceOutcome::Cancelled;
        }
        self.send(RobotAction::HornOn).await;

        let pulse = Duration::from_millis(self.settings.horn_pulse_ms);
        let completed = hold(&scope.token, pulse).await;

        self.store.apply_within(&scope.lifetime, StateDelta::SetHorn(false));
        self.send(RobotAction::HornOff).await;

        if completed {
            SequenceOutcome::Completed
        } else {
            SequenceOutcome::Cancelled
        }
    }

    async fn calibration(self: Arc<Self>, scope: Scope) -> SequenceOutcome {
        scope.wait_for_predecessors().await;
        if self
            .store
            .apply_within(&scope.token, StateDelta::SetCalibrating(true))
            .is_none()
        {
            return SequenceOutcome::Cancelled;
        }
        info!("Calibrating sensors");
        self.send(RobotAction::CalibrateSensors).await;

        let completed = hold(&scope.token, Duration::from_millis(self.settings.calibration_ms)).await;

        self.store
            .apply_within(&scope.lifetime, StateDelta::SetCalibrating(false));
        self.events
            .publish(SessionEvent::CalibrationFinished { completed });

        if completed {
            info!("Calibration complete");
            SequenceOutcome::Completed
        } else {
            info!("Calibration aborted");
            SequenceOutcome::Cancelled
        }
    }

    async fn ultrasonic_read(self: Arc<Self>, scope: Scope) -> SequenceOutcome {
        scope.wait_for_predecessors().await;
        if scope.token.is_cancelled() {
            return SequenceOutcome::Cancelled;
        }
        self.send(RobotAction::UltrasonicRead).await;

        let latency = Duration::from_millis(self.settings.ultrasonic_latency_ms);
        if !hold(&scope.token, latency).await {
            return SequenceOutcome::Cancelled;
        }

        let distance = self.sensor.sample_cm();
        match self
            .store
            .apply_within(&scope.token, StateDelta::SetDistance(Some(distance)))
        {
            Some(_) => {
                debug!("Ultrasonic distance: {} cm", distance);
                SequenceOutcome::Completed
            }
            None => SequenceOutcome::Cancelled,
        }
    }

    async fn send(&self, action: RobotAction) {
        let command = RobotCommand::simple(action, self.clock.now_millis());
        if let Err(e) = self.connection.send(&command).await {
            debug!("{} not delivered: {}", action, e);
        }
    }
}

/// Wait for `duration` unless `token` fires first. Returns true if the full
/// duration elapsed.
async fn hold(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => !token.is_cancelled(),
    }
}
