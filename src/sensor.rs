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

//! Ultrasonic distance source.

use rand::Rng;

/// Nearest distance the ultrasonic sensor reports, in centimetres.
pub const MIN_DISTANCE_CM: u32 = 5;

/// Farthest distance the ultrasonic sensor reports, in centimetres.
pub const MAX_DISTANCE_CM: u32 = 200;

/// Produces one distance sample per ultrasonic read.
pub trait DistanceSensor: Send + Sync {
    fn sample_cm(&self) -> f32;
}

/// Uniform whole-centimetre samples across the sensor range.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDistanceSensor;

impl DistanceSensor for RandomDistanceSensor {
    fn sample_cm(&self) -> f32 {
        rand::thread_rng().gen_range(MIN_DISTANCE_CM..=MAX_DISTANCE_CM) as f32
    }
}

/// Always reports the same distance.
#[derive(Debug, Clone, Copy)]
pub struct FixedDistanceSensor(pub f32);

impl DistanceSensor for FixedDistanceSensor {
    fn sample_cm(&self) -> f32 {
        self.0
    }
}
