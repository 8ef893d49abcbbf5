pub mod linalg;

pub use linalg::*;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Unit of the integer timestamps flowing through one pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Millis,
    Micros,
}

impl TimeUnit {
    pub fn ticks_per_second(self) -> f64 {
        match self {
            TimeUnit::Millis => 1_000.0,
            TimeUnit::Micros => 1_000_000.0,
        }
    }

    /// Convert a tick count in `self` to ticks of `to`.
    pub fn rescale(self, ticks: i64, to: TimeUnit) -> i64 {
        match (self, to) {
            (TimeUnit::Millis, TimeUnit::Micros) => ticks.saturating_mul(1_000),
            (TimeUnit::Micros, TimeUnit::Millis) => ticks / 1_000,
            _ => ticks,
        }
    }
}

/// Raw accelerometer reading (m/s², gravity included).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedSample {
    pub t: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl TimedSample {
    pub fn new(t: i64, x: f64, y: f64, z: f64) -> Self {
        Self { t, x, y, z }
    }

    pub fn vector(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Magnitude of the raw reading, gravity included.
    pub fn resultant(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Externally supplied speed measurement (m/s), e.g. GPS-derived.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VelocityObservation {
    pub t: i64,
    pub v: f64,
}

impl VelocityObservation {
    pub fn new(t: i64, v: f64) -> Self {
        Self { t, v }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusedSource {
    Predict,
    Update,
}

/// Filter output emitted on every predict or update call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusedVelocitySample {
    pub t: i64,
    pub v: f64,
    pub variance: f64,
    pub source: FusedSource,
}

/// Raw sample joined with the nearest fused velocity. `v` is `None` when no
/// fused sample exists at or after `t`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub t: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub v: Option<f64>,
}

impl ExportRecord {
    pub fn resultant(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// One event of the single, arrival-ordered input stream.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionInput {
    Accel(TimedSample),
    Velocity(VelocityObservation),
}

impl FusionInput {
    pub fn timestamp(&self) -> i64 {
        match self {
            FusionInput::Accel(s) => s.t,
            FusionInput::Velocity(o) => o.t,
        }
    }
}
