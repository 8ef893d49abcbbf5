use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{check_param, FusionError, Result};
use crate::types::{is_finite3, Vec3};

pub const DEFAULT_GRAVITY_ALPHA: f64 = 0.98;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GravityState {
    pub direction: (f64, f64, f64),
    pub updates: u64,
    pub rejected: u64,
}

/// Recursive gravity-direction estimator.
///
/// Each raw reading is blended into the estimate with an exponential moving
/// average per axis (`g = α·g + (1-α)·raw`) and the result is renormalized,
/// so the estimate is a unit vector after every accepted update.
///
/// Inputs that would break the unit-norm invariant are rejected: a non-finite
/// reading returns `NonFiniteInput`, and a smoothed vector with zero or
/// non-finite norm returns `DegenerateGravity`. In both cases the previous
/// estimate is kept as is.
#[derive(Clone, Debug)]
pub struct GravityEstimator {
    alpha: f64,
    initial: Vec3,
    estimate: Vec3,
    updates: u64,
    rejected: u64,
}

impl GravityEstimator {
    /// `alpha` must lie in (0, 1); `initial` must be finite and non-zero and
    /// is normalized before use.
    pub fn new(alpha: f64, initial: Vec3) -> Result<Self> {
        check_param("gravity_alpha", alpha, alpha > 0.0 && alpha < 1.0, "in (0, 1)")?;
        if !is_finite3(&initial) {
            return Err(FusionError::InvalidConfig(
                "initial_gravity must be finite".to_string(),
            ));
        }
        let norm = initial.norm();
        if norm == 0.0 || !norm.is_finite() {
            return Err(FusionError::InvalidConfig(
                "initial_gravity must be non-zero".to_string(),
            ));
        }
        let initial = initial / norm;

        Ok(Self {
            alpha,
            initial,
            estimate: initial,
            updates: 0,
            rejected: 0,
        })
    }

    /// Blend `raw` into the estimate and return the new unit gravity direction.
    pub fn update(&mut self, raw: &Vec3) -> Result<Vec3> {
        if !is_finite3(raw) {
            self.rejected += 1;
            debug!("gravity: non-finite reading {:?}, holding estimate", raw);
            return Err(FusionError::NonFiniteInput { what: "accelerometer" });
        }

        let smoothed = self.estimate * self.alpha + raw * (1.0 - self.alpha);
        let norm = smoothed.norm();
        if norm == 0.0 || !norm.is_finite() {
            self.rejected += 1;
            debug!("gravity: smoothed norm {} after {:?}, holding estimate", norm, raw);
            return Err(FusionError::DegenerateGravity);
        }

        self.estimate = smoothed / norm;
        self.updates += 1;
        debug!(
            "gravity: update {} dir=({:.4}, {:.4}, {:.4}) pre-norm={:.4}",
            self.updates, self.estimate.x, self.estimate.y, self.estimate.z, norm
        );
        Ok(self.estimate)
    }

    pub fn estimate(&self) -> Vec3 {
        self.estimate
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn reset(&mut self) {
        self.estimate = self.initial;
        self.updates = 0;
        self.rejected = 0;
    }

    pub fn get_state(&self) -> GravityState {
        GravityState {
            direction: (self.estimate.x, self.estimate.y, self.estimate.z),
            updates: self.updates,
            rejected: self.rejected,
        }
    }
}
