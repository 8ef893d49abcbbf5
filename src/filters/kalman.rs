use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{check_param, Result};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Integration step in seconds
    pub dt: f64,
    /// Measurement noise variance (how noisy the velocity reference is)
    pub r: f64,
    /// Process noise variance (how fast integration drift accumulates)
    pub q: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            dt: 0.016,
            r: 1.0,
            q: 0.1,
        }
    }
}

impl KalmanConfig {
    pub fn validate(&self) -> Result<()> {
        check_param("dt", self.dt, self.dt > 0.0, "positive")?;
        check_param("r", self.r, self.r >= 0.0, "non-negative")?;
        check_param("q", self.q, self.q >= 0.0, "non-negative")?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KalmanState {
    pub velocity: f64,
    pub variance: f64,
    pub predict_count: u64,
    pub update_count: u64,
}

/// Kalman gain `P / (P + R)`.
///
/// Lies in [0, 1] whenever `p, r >= 0`. When both are exactly zero the gain is
/// 1: an exact measurement replaces an exact estimate.
pub fn kalman_gain(p: f64, r: f64) -> f64 {
    let s = p + r;
    if s == 0.0 {
        1.0
    } else {
        p / s
    }
}

/// One-dimensional Kalman filter over velocity.
///
/// `predict` integrates an acceleration with forward Euler and grows the
/// variance by `Q`; `update` pulls the estimate toward a velocity observation
/// and shrinks the variance by `(1 - K)`. Since `K` is in [0, 1] the variance
/// can never go negative. The two calls may interleave in any ratio.
///
/// Not synchronized: one owner drives all calls.
#[derive(Clone, Debug)]
pub struct ScalarKalmanFilter {
    config: KalmanConfig,
    v: f64,
    p: f64,
    predict_count: u64,
    update_count: u64,
}

impl ScalarKalmanFilter {
    pub const INITIAL_VELOCITY: f64 = 0.0;
    pub const INITIAL_VARIANCE: f64 = 1.0;

    pub fn new(config: KalmanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            v: Self::INITIAL_VELOCITY,
            p: Self::INITIAL_VARIANCE,
            predict_count: 0,
            update_count: 0,
        })
    }

    /// Call on every acceleration sample (m/s²).
    pub fn predict(&mut self, a: f64) {
        self.v += a * self.config.dt;
        self.p += self.config.q;
        self.predict_count += 1;
    }

    /// Call whenever an independent velocity observation (m/s) arrives.
    pub fn update(&mut self, z: f64) {
        let k = kalman_gain(self.p, self.config.r);
        self.v += k * (z - self.v);
        self.p *= 1.0 - k;
        self.update_count += 1;
        debug!(
            "kalman: update z={:.3} K={:.4} -> v={:.3} P={:.4}",
            z, k, self.v, self.p
        );
    }

    pub fn velocity(&self) -> f64 {
        self.v
    }

    pub fn variance(&self) -> f64 {
        self.p
    }

    pub fn config(&self) -> &KalmanConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.v = Self::INITIAL_VELOCITY;
        self.p = Self::INITIAL_VARIANCE;
        self.predict_count = 0;
        self.update_count = 0;
    }

    pub fn get_state(&self) -> KalmanState {
        KalmanState {
            velocity: self.v,
            variance: self.p,
            predict_count: self.predict_count,
            update_count: self.update_count,
        }
    }
}
