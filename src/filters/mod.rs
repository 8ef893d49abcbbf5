//! Estimators of the fusion core
//!
//! Gravity separation, horizontal projection and the scalar velocity
//! Kalman filter. Each type is owned by a single pipeline instance.

pub mod gravity;
pub mod kalman;
pub mod projection;

pub use gravity::{GravityEstimator, GravityState, DEFAULT_GRAVITY_ALPHA};
pub use kalman::{kalman_gain, KalmanConfig, KalmanState, ScalarKalmanFilter};
pub use projection::{reject_onto, HorizontalProjector};
