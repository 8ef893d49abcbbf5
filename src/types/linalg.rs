//! Linear algebra aliases for the fusion core
//!
//! Every vector in the crate is a 3-axis reading in m/s², expressed in the
//! sensor's own frame.

use nalgebra::Vector3;

pub type Vec3 = Vector3<f64>;

// ===== Tolerances =====
pub const UNIT_NORM_TOLERANCE: f64 = 1e-9;

pub fn vec3(x: f64, y: f64, z: f64) -> Vec3 {
    Vec3::new(x, y, z)
}

/// True when all three components are finite.
pub fn is_finite3(v: &Vec3) -> bool {
    v.iter().all(|c| c.is_finite())
}

pub fn is_unit(v: &Vec3) -> bool {
    (v.norm() - 1.0).abs() <= UNIT_NORM_TOLERANCE
}
