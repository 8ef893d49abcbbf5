use crate::error::{FusionError, Result};
use crate::types::{is_finite3, Vec3};

/// Removes the gravity component from a raw reading.
///
/// Stateless. `gravity` must be a unit vector (as produced by
/// `GravityEstimator`); with a non-unit vector the rejection is scaled wrong.
pub struct HorizontalProjector;

impl HorizontalProjector {
    /// Component of `raw` orthogonal to `gravity`.
    pub fn project(raw: &Vec3, gravity: &Vec3) -> Result<Vec3> {
        if !is_finite3(raw) {
            return Err(FusionError::NonFiniteInput { what: "accelerometer" });
        }
        if !is_finite3(gravity) {
            return Err(FusionError::NonFiniteInput { what: "gravity" });
        }
        Ok(reject_onto(raw, gravity))
    }

    /// Magnitude of the horizontal (motion-only) acceleration.
    pub fn horizontal_magnitude(raw: &Vec3, gravity: &Vec3) -> Result<f64> {
        Self::project(raw, gravity).map(|h| h.norm())
    }
}

/// Vector rejection `raw - (raw·g)·g` for unit `g`.
pub fn reject_onto(raw: &Vec3, unit_gravity: &Vec3) -> Vec3 {
    raw - unit_gravity * raw.dot(unit_gravity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_pure_gravity_projects_to_zero() {
        let g = Vec3::new(0.0, 0.0, 1.0);
        let h = HorizontalProjector::project(&Vec3::new(0.0, 0.0, 9.81), &g).unwrap();
        assert_abs_diff_eq!(h.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_keeps_horizontal_component() {
        let g = Vec3::new(0.0, 0.0, 1.0);
        let h = HorizontalProjector::project(&Vec3::new(3.0, 4.0, 9.81), &g).unwrap();
        assert_abs_diff_eq!(h.x, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(h.y, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(h.z, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            HorizontalProjector::horizontal_magnitude(&Vec3::new(3.0, 4.0, 9.81), &g).unwrap(),
            5.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_orthogonal_for_tilted_gravity() {
        for k in 0..500 {
            let phase = k as f64 * 0.113;
            let g = Vec3::new(phase.sin(), (0.7 * phase).cos(), 0.5 + phase.cos().abs())
                .normalize();
            let raw = Vec3::new(
                12.0 * (1.3 * phase).cos(),
                -7.5 * phase.sin(),
                9.81 + 3.0 * (2.1 * phase).sin(),
            );
            let h = HorizontalProjector::project(&raw, &g).unwrap();
            assert_abs_diff_eq!(h.dot(&g), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_rejects_non_finite() {
        let g = Vec3::new(0.0, 0.0, 1.0);
        assert!(HorizontalProjector::project(&Vec3::new(f64::NAN, 0.0, 0.0), &g).is_err());
        assert!(matches!(
            HorizontalProjector::project(&Vec3::new(1.0, 0.0, 0.0), &Vec3::new(0.0, f64::NAN, 1.0)),
            Err(FusionError::NonFiniteInput { what: "gravity" })
        ));
    }
}
