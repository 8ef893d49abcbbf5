use geo::{HaversineDistance, Point};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::types::{TimeUnit, VelocityObservation};

/// One location fix. `speed` is whatever the receiver reported, if anything.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub t: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
}

impl GpsFix {
    fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    fn has_position(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Turns location fixes into velocity observations.
///
/// Reported speed is used when present; otherwise the haversine displacement
/// from the previous fix is divided by the elapsed time.
#[derive(Clone, Debug, Default)]
pub struct GpsSpeedEstimator {
    time_unit: TimeUnit,
    last: Option<GpsFix>,
}

impl GpsSpeedEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_unit(time_unit: TimeUnit) -> Self {
        Self { time_unit, last: None }
    }

    pub fn observe(&mut self, fix: &GpsFix) -> Option<VelocityObservation> {
        let reported = fix.speed.filter(|s| s.is_finite() && *s >= 0.0);

        let v = match (reported, self.last) {
            (Some(speed), _) => Some(speed),
            (None, Some(prev)) if fix.has_position() && prev.has_position() => {
                let dt = (fix.t - prev.t) as f64 / self.time_unit.ticks_per_second();
                if dt > 0.0 {
                    let meters = prev.point().haversine_distance(&fix.point());
                    debug!("gps: no speed at t={}, {:.2} m over {:.3} s", fix.t, meters, dt);
                    Some(meters / dt)
                } else {
                    None
                }
            }
            _ => None,
        };

        if fix.has_position() {
            self.last = Some(*fix);
        }
        v.map(|v| VelocityObservation::new(fix.t, v))
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fix(t: i64, latitude: f64, speed: Option<f64>) -> GpsFix {
        GpsFix { t, latitude, longitude: 0.0, speed }
    }

    #[test]
    fn test_reported_speed_wins() {
        let mut est = GpsSpeedEstimator::new();
        let obs = est.observe(&fix(1_000, 10.0, Some(3.5))).unwrap();
        assert_eq!(obs, VelocityObservation::new(1_000, 3.5));
    }

    #[test]
    fn test_first_fix_without_speed_gives_nothing() {
        let mut est = GpsSpeedEstimator::new();
        assert!(est.observe(&fix(0, 10.0, None)).is_none());
    }

    #[test]
    fn test_displacement_fallback() {
        let mut est = GpsSpeedEstimator::new();
        est.observe(&fix(0, 0.0, Some(0.0)));
        // 0.0001° of latitude is about 11.12 m on the mean-radius sphere
        let obs = est.observe(&fix(1_000, 0.0001, None)).unwrap();
        assert_eq!(obs.t, 1_000);
        assert_relative_eq!(obs.v, 11.1195, max_relative = 1e-3);
    }

    #[test]
    fn test_fallback_in_micros() {
        let mut est = GpsSpeedEstimator::with_time_unit(TimeUnit::Micros);
        est.observe(&fix(0, 0.0, None));
        let obs = est.observe(&fix(2_000_000, 0.0001, None)).unwrap();
        assert_relative_eq!(obs.v, 11.1195 / 2.0, max_relative = 1e-3);
    }

    #[test]
    fn test_non_positive_interval_gives_nothing() {
        let mut est = GpsSpeedEstimator::new();
        est.observe(&fix(1_000, 0.0, None));
        assert!(est.observe(&fix(1_000, 0.0001, None)).is_none());
        assert!(est.observe(&fix(500, 0.0002, None)).is_none());
    }

    #[test]
    fn test_invalid_reported_speed_falls_back() {
        let mut est = GpsSpeedEstimator::new();
        est.observe(&fix(0, 0.0, None));
        let obs = est.observe(&fix(1_000, 0.0001, Some(f64::NAN))).unwrap();
        assert!(obs.v > 11.0);
    }
}
