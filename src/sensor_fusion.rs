// sensor_fusion.rs — Orchestration layer for the velocity fusion core
//
// Everything in this module is independent of:
//   - tokio / async runtime
//   - sensor acquisition (accelerometer APIs, GPS, BLE devices)
//   - CSV formatting and file I/O
//
// Raw acceleration samples and velocity observations go in, in arrival order;
// fused velocity samples and events come out. One pipeline owns one gravity
// estimator and one Kalman filter, so independent sessions never share state.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{check_param, FusionError, Result};
use crate::filters::{
    GravityEstimator, HorizontalProjector, KalmanConfig, ScalarKalmanFilter, DEFAULT_GRAVITY_ALPHA,
};
use crate::merge::merge_by_timestamp;
use crate::types::{
    is_finite3, is_unit, ExportRecord, FusedSource, FusedVelocitySample, FusionInput, TimeUnit,
    TimedSample, Vec3, VelocityObservation,
};
use crate::window::SampleWindow;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    // ── Gravity estimator ──
    pub gravity_alpha: f64,
    pub initial_gravity: [f64; 3],

    // ── Velocity filter ──
    pub kalman: KalmanConfig,

    // ── Export buffer ──
    /// Retention horizon in milliseconds, whatever `time_unit` the timestamps use
    pub window_ms: i64,
    pub tick_interval_ms: u64,
    pub time_unit: TimeUnit,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            gravity_alpha: DEFAULT_GRAVITY_ALPHA,
            initial_gravity: [0.0, 0.0, 1.0],
            kalman: KalmanConfig::default(),
            window_ms: 5_000,
            tick_interval_ms: 100,
            time_unit: TimeUnit::Millis,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<()> {
        check_param(
            "gravity_alpha",
            self.gravity_alpha,
            self.gravity_alpha > 0.0 && self.gravity_alpha < 1.0,
            "in (0, 1)",
        )?;
        let g = Vec3::from(self.initial_gravity);
        if !is_finite3(&g) || g.norm() == 0.0 {
            return Err(FusionError::InvalidConfig(format!(
                "initial_gravity must be finite and non-zero, got {:?}",
                self.initial_gravity
            )));
        }
        self.kalman.validate()?;
        if self.window_ms < 0 {
            return Err(FusionError::InvalidConfig(format!(
                "window_ms must be non-negative, got {}",
                self.window_ms
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(FusionError::InvalidConfig(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Retention horizon in timestamp ticks.
    pub fn window_ticks(&self) -> i64 {
        TimeUnit::Millis.rescale(self.window_ms, self.time_unit)
    }

    /// Load a (possibly partial) JSON config; missing fields keep defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: FusionConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum RejectReason {
    NonFinite,
    DegenerateGravity,
    OutOfOrder { last: i64 },
}

impl RejectReason {
    fn from_error(err: &FusionError) -> Self {
        match err {
            FusionError::DegenerateGravity => RejectReason::DegenerateGravity,
            FusionError::OutOfOrder { last, .. } => RejectReason::OutOfOrder { last: *last },
            _ => RejectReason::NonFinite,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FusionEvent {
    Fused(FusedVelocitySample),
    SampleRejected { t: i64, reason: RejectReason },
    ObservationRejected { t: i64 },
    TimestampClamped { t: i64, stamped: i64 },
    WindowPruned { raw: usize, fused: usize },
}

// ─── Fusion output snapshot ──────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionStats {
    pub accel_samples: u64,
    pub observations: u64,
    pub rejected_samples: u64,
    pub rejected_observations: u64,
    pub clamped_timestamps: u64,
    pub peak_velocity: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FusionSnapshot {
    pub velocity: f64,
    pub variance: f64,
    pub gravity: (f64, f64, f64),
    pub horizontal_accel: f64,
    pub buffered_samples: usize,
    pub buffered_fused: usize,
    pub last_sample_t: Option<i64>,
    pub stats: FusionStats,
}

// ─── The pipeline ────────────────────────────────────────────────────────────

pub struct FusionPipeline {
    config: FusionConfig,

    gravity: GravityEstimator,
    filter: ScalarKalmanFilter,

    // Export buffers
    raw: SampleWindow<TimedSample>,
    fused: SampleWindow<FusedVelocitySample>,

    // Ordering
    last_sample_t: Option<i64>,
    last_emitted_t: Option<i64>,

    last_horizontal: f64,
    stats: FusionStats,
}

impl FusionPipeline {
    pub fn new(config: FusionConfig) -> Result<Self> {
        config.validate()?;
        let initial = Vec3::from(config.initial_gravity);
        let gravity = GravityEstimator::new(config.gravity_alpha, initial)?;
        let filter = ScalarKalmanFilter::new(config.kalman)?;
        let horizon = config.window_ticks();
        info!(
            "fusion: pipeline ready (alpha={}, dt={}, R={}, Q={}, window={} ms, {:?} ticks)",
            config.gravity_alpha,
            config.kalman.dt,
            config.kalman.r,
            config.kalman.q,
            config.window_ms,
            config.time_unit
        );

        Ok(Self {
            raw: SampleWindow::new(horizon),
            fused: SampleWindow::new(horizon),
            gravity,
            filter,
            last_sample_t: None,
            last_emitted_t: None,
            last_horizontal: 0.0,
            stats: FusionStats::default(),
            config,
        })
    }

    // ── Inputs ───────────────────────────────────────────────────────────

    pub fn apply(&mut self, input: &FusionInput) -> Vec<FusionEvent> {
        match input {
            FusionInput::Accel(sample) => self.feed_accel(sample),
            FusionInput::Velocity(obs) => self.feed_velocity(obs),
        }
    }

    /// Gravity update → horizontal projection → predict on its magnitude.
    pub fn feed_accel(&mut self, sample: &TimedSample) -> Vec<FusionEvent> {
        let mut events = Vec::new();

        if let Some(last) = self.last_sample_t {
            if sample.t < last {
                return self.reject_sample(sample.t, FusionError::OutOfOrder { t: sample.t, last });
            }
        }

        let raw = sample.vector();
        let gravity = match self.gravity.update(&raw) {
            Ok(g) => g,
            Err(e) => return self.reject_sample(sample.t, e),
        };
        debug_assert!(is_unit(&gravity));
        let horizontal = match HorizontalProjector::project(&raw, &gravity) {
            Ok(h) => h,
            Err(e) => return self.reject_sample(sample.t, e),
        };

        self.last_horizontal = horizontal.norm();
        self.filter.predict(self.last_horizontal);

        self.last_sample_t = Some(sample.t);
        self.raw.push(*sample);
        self.stats.accel_samples += 1;

        self.emit(sample.t, FusedSource::Predict, &mut events);
        events
    }

    /// Correct the filter against an external velocity reference.
    pub fn feed_velocity(&mut self, obs: &VelocityObservation) -> Vec<FusionEvent> {
        let mut events = Vec::new();

        if !obs.v.is_finite() {
            self.stats.rejected_observations += 1;
            warn!("fusion: rejected non-finite velocity observation at t={}", obs.t);
            events.push(FusionEvent::ObservationRejected { t: obs.t });
            return events;
        }

        self.filter.update(obs.v);
        self.stats.observations += 1;

        self.emit(obs.t, FusedSource::Update, &mut events);
        events
    }

    // ── Per-tick (batch window maintenance) ──────────────────────────────

    pub fn tick(&mut self, now: i64) -> Vec<FusionEvent> {
        let mut events = Vec::new();
        let raw = self.raw.prune(now);
        let fused = self.fused.prune(now);
        if raw > 0 || fused > 0 {
            debug!("fusion: pruned {} raw / {} fused samples at t={}", raw, fused, now);
            events.push(FusionEvent::WindowPruned { raw, fused });
        }
        events
    }

    /// Drop buffered state and return estimator and filter to their initial state.
    pub fn reset(&mut self) {
        self.gravity.reset();
        self.filter.reset();
        self.raw.clear();
        self.fused.clear();
        self.last_sample_t = None;
        self.last_emitted_t = None;
        self.last_horizontal = 0.0;
        self.stats = FusionStats::default();
        info!("fusion: pipeline reset");
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn velocity(&self) -> f64 {
        self.filter.velocity()
    }

    pub fn variance(&self) -> f64 {
        self.filter.variance()
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity.estimate()
    }

    /// Timestamp and resultant of the newest buffered raw sample.
    pub fn latest_resultant(&self) -> Option<(i64, f64)> {
        self.raw.latest().map(|s| (s.t, s.resultant()))
    }

    pub fn last_sample_t(&self) -> Option<i64> {
        self.last_sample_t
    }

    pub fn raw_samples(&self) -> Vec<TimedSample> {
        self.raw.to_vec()
    }

    pub fn fused_samples(&self) -> Vec<FusedVelocitySample> {
        self.fused.to_vec()
    }

    pub fn export_records(&self) -> Vec<ExportRecord> {
        merge_by_timestamp(&self.raw.to_vec(), &self.fused.to_vec())
    }

    pub fn stats(&self) -> &FusionStats {
        &self.stats
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn get_snapshot(&self) -> FusionSnapshot {
        let g = self.gravity.estimate();
        FusionSnapshot {
            velocity: self.filter.velocity(),
            variance: self.filter.variance(),
            gravity: (g.x, g.y, g.z),
            horizontal_accel: self.last_horizontal,
            buffered_samples: self.raw.len(),
            buffered_fused: self.fused.len(),
            last_sample_t: self.last_sample_t,
            stats: self.stats.clone(),
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn reject_sample(&mut self, t: i64, err: FusionError) -> Vec<FusionEvent> {
        self.stats.rejected_samples += 1;
        warn!("fusion: rejected accel sample at t={}: {}", t, err);
        vec![FusionEvent::SampleRejected { t, reason: RejectReason::from_error(&err) }]
    }

    /// Record the current filter output. The emitted stream never goes back in
    /// time: an event older than the last emission is stamped with that time.
    fn emit(&mut self, t: i64, source: FusedSource, events: &mut Vec<FusionEvent>) {
        let stamped = match self.last_emitted_t {
            Some(last) if t < last => {
                self.stats.clamped_timestamps += 1;
                warn!(
                    "fusion: {:?} at t={} older than last output t={}, clamping",
                    source, t, last
                );
                events.push(FusionEvent::TimestampClamped { t, stamped: last });
                last
            }
            _ => t,
        };

        let sample = FusedVelocitySample {
            t: stamped,
            v: self.filter.velocity(),
            variance: self.filter.variance(),
            source,
        };
        self.last_emitted_t = Some(stamped);
        self.stats.peak_velocity = self.stats.peak_velocity.max(sample.v);
        self.fused.push(sample);
        events.push(FusionEvent::Fused(sample));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{XsensClock, XsensSample};
    use approx::assert_relative_eq;

    fn fused_of(events: &[FusionEvent]) -> Vec<FusedVelocitySample> {
        events
            .iter()
            .filter_map(|e| match e {
                FusionEvent::Fused(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(FusionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = FusionConfig::default();
        cfg.kalman.dt = 0.0;
        assert!(matches!(FusionPipeline::new(cfg), Err(FusionError::InvalidConfig(_))));

        let cfg = FusionConfig { gravity_alpha: 1.5, ..Default::default() };
        assert!(FusionPipeline::new(cfg).is_err());

        let cfg = FusionConfig { initial_gravity: [0.0; 3], ..Default::default() };
        assert!(FusionPipeline::new(cfg).is_err());

        let cfg = FusionConfig { window_ms: -1, ..Default::default() };
        assert!(FusionPipeline::new(cfg).is_err());
    }

    #[test]
    fn test_partial_json_config() {
        let json = r#"{"gravity_alpha": 0.9, "kalman": {"r": 4.0}}"#;
        let cfg: FusionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.gravity_alpha, 0.9);
        assert_eq!(cfg.kalman.r, 4.0);
        assert_eq!(cfg.kalman.dt, 0.016);
        assert_eq!(cfg.window_ms, 5_000);
    }

    #[test]
    fn test_stationary_device_predicts_zero_accel() {
        let mut fusion = FusionPipeline::new(FusionConfig::default()).unwrap();
        for t in 0..50 {
            let events = fusion.feed_accel(&TimedSample::new(t * 16, 0.0, 0.0, 9.81));
            let fused = fused_of(&events);
            assert_eq!(fused.len(), 1);
            assert_eq!(fused[0].t, t * 16);
            assert_eq!(fused[0].source, FusedSource::Predict);
        }
        assert_relative_eq!(fusion.velocity(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(fusion.variance(), 1.0 + 50.0 * 0.1, max_relative = 1e-12);
    }

    #[test]
    fn test_horizontal_motion_integrates() {
        let cfg = FusionConfig {
            kalman: KalmanConfig { dt: 0.1, r: 1.0, q: 0.0 },
            ..Default::default()
        };
        let mut fusion = FusionPipeline::new(cfg).unwrap();
        // gravity estimate starts at +z; a pure x push is entirely horizontal
        fusion.feed_accel(&TimedSample::new(0, 2.0, 0.0, 0.0));
        let snap = fusion.get_snapshot();
        assert!(snap.horizontal_accel > 0.0);
        assert!(fusion.velocity() > 0.0);
        assert_relative_eq!(fusion.velocity(), snap.horizontal_accel * 0.1, max_relative = 1e-12);
    }

    #[test]
    fn test_observation_emits_update_sample() {
        let mut fusion = FusionPipeline::new(FusionConfig::default()).unwrap();
        let events = fusion.feed_velocity(&VelocityObservation::new(1_000, 3.0));
        let fused = fused_of(&events);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].t, 1_000);
        assert_eq!(fused[0].source, FusedSource::Update);
        // K = 1 / (1 + 1)
        assert_relative_eq!(fused[0].v, 1.5);
        assert_relative_eq!(fused[0].variance, 0.5);
    }

    #[test]
    fn test_bad_sample_does_not_stop_processing() {
        let mut fusion = FusionPipeline::new(FusionConfig::default()).unwrap();
        fusion.feed_accel(&TimedSample::new(0, 0.0, 0.0, 9.81));
        let gravity_before = fusion.gravity();

        let events = fusion.feed_accel(&TimedSample::new(16, f64::NAN, 0.0, 9.81));
        assert_eq!(
            events,
            vec![FusionEvent::SampleRejected { t: 16, reason: RejectReason::NonFinite }]
        );
        assert_eq!(fusion.gravity(), gravity_before);
        assert_eq!(fusion.raw_samples().len(), 1);

        let events = fusion.feed_accel(&TimedSample::new(32, 0.0, 0.0, 9.81));
        assert_eq!(fused_of(&events).len(), 1);
        assert_eq!(fusion.stats().rejected_samples, 1);
        assert_eq!(fusion.stats().accel_samples, 2);
    }

    #[test]
    fn test_out_of_order_sample_rejected() {
        let mut fusion = FusionPipeline::new(FusionConfig::default()).unwrap();
        fusion.feed_accel(&TimedSample::new(100, 0.0, 0.0, 9.81));
        let events = fusion.feed_accel(&TimedSample::new(50, 0.0, 0.0, 9.81));
        assert_eq!(
            events,
            vec![FusionEvent::SampleRejected {
                t: 50,
                reason: RejectReason::OutOfOrder { last: 100 }
            }]
        );
        // equal timestamps are fine
        let events = fusion.feed_accel(&TimedSample::new(100, 0.0, 0.0, 9.81));
        assert_eq!(fused_of(&events).len(), 1);
    }

    #[test]
    fn test_non_finite_observation_rejected() {
        let mut fusion = FusionPipeline::new(FusionConfig::default()).unwrap();
        let events = fusion.feed_velocity(&VelocityObservation::new(10, f64::NAN));
        assert_eq!(events, vec![FusionEvent::ObservationRejected { t: 10 }]);
        assert_eq!(fusion.velocity(), 0.0);
        assert_eq!(fusion.variance(), 1.0);
    }

    #[test]
    fn test_late_observation_is_applied_but_clamped() {
        let mut fusion = FusionPipeline::new(FusionConfig::default()).unwrap();
        fusion.feed_accel(&TimedSample::new(200, 0.0, 0.0, 9.81));
        let events = fusion.feed_velocity(&VelocityObservation::new(150, 4.0));

        assert!(events.contains(&FusionEvent::TimestampClamped { t: 150, stamped: 200 }));
        let fused = fused_of(&events);
        assert_eq!(fused[0].t, 200);
        assert!(fusion.velocity() > 0.0);

        let ts: Vec<i64> = fusion.fused_samples().iter().map(|s| s.t).collect();
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(fusion.stats().clamped_timestamps, 1);
    }

    #[test]
    fn test_tick_prunes_both_buffers() {
        let cfg = FusionConfig { window_ms: 1_000, ..Default::default() };
        let mut fusion = FusionPipeline::new(cfg).unwrap();
        for t in [0, 500, 1_000, 1_500, 2_000] {
            fusion.feed_accel(&TimedSample::new(t, 0.0, 0.0, 9.81));
        }
        let events = fusion.tick(2_000);
        assert_eq!(events, vec![FusionEvent::WindowPruned { raw: 2, fused: 2 }]);
        assert_eq!(fusion.raw_samples().first().map(|s| s.t), Some(1_000));
        assert!(fusion.tick(2_000).is_empty());
        assert_eq!(fusion.latest_resultant().map(|(t, _)| t), Some(2_000));
    }

    #[test]
    fn test_micros_pipeline_keeps_five_seconds() {
        let cfg = FusionConfig { time_unit: TimeUnit::Micros, ..Default::default() };
        assert_eq!(cfg.window_ticks(), 5_000_000);
        let mut fusion = FusionPipeline::new(cfg).unwrap();

        let mut clock = XsensClock::new();
        for k in 0..1_000u32 {
            let raw = XsensSample { device_time_us: k * 16_000, x: 0.0, y: 0.0, z: 9.81 };
            let sample = clock.stamp(&raw);
            fusion.feed_accel(&sample);
            fusion.tick(sample.t);
        }
        let raw = fusion.raw_samples();
        let newest = raw.last().map(|s| s.t).unwrap();
        assert_eq!(newest, 999 * 16_000);
        assert_eq!(raw.first().map(|s| s.t), Some(newest - 5_000_000 + 8_000));
        assert_eq!(raw.len(), 313);
    }

    #[test]
    fn test_export_records_after_fusion() {
        let mut fusion = FusionPipeline::new(FusionConfig::default()).unwrap();
        fusion.feed_accel(&TimedSample::new(0, 0.0, 0.0, 9.81));
        fusion.feed_velocity(&VelocityObservation::new(10, 2.0));
        fusion.feed_accel(&TimedSample::new(20, 0.0, 0.0, 9.81));

        let records = fusion.export_records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.v.is_some()));
        // every raw sample matches its own predict output
        assert_eq!(records[0].v, Some(0.0));
    }

    #[test]
    fn test_reset_discards_state() {
        let mut fusion = FusionPipeline::new(FusionConfig::default()).unwrap();
        fusion.feed_accel(&TimedSample::new(0, 1.0, 0.0, 9.81));
        fusion.feed_velocity(&VelocityObservation::new(5, 2.0));
        fusion.reset();

        assert_eq!(fusion.velocity(), 0.0);
        assert_eq!(fusion.variance(), 1.0);
        assert!(fusion.raw_samples().is_empty());
        assert!(fusion.fused_samples().is_empty());
        assert_eq!(fusion.stats(), &FusionStats::default());
        // ordering restarts too
        let events = fusion.feed_accel(&TimedSample::new(0, 0.0, 0.0, 9.81));
        assert_eq!(fused_of(&events).len(), 1);
    }
}
