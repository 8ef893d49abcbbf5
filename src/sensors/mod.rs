//! Input producers for the fusion loop.
//!
//! The loops here stand in for the platform sensor APIs: they generate
//! plausible mock readings and push them onto the shared input channel with
//! wall-clock millisecond timestamps.

pub mod gps;
pub mod xsens;

use std::f64::consts::PI;

use chrono::Utc;
use log::{debug, info};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::time::{interval, Duration};

use crate::types::{FusionInput, TimedSample};

pub use gps::{GpsFix, GpsSpeedEstimator};
pub use xsens::{decode_short_payload, XsensClock, XsensSample};

/// Push one input, returning `false` once the consumer is gone. A full
/// channel drops the input.
fn offer(tx: &Sender<FusionInput>, input: FusionInput, name: &str, count: &mut u64) -> bool {
    match tx.try_send(input) {
        Ok(_) => {
            *count += 1;
            if *count % 100 == 0 {
                debug!("[{}] {} inputs", name, count);
            }
            true
        }
        Err(TrySendError::Closed(_)) => {
            info!("[{}] channel closed after {} inputs", name, count);
            false
        }
        Err(TrySendError::Full(_)) => true,
    }
}

pub async fn accel_loop(tx: Sender<FusionInput>, period: Duration) {
    let mut interval = interval(period);
    let mut sample_count = 0u64;
    let mut step = 0u64;

    loop {
        interval.tick().await;
        let sample = mock_accel_sample(Utc::now().timestamp_millis(), step, period);
        step += 1;

        if !offer(&tx, FusionInput::Accel(sample), "accel", &mut sample_count) {
            break;
        }
    }
}

/// Mock GPS at `period`; every other fix omits its speed so the
/// displacement fallback of `GpsSpeedEstimator` is exercised too.
pub async fn velocity_loop(tx: Sender<FusionInput>, period: Duration) {
    let mut interval = interval(period);
    let mut estimator = GpsSpeedEstimator::new();
    let mut fix_count = 0u64;
    let mut seq = 0u64;

    loop {
        interval.tick().await;
        let fix = mock_gps_fix(Utc::now().timestamp_millis(), seq);
        seq += 1;

        let Some(obs) = estimator.observe(&fix) else {
            continue;
        };
        if !offer(&tx, FusionInput::Velocity(obs), "velocity", &mut fix_count) {
            break;
        }
    }
}

/// Device lying flat, gently swaying in the horizontal plane.
fn mock_accel_sample(t: i64, step: u64, period: Duration) -> TimedSample {
    let s = step as f64 * period.as_secs_f64();
    TimedSample::new(
        t,
        (s * 2.0 * PI).sin() * 0.5,
        (s * 2.0 * PI).cos() * 0.3,
        9.81 + (s * PI).sin() * 0.1,
    )
}

fn mock_gps_fix(t: i64, seq: u64) -> GpsFix {
    let n = seq as f64;
    GpsFix {
        t,
        latitude: 37.7749 + n * 0.00001,
        longitude: -122.4194 + n * 0.00001,
        speed: if seq % 2 == 0 {
            Some(1.4 + (n * 0.5).sin() * 0.3)
        } else {
            None
        },
    }
}
