//! Velocity fusion: gravity separation, horizontal projection and a scalar
//! Kalman filter combining high-rate acceleration with sparse velocity
//! references.

pub mod cli;
pub mod error;
pub mod export;
pub mod filters;
pub mod ingest;
pub mod merge;
pub mod sensor_fusion;
pub mod sensors;
pub mod session_log;
pub mod types;
pub mod window;

pub use error::{FusionError, Result};
pub use sensor_fusion::{
    FusionConfig, FusionEvent, FusionPipeline, FusionSnapshot, FusionStats, RejectReason,
};
pub use types::{
    ExportRecord, FusedSource, FusedVelocitySample, FusionInput, TimeUnit, TimedSample, Vec3,
    VelocityObservation,
};
