//! Tuning flags shared by the binaries.

use std::path::PathBuf;

use clap::Args;

use crate::error::Result;
use crate::sensor_fusion::FusionConfig;
use crate::types::TimeUnit;

#[derive(Args, Debug, Clone, Default)]
pub struct TuningArgs {
    /// JSON config file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Gravity smoothing factor in (0, 1)
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Kalman integration step (seconds)
    #[arg(long)]
    pub dt: Option<f64>,

    /// Measurement noise variance
    #[arg(long)]
    pub r: Option<f64>,

    /// Process noise variance
    #[arg(long)]
    pub q: Option<f64>,

    /// Export window in milliseconds
    #[arg(long)]
    pub window_ms: Option<i64>,

    /// Unit of the input timestamps
    #[arg(long, value_enum)]
    pub time_unit: Option<TimeUnit>,
}

impl TuningArgs {
    pub fn to_config(&self) -> Result<FusionConfig> {
        let mut config = match &self.config {
            Some(path) => FusionConfig::from_json_file(path)?,
            None => FusionConfig::default(),
        };
        if let Some(alpha) = self.alpha {
            config.gravity_alpha = alpha;
        }
        if let Some(dt) = self.dt {
            config.kalman.dt = dt;
        }
        if let Some(r) = self.r {
            config.kalman.r = r;
        }
        if let Some(q) = self.q {
            config.kalman.q = q;
        }
        if let Some(window_ms) = self.window_ms {
            config.window_ms = window_ms;
        }
        if let Some(time_unit) = self.time_unit {
            config.time_unit = time_unit;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_flags() {
        let config = TuningArgs::default().to_config().unwrap();
        assert_eq!(config, FusionConfig::default());
    }

    #[test]
    fn test_flags_override() {
        let args = TuningArgs {
            alpha: Some(0.9),
            q: Some(0.0),
            window_ms: Some(1_000),
            ..Default::default()
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.gravity_alpha, 0.9);
        assert_eq!(config.kalman.q, 0.0);
        assert_eq!(config.kalman.r, 1.0);
        assert_eq!(config.window_ms, 1_000);
        assert_eq!(config.window_ticks(), 1_000);
    }

    #[test]
    fn test_micros_keeps_window_in_milliseconds() {
        let args = TuningArgs { time_unit: Some(TimeUnit::Micros), ..Default::default() };
        let config = args.to_config().unwrap();
        assert_eq!(config.time_unit, TimeUnit::Micros);
        assert_eq!(config.window_ms, 5_000);
        assert_eq!(config.window_ticks(), 5_000_000);
    }

    #[test]
    fn test_time_unit_flag_parses() {
        use clap::Parser;

        #[derive(Parser)]
        struct Cli {
            #[command(flatten)]
            tuning: TuningArgs,
        }

        let argv = ["test", "--time-unit", "micros", "--window-ms", "2000"];
        let cli = Cli::try_parse_from(argv).unwrap();
        assert_eq!(cli.tuning.time_unit, Some(TimeUnit::Micros));
        assert_eq!(cli.tuning.to_config().unwrap().window_ticks(), 2_000_000);
    }

    #[test]
    fn test_bad_override_rejected() {
        let args = TuningArgs { dt: Some(-1.0), ..Default::default() };
        assert!(args.to_config().is_err());
    }
}
