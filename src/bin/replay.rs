use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;
use serde_json::json;
use velocity_fusion_rs::cli::TuningArgs;
use velocity_fusion_rs::export::save_csv;
use velocity_fusion_rs::session_log::{load_session, SessionLog};
use velocity_fusion_rs::{FusionConfig, FusionEvent, FusionInput, FusionPipeline};

#[derive(Parser, Debug)]
struct Args {
    /// Path to a recorded session (.json or .json.gz)
    #[arg(long)]
    log: PathBuf,

    /// Write the merged export to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    #[command(flatten)]
    tuning: TuningArgs,
}

fn rmse_pairs(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let sum_sq: f64 = pairs.iter().map(|(a, b)| (a - b).powi(2)).sum();
    Some((sum_sq / pairs.len() as f64).sqrt())
}

/// Feed a recorded session through a fresh pipeline. Pruning follows the
/// recorded clock: a tick after every accepted accel sample.
fn replay(
    session: &SessionLog,
    config: FusionConfig,
) -> anyhow::Result<(FusionPipeline, serde_json::Value)> {
    let mut pipeline = FusionPipeline::new(config)?;
    // (estimate just before the update, observed velocity)
    let mut innovations = Vec::new();
    let mut pruned = 0usize;

    for input in &session.inputs {
        let prior = pipeline.velocity();
        let events = pipeline.apply(input);
        let accepted = events.iter().any(|e| matches!(e, FusionEvent::Fused(_)));
        if !accepted {
            continue;
        }

        match input {
            FusionInput::Accel(sample) => {
                for event in pipeline.tick(sample.t) {
                    if let FusionEvent::WindowPruned { raw, .. } = event {
                        pruned += raw;
                    }
                }
            }
            FusionInput::Velocity(obs) => innovations.push((prior, obs.v)),
        }
    }

    let stats = pipeline.stats();
    let summary = json!({
        "inputs": session.inputs.len(),
        "accel_samples": stats.accel_samples,
        "observations": stats.observations,
        "rejected_samples": stats.rejected_samples,
        "rejected_observations": stats.rejected_observations,
        "clamped_timestamps": stats.clamped_timestamps,
        "pruned_samples": pruned,
        "final_velocity": pipeline.velocity(),
        "final_variance": pipeline.variance(),
        "peak_velocity": stats.peak_velocity,
        "innovation_rmse": rmse_pairs(&innovations),
    });
    Ok((pipeline, summary))
}

fn run(path: &Path, args: &Args) -> anyhow::Result<serde_json::Value> {
    let config = args.tuning.to_config()?;
    let time_unit = config.time_unit;
    let session = load_session(path)?;
    info!(
        "replay: {} accel samples, {} velocity observations",
        session.accel_count(),
        session.velocity_count()
    );

    let (pipeline, mut summary) = replay(&session, config)?;

    if let Some(csv) = &args.csv {
        let records = pipeline.export_records();
        save_csv(csv, &records, time_unit)?;
        summary["csv"] = json!(csv.display().to_string());
        summary["exported_rows"] = json!(records.len());
    }
    summary["log"] = json!(path.display().to_string());
    Ok(summary)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let summary = run(&args.log, &args)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
