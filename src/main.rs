use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use velocity_fusion_rs::cli::TuningArgs;
use velocity_fusion_rs::export::{default_export_name, save_csv};
use velocity_fusion_rs::ingest::run_pipeline;
use velocity_fusion_rs::sensors;
use velocity_fusion_rs::{FusedVelocitySample, FusionInput, FusionPipeline, TimeUnit};

#[derive(Parser, Debug)]
#[command(name = "velocity_fusion")]
#[command(
    about = "Fuse accelerometer and velocity streams into a smoothed speed estimate",
    long_about = None
)]
struct Args {
    /// Duration in seconds (0 = until Ctrl-C)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Output directory for the CSV export
    #[arg(long, default_value = "velocity_fusion_sessions")]
    output_dir: PathBuf,

    /// Accelerometer sampling period (ms)
    #[arg(long, default_value = "16")]
    accel_period_ms: u64,

    /// Velocity reference period (ms)
    #[arg(long, default_value = "1000")]
    velocity_period_ms: u64,

    #[command(flatten)]
    tuning: TuningArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.tuning.to_config()?;
    if config.time_unit != TimeUnit::Millis {
        anyhow::bail!("the mock producers stamp milliseconds; use --time-unit millis");
    }

    println!("[{}] Velocity Fusion Starting", ts_now());
    println!("  Duration: {} seconds (0=continuous)", args.duration);
    println!(
        "  alpha={} dt={} R={} Q={} window={} ms ({:?})",
        config.gravity_alpha,
        config.kalman.dt,
        config.kalman.r,
        config.kalman.q,
        config.window_ms,
        config.time_unit
    );
    println!("  Output Dir: {}", args.output_dir.display());

    std::fs::create_dir_all(&args.output_dir)?;

    let tick_interval = Duration::from_millis(config.tick_interval_ms);
    let pipeline = FusionPipeline::new(config)?;

    // One input channel: its order is the order the filter sees
    let (input_tx, input_rx) = mpsc::channel::<FusionInput>(500);
    let (fused_tx, mut fused_rx) = mpsc::channel::<FusedVelocitySample>(500);

    let accel_handle = tokio::spawn(sensors::accel_loop(
        input_tx.clone(),
        Duration::from_millis(args.accel_period_ms.max(1)),
    ));
    let velocity_handle = tokio::spawn(sensors::velocity_loop(
        input_tx.clone(),
        Duration::from_millis(args.velocity_period_ms.max(1)),
    ));
    drop(input_tx);

    let fusion_handle =
        tokio::spawn(run_pipeline(pipeline, input_rx, Some(fused_tx), tick_interval));

    let stop = async {
        if args.duration > 0 {
            sleep(Duration::from_secs(args.duration)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(stop);

    let mut fused_count = 0u64;
    let mut last_print = Utc::now();

    loop {
        tokio::select! {
            _ = &mut stop => {
                println!("[{}] Duration reached, stopping...", ts_now());
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                println!("[{}] Interrupted, stopping...", ts_now());
                break;
            }
            maybe_sample = fused_rx.recv() => {
                let Some(sample) = maybe_sample else {
                    break;
                };
                fused_count += 1;
                let now = Utc::now();
                if now.signed_duration_since(last_print).num_seconds() >= 2 {
                    println!(
                        "[{}] v={:.3} m/s  P={:.3}  ({} fused samples)",
                        ts_now(), sample.v, sample.variance, fused_count
                    );
                    last_print = now;
                }
            }
        }
    }

    // Producers own the only senders; stopping them closes the input channel
    accel_handle.abort();
    velocity_handle.abort();
    drop(fused_rx);
    let pipeline = fusion_handle.await?;

    let records = pipeline.export_records();
    let filename = args.output_dir.join(default_export_name(Utc::now()));
    save_csv(&filename, &records, pipeline.config().time_unit)?;
    println!("[{}] Exported {} rows to {}", ts_now(), records.len(), filename.display());

    let stats = pipeline.stats();
    println!("\n=== Final Stats ===");
    println!("Accel samples: {} ({} rejected)", stats.accel_samples, stats.rejected_samples);
    println!(
        "Velocity observations: {} ({} rejected)",
        stats.observations, stats.rejected_observations
    );
    println!("Velocity: {:.3} m/s (P={:.4})", pipeline.velocity(), pipeline.variance());
    println!("Peak velocity: {:.3} m/s", stats.peak_velocity);

    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
