//! Single-consumer event loop.
//!
//! Accelerometer and velocity producers share one channel, so the channel
//! order is the arrival order the filter sees. Window maintenance runs in the
//! same task at least once per tick interval, also while inputs are backed
//! up; nothing else touches the pipeline while the loop owns it.

use log::{debug, info};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

use crate::sensor_fusion::{FusionEvent, FusionPipeline};
use crate::types::{FusedVelocitySample, FusionInput};

/// Evict everything older than the window, using the newest raw sample
/// timestamp as `now` so pruning does not depend on wall-clock time.
fn prune(pipeline: &mut FusionPipeline) {
    if let Some(now) = pipeline.last_sample_t() {
        pipeline.tick(now);
    }
}

/// Drive `pipeline` until every producer has dropped its sender, then hand it
/// back so the caller can export what is still buffered.
///
/// Fused samples are forwarded to `out` when given; a full consumer drops
/// samples, a closed one stops forwarding. The returned pipeline has been
/// pruned after its last input.
pub async fn run_pipeline(
    mut pipeline: FusionPipeline,
    mut rx: Receiver<FusionInput>,
    mut out: Option<Sender<FusedVelocitySample>>,
    tick_interval: Duration,
) -> FusionPipeline {
    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_prune = Instant::now();
    let mut applied = 0u64;
    let mut dropped = 0u64;

    info!("ingest: started (tick every {:?})", tick_interval);

    loop {
        tokio::select! {
            biased;

            maybe_input = rx.recv() => {
                let Some(input) = maybe_input else {
                    break;
                };
                applied += 1;
                for event in pipeline.apply(&input) {
                    if let FusionEvent::Fused(sample) = event {
                        if let Some(tx) = &out {
                            match tx.try_send(sample) {
                                Ok(_) => {}
                                Err(TrySendError::Full(_)) => dropped += 1,
                                Err(TrySendError::Closed(_)) => {
                                    info!("ingest: output consumer closed, fusion continues");
                                    out = None;
                                }
                            }
                        }
                    }
                }
                // biased select starves the ticker while inputs are queued
                if last_prune.elapsed() >= tick_interval {
                    prune(&mut pipeline);
                    last_prune = Instant::now();
                }
            }

            _ = ticker.tick() => {
                prune(&mut pipeline);
                last_prune = Instant::now();
                debug!(
                    "ingest: tick v={:.3} P={:.3} buffered={}",
                    pipeline.velocity(),
                    pipeline.variance(),
                    pipeline.raw_samples().len()
                );
            }
        }
    }

    prune(&mut pipeline);
    info!(
        "ingest: input closed after {} events ({} fused samples dropped)",
        applied, dropped
    );
    pipeline
}
