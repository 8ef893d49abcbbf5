use crate::types::{ExportRecord, FusedVelocitySample, TimedSample};

/// Join raw samples with fused velocity for export.
///
/// Each raw sample takes the velocity of the first fused sample (in stream
/// order) whose timestamp is at or after its own; `None` when there is none.
/// This can associate a later velocity with an earlier acceleration sample.
///
/// Sorted fused streams (all pipeline output) are searched with
/// `partition_point`; anything else falls back to a linear scan that gives the
/// same answer.
pub fn merge_by_timestamp(raw: &[TimedSample], fused: &[FusedVelocitySample]) -> Vec<ExportRecord> {
    let sorted = fused.windows(2).all(|w| w[0].t <= w[1].t);

    raw.iter()
        .map(|s| {
            let v = if sorted {
                let idx = fused.partition_point(|f| f.t < s.t);
                fused.get(idx).map(|f| f.v)
            } else {
                fused.iter().find(|f| f.t >= s.t).map(|f| f.v)
            };
            ExportRecord {
                t: s.t,
                x: s.x,
                y: s.y,
                z: s.z,
                v,
            }
        })
        .collect()
}
