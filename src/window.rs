use std::collections::VecDeque;

use crate::types::{FusedVelocitySample, TimedSample};

/// Anything carrying a pipeline timestamp.
pub trait Stamped {
    fn stamp(&self) -> i64;
}

impl Stamped for TimedSample {
    fn stamp(&self) -> i64 {
        self.t
    }
}

impl Stamped for FusedVelocitySample {
    fn stamp(&self) -> i64 {
        self.t
    }
}

/// Sliding time-window buffer.
///
/// Samples are kept in insertion order. `prune` drops every sample with
/// `now - t > horizon`; it filters by predicate and does not assume the
/// buffer is sorted.
#[derive(Clone, Debug)]
pub struct SampleWindow<T> {
    samples: VecDeque<T>,
    horizon: i64,
}

impl<T: Stamped + Clone> SampleWindow<T> {
    pub fn new(horizon: i64) -> Self {
        SampleWindow {
            samples: VecDeque::new(),
            horizon,
        }
    }

    pub fn push(&mut self, sample: T) {
        self.samples.push_back(sample);
    }

    /// Evict samples older than the horizon relative to `now`.
    /// Returns how many were removed.
    pub fn prune(&mut self, now: i64) -> usize {
        let before = self.samples.len();
        let horizon = self.horizon;
        self.samples
            .retain(|s| now.saturating_sub(s.stamp()) <= horizon);
        before - self.samples.len()
    }

    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.samples.iter().cloned().collect()
    }

    pub fn horizon(&self) -> i64 {
        self.horizon
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
