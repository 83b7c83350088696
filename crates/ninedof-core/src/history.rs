//! Bounded per-device sample history

use alloc::collections::VecDeque;
use alloc::collections::vec_deque::Iter;

use crate::sample::{Sample, Scalar, Vector};

/// Number of samples kept when no capacity is given
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Insertion-ordered ring of the most recent samples.
///
/// Once full, every push drops the oldest sample. Nothing else removes or
/// reorders entries.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SampleHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History that keeps at most `capacity` samples.
    ///
    /// Storage grows on demand, so a large capacity costs nothing up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            capacity,
        }
    }

    /// Append `sample`, evicting from the front down to capacity.
    pub fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Newest sample, if any
    pub fn current(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Samples from oldest to newest
    pub fn iter(&self) -> Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Average of the newest `last_n` samples (or of all of them if fewer
    /// are stored), timestamped with the newest one.
    pub fn mean(&self, last_n: usize) -> Option<Sample> {
        let count = last_n.min(self.samples.len());
        if count == 0 {
            return None;
        }

        let (vector, value) = self
            .samples
            .iter()
            .rev()
            .take(count)
            .fold((Vector::zeros(), 0.0), |(vector, value), sample| {
                (vector + sample.vector, value + sample.value)
            });
        let scale = 1.0 / count as Scalar;

        Some(Sample {
            timestamp: self.current()?.timestamp,
            vector: vector * scale,
            value: value * scale,
        })
    }
}

impl<'a> IntoIterator for &'a SampleHistory {
    type Item = &'a Sample;
    type IntoIter = Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
