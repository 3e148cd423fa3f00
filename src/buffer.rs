//! Sliding sample window
//!
//! Fixed-capacity FIFO of the most recent samples, consumed read-only by
//! presentation sinks. Pure data structure: no I/O, no timers.

use std::collections::VecDeque;

use crate::types::Sample;

/// Default window size: the last 50 samples.
pub const DEFAULT_CAPACITY: usize = 50;

/// Insertion-ordered window of recent samples; oldest evicted first.
///
/// Length never exceeds capacity; eviction is O(1) amortized.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
    /// Most recently pushed sample. `None` is the zero state: it means no
    /// sample has arrived since creation or the last `clear()`.
    latest: Option<Sample>,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            latest: None,
        }
    }

    /// Append a sample, evicting the oldest entry once full.
    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.latest = Some(sample.clone());
        self.samples.push_back(sample);
    }

    /// Empty the window and reset the last-known sample to its zero state.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.latest = None;
    }

    /// Immutable copy for rendering. Later pushes are never visible
    /// through a snapshot taken earlier.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    /// Most recently pushed sample, if any arrived since the last clear.
    pub fn latest(&self) -> Option<&Sample> {
        self.latest.as_ref()
    }

    /// Mean concentration across the window, or 0.0 when empty.
    pub fn average_concentration(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| s.concentration).sum();
        sum / self.samples.len() as f64
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
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(index: u64, concentration: f64) -> Sample {
        Sample {
            concentration,
            sequence_index: Some(index),
            ..Default::default()
        }
    }

    #[test]
    fn test_never_exceeds_capacity_and_keeps_most_recent() {
        let mut buffer = SampleBuffer::default();
        for i in 0..120u64 {
            buffer.push(sample(i, i as f64));
            assert!(buffer.len() <= DEFAULT_CAPACITY);
        }

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 50);
        // The most recent 50 in arrival order: indices 70..=119
        let indices: Vec<u64> = snapshot.iter().filter_map(|s| s.sequence_index).collect();
        assert_eq!(indices, (70..120).collect::<Vec<u64>>());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_pushes() {
        let mut buffer = SampleBuffer::new(5);
        buffer.push(sample(1, 40.0));
        buffer.push(sample(2, 41.0));

        let snapshot = buffer.snapshot();
        buffer.push(sample(3, 42.0));

        assert_eq!(snapshot.len(), 2);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_clear_resets_to_zero_state() {
        let mut buffer = SampleBuffer::new(5);
        buffer.push(sample(1, 40.0));
        assert!(buffer.latest().is_some());

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.latest().is_none());
        assert_eq!(buffer.average_concentration(), 0.0);
    }

    #[test]
    fn test_average_concentration() {
        let mut buffer = SampleBuffer::new(5);
        buffer.push(sample(1, 20.0));
        buffer.push(sample(2, 40.0));
        assert_eq!(buffer.average_concentration(), 30.0);
    }
}
