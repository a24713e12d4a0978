//! Miscellaneous utility structs and functions.

use crate::config::FlowWaitAggregation;
use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    /// Creates a new interval.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

/// Iterates over `0..count` starting at `start`, wrapping around.
pub fn rotated_range(count: usize, start: usize) -> impl Iterator<Item = usize> {
    (0..count)
        .map(move |i| i + start)
        .map(move |i| if i >= count { i - count } else { i })
}

/// Folds a sequence of (flow, wait) samples into one pair, either as a
/// straight sum or as the mean over the contributing samples.
/// Returns `None` if the sequence is empty.
pub fn fold_pairs(
    samples: impl Iterator<Item = (f32, f32)>,
    aggregation: FlowWaitAggregation,
) -> Option<(f32, f32)> {
    let mut count = 0usize;
    let mut flow = 0.0f32;
    let mut wait = 0.0f32;
    for (f, w) in samples {
        flow += f;
        wait += w;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    match aggregation {
        FlowWaitAggregation::Total => Some((flow, wait)),
        FlowWaitAggregation::Mean => Some((flow / count as f32, wait / count as f32)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn rotated_range_wraps() {
        let order: Vec<usize> = rotated_range(4, 2).collect();
        assert_eq!(order, vec![2, 3, 0, 1]);
    }

    #[test]
    fn fold_pairs_modes() {
        let samples = [(1.0, 2.0), (3.0, 4.0)];
        let (f, w) = fold_pairs(samples.iter().copied(), FlowWaitAggregation::Total).unwrap();
        assert_approx_eq!(f, 4.0);
        assert_approx_eq!(w, 6.0);

        let (f, w) = fold_pairs(samples.iter().copied(), FlowWaitAggregation::Mean).unwrap();
        assert_approx_eq!(f, 2.0);
        assert_approx_eq!(w, 3.0);

        assert!(fold_pairs(std::iter::empty(), FlowWaitAggregation::Mean).is_none());
    }
}
