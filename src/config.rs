#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How per-lane flow/wait measurements are combined into
/// per-approach, per-node and per-group aggregates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FlowWaitAggregation {
    /// Straight sums at every level.
    #[default]
    Total,
    /// Mean-of-means at every level.
    Mean,
}

/// Which side of the road traffic drives on.
///
/// Determines which arrow governs near-side turns and U-turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrafficSide {
    #[default]
    Right,
    Left,
}

/// Process-wide scheduler configuration.
///
/// These values are read-only to the core and apply to every
/// intersection; they are not configurable per node.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchedulerConfig {
    /// Exponential smoothing factor for flow/wait measurements.
    /// `smoothed = smoothing * previous + (1 - smoothing) * new`.
    pub smoothing: f32,
    /// Aggregation policy for flow/wait measurements.
    pub aggregation: FlowWaitAggregation,
    /// Left or right-hand traffic convention.
    pub side: TrafficSide,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.25,
            aggregation: FlowWaitAggregation::Total,
            side: TrafficSide::Right,
        }
    }
}
