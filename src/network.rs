//! The boundary between the scheduler and the host simulation.

use crate::math::Vector2d;
use crate::{ApproachId, NodeId};
use smallvec::SmallVec;
use std::ops::BitOr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A bitmask of vehicle classes allowed to use a lane.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleMask(pub u32);

impl VehicleMask {
    pub const NONE: Self = Self(0);
    pub const CAR: Self = Self(1);
    pub const BUS: Self = Self(1 << 1);
    pub const TRAM: Self = Self(1 << 2);
    pub const RAIL: Self = Self(1 << 3);
    pub const EMERGENCY: Self = Self(1 << 4);
    /// The unrestricted mask, doubling as the reserved default
    /// vehicle-class key of an approach light set.
    pub const DEFAULT: Self = Self(u32::MAX);
}

impl BitOr for VehicleMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::fmt::Debug for VehicleMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VehicleMask({:#x})", self.0)
    }
}

/// The turning movements physically available from an approach.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurnOptions {
    pub left: bool,
    pub forward: bool,
    pub right: bool,
}

/// Coarse road category used to decide whether two approaches are
/// comparable for pedestrian gating purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RoadClass {
    Road,
    Highway,
    Tram,
    Rail,
    Path,
}

/// The host-side services the scheduler queries.
///
/// Road geometry and lane topology are owned by the host; the scheduler
/// only ever reads them through this trait, and asks the host to create
/// the physical light fixture when a timed signal starts.
pub trait TrafficNetwork {
    /// The current simulation frame counter. Must be monotonic.
    fn frame(&self) -> usize;

    /// Whether the node currently carries a physical signal fixture.
    fn has_signal_fixture(&self, node: NodeId) -> bool;

    /// Ensures a physical signal fixture exists at the node.
    fn ensure_signal_fixture(&mut self, node: NodeId);

    /// The incoming approaches at a node, in no particular order.
    fn approaches(&self, node: NodeId) -> Vec<ApproachId>;

    /// Whether the approach still resolves to live geometry.
    fn approach_exists(&self, approach: ApproachId) -> bool;

    /// A unit vector pointing from the approach toward its node.
    fn approach_direction(&self, approach: ApproachId) -> Vector2d;

    /// A stable fingerprint of the approach's physical position,
    /// preserved when a segment is deleted and rebuilt in place.
    fn approach_fingerprint(&self, approach: ApproachId) -> u64;

    /// The number of incoming lanes on the approach.
    fn lane_count(&self, approach: ApproachId) -> usize;

    /// The allowed-vehicle mask of one lane.
    fn lane_mask(&self, approach: ApproachId, lane: usize) -> VehicleMask;

    /// The allowed-vehicle mask of the approach as a whole.
    fn approach_mask(&self, approach: ApproachId) -> VehicleMask;

    /// The turning movements available from the approach.
    fn turn_options(&self, approach: ApproachId) -> TurnOptions;

    /// The road category of the approach's segment.
    fn road_class(&self, approach: ApproachId) -> RoadClass;

    /// Whether the segment is one-way and only leaves the node,
    /// i.e. carries no traffic toward it.
    fn is_one_way_exit(&self, approach: ApproachId) -> bool;

    /// The approaches reachable from one lane of an approach.
    fn lane_destinations(&self, approach: ApproachId, lane: usize) -> SmallVec<[ApproachId; 4]>;

    /// The number of vehicles currently queued on the lane toward the
    /// given destination approach.
    fn queued_vehicles(&self, approach: ApproachId, lane: usize, toward: ApproachId) -> usize;
}
