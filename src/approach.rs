use crate::network::{TrafficNetwork, VehicleMask};
use crate::signal::{LightState, SignalState};
use crate::{NodeId, SegmentId};
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One directed approach: a segment's incoming side at a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ApproachId {
    pub node: NodeId,
    pub segment: SegmentId,
}

impl ApproachId {
    pub fn new(node: NodeId, segment: SegmentId) -> Self {
        Self { node, segment }
    }
}

/// The live signals at one approach: one [SignalState] per vehicle class
/// that needs an independent signal, plus the pedestrian crossing state.
///
/// This is the renderer/vehicle-AI-visible side of the scheduler. Phase
/// steps hold their own snapshots and only write here through
/// [LiveSignalRegistry](crate::LiveSignalRegistry) commits.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ApproachLights {
    id: ApproachId,
    /// Per-class signals. The entry keyed [VehicleMask::DEFAULT] is always
    /// present and always first.
    signals: Vec<(VehicleMask, SignalState)>,
    /// The vehicle class governing each physical lane.
    lane_classes: SmallVec<[VehicleMask; 8]>,
    /// Manual pedestrian override; `None` means the auto state applies.
    pedestrian_manual: Option<LightState>,
    /// The auto-computed pedestrian state.
    pedestrian_auto: LightState,
    /// No configured phase ever gives this crossing a green, so it is
    /// forced green unconditionally.
    invalid_pedestrian: bool,
    /// The frame at which a light here last changed.
    last_change: usize,
}

impl ApproachLights {
    /// Creates the light set for an approach and runs the initial
    /// housekeeping pass to derive its vehicle classes.
    pub fn new(net: &impl TrafficNetwork, id: ApproachId, frame: usize) -> Self {
        let mut lights = Self {
            id,
            signals: vec![(VehicleMask::DEFAULT, SignalState::red())],
            lane_classes: SmallVec::new(),
            pedestrian_manual: None,
            pedestrian_auto: LightState::Green,
            invalid_pedestrian: false,
            last_change: frame,
        };
        lights.housekeep(net, true);
        lights
    }

    pub fn id(&self) -> ApproachId {
        self.id
    }

    /// Re-derives the vehicle-class table from current lane restrictions.
    ///
    /// Idempotent: running it twice with unchanged inputs produces an
    /// identical mapping. Existing class entries are reused so manual
    /// light plans survive minor edits; `may_delete` additionally removes
    /// entries no lane references any more.
    pub fn housekeep(&mut self, net: &impl TrafficNetwork, may_delete: bool) {
        self.lane_classes = reconcile_lane_classes(net, self.id, &mut self.signals, may_delete);
    }

    /// Ensures an entry exists for the class, seeded from the main signal.
    fn ensure_class(&mut self, mask: VehicleMask) {
        ensure_class(&mut self.signals, mask);
    }

    /// The signal governing the given lane.
    pub fn light_for_lane(&self, lane: usize) -> &SignalState {
        let class = self
            .lane_classes
            .get(lane)
            .copied()
            .unwrap_or(VehicleMask::DEFAULT);
        self.light_for_class(class)
    }

    /// The signal for a vehicle class, falling back to the default entry.
    pub fn light_for_class(&self, class: VehicleMask) -> &SignalState {
        self.signals
            .iter()
            .find(|(mask, _)| *mask == class)
            .map(|(_, signal)| signal)
            .unwrap_or(&self.signals[0].1)
    }

    /// The default ("main") signal of the approach.
    pub fn main_light(&self) -> &SignalState {
        &self.signals[0].1
    }

    /// The vehicle class governing each lane.
    pub fn lane_classes(&self) -> &[VehicleMask] {
        &self.lane_classes
    }

    /// The per-class signal entries, default entry first.
    pub fn signals(&self) -> impl Iterator<Item = (VehicleMask, &SignalState)> {
        self.signals.iter().map(|(mask, signal)| (*mask, signal))
    }

    /// Whether any vehicle signal at this approach is green.
    pub fn any_green(&self) -> bool {
        self.signals
            .iter()
            .any(|(_, signal)| signal.visual_state().is_green())
    }

    /// Overwrites the signal for a class, creating the entry if needed.
    /// Returns whether anything changed.
    pub(crate) fn commit(&mut self, class: VehicleMask, state: SignalState, frame: usize) -> bool {
        self.ensure_class(class);
        let entry = self
            .signals
            .iter_mut()
            .find(|(mask, _)| *mask == class)
            .expect("Vehicle class entry was just ensured");
        if entry.1 == state {
            return false;
        }
        entry.1 = state;
        self.last_change = frame;
        true
    }

    /// Mutable access to a class's signal for manual editing.
    /// Falls back to the default entry like [Self::light_for_class].
    pub fn light_for_class_mut(&mut self, class: VehicleMask) -> &mut SignalState {
        let idx = self
            .signals
            .iter()
            .position(|(mask, _)| *mask == class)
            .unwrap_or(0);
        &mut self.signals[idx].1
    }

    /// The pedestrian crossing state shown to the simulation.
    pub fn pedestrian(&self) -> LightState {
        if self.invalid_pedestrian {
            return LightState::Green;
        }
        self.pedestrian_manual.unwrap_or(self.pedestrian_auto)
    }

    /// Sets or clears the manual pedestrian override.
    pub fn set_pedestrian_manual(&mut self, state: Option<LightState>) {
        self.pedestrian_manual = state;
    }

    pub(crate) fn set_pedestrian_auto(&mut self, state: LightState) {
        self.pedestrian_auto = state;
    }

    pub(crate) fn set_invalid_pedestrian(&mut self, invalid: bool) {
        self.invalid_pedestrian = invalid;
    }

    pub fn invalid_pedestrian(&self) -> bool {
        self.invalid_pedestrian
    }

    /// The frame at which a light here last changed.
    pub fn last_change(&self) -> usize {
        self.last_change
    }
}

/// Ensures a class entry exists, seeded from the default ("main") entry.
pub(crate) fn ensure_class(signals: &mut Vec<(VehicleMask, SignalState)>, mask: VehicleMask) {
    if !signals.iter().any(|(m, _)| *m == mask) {
        let seed = signals[0].1;
        signals.push((mask, seed));
    }
}

/// Derives the lane-to-class table from current lane restrictions,
/// creating missing class entries in `signals` as it goes.
///
/// If every lane's mask equals the approach-wide mask, no separation is
/// needed and all lanes map to the default class. Otherwise each lane
/// whose mask differs from the unrestricted mask is keyed by that mask.
/// With `may_delete`, entries no lane references are removed; the default
/// entry is never removed.
pub(crate) fn reconcile_lane_classes(
    net: &impl TrafficNetwork,
    id: ApproachId,
    signals: &mut Vec<(VehicleMask, SignalState)>,
    may_delete: bool,
) -> SmallVec<[VehicleMask; 8]> {
    let lanes: SmallVec<[VehicleMask; 8]> = (0..net.lane_count(id))
        .map(|lane| net.lane_mask(id, lane))
        .collect();
    let approach_mask = net.approach_mask(id);

    let uniform = lanes.iter().all(|mask| *mask == approach_mask);
    let mut classes: SmallVec<[VehicleMask; 8]> = SmallVec::with_capacity(lanes.len());
    for mask in &lanes {
        if uniform || *mask == VehicleMask::DEFAULT {
            classes.push(VehicleMask::DEFAULT);
        } else {
            ensure_class(signals, *mask);
            classes.push(*mask);
        }
    }

    if may_delete {
        signals.retain(|(mask, _)| *mask == VehicleMask::DEFAULT || classes.contains(mask));
    }
    classes
}
