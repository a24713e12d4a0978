use crate::approach::{ApproachId, ApproachLights};
use crate::config::SchedulerConfig;
use crate::math::{clockwise_bearing, signed_angle, Vector2d};
use crate::network::{TrafficNetwork, VehicleMask};
use crate::registry::LiveSignalRegistry;
use crate::signal::{ArrowDirection, LightState, SignalState};
use crate::step::{ChangeMetric, PhaseSignals, PhaseStep};
use crate::{GroupId, NodeId, SegmentId};
use anyhow::{anyhow, bail, Result};
use itertools::Itertools;
use std::collections::HashMap;
use std::f64::consts::FRAC_PI_4;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which physical direction travel from one segment to another at the
/// node represents. Rebuilt wholesale on every geometry change.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DirectionTable {
    directions: HashMap<(SegmentId, SegmentId), ArrowDirection>,
}

impl DirectionTable {
    pub fn get(&self, from: SegmentId, to: SegmentId) -> Option<ArrowDirection> {
        self.directions.get(&(from, to)).copied()
    }
}

/// Classifies the turn from an incoming to an outgoing segment given
/// unit vectors pointing toward the node.
fn classify_turn(incoming: Vector2d, outgoing: Vector2d) -> ArrowDirection {
    let angle = signed_angle(incoming, -outgoing);
    if angle.abs() <= FRAC_PI_4 {
        ArrowDirection::Forward
    } else if angle.abs() >= 3.0 * FRAC_PI_4 {
        ArrowDirection::Turn
    } else if angle > 0.0 {
        ArrowDirection::Left
    } else {
        ArrowDirection::Right
    }
}

/// The timed-signal controller of one intersection.
///
/// Owns the ordered phase cycle and the node's geometry caches. Whether
/// its own step state machine advances is decided by the node group: only
/// the master's does, and every other member mirrors it.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimedSignal {
    /// The controlled intersection.
    node: NodeId,
    /// The phase cycle.
    steps: Vec<PhaseStep>,
    /// Index of the current phase.
    current: usize,
    /// The synchronized node group this controller belongs to.
    group: GroupId,
    /// Whether the cycle is running.
    started: bool,
    /// In test mode the current step never advances automatically.
    test_mode: bool,
    /// Signed rotation offset, reduced modulo the approach count.
    rotation_offset: i32,
    /// Incoming approaches in clockwise order around the node.
    approaches: Vec<ApproachId>,
    /// Turn directions between segment pairs at this node.
    directions: DirectionTable,
}

impl TimedSignal {
    pub(crate) fn new(net: &impl TrafficNetwork, node: NodeId, group: GroupId) -> Self {
        let (approaches, directions) = rebuild_geometry(net, node);
        Self {
            node,
            steps: Vec::new(),
            current: 0,
            group,
            started: false,
            test_mode: false,
            rotation_offset: 0,
            approaches,
            directions,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub(crate) fn set_group(&mut self, group: GroupId) {
        self.group = group;
    }

    pub fn steps(&self) -> &[PhaseStep] {
        &self.steps
    }

    pub(crate) fn steps_mut(&mut self) -> &mut Vec<PhaseStep> {
        &mut self.steps
    }

    pub fn current_step(&self) -> usize {
        self.current
    }

    pub(crate) fn set_current(&mut self, index: usize) {
        self.current = index;
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// In test mode the current step holds indefinitely; used by hosts
    /// while previewing a phase under construction.
    pub fn set_test_mode(&mut self, test_mode: bool) {
        self.test_mode = test_mode;
    }

    pub fn rotation_offset(&self) -> i32 {
        self.rotation_offset
    }

    /// The node's incoming approaches in clockwise order.
    pub fn approaches(&self) -> &[ApproachId] {
        &self.approaches
    }

    pub fn directions(&self) -> &DirectionTable {
        &self.directions
    }

    // ---- phase editing ----

    /// Appends a phase to the cycle. Durations are clamped to
    /// `0 <= min <= max`, `max >= 1`. The new step snapshots every
    /// approach's current live lights (after a forced housekeeping pass);
    /// `make_all_red` forces the snapshot all-red, otherwise caution
    /// states are collapsed to a red/green-consistent state.
    pub(crate) fn add_step(
        &mut self,
        net: &impl TrafficNetwork,
        registry: &mut LiveSignalRegistry,
        min_time: i64,
        max_time: i64,
        change_metric: ChangeMetric,
        wait_flow_balance: f32,
        make_all_red: bool,
    ) -> usize {
        let mut step = PhaseStep::new(min_time, max_time, change_metric, wait_flow_balance);
        for approach in &self.approaches {
            let fingerprint = net.approach_fingerprint(*approach);
            let mut signals = match registry.get_mut(*approach) {
                Some(live) => {
                    live.housekeep(net, true);
                    PhaseSignals::from_live(live)
                }
                None => {
                    log::warn!("approach {:?} has no live lights; seeding red", approach);
                    PhaseSignals::seeded(SignalState::red())
                }
            };
            if make_all_red {
                signals.make_red();
            } else {
                signals.settle();
            }
            step.push_approach(*approach, fingerprint, signals);
        }
        self.steps.push(step);
        self.steps.len() - 1
    }

    /// Removes a phase from a stopped cycle.
    pub(crate) fn remove_step(&mut self, index: usize) -> Result<()> {
        if self.started {
            bail!("cannot edit the cycle of a running signal");
        }
        if index >= self.steps.len() {
            bail!("no phase at index {index}");
        }
        self.steps.remove(index);
        if self.current >= self.steps.len() {
            self.current = 0;
        }
        Ok(())
    }

    /// Moves a phase to another position in a stopped cycle.
    pub(crate) fn move_step(&mut self, from: usize, to: usize) -> Result<()> {
        if self.started {
            bail!("cannot edit the cycle of a running signal");
        }
        if from >= self.steps.len() || to >= self.steps.len() {
            bail!("phase index out of range");
        }
        let step = self.steps.remove(from);
        self.steps.insert(to, step);
        Ok(())
    }

    /// Edits one class's light inside one phase of a stopped cycle.
    pub(crate) fn set_step_light(
        &mut self,
        step: usize,
        approach: ApproachId,
        class: VehicleMask,
        state: SignalState,
    ) -> Result<()> {
        if self.started {
            bail!("cannot edit the cycle of a running signal");
        }
        let step = self
            .steps
            .get_mut(step)
            .ok_or_else(|| anyhow!("no phase at index {step}"))?;
        let lights = step
            .lights_mut(approach)
            .ok_or_else(|| anyhow!("phase has no lights for approach {:?}", approach))?;
        lights.set_light(class, state);
        Ok(())
    }

    // ---- lifecycle ----

    /// Starts the cycle at the given phase.
    ///
    /// Ensures the physical fixture exists, re-housekeeps every phase and
    /// every live approach (tolerating geometry drift since the phases
    /// were configured), and recomputes which crossings no phase ever
    /// serves so they can be forced green.
    pub(crate) fn start(
        &mut self,
        net: &mut impl TrafficNetwork,
        registry: &mut LiveSignalRegistry,
        config: &SchedulerConfig,
        step_index: usize,
    ) {
        if self.steps.is_empty() {
            log::warn!("not starting signal at {:?}: no phases", self.node);
            return;
        }
        if !net.has_signal_fixture(self.node) {
            net.ensure_signal_fixture(self.node);
        }
        let frame = net.frame();

        for approach in &self.approaches {
            if let Some(live) = registry.get_mut(*approach) {
                live.housekeep(net, true);
            }
        }
        for step in &mut self.steps {
            step.housekeep(net);
        }
        self.scan_invalid_pedestrians(net, registry, config);

        self.current = step_index.min(self.steps.len() - 1);
        self.started = true;
        let prev = self.current;
        self.steps[self.current].start(frame, prev);
        self.commit_lights(net, registry, config, true);
    }

    /// Stops the cycle; immediate and total.
    pub(crate) fn stop(&mut self) {
        self.started = false;
        for step in &mut self.steps {
            step.stop();
        }
    }

    /// Writes the current phase's lights into the live registry and
    /// refreshes the node's pedestrian states.
    pub(crate) fn commit_lights(
        &self,
        net: &impl TrafficNetwork,
        registry: &mut LiveSignalRegistry,
        config: &SchedulerConfig,
        no_transition: bool,
    ) {
        if self.steps.is_empty() {
            return;
        }
        let frame = net.frame();
        let current = &self.steps[self.current];
        let prev = &self.steps[current.prev_ref().min(self.steps.len() - 1)];
        let next_idx = current
            .next_ref()
            .unwrap_or((self.current + 1) % self.steps.len());
        let next = &self.steps[next_idx.min(self.steps.len() - 1)];
        current.update_live_lights(prev, next, registry, frame, no_transition);
        self.recalculate_pedestrians(net, registry, config);
    }

    // ---- pedestrian gating ----

    /// Recomputes every approach's automatic pedestrian state from the
    /// live lights, in two passes: all states are derived from one
    /// consistent snapshot, then committed, so the computation propagates
    /// exactly one hop and can never recurse.
    pub(crate) fn recalculate_pedestrians(
        &self,
        net: &impl TrafficNetwork,
        registry: &mut LiveSignalRegistry,
        config: &SchedulerConfig,
    ) {
        let computed: Vec<(ApproachId, LightState)> = self
            .approaches
            .iter()
            .map(|approach| {
                (
                    *approach,
                    self.pedestrian_auto_for(net, registry, config, *approach),
                )
            })
            .collect();
        for (approach, state) in computed {
            if let Some(lights) = registry.get_mut(approach) {
                lights.set_pedestrian_auto(state);
            }
        }
    }

    /// The automatic pedestrian state for one approach: red while any
    /// vehicle light here is green, else red while any comparable
    /// neighbor shows a non-red light toward this approach.
    fn pedestrian_auto_for(
        &self,
        net: &impl TrafficNetwork,
        registry: &LiveSignalRegistry,
        config: &SchedulerConfig,
        approach: ApproachId,
    ) -> LightState {
        let Some(lights) = registry.get(approach) else {
            return LightState::Red;
        };
        if lights.any_green() {
            return LightState::Red;
        }
        let class = net.road_class(approach);
        for other in &self.approaches {
            if *other == approach {
                continue;
            }
            if net.road_class(*other) != class || net.is_one_way_exit(*other) {
                continue;
            }
            let Some(other_lights) = registry.get(*other) else {
                log::warn!("neighbor {:?} has no live lights; skipped", other);
                continue;
            };
            let Some(direction) = self.directions.get(other.segment, approach.segment) else {
                log::warn!("no direction from {:?} to {:?}; neighbor skipped", other, approach);
                continue;
            };
            let light = other_lights.main_light().light(direction, config.side);
            if !light.is_red() {
                return LightState::Red;
            }
        }
        LightState::Green
    }

    /// Flags approaches whose pedestrians never get a green in any
    /// configured phase; their crossings are forced green instead.
    fn scan_invalid_pedestrians(
        &self,
        net: &impl TrafficNetwork,
        registry: &mut LiveSignalRegistry,
        config: &SchedulerConfig,
    ) {
        for approach in &self.approaches {
            let served = self
                .steps
                .iter()
                .any(|step| self.step_gives_pedestrian_green(net, config, step, *approach));
            if let Some(lights) = registry.get_mut(*approach) {
                lights.set_invalid_pedestrian(!served);
            }
        }
    }

    /// Whether a phase would give the approach's pedestrians a green.
    fn step_gives_pedestrian_green(
        &self,
        net: &impl TrafficNetwork,
        config: &SchedulerConfig,
        step: &PhaseStep,
        approach: ApproachId,
    ) -> bool {
        let Some(own) = step.lights(approach) else {
            return false;
        };
        if own.signals().any(|(_, signal)| signal.visual_state().is_green()) {
            return false;
        }
        let class = net.road_class(approach);
        for other in &self.approaches {
            if *other == approach
                || net.road_class(*other) != class
                || net.is_one_way_exit(*other)
            {
                continue;
            }
            let Some(other_lights) = step.lights(*other) else {
                continue;
            };
            let Some(direction) = self.directions.get(other.segment, approach.segment) else {
                continue;
            };
            let light = other_lights
                .light_for_class(VehicleMask::DEFAULT)
                .light(direction, config.side);
            if !light.is_red() {
                return false;
            }
        }
        true
    }

    // ---- rotation ----

    /// Reassigns every phase's per-approach lights to the approach one
    /// position clockwise or counter-clockwise around the node.
    ///
    /// Only valid for a controller that is alone in its group. A missing
    /// source light configuration mid-rotation is a data-consistency bug
    /// and aborts the operation with an error.
    pub(crate) fn rotate(&mut self, clockwise: bool, group_len: usize) -> Result<()> {
        if group_len != 1 {
            bail!("cannot rotate a signal that is part of a multi-node group");
        }
        if self.steps.is_empty() {
            bail!("cannot rotate a signal with no phases");
        }
        let n = self.approaches.len();
        if n == 0 {
            bail!("cannot rotate a signal with no approaches");
        }

        // Moving lights one position clockwise means position i takes its
        // lights from its counter-clockwise neighbor, position i-1.
        let shift = if clockwise { n - 1 } else { 1 };
        for step in &mut self.steps {
            let fingerprints: HashMap<ApproachId, u64> =
                step.entries().map(|(a, fp, _)| (a, fp)).collect();
            let mut entries = Vec::with_capacity(n);
            for (i, target) in self.approaches.iter().enumerate() {
                let source = self.approaches[(i + shift) % n];
                let signals = step
                    .lights(source)
                    .ok_or_else(|| anyhow!("no lights for approach {:?} during rotation", source))?
                    .clone();
                let fingerprint = *fingerprints
                    .get(target)
                    .ok_or_else(|| anyhow!("no entry for approach {:?} during rotation", target))?;
                entries.push((*target, fingerprint, signals));
            }
            step.replace_entries(entries.into_iter());
        }
        let delta = if clockwise { 1 } else { -1 };
        self.rotation_offset = (self.rotation_offset + delta).rem_euclid(n as i32);
        Ok(())
    }

    // ---- geometry recovery ----

    /// Reconciles the controller with changed road geometry.
    ///
    /// Vanished approaches have their snapshots retired into each phase's
    /// reusable arena rather than deleted; newly appeared approaches
    /// first try to adopt a retired snapshot with the same position
    /// fingerprint, preserving the signal plan across a segment rebuild.
    pub(crate) fn on_geometry_update(
        &mut self,
        net: &impl TrafficNetwork,
        registry: &mut LiveSignalRegistry,
    ) {
        let frame = net.frame();
        let (approaches, directions) = rebuild_geometry(net, self.node);

        for old in &self.approaches {
            if !approaches.contains(old) {
                log::debug!("approach {:?} vanished; retiring its lights", old);
                for step in &mut self.steps {
                    step.retire(*old);
                }
                registry.remove(*old);
            }
        }

        for new in &approaches {
            if !self.approaches.contains(new) {
                let fingerprint = net.approach_fingerprint(*new);
                registry.insert(ApproachLights::new(net, *new, frame));
                for step in &mut self.steps {
                    let adopted =
                        step.adopt_or_create(net, *new, fingerprint, SignalState::red());
                    if adopted {
                        log::debug!("approach {:?} adopted a retired light plan", new);
                    }
                }
            }
        }

        for step in &mut self.steps {
            step.housekeep(net);
        }
        self.approaches = approaches;
        self.directions = directions;
    }
}

/// Computes the clockwise approach ordering and the turn-direction table
/// for a node from host geometry.
fn rebuild_geometry(
    net: &impl TrafficNetwork,
    node: NodeId,
) -> (Vec<ApproachId>, DirectionTable) {
    let approaches: Vec<ApproachId> = net
        .approaches(node)
        .into_iter()
        .sorted_by(|a, b| {
            let ba = clockwise_bearing(net.approach_direction(*a));
            let bb = clockwise_bearing(net.approach_direction(*b));
            ba.partial_cmp(&bb).expect("Approach bearing must be finite")
        })
        .collect();

    // Destinations include outgoing-only segments that never appear in
    // the incoming approach list.
    let mut targets = approaches.clone();
    for approach in &approaches {
        for lane in 0..net.lane_count(*approach) {
            for dest in net.lane_destinations(*approach, lane) {
                if !targets.contains(&dest) {
                    targets.push(dest);
                }
            }
        }
    }

    let mut directions = HashMap::new();
    for from in &approaches {
        for to in &targets {
            let direction = if from.segment == to.segment {
                ArrowDirection::Turn
            } else {
                classify_turn(
                    net.approach_direction(*from),
                    net.approach_direction(*to),
                )
            };
            directions.insert((from.segment, to.segment), direction);
        }
    }
    (approaches, DirectionTable { directions })
}
