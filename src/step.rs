use crate::approach::{ensure_class, reconcile_lane_classes, ApproachId, ApproachLights};
use crate::config::{FlowWaitAggregation, TrafficSide};
use crate::controller::DirectionTable;
use crate::network::{TrafficNetwork, VehicleMask};
use crate::registry::LiveSignalRegistry;
use crate::signal::{LightState, SignalState};
use crate::util::{fold_pairs, Interval};
use smallvec::SmallVec;
use std::cell::Cell;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The caution interval shown while a movement switches between green
/// and red, in simulation frames. Tied to the simulation clock's
/// granularity; not user-configurable.
pub(crate) const FRAME_GROUP: usize = 4;

/// Below this, a flow or wait measurement counts as zero.
const METRIC_EPSILON: f32 = 1e-3;

/// The policy deciding when an adaptive phase should end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChangeMetric {
    /// End once more vehicles are waiting than flowing.
    #[default]
    Default,
    /// End once flow has dried up.
    FirstFlow,
    /// End once nothing is waiting any more.
    FirstWait,
    /// End while any flow exists.
    NoFlow,
    /// End while anything is waiting.
    NoWait,
}

impl ChangeMetric {
    /// The scalar decision metric for a flow/wait measurement.
    pub(crate) fn metric(self, flow: f32, wait: f32) -> f32 {
        match self {
            ChangeMetric::Default => flow - wait,
            ChangeMetric::FirstFlow => {
                if flow <= METRIC_EPSILON {
                    1.0
                } else {
                    0.0
                }
            }
            ChangeMetric::FirstWait => {
                if wait <= METRIC_EPSILON {
                    1.0
                } else {
                    0.0
                }
            }
            ChangeMetric::NoFlow => {
                if flow > METRIC_EPSILON {
                    1.0
                } else {
                    0.0
                }
            }
            ChangeMetric::NoWait => {
                if wait > METRIC_EPSILON {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Whether the metric value terminates the step.
    pub(crate) fn is_done(self, flow: f32, wait: f32) -> bool {
        let metric = self.metric(flow, wait);
        match self {
            ChangeMetric::Default => metric < 0.0,
            _ => metric > 0.5,
        }
    }

    /// The binary policies react to the instantaneous measurement;
    /// the others use the exponentially smoothed values.
    pub(crate) fn uses_smoothing(self) -> bool {
        !matches!(self, ChangeMetric::NoFlow | ChangeMetric::NoWait)
    }
}

/// The signals one approach shows during one phase.
///
/// A read-only snapshot as far as the live simulation is concerned: the
/// active step blends snapshots into the live registry, and only explicit
/// phase editing mutates them.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhaseSignals {
    signals: Vec<(VehicleMask, SignalState)>,
    lane_classes: SmallVec<[VehicleMask; 8]>,
}

impl PhaseSignals {
    /// Snapshots the current live lights of an approach.
    pub(crate) fn from_live(live: &ApproachLights) -> Self {
        Self {
            signals: live.signals().map(|(mask, s)| (mask, *s)).collect(),
            lane_classes: live.lane_classes().iter().copied().collect(),
        }
    }

    /// Creates a single-class snapshot from a seed signal.
    pub(crate) fn seeded(seed: SignalState) -> Self {
        Self {
            signals: vec![(VehicleMask::DEFAULT, seed)],
            lane_classes: SmallVec::new(),
        }
    }

    /// The signal for a vehicle class, falling back to the default entry.
    pub fn light_for_class(&self, class: VehicleMask) -> &SignalState {
        self.signals
            .iter()
            .find(|(mask, _)| *mask == class)
            .map(|(_, signal)| signal)
            .unwrap_or(&self.signals[0].1)
    }

    /// The vehicle class governing each lane.
    pub fn lane_classes(&self) -> &[VehicleMask] {
        &self.lane_classes
    }

    /// The per-class signal entries, default entry first.
    pub fn signals(&self) -> impl Iterator<Item = (VehicleMask, &SignalState)> {
        self.signals.iter().map(|(mask, signal)| (*mask, signal))
    }

    /// Edits the signal for a class (phase configuration only).
    pub fn set_light(&mut self, class: VehicleMask, state: SignalState) {
        ensure_class(&mut self.signals, class);
        let entry = self
            .signals
            .iter_mut()
            .find(|(mask, _)| *mask == class)
            .expect("Vehicle class entry was just ensured");
        entry.1 = state;
    }

    /// Re-derives the lane table from current restrictions. Snapshots
    /// never delete class entries; an active phase must not lose data.
    pub(crate) fn housekeep(&mut self, net: &impl TrafficNetwork, id: ApproachId) {
        self.lane_classes = reconcile_lane_classes(net, id, &mut self.signals, false);
    }

    /// Forces every class red.
    pub(crate) fn make_red(&mut self) {
        for (_, signal) in &mut self.signals {
            signal.make_red();
        }
    }

    /// Collapses caution states onto red/green.
    pub(crate) fn settle(&mut self) {
        for (_, signal) in &mut self.signals {
            signal.settle();
        }
    }
}

/// One phase of a timed signal's cycle.
///
/// Owns a snapshot of every approach's lights for the duration of the
/// phase, the duration bounds, the change-metric policy, and the running
/// flow/wait measurement. The `Cell` fields let the master evaluate a
/// tick over shared references and commit the outcome afterwards.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhaseStep {
    /// Snapshots per approach, in clockwise order around the node.
    signals: Vec<StepEntry>,
    /// Orphaned snapshots, adoptable by position fingerprint when a
    /// segment is rebuilt in place.
    reusable: Vec<(u64, PhaseSignals)>,
    /// Minimum and maximum phase duration in frames.
    bounds: Interval<usize>,
    /// The policy deciding early termination.
    change_metric: ChangeMetric,
    /// Divisor applied to measured flow; values below 1 favour keeping
    /// high-flow phases running.
    wait_flow_balance: f32,
    /// The frame at which the step last started.
    start_frame: usize,
    /// The step that handed off to this one.
    prev_ref: usize,
    /// The step chosen to run next, latched when the step is done.
    next_ref: Cell<Option<usize>>,
    /// Whether the step has terminated. A step is done only once.
    done: Cell<bool>,
    /// The frame the end transition started; never rewound once set.
    end_start: Cell<Option<usize>>,
    /// Smoothed flow measurement, if any measurement happened yet.
    flow: Cell<f32>,
    /// Smoothed wait measurement.
    wait: Cell<f32>,
    have_metrics: Cell<bool>,
    /// Frame of the memoized raw measurement.
    measured_frame: Cell<Option<usize>>,
    measured: Cell<(f32, f32)>,
}

impl PhaseStep {
    /// Creates an empty step. Durations are clamped so that
    /// `0 <= min <= max` and `max >= 1`.
    pub fn new(
        min_time: i64,
        max_time: i64,
        change_metric: ChangeMetric,
        wait_flow_balance: f32,
    ) -> Self {
        let min = min_time.max(0) as usize;
        let max = (max_time.max(1) as usize).max(min);
        Self {
            signals: Vec::new(),
            reusable: Vec::new(),
            bounds: Interval::new(min, max),
            change_metric,
            wait_flow_balance: if wait_flow_balance > 0.0 {
                wait_flow_balance
            } else {
                1.0
            },
            start_frame: 0,
            prev_ref: 0,
            next_ref: Cell::new(None),
            done: Cell::new(false),
            end_start: Cell::new(None),
            flow: Cell::new(0.0),
            wait: Cell::new(0.0),
            have_metrics: Cell::new(false),
            measured_frame: Cell::new(None),
            measured: Cell::new((0.0, 0.0)),
        }
    }

    pub fn min_time(&self) -> usize {
        self.bounds.min
    }

    pub fn max_time(&self) -> usize {
        self.bounds.max
    }

    pub fn change_metric(&self) -> ChangeMetric {
        self.change_metric
    }

    pub fn wait_flow_balance(&self) -> f32 {
        self.wait_flow_balance
    }

    pub(crate) fn set_bounds(&mut self, min: usize, max: usize) {
        self.bounds = Interval::new(min, max.max(1).max(min));
    }

    pub(crate) fn set_change_metric(&mut self, metric: ChangeMetric) {
        self.change_metric = metric;
    }

    pub(crate) fn set_wait_flow_balance(&mut self, balance: f32) {
        if balance > 0.0 {
            self.wait_flow_balance = balance;
        }
    }

    /// The smoothed (flow, wait) measurement, if one exists yet.
    pub fn metrics(&self) -> Option<(f32, f32)> {
        self.have_metrics.get().then(|| (self.flow.get(), self.wait.get()))
    }

    pub(crate) fn prev_ref(&self) -> usize {
        self.prev_ref
    }

    pub(crate) fn next_ref(&self) -> Option<usize> {
        self.next_ref.get()
    }

    pub(crate) fn set_next_ref(&self, next: usize) {
        self.next_ref.set(Some(next));
    }

    // ---- snapshot management ----

    /// The approaches captured by this step, in clockwise order.
    pub fn approaches(&self) -> impl Iterator<Item = ApproachId> + '_ {
        self.signals.iter().map(|entry| entry.approach)
    }

    /// The snapshot for an approach.
    pub fn lights(&self, approach: ApproachId) -> Option<&PhaseSignals> {
        self.signals
            .iter()
            .find(|entry| entry.approach == approach)
            .map(|entry| &entry.signals)
    }

    pub fn lights_mut(&mut self, approach: ApproachId) -> Option<&mut PhaseSignals> {
        self.signals
            .iter_mut()
            .find(|entry| entry.approach == approach)
            .map(|entry| &mut entry.signals)
    }

    pub(crate) fn push_approach(
        &mut self,
        approach: ApproachId,
        fingerprint: u64,
        signals: PhaseSignals,
    ) {
        self.signals.push(StepEntry {
            approach,
            fingerprint,
            signals,
        });
    }

    /// Replaces the entry list, preserving the reusable arena.
    pub(crate) fn replace_entries(
        &mut self,
        entries: impl Iterator<Item = (ApproachId, u64, PhaseSignals)>,
    ) {
        self.signals = entries
            .map(|(approach, fingerprint, signals)| StepEntry {
                approach,
                fingerprint,
                signals,
            })
            .collect();
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (ApproachId, u64, &PhaseSignals)> {
        self.signals
            .iter()
            .map(|e| (e.approach, e.fingerprint, &e.signals))
    }

    /// Moves an approach's snapshot to the reusable arena instead of
    /// discarding it, so a segment rebuilt in place can adopt it.
    pub(crate) fn retire(&mut self, approach: ApproachId) {
        if let Some(idx) = self.signals.iter().position(|e| e.approach == approach) {
            let entry = self.signals.remove(idx);
            self.reusable.push((entry.fingerprint, entry.signals));
        }
    }

    /// Adds a newly appeared approach, adopting a retired snapshot with
    /// the same position fingerprint if one exists.
    pub(crate) fn adopt_or_create(
        &mut self,
        net: &impl TrafficNetwork,
        approach: ApproachId,
        fingerprint: u64,
        seed: SignalState,
    ) -> bool {
        let adopted = self
            .reusable
            .iter()
            .position(|(fp, _)| *fp == fingerprint)
            .map(|idx| self.reusable.remove(idx).1);
        let found = adopted.is_some();
        let mut signals = adopted.unwrap_or_else(|| PhaseSignals::seeded(seed));
        signals.housekeep(net, approach);
        self.push_approach(approach, fingerprint, signals);
        found
    }

    /// The number of retired light plans waiting for adoption.
    pub fn reusable_count(&self) -> usize {
        self.reusable.len()
    }

    /// Re-housekeeps every approach snapshot, tolerating geometry drift.
    pub(crate) fn housekeep(&mut self, net: &impl TrafficNetwork) {
        for entry in &mut self.signals {
            if net.approach_exists(entry.approach) {
                entry.signals.housekeep(net, entry.approach);
            }
        }
    }

    /// Forces every snapshot red.
    pub fn make_all_red(&mut self) {
        for entry in &mut self.signals {
            entry.signals.make_red();
        }
    }

    // ---- lifecycle ----

    /// Starts the step: records the start frame and the previous step,
    /// and clears the termination latch and measurement accumulators.
    pub(crate) fn start(&mut self, frame: usize, prev_ref: usize) {
        self.start_frame = frame;
        self.prev_ref = prev_ref;
        self.next_ref.set(None);
        self.done.set(false);
        self.end_start.set(None);
        self.have_metrics.set(false);
        self.flow.set(0.0);
        self.wait.set(0.0);
        self.measured_frame.set(None);
    }

    /// Resets the step's accumulators; immediate and total.
    pub(crate) fn stop(&mut self) {
        self.done.set(false);
        self.end_start.set(None);
        self.next_ref.set(None);
        self.have_metrics.set(false);
        self.measured_frame.set(None);
    }

    pub fn is_started_done(&self) -> bool {
        self.done.get()
    }

    /// Decides whether the step is over, evaluated once per tick for the
    /// current step of a group master only.
    ///
    /// The maximum duration is a hard ceiling that always wins; the
    /// minimum duration a hard floor that always blocks. In between, the
    /// change-metric policy is applied to the (possibly smoothed)
    /// flow/wait measurement obtained from `sample`, which is memoized
    /// per frame.
    pub(crate) fn is_done(
        &self,
        frame: usize,
        smoothing: f32,
        sample: &mut dyn FnMut() -> (f32, f32),
    ) -> bool {
        if self.done.get() {
            return true;
        }
        let elapsed = frame.saturating_sub(self.start_frame);
        if elapsed >= self.bounds.max {
            self.latch_done(frame);
            return true;
        }
        if elapsed < self.bounds.min {
            return false;
        }

        let (raw_flow, raw_wait) = self.sample_memo(frame, sample);
        let flow = raw_flow / self.wait_flow_balance;
        let wait = raw_wait;

        let (flow, wait) = if self.change_metric.uses_smoothing() {
            let (flow, wait) = if self.have_metrics.get() {
                (
                    smoothing * self.flow.get() + (1.0 - smoothing) * flow,
                    smoothing * self.wait.get() + (1.0 - smoothing) * wait,
                )
            } else {
                (flow, wait)
            };
            self.flow.set(flow);
            self.wait.set(wait);
            self.have_metrics.set(true);
            (flow, wait)
        } else {
            (flow, wait)
        };

        if self.change_metric.is_done(flow, wait) {
            self.latch_done(frame);
            return true;
        }
        false
    }

    /// The policy metric this step would report for a raw measurement,
    /// without mutating any running state. Used by the next-step walk.
    pub(crate) fn raw_metric(&self, raw: (f32, f32)) -> f32 {
        self.change_metric.metric(raw.0 / self.wait_flow_balance, raw.1)
    }

    fn sample_memo(&self, frame: usize, sample: &mut dyn FnMut() -> (f32, f32)) -> (f32, f32) {
        if self.measured_frame.get() != Some(frame) {
            self.measured.set(sample());
            self.measured_frame.set(Some(frame));
        }
        self.measured.get()
    }

    fn latch_done(&self, frame: usize) {
        self.done.set(true);
        if self.end_start.get().is_none() {
            self.end_start.set(Some(frame));
        }
    }

    // ---- transitions ----

    /// Whether the step is within its opening caution interval.
    pub fn is_in_start_transition(&self, frame: usize) -> bool {
        !self.done.get() && frame.saturating_sub(self.start_frame) < FRAME_GROUP
    }

    /// Whether the step is within its closing caution interval.
    pub fn is_in_end_transition(&self, frame: usize) -> bool {
        self.done.get()
            && self
                .end_start
                .get()
                .map(|end| frame < end + FRAME_GROUP)
                .unwrap_or(false)
    }

    /// Whether the closing caution interval has elapsed.
    pub fn is_end_transition_done(&self, frame: usize) -> bool {
        self.done.get()
            && self
                .end_start
                .get()
                .map(|end| frame >= end + FRAME_GROUP)
                .unwrap_or(false)
    }

    // ---- live output ----

    /// Blends this step's snapshots with the previous and next steps'
    /// and writes the result into the live registry.
    ///
    /// During the start transition an arrow that switched red to green
    /// shows [LightState::RedToGreen]; during the end transition an arrow
    /// about to lose green shows [LightState::GreenToRed]; otherwise the
    /// snapshot value is shown verbatim.
    pub(crate) fn update_live_lights(
        &self,
        prev: &PhaseStep,
        next: &PhaseStep,
        registry: &mut LiveSignalRegistry,
        frame: usize,
        no_transition: bool,
    ) {
        let in_start = !no_transition && self.is_in_start_transition(frame);
        let in_end = !no_transition && self.is_in_end_transition(frame);

        for entry in &self.signals {
            for (class, current) in entry.signals.signals() {
                let state = if in_start || in_end {
                    let prev = prev
                        .lights(entry.approach)
                        .map(|s| *s.light_for_class(class))
                        .unwrap_or_else(SignalState::red);
                    let next = next
                        .lights(entry.approach)
                        .map(|s| *s.light_for_class(class))
                        .unwrap_or_else(SignalState::red);
                    blend_signal(*current, prev, next, in_start, in_end)
                } else {
                    *current
                };
                registry.commit(entry.approach, class, state, frame);
            }
        }
    }

    // ---- measurement ----

    /// Measures flow and wait across this step's own node.
    ///
    /// Every queued-vehicle count toward a reachable destination counts
    /// as flowing if the arrow governing that movement is green in this
    /// step's snapshot, else as waiting. Counts aggregate lane, then
    /// approach, then node; the caller folds nodes across the group.
    pub(crate) fn measure_node(
        &self,
        net: &impl TrafficNetwork,
        directions: &DirectionTable,
        side: TrafficSide,
        aggregation: FlowWaitAggregation,
    ) -> Option<(f32, f32)> {
        let mut approach_pairs = Vec::with_capacity(self.signals.len());
        for entry in &self.signals {
            if !net.approach_exists(entry.approach) {
                log::warn!(
                    "skipping vanished approach {:?} in flow/wait measurement",
                    entry.approach
                );
                continue;
            }
            let mut lane_pairs = Vec::new();
            for (lane, class) in entry.signals.lane_classes().iter().enumerate() {
                let signal = entry.signals.light_for_class(*class);
                let mut dest_pairs = Vec::new();
                for dest in net.lane_destinations(entry.approach, lane) {
                    let Some(direction) = directions.get(entry.approach.segment, dest.segment)
                    else {
                        log::warn!(
                            "no direction from {:?} to {:?}; neighbor skipped",
                            entry.approach.segment,
                            dest.segment
                        );
                        continue;
                    };
                    let count = net.queued_vehicles(entry.approach, lane, dest) as f32;
                    if signal.light(direction, side).is_green() {
                        dest_pairs.push((count, 0.0));
                    } else {
                        dest_pairs.push((0.0, count));
                    }
                }
                if let Some(pair) = fold_pairs(dest_pairs.into_iter(), aggregation) {
                    lane_pairs.push(pair);
                }
            }
            if let Some(pair) = fold_pairs(lane_pairs.into_iter(), aggregation) {
                approach_pairs.push(pair);
            }
        }
        fold_pairs(approach_pairs.into_iter(), aggregation)
    }
}

/// Snapshot of one approach inside a phase step.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct StepEntry {
    approach: ApproachId,
    /// Position fingerprint captured at creation, so the snapshot can be
    /// retired and adopted across a segment rebuild.
    fingerprint: u64,
    signals: PhaseSignals,
}

/// Blends one class's signal between the previous, current and next steps.
fn blend_signal(
    current: SignalState,
    prev: SignalState,
    next: SignalState,
    in_start: bool,
    in_end: bool,
) -> SignalState {
    let mut out = current;
    let arrows = [
        (current.main(), prev.main(), next.main()),
        (current.left(), prev.left(), next.left()),
        (current.right(), prev.right(), next.right()),
    ];
    let blended = arrows.map(|(cur, prev, next)| {
        if in_start && cur == LightState::Green && prev == LightState::Red {
            LightState::RedToGreen
        } else if in_end && cur == LightState::Green && next == LightState::Red {
            LightState::GreenToRed
        } else {
            cur
        }
    });
    // Write arrows directly; mode mirroring must not overwrite a blend.
    out.set_raw(blended[0], blended[1], blended[2]);
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bounds_are_clamped() {
        let step = PhaseStep::new(-5, 0, ChangeMetric::Default, 1.0);
        assert_eq!(step.min_time(), 0);
        assert_eq!(step.max_time(), 1);

        let step = PhaseStep::new(10, 3, ChangeMetric::Default, 1.0);
        assert_eq!(step.min_time(), 10);
        assert_eq!(step.max_time(), 10);
    }

    #[test]
    fn max_time_is_a_hard_ceiling() {
        let mut step = PhaseStep::new(0, 5, ChangeMetric::Default, 1.0);
        step.start(0, 0);
        // Enormous flow would keep the step alive, but the ceiling wins.
        let mut sample = || (1000.0, 0.0);
        assert!(!step.is_done(4, 0.25, &mut sample));
        assert!(step.is_done(5, 0.25, &mut sample));
        // Once done, stays done.
        assert!(step.is_done(6, 0.25, &mut sample));
    }

    #[test]
    fn min_time_is_a_hard_floor() {
        let mut step = PhaseStep::new(10, 100, ChangeMetric::Default, 1.0);
        step.start(0, 0);
        let mut sample = || (0.0, 1000.0);
        for frame in 0..10 {
            assert!(!step.is_done(frame, 0.25, &mut sample));
        }
        assert!(step.is_done(10, 0.25, &mut sample));
    }

    #[test]
    fn default_metric_compares_flow_and_wait() {
        let mut step = PhaseStep::new(0, 100, ChangeMetric::Default, 1.0);
        step.start(0, 0);
        assert!(step.is_done(1, 0.0, &mut || (3.0, 5.0)));

        let mut step = PhaseStep::new(0, 100, ChangeMetric::Default, 1.0);
        step.start(0, 0);
        assert!(!step.is_done(1, 0.0, &mut || (6.0, 5.0)));
    }

    #[test]
    fn first_flow_ends_when_flow_dries_up() {
        let mut step = PhaseStep::new(0, 100, ChangeMetric::FirstFlow, 1.0);
        step.start(0, 0);
        assert!(step.is_done(1, 0.0, &mut || (0.0, 7.0)));

        let mut step = PhaseStep::new(0, 100, ChangeMetric::FirstFlow, 1.0);
        step.start(0, 0);
        assert!(!step.is_done(1, 0.0, &mut || (0.01, 7.0)));
    }

    #[test]
    fn wait_flow_balance_biases_flow() {
        // flow 4, wait 5 ends under balance 1 but survives balance 0.5.
        let mut step = PhaseStep::new(0, 100, ChangeMetric::Default, 1.0);
        step.start(0, 0);
        assert!(step.is_done(1, 0.0, &mut || (4.0, 5.0)));

        let mut step = PhaseStep::new(0, 100, ChangeMetric::Default, 0.5);
        step.start(0, 0);
        assert!(!step.is_done(1, 0.0, &mut || (4.0, 5.0)));
    }

    #[test]
    fn measurement_memoized_within_frame() {
        let mut step = PhaseStep::new(0, 100, ChangeMetric::Default, 1.0);
        step.start(0, 0);
        let calls = Cell::new(0);
        let mut sample = || {
            calls.set(calls.get() + 1);
            (5.0, 1.0)
        };
        assert!(!step.is_done(1, 0.25, &mut sample));
        assert!(!step.is_done(1, 0.25, &mut sample));
        assert_eq!(calls.get(), 1);
        assert!(!step.is_done(2, 0.25, &mut sample));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn transition_windows() {
        let mut step = PhaseStep::new(0, 100, ChangeMetric::Default, 1.0);
        step.start(10, 0);
        assert!(step.is_in_start_transition(10));
        assert!(step.is_in_start_transition(10 + FRAME_GROUP - 1));
        assert!(!step.is_in_start_transition(10 + FRAME_GROUP));
        assert!(!step.is_in_end_transition(12));

        assert!(step.is_done(20, 0.0, &mut || (0.0, 9.0)));
        assert!(step.is_in_end_transition(20));
        assert!(!step.is_end_transition_done(20 + FRAME_GROUP - 1));
        assert!(step.is_end_transition_done(20 + FRAME_GROUP));
    }
}
