use crate::approach::ApproachLights;
use crate::config::SchedulerConfig;
use crate::controller::TimedSignal;
use crate::debug::debug_decision;
#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::group::NodeGroup;
use crate::network::TrafficNetwork;
use crate::registry::LiveSignalRegistry;
use crate::step::{ChangeMetric, PhaseStep};
use crate::util::{fold_pairs, rotated_range};
use crate::{GroupId, NodeId};
use anyhow::{anyhow, bail, Result};
use slotmap::{SecondaryMap, SlotMap};

/// The signal scheduler of a simulation session.
///
/// Owns every intersection's timed-signal controller, the node groups,
/// the live signal registry and the process-wide configuration. The host
/// calls [Self::step] once per simulation tick; everything else is
/// command-driven.
#[derive(Default)]
pub struct SignalSystem {
    /// The timed-signal controllers, one per enabled intersection.
    signals: SecondaryMap<NodeId, TimedSignal>,
    /// The synchronized node groups.
    groups: SlotMap<GroupId, NodeGroup>,
    /// The live per-approach lights read by renderer and vehicle AI.
    registry: LiveSignalRegistry,
    /// Process-wide configuration, read-only to the scheduler.
    config: SchedulerConfig,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl SignalSystem {
    /// Creates a scheduler with default configuration.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a scheduler with the given configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The live signal registry consumed by renderer and vehicle AI.
    pub fn registry(&self) -> &LiveSignalRegistry {
        &self.registry
    }

    /// Mutable registry access for manual light and pedestrian edits.
    pub fn registry_mut(&mut self) -> &mut LiveSignalRegistry {
        &mut self.registry
    }

    /// The controller of an intersection, if timed mode is enabled.
    pub fn signal(&self, node: NodeId) -> Option<&TimedSignal> {
        self.signals.get(node)
    }

    /// Returns an iterator over all the timed signals in the system.
    pub fn iter_signals(&self) -> impl Iterator<Item = (NodeId, &TimedSignal)> {
        self.signals.iter()
    }

    /// Whether the intersection's cycle is currently running.
    pub fn is_active(&self, node: NodeId) -> bool {
        self.signals
            .get(node)
            .map(|sig| sig.started())
            .unwrap_or(false)
    }

    /// The node group an intersection belongs to.
    pub fn group_of(&self, node: NodeId) -> Option<&NodeGroup> {
        self.signals.get(node).and_then(|sig| self.groups.get(sig.group()))
    }

    // ---- enable / disable ----

    /// Enables timed-signal mode for an intersection, placing it in a
    /// group of its own and creating live lights for its approaches.
    pub fn enable(&mut self, net: &impl TrafficNetwork, node: NodeId) -> Result<()> {
        if self.signals.contains_key(node) {
            bail!("timed signal already enabled at {:?}", node);
        }
        let group = self.groups.insert(NodeGroup::single(node));
        let signal = TimedSignal::new(net, node, group);
        let frame = net.frame();
        for approach in signal.approaches() {
            if self.registry.get(*approach).is_none() {
                self.registry.insert(ApproachLights::new(net, *approach, frame));
            }
        }
        self.signals.insert(node, signal);
        Ok(())
    }

    /// Disables timed-signal mode, tearing the intersection out of its
    /// group and dropping its live lights. Removing a group's last
    /// member removes the group itself.
    pub fn disable(&mut self, node: NodeId) -> Result<()> {
        let signal = self
            .signals
            .remove(node)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", node))?;
        let gid = signal.group();
        if let Some(group) = self.groups.get_mut(gid) {
            if group.remove(node) {
                self.groups.remove(gid);
            }
        }
        self.registry.remove_node(node);
        Ok(())
    }

    /// Removes an intersection from its group without disabling it;
    /// it continues alone in a fresh group. No-op for a lone member.
    pub fn leave(&mut self, node: NodeId) -> Result<()> {
        let signal = self
            .signals
            .get(node)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", node))?;
        let gid = signal.group();
        if self.groups.get(gid).map(|g| g.len()).unwrap_or(0) <= 1 {
            return Ok(());
        }
        if let Some(group) = self.groups.get_mut(gid) {
            group.remove(node);
        }
        let fresh = self.groups.insert(NodeGroup::single(node));
        self.signals[node].set_group(fresh);
        Ok(())
    }

    // ---- phase editing ----

    /// Appends a phase to an intersection's cycle. Negative or zero
    /// durations are clamped, not rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn add_step(
        &mut self,
        net: &impl TrafficNetwork,
        node: NodeId,
        min_time: i64,
        max_time: i64,
        change_metric: ChangeMetric,
        wait_flow_balance: f32,
        make_all_red: bool,
    ) -> Result<usize> {
        let signal = self
            .signals
            .get_mut(node)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", node))?;
        Ok(signal.add_step(
            net,
            &mut self.registry,
            min_time,
            max_time,
            change_metric,
            wait_flow_balance,
            make_all_red,
        ))
    }

    /// Removes a phase from a stopped cycle.
    pub fn remove_step(&mut self, node: NodeId, index: usize) -> Result<()> {
        self.signals
            .get_mut(node)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", node))?
            .remove_step(index)
    }

    /// Reorders a phase within a stopped cycle.
    pub fn move_step(&mut self, node: NodeId, from: usize, to: usize) -> Result<()> {
        self.signals
            .get_mut(node)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", node))?
            .move_step(from, to)
    }

    /// Edits one class's light inside one phase of a stopped cycle.
    pub fn set_step_light(
        &mut self,
        node: NodeId,
        step: usize,
        approach: crate::ApproachId,
        class: crate::VehicleMask,
        state: crate::SignalState,
    ) -> Result<()> {
        self.signals
            .get_mut(node)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", node))?
            .set_step_light(step, approach, class, state)
    }

    /// Puts a controller into or out of test mode.
    pub fn set_test_mode(&mut self, node: NodeId, test_mode: bool) -> Result<()> {
        self.signals
            .get_mut(node)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", node))?
            .set_test_mode(test_mode);
        Ok(())
    }

    // ---- lifecycle ----

    /// Starts every member of the node's group at the given phase.
    pub fn start(
        &mut self,
        net: &mut impl TrafficNetwork,
        node: NodeId,
        step_index: usize,
    ) -> Result<()> {
        let members = self.members_of(node)?;
        for member in members {
            if let Some(signal) = self.signals.get_mut(member) {
                signal.start(net, &mut self.registry, &self.config, step_index);
            }
        }
        Ok(())
    }

    /// Stops every member of the node's group.
    pub fn stop(&mut self, node: NodeId) -> Result<()> {
        let members = self.members_of(node)?;
        for member in members {
            if let Some(signal) = self.signals.get_mut(member) {
                signal.stop();
            }
        }
        Ok(())
    }

    /// Rotates a lone intersection's phase plan one approach position
    /// clockwise or counter-clockwise.
    pub fn rotate(&mut self, node: NodeId, clockwise: bool) -> Result<()> {
        let group_len = self
            .group_of(node)
            .map(|group| group.len())
            .unwrap_or(0);
        self.signals
            .get_mut(node)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", node))?
            .rotate(clockwise, group_len)
    }

    /// Copies a phase plan from one intersection to another with the
    /// same approach count, matching approaches by clockwise order.
    pub fn paste_steps(
        &mut self,
        net: &impl TrafficNetwork,
        source: NodeId,
        target: NodeId,
    ) -> Result<()> {
        let source_sig = self
            .signals
            .get(source)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", source))?;
        let target_sig = self
            .signals
            .get(target)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", target))?;
        let n = source_sig.approaches().len();
        if n != target_sig.approaches().len() {
            bail!(
                "cannot paste: source has {} approaches, target has {}",
                n,
                target_sig.approaches().len()
            );
        }
        let source_order = source_sig.approaches().to_vec();
        let target_order = target_sig.approaches().to_vec();

        let mut steps = Vec::with_capacity(source_sig.steps().len());
        for step in source_sig.steps() {
            let mut copy = PhaseStep::new(
                step.min_time() as i64,
                step.max_time() as i64,
                step.change_metric(),
                step.wait_flow_balance(),
            );
            for (i, target_approach) in target_order.iter().enumerate() {
                let signals = step
                    .lights(source_order[i])
                    .ok_or_else(|| {
                        anyhow!("no lights for approach {:?} during paste", source_order[i])
                    })?
                    .clone();
                copy.push_approach(
                    *target_approach,
                    net.approach_fingerprint(*target_approach),
                    signals,
                );
            }
            steps.push(copy);
        }

        let target_sig = self.signals.get_mut(target).expect("checked above");
        target_sig.stop();
        *target_sig.steps_mut() = steps;
        target_sig.set_current(0);
        Ok(())
    }

    /// Merges two controllers' groups into one synchronized unit.
    ///
    /// Shorter cycles are padded with all-red phases timed like the
    /// longer cycle's trailing steps; per-phase durations and balances
    /// are averaged across all members, the change metric is kept only
    /// if every non-default member agrees; then every member restarts on
    /// the merged configuration.
    pub fn join(
        &mut self,
        net: &mut impl TrafficNetwork,
        a: NodeId,
        b: NodeId,
    ) -> Result<()> {
        let ga = self
            .signals
            .get(a)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", a))?
            .group();
        let gb = self
            .signals
            .get(b)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", b))?
            .group();
        if ga == gb {
            return Ok(());
        }

        let members_a = self.groups[ga].members().to_vec();
        let members_b = self.groups[gb].members().to_vec();
        let all_members: Vec<NodeId> = members_a
            .iter()
            .chain(members_b.iter())
            .copied()
            .collect();

        // Equalize step counts: pad shorter cycles with all-red phases
        // copying the timing of the longest cycle's trailing steps.
        let longest = all_members
            .iter()
            .filter_map(|n| self.signals.get(*n))
            .map(|sig| sig.steps().len())
            .max()
            .unwrap_or(0);
        let reference = all_members
            .iter()
            .filter_map(|n| self.signals.get(*n))
            .find(|sig| sig.steps().len() == longest)
            .map(|sig| sig.node())
            .expect("at least one member exists");
        let trailing: Vec<(i64, i64, ChangeMetric, f32)> = self.signals[reference]
            .steps()
            .iter()
            .map(|s| {
                (
                    s.min_time() as i64,
                    s.max_time() as i64,
                    s.change_metric(),
                    s.wait_flow_balance(),
                )
            })
            .collect();
        for member in &all_members {
            let existing = self.signals[*member].steps().len();
            for (min, max, metric, balance) in trailing.iter().skip(existing) {
                let signal = self.signals.get_mut(*member).expect("member exists");
                signal.add_step(net, &mut self.registry, *min, *max, *metric, *balance, true);
            }
        }

        // Union the groups; the first group's master leads the union.
        let other = self.groups[gb].clone();
        self.groups[ga].union(&other);
        self.groups.remove(gb);
        for member in &members_b {
            self.signals[*member].set_group(ga);
        }

        // Reconcile per-phase parameters across the merged group.
        for idx in 0..longest {
            let mut mins = Vec::new();
            let mut maxs = Vec::new();
            let mut balances = Vec::new();
            let mut metrics = Vec::new();
            for member in &all_members {
                let step = &self.signals[*member].steps()[idx];
                mins.push(step.min_time());
                maxs.push(step.max_time());
                balances.push(step.wait_flow_balance());
                metrics.push(step.change_metric());
            }
            let min = mins.iter().sum::<usize>() / mins.len();
            let max = maxs.iter().sum::<usize>() / maxs.len();
            let balance = balances.iter().sum::<f32>() / balances.len() as f32;
            let custom: Vec<ChangeMetric> = metrics
                .iter()
                .copied()
                .filter(|m| *m != ChangeMetric::Default)
                .collect();
            let metric = match custom.as_slice() {
                [] => ChangeMetric::Default,
                [first, rest @ ..] if rest.iter().all(|m| m == first) => *first,
                _ => ChangeMetric::Default,
            };
            for member in &all_members {
                let signal = self.signals.get_mut(*member).expect("member exists");
                let step = &mut signal.steps_mut()[idx];
                step.set_bounds(min, max);
                step.set_wait_flow_balance(balance);
                step.set_change_metric(metric);
            }
        }

        // Restart every member on the merged configuration.
        for member in &all_members {
            let signal = self.signals.get_mut(*member).expect("member exists");
            signal.stop();
            signal.start(net, &mut self.registry, &self.config, 0);
        }
        Ok(())
    }

    /// Notifies the scheduler that road geometry around the node changed.
    pub fn notify_geometry_change(
        &mut self,
        net: &impl TrafficNetwork,
        node: NodeId,
    ) -> Result<()> {
        self.signals
            .get_mut(node)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", node))?
            .on_geometry_update(net, &mut self.registry);
        Ok(())
    }

    // ---- per-tick simulation ----

    /// Advances every node group by one tick.
    ///
    /// Only group masters evaluate their timers; every other member
    /// mirrors the master's decision within the same tick, so the whole
    /// group acts as one signal.
    pub fn step(&mut self, net: &impl TrafficNetwork) {
        let frame = net.frame();
        let group_ids: Vec<GroupId> = self.groups.keys().collect();
        for gid in group_ids {
            self.step_group(net, gid, frame);
        }

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }
    }

    /// Gets the debugging information for the previously simulated frame.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }

    fn step_group(&mut self, net: &impl TrafficNetwork, gid: GroupId, frame: usize) {
        let Some(group) = self.groups.get(gid) else {
            return;
        };
        let master_id = group.master();
        let members = group.members().to_vec();
        let Some(master) = self.signals.get(master_id) else {
            log::warn!("group master {:?} has no controller", master_id);
            return;
        };
        if !master.started() || master.steps().is_empty() {
            return;
        }
        if master.test_mode() {
            self.commit_group_lights(net, &members, false);
            return;
        }

        let current = master.current_step();
        let smoothing = self.config.smoothing;

        // Evaluation happens-before the broadcast: the master decides,
        // the members mirror. Interior-mutable latches on the step let
        // this run over shared references.
        let (done, end_done) = {
            let step = &master.steps()[current];
            let mut sample = || self.measure_group(net, &members, current);
            let done = step.is_done(frame, smoothing, &mut sample);
            (done, step.is_end_transition_done(frame))
        };

        if !done {
            self.commit_group_lights(net, &members, false);
            return;
        }

        // Latch the next-phase choice the moment the step terminates, so
        // the caution interval blends toward a stable target.
        let next = match master.steps()[current].next_ref() {
            Some(next) => next,
            None => {
                let next = self.choose_next(net, &members, master_id, current);
                for member in &members {
                    if let Some(sig) = self.signals.get(*member) {
                        if let Some(step) = sig.steps().get(current) {
                            step.set_next_ref(next);
                        }
                    }
                }
                next
            }
        };

        if !end_done {
            self.commit_group_lights(net, &members, false);
            return;
        }

        // Caution interval over: commit the new phase to every member.
        let (flow, wait) = self.signals[master_id].steps()[current]
            .metrics()
            .unwrap_or((0.0, 0.0));
        if next == current {
            log::debug!("{:?}: phase {} restarts in place", master_id, current);
        } else {
            log::debug!("{:?}: phase {} -> {}", master_id, current, next);
        }
        debug_decision(master_id, current, next, flow, wait);

        for member in &members {
            let Some(signal) = self.signals.get_mut(*member) else {
                log::warn!("group member {:?} has no controller", member);
                continue;
            };
            if signal.steps().is_empty() {
                continue;
            }
            let prev = signal.current_step();
            let target = next.min(signal.steps().len() - 1);
            signal.set_current(target);
            signal.steps_mut()[target].start(frame, prev);
        }
        self.commit_group_lights(net, &members, false);
    }

    /// Writes every member's current phase into the live registry.
    fn commit_group_lights(
        &mut self,
        net: &impl TrafficNetwork,
        members: &[NodeId],
        no_transition: bool,
    ) {
        for member in members {
            if let Some(signal) = self.signals.get(*member) {
                signal.commit_lights(net, &mut self.registry, &self.config, no_transition);
            }
        }
    }

    /// Measures flow and wait for one phase index across a whole group.
    fn measure_group(
        &self,
        net: &impl TrafficNetwork,
        members: &[NodeId],
        step_index: usize,
    ) -> (f32, f32) {
        let pairs = members.iter().filter_map(|member| {
            let signal = self.signals.get(*member)?;
            let step = signal.steps().get(step_index)?;
            step.measure_node(net, signal.directions(), self.config.side, self.config.aggregation)
        });
        fold_pairs(pairs, self.config.aggregation).unwrap_or((0.0, 0.0))
    }

    /// Picks the phase to run after `current`.
    ///
    /// When the natural successor is adaptive (zero minimum, same change
    /// metric), consecutive such candidates compete on their would-be
    /// metric; the walk stops at the first fixed-minimum step, which is
    /// never skipped over. The current phase itself only competes when
    /// the walk wraps the whole cycle, in which case it may restart in
    /// place rather than oscillate between equally good phases.
    fn choose_next(
        &self,
        net: &impl TrafficNetwork,
        members: &[NodeId],
        master: NodeId,
        current: usize,
    ) -> usize {
        let steps = self.signals[master].steps();
        let n = steps.len();
        let next = (current + 1) % n;
        let policy = steps[current].change_metric();

        if steps[next].min_time() != 0 || steps[next].change_metric() != policy {
            return next;
        }

        let mut best = next;
        let mut best_metric = steps[next].raw_metric(self.measure_group(net, members, next));
        for idx in rotated_range(n, next).skip(1) {
            let candidate = &steps[idx];
            if idx != current && (candidate.min_time() != 0 || candidate.change_metric() != policy)
            {
                break;
            }
            let metric = candidate.raw_metric(self.measure_group(net, members, idx));
            if metric > best_metric {
                best = idx;
                best_metric = metric;
            }
            if idx == current {
                break;
            }
        }
        best
    }

    fn members_of(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let group = self
            .group_of(node)
            .ok_or_else(|| anyhow!("no timed signal at {:?}", node))?;
        Ok(group.members().to_vec())
    }
}
