use crate::approach::{ApproachId, ApproachLights};
use crate::network::VehicleMask;
use crate::signal::SignalState;
use crate::NodeId;
use std::collections::HashMap;

/// The live per-approach signal state shared with the renderer and
/// vehicle right-of-way checks.
///
/// Owned by the [SignalSystem](crate::SignalSystem) for the lifetime of a
/// simulation session. Only the currently active phase step writes here,
/// through [Self::commit]; phase snapshots are private to their steps.
#[derive(Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LiveSignalRegistry {
    approaches: HashMap<ApproachId, ApproachLights>,
}

impl LiveSignalRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// The live lights of an approach, if it is under signal control.
    pub fn get(&self, id: ApproachId) -> Option<&ApproachLights> {
        self.approaches.get(&id)
    }

    pub fn get_mut(&mut self, id: ApproachId) -> Option<&mut ApproachLights> {
        self.approaches.get_mut(&id)
    }

    /// The live signal an approach shows for a vehicle class.
    pub fn signal(&self, id: ApproachId, class: VehicleMask) -> Option<&SignalState> {
        self.get(id).map(|lights| lights.light_for_class(class))
    }

    /// Writes one class's signal at an approach. Returns whether the
    /// state changed. Commits to unknown approaches are dropped.
    pub(crate) fn commit(
        &mut self,
        id: ApproachId,
        class: VehicleMask,
        state: SignalState,
        frame: usize,
    ) -> bool {
        match self.approaches.get_mut(&id) {
            Some(lights) => lights.commit(class, state, frame),
            None => {
                log::warn!("commit to untracked approach {:?} dropped", id);
                false
            }
        }
    }

    pub(crate) fn insert(&mut self, lights: ApproachLights) {
        self.approaches.insert(lights.id(), lights);
    }

    pub(crate) fn remove(&mut self, id: ApproachId) -> Option<ApproachLights> {
        self.approaches.remove(&id)
    }

    /// Removes every approach belonging to the node.
    pub(crate) fn remove_node(&mut self, node: NodeId) {
        self.approaches.retain(|id, _| id.node != node);
    }

    /// Iterates over all tracked approaches.
    pub fn iter(&self) -> impl Iterator<Item = &ApproachLights> {
        self.approaches.values()
    }
}
