pub use approach::{ApproachId, ApproachLights};
pub use cgmath;
pub use config::{FlowWaitAggregation, SchedulerConfig, TrafficSide};
pub use controller::TimedSignal;
pub use group::NodeGroup;
pub use network::{RoadClass, TrafficNetwork, TurnOptions, VehicleMask};
pub use registry::LiveSignalRegistry;
pub use signal::{ArrowDirection, ArrowMode, LightState, SignalState};
use slotmap::new_key_type;
pub use slotmap::{Key, KeyData};
pub use step::{ChangeMetric, PhaseSignals, PhaseStep};
pub use system::SignalSystem;
pub use util::Interval;

mod approach;
mod config;
mod controller;
mod debug;
mod group;
pub mod math;
mod network;
mod registry;
mod signal;
mod step;
mod system;
mod util;

new_key_type! {
    /// Unique ID of an intersection node in the host network.
    pub struct NodeId;
    /// Unique ID of a road segment in the host network.
    pub struct SegmentId;
    /// Unique ID of a [NodeGroup].
    pub struct GroupId;
}
