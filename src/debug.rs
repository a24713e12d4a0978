use crate::NodeId;

#[cfg(feature = "debug")]
use serde_json::json;

#[cfg(feature = "debug")]
thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

/// Records a phase-change decision made by a group master.
#[allow(unused)]
pub fn debug_decision(node: NodeId, from: usize, to: usize, flow: f32, wait: f32) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "phase_change",
            "node": format!("{:?}", node),
            "from": from,
            "to": to,
            "flow": flow,
            "wait": wait,
        }))
    })
}

#[cfg(feature = "debug")]
pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}
