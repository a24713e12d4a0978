use crate::NodeId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A set of intersections whose signal cycles act as one unit.
///
/// The first member is the master: only its step state machine advances,
/// and every other member mirrors its current phase. The member list is
/// rebuilt wholesale on every structural edit; controllers reference the
/// group by id and never hold a private copy.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeGroup {
    nodes: Vec<NodeId>,
}

impl NodeGroup {
    /// Creates a group with a single member, which is its own master.
    pub fn single(node: NodeId) -> Self {
        Self { nodes: vec![node] }
    }

    /// The elected master: the first member. A group is never empty.
    pub fn master(&self) -> NodeId {
        *self.nodes.first().expect("Node group must not be empty")
    }

    pub fn members(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Appends the members of `other` that are not already present.
    /// The master of `self` remains master of the union.
    pub(crate) fn union(&mut self, other: &NodeGroup) {
        for node in &other.nodes {
            if !self.nodes.contains(node) {
                self.nodes.push(*node);
            }
        }
    }

    /// Removes a member. Returns whether the group is now empty.
    pub(crate) fn remove(&mut self, node: NodeId) -> bool {
        self.nodes.retain(|n| *n != node);
        self.nodes.is_empty()
    }
}
