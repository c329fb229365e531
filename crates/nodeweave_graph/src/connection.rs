// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) view of a graph.
//!
//! Connections live in the outputs themselves; an [`Edge`] is a snapshot
//! resolved against a graph's node set.

use crate::node::NodeId;
use crate::port::PortId;

/// A live connection from an output of a member node to an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Node owning the output
    pub from_node: NodeId,
    /// Index of the output on its node
    pub from_output: usize,
    /// The output port
    pub output: PortId,
    /// Node owning the input, `None` if it is not a member of the graph
    pub to_node: Option<NodeId>,
    /// Index of the input on its node, `None` if it is not a member
    pub to_input: Option<usize>,
    /// The input port
    pub input: PortId,
}

impl Edge {
    /// Check if both ends belong to the graph
    pub fn is_internal(&self) -> bool {
        self.to_node.is_some()
    }
}
