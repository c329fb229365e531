// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors for the explicit, fallible graph operations.
//!
//! Value propagation never errors; rejection is reported as a `bool`.

use crate::node::NodeId;
use crate::port::PortId;

/// Error from graph validation, serialization or reconstruction
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// An output connects to an input owned by a node outside the set
    #[error("Output {output} of node {node} connects to input {input} outside the node set")]
    ForeignConnection {
        /// Node owning the output
        node: NodeId,
        /// The output
        output: PortId,
        /// The foreign input
        input: PortId,
    },

    /// A member node cannot be serialized
    #[error("Node is not serializable: {0}")]
    NotSerializable(NodeId),

    /// No constructor is registered for a node type
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// A record refers to a node that is not in the record
    #[error("Node index {index} out of range ({count} nodes)")]
    NodeIndexOutOfRange {
        /// Referenced index
        index: usize,
        /// Nodes in the record
        count: usize,
    },

    /// A record refers to a port the reconstructed node does not have
    #[error("Node {node} has no {kind} at index {index}")]
    PortIndexOutOfRange {
        /// Reconstructed node
        node: NodeId,
        /// "input" or "output"
        kind: &'static str,
        /// Referenced index
        index: usize,
    },

    /// The record was written by an incompatible format version
    #[error("Unsupported graph format version {found}, expected {expected}")]
    UnsupportedVersion {
        /// Version in the record
        found: u32,
        /// Version this build writes
        expected: u32,
    },

    /// A node constructor refused its record
    #[error("Failed to construct node: {0}")]
    Construction(String),

    /// RON encoding failed
    #[error("RON encode error: {0}")]
    RonEncode(#[from] ron::Error),

    /// RON decoding failed
    #[error("RON decode error: {0}")]
    RonDecode(#[from] ron::error::SpannedError),
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
