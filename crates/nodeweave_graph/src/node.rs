// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node capability traits and the registry used to rebuild nodes.

use crate::error::{GraphError, Result};
use crate::input::NodeInput;
use crate::output::NodeOutput;
use crate::port::{PortId, PortValue};
use crate::serialization::{GraphRecord, NodeRecord};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A processing unit that owns inputs and outputs.
///
/// What a node computes is up to the implementor. Nodes usually react to
/// input changes by implementing [`InputDelegate`](crate::input::InputDelegate)
/// and sending on their outputs.
///
/// A node must hold the only strong handles to its inputs, so that dropping
/// the node drops the inputs and every output connected to them forgets them.
pub trait Node {
    /// Identity of this node within a graph
    fn id(&self) -> NodeId;

    /// Inputs in a stable order
    fn inputs(&self) -> &[Rc<NodeInput>];

    /// Outputs in a stable order
    fn outputs(&self) -> &[NodeOutput];

    /// Serialization capability, if this node has one
    fn as_serializable(&self) -> Option<&dyn SerializableNode> {
        None
    }

    /// Whether this node can be serialized
    fn is_serializable(&self) -> bool {
        self.as_serializable().is_some()
    }

    /// Find an input by key
    fn input(&self, key: &str) -> Option<&Rc<NodeInput>> {
        self.inputs().iter().find(|input| input.key() == Some(key))
    }

    /// Find an output by key
    fn output(&self, key: &str) -> Option<&NodeOutput> {
        self.outputs().iter().find(|output| output.key() == Some(key))
    }

    /// Position of an input of this node
    fn input_index(&self, id: PortId) -> Option<usize> {
        self.inputs().iter().position(|input| input.id() == id)
    }

    /// Whether this node owns the input
    fn owns_input(&self, id: PortId) -> bool {
        self.input_index(id).is_some()
    }
}

/// A node that can be written out and rebuilt through a [`NodeRegistry`].
///
/// Input values and connections are captured by the graph; the node only
/// supplies its type tag and any private state. Serialization must be
/// deterministic: the same node state always yields the same properties in
/// the same order.
pub trait SerializableNode {
    /// Stable type tag the registry rebuilds this node from
    fn node_type(&self) -> &str;

    /// Node-private state not held in inputs
    fn properties(&self) -> IndexMap<String, PortValue> {
        IndexMap::new()
    }

    /// Nested graph carried by this node, for graphs used as nodes
    fn subgraph(&self) -> Result<Option<GraphRecord>> {
        Ok(None)
    }

    /// Reapply private state after the graph restored input values.
    ///
    /// Runs once per node during reconstruction, after every recorded input
    /// value was set and before connections are rewired, so state touched
    /// by those input notifications can be overwritten here.
    fn restore(&self, _properties: &IndexMap<String, PortValue>) -> Result<()> {
        Ok(())
    }
}

/// Constructor rebuilding a node from its record.
///
/// The registry is passed along so nodes holding a nested graph can rebuild
/// its members.
pub type NodeConstructor = Box<dyn Fn(&NodeRecord, &NodeRegistry) -> Result<Rc<dyn Node>>>;

/// Registry of constructors for serializable node types
pub struct NodeRegistry {
    constructors: IndexMap<String, NodeConstructor>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            constructors: IndexMap::new(),
        }
    }

    /// Register a constructor for a node type, replacing any previous one
    pub fn register<F>(&mut self, node_type: impl Into<String>, constructor: F)
    where
        F: Fn(&NodeRecord, &NodeRegistry) -> Result<Rc<dyn Node>> + 'static,
    {
        self.constructors
            .insert(node_type.into(), Box::new(constructor));
    }

    /// Check if a node type is registered
    pub fn contains(&self, node_type: &str) -> bool {
        self.constructors.contains_key(node_type)
    }

    /// Get all registered type tags
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Rebuild a node from its record.
    ///
    /// Only the node itself is constructed; input values and connections
    /// are restored by the graph.
    pub fn construct(&self, record: &NodeRecord) -> Result<Rc<dyn Node>> {
        let constructor = self
            .constructors
            .get(&record.node_type)
            .ok_or_else(|| GraphError::UnknownNodeType(record.node_type.clone()))?;
        constructor(record, self)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
