// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph: a set of nodes that only connect among themselves.
//!
//! A graph is only consistent if every connection of every member's outputs
//! targets an input owned by another member. Callers establish this before
//! calling [`Graph::set_node_set`]; the graph does not walk connections on
//! edits. [`Graph::validate`] checks it on demand and never repairs
//! anything. Serialization refuses inconsistent graphs.
//!
//! A graph is itself a [`Node`] without ports, so graphs nest. A nested
//! graph serializes as a node whose record carries the member graph.

use crate::connection::Edge;
use crate::error::{GraphError, Result};
use crate::input::NodeInput;
use crate::node::{Node, NodeId, NodeRegistry, SerializableNode};
use crate::output::NodeOutput;
use crate::port::PortId;
use crate::serialization::{ConnectionRecord, GraphRecord, InputRecord, NodeRecord, OutputRecord};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Identity of a member handle: the address of the node it points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeKey(*const ());

impl NodeKey {
    fn of(node: &Rc<dyn Node>) -> Self {
        Self(Rc::as_ptr(node).cast::<()>())
    }
}

/// A node graph
pub struct Graph {
    /// Graph name
    pub name: String,
    id: NodeId,
    /// Member nodes, in the order they were supplied
    nodes: IndexMap<NodeKey, Rc<dyn Node>>,
}

impl Graph {
    /// Type tag of a graph used as a node
    pub const TYPE: &'static str = "graph";

    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: NodeId::new(),
            nodes: IndexMap::new(),
        }
    }

    /// Replace the whole node set.
    ///
    /// Membership is by handle: supplying the same `Rc` twice keeps it once,
    /// while distinct nodes are all kept even if their IDs are equal (two
    /// loads of the same file, for instance). Connections are not checked:
    /// every connection reachable from `nodes` must stay within `nodes`, or
    /// the graph is inconsistent until fixed.
    ///
    /// Returns the previous members. Dropping them drops any node nobody
    /// else holds, and outputs connected to its inputs forget them.
    pub fn set_node_set<I>(&mut self, nodes: I) -> Vec<Rc<dyn Node>>
    where
        I: IntoIterator<Item = Rc<dyn Node>>,
    {
        let mut next = IndexMap::new();
        let mut repeated = 0usize;
        for node in nodes {
            if next.insert(NodeKey::of(&node), node).is_some() {
                repeated += 1;
            }
        }
        if repeated > 0 {
            tracing::debug!(graph = %self.name, repeated, "Same node supplied more than once");
        }

        let previous = std::mem::replace(&mut self.nodes, next);
        tracing::debug!(
            graph = %self.name,
            nodes = self.nodes.len(),
            previous = previous.len(),
            "Replaced node set"
        );
        previous.into_values().collect()
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &Rc<dyn Node>> {
        self.nodes.values()
    }

    /// Get all node IDs, in member order; IDs repeat if members share one
    pub fn node_ids(&self) -> impl ExactSizeIterator<Item = NodeId> + '_ {
        self.nodes.values().map(|node| node.id())
    }

    /// Get the first member with the given ID
    pub fn node(&self, node_id: NodeId) -> Option<&Rc<dyn Node>> {
        self.nodes.values().find(|node| node.id() == node_id)
    }

    /// Check if a node with the given ID is a member
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.node(node_id).is_some()
    }

    /// Check if this exact node handle is a member
    pub fn contains_node(&self, node: &Rc<dyn Node>) -> bool {
        self.nodes.contains_key(&NodeKey::of(node))
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether every member can be serialized.
    ///
    /// Recomputed on each call. An empty graph is serializable.
    pub fn is_serializable(&self) -> bool {
        self.nodes.values().all(|node| node.is_serializable())
    }

    /// Snapshot of all live connections leaving member nodes
    pub fn edges(&self) -> Vec<Edge> {
        let owners = self.input_owners();
        let mut edges = Vec::new();
        for node in self.nodes.values() {
            for (from_output, output) in node.outputs().iter().enumerate() {
                for input in output.connected_ids() {
                    let owner = owners.get(&input);
                    edges.push(Edge {
                        from_node: node.id(),
                        from_output,
                        output: output.id(),
                        to_node: owner.map(|owner| owner.node),
                        to_input: owner.map(|owner| owner.input),
                        input,
                    });
                }
            }
        }
        edges
    }

    /// Check that no output connects outside the node set.
    ///
    /// Reports the first foreign connection found. Never modifies the graph.
    pub fn validate(&self) -> Result<()> {
        match self.edges().into_iter().find(|edge| !edge.is_internal()) {
            Some(edge) => {
                tracing::warn!(
                    graph = %self.name,
                    node = %edge.from_node,
                    input = %edge.input,
                    "Connection leaves the node set"
                );
                Err(GraphError::ForeignConnection {
                    node: edge.from_node,
                    output: edge.output,
                    input: edge.input,
                })
            }
            None => Ok(()),
        }
    }

    /// Capture the graph as a record.
    ///
    /// Fails if a member is not serializable or a connection leaves the set.
    /// The same graph state always yields the same record.
    pub fn to_record(&self) -> Result<GraphRecord> {
        let owners = self.input_owners();
        let mut record = GraphRecord::new(self.name.clone());

        for node in self.nodes.values() {
            let serializable = node
                .as_serializable()
                .ok_or(GraphError::NotSerializable(node.id()))?;

            let mut node_record = NodeRecord::new(node.id(), serializable.node_type());
            node_record.properties = serializable.properties();
            node_record.subgraph = serializable.subgraph()?;
            node_record.inputs = node
                .inputs()
                .iter()
                .map(|input| InputRecord {
                    key: input.key().map(str::to_string),
                    value: input.value(),
                })
                .collect();

            for output in node.outputs() {
                let mut connections = Vec::new();
                for input in output.connected_ids() {
                    let owner = owners.get(&input).ok_or(GraphError::ForeignConnection {
                        node: node.id(),
                        output: output.id(),
                        input,
                    })?;
                    connections.push(ConnectionRecord {
                        node: owner.node_index,
                        input: owner.input,
                    });
                }
                connections.sort();
                node_record.outputs.push(OutputRecord {
                    key: output.key().map(str::to_string),
                    connections,
                });
            }

            record.nodes.push(node_record);
        }

        Ok(record)
    }

    /// Serialize to RON format
    pub fn to_ron(&self) -> Result<String> {
        Ok(self.to_record()?.to_ron()?)
    }

    /// Rebuild a graph from a record.
    ///
    /// Nodes are constructed through the registry, recorded input values
    /// are set through the normal validated path, node state is restored
    /// with [`SerializableNode::restore`], then connections are rewired.
    pub fn from_record(record: &GraphRecord, registry: &NodeRegistry) -> Result<Self> {
        if record.version != GraphRecord::FORMAT_VERSION {
            return Err(GraphError::UnsupportedVersion {
                found: record.version,
                expected: GraphRecord::FORMAT_VERSION,
            });
        }

        let mut nodes = Vec::with_capacity(record.nodes.len());
        for node_record in &record.nodes {
            let node = registry.construct(node_record)?;
            for (index, input_record) in node_record.inputs.iter().enumerate() {
                let input = node
                    .inputs()
                    .get(index)
                    .ok_or(GraphError::PortIndexOutOfRange {
                        node: node.id(),
                        kind: "input",
                        index,
                    })?;
                if let Some(value) = &input_record.value {
                    if !input.set_value(value.clone()) {
                        tracing::debug!(node = %node.id(), index, "Recorded input value rejected");
                    }
                }
            }
            if let Some(serializable) = node.as_serializable() {
                serializable.restore(&node_record.properties)?;
            }
            nodes.push(node);
        }

        for (node, node_record) in nodes.iter().zip(&record.nodes) {
            for (index, output_record) in node_record.outputs.iter().enumerate() {
                let output = node
                    .outputs()
                    .get(index)
                    .ok_or(GraphError::PortIndexOutOfRange {
                        node: node.id(),
                        kind: "output",
                        index,
                    })?;
                for connection in &output_record.connections {
                    let target = nodes.get(connection.node).ok_or(
                        GraphError::NodeIndexOutOfRange {
                            index: connection.node,
                            count: nodes.len(),
                        },
                    )?;
                    let input = target.inputs().get(connection.input).ok_or(
                        GraphError::PortIndexOutOfRange {
                            node: target.id(),
                            kind: "input",
                            index: connection.input,
                        },
                    )?;
                    output.add_connection(input);
                }
            }
        }

        let mut graph = Self::new(record.name.clone());
        graph.set_node_set(nodes);
        tracing::debug!(graph = %graph.name, nodes = graph.node_count(), "Rebuilt graph");
        Ok(graph)
    }

    /// Deserialize from RON format
    pub fn from_ron(s: &str, registry: &NodeRegistry) -> Result<Self> {
        let record = GraphRecord::from_ron(s)?;
        Self::from_record(&record, registry)
    }

    /// Registry constructor for a graph nested as a node
    pub fn from_node_record(record: &NodeRecord, registry: &NodeRegistry) -> Result<Rc<dyn Node>> {
        let subgraph = record.subgraph.as_ref().ok_or_else(|| {
            GraphError::Construction(format!("graph node {} has no member graph", record.id))
        })?;
        let mut graph = Self::from_record(subgraph, registry)?;
        graph.id = record.id;
        let node: Rc<dyn Node> = Rc::new(graph);
        Ok(node)
    }

    /// Map every member input to its owner and position
    fn input_owners(&self) -> HashMap<PortId, InputOwner> {
        let mut owners = HashMap::new();
        for (node_index, node) in self.nodes.values().enumerate() {
            for (input, port) in node.inputs().iter().enumerate() {
                owners.insert(
                    port.id(),
                    InputOwner {
                        node: node.id(),
                        node_index,
                        input,
                    },
                );
            }
        }
        owners
    }
}

/// Where a member input lives
#[derive(Debug, Clone, Copy)]
struct InputOwner {
    node: NodeId,
    node_index: usize,
    input: usize,
}

impl Node for Graph {
    fn id(&self) -> NodeId {
        self.id
    }

    fn inputs(&self) -> &[Rc<NodeInput>] {
        &[]
    }

    fn outputs(&self) -> &[NodeOutput] {
        &[]
    }

    fn as_serializable(&self) -> Option<&dyn SerializableNode> {
        if Graph::is_serializable(self) {
            Some(self)
        } else {
            None
        }
    }
}

impl SerializableNode for Graph {
    fn node_type(&self) -> &str {
        Self::TYPE
    }

    fn subgraph(&self) -> Result<Option<GraphRecord>> {
        self.to_record().map(Some)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("nodes", &self.node_ids().collect::<Vec<_>>())
            .finish()
    }
}
