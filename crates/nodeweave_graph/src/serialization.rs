// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serialized form of graphs and nodes.
//!
//! Connections are stored as indices (target node in the graph's node list,
//! target input on that node), so a record never depends on the port IDs of
//! the nodes it was written from. Rebuilt nodes get fresh ports.

use crate::node::NodeId;
use crate::port::PortValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Serialized connection target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Index of the target node in [`GraphRecord::nodes`]
    pub node: usize,
    /// Index of the input on the target node
    pub input: usize,
}

/// Serialized input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Input key
    pub key: Option<String>,
    /// Last accepted value
    pub value: Option<PortValue>,
}

/// Serialized output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Output key
    pub key: Option<String>,
    /// Connection targets, sorted
    pub connections: Vec<ConnectionRecord>,
}

/// Serialized node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node ID at the time of writing
    pub id: NodeId,
    /// Type tag used to find the constructor
    pub node_type: String,
    /// Node-private state
    #[serde(default)]
    pub properties: IndexMap<String, PortValue>,
    /// Inputs in node order
    #[serde(default)]
    pub inputs: Vec<InputRecord>,
    /// Outputs in node order
    #[serde(default)]
    pub outputs: Vec<OutputRecord>,
    /// Member graph of a node that is itself a graph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgraph: Option<GraphRecord>,
}

impl NodeRecord {
    /// Create a record with no ports or properties
    pub fn new(id: NodeId, node_type: impl Into<String>) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            properties: IndexMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            subgraph: None,
        }
    }

    /// Get a property by name
    pub fn property(&self, name: &str) -> Option<&PortValue> {
        self.properties.get(name)
    }
}

/// Serialized graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    /// Format version
    pub version: u32,
    /// Graph name
    pub name: String,
    /// Nodes in graph order
    pub nodes: Vec<NodeRecord>,
}

impl GraphRecord {
    /// Current graph format version
    pub const FORMAT_VERSION: u32 = 1;

    /// Create an empty record at the current version
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: Self::FORMAT_VERSION,
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    /// Serialize to RON format
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Deserialize from RON format
    pub fn from_ron(s: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults() {
        let record = GraphRecord::new("Empty");
        assert_eq!(record.version, GraphRecord::FORMAT_VERSION);
        assert!(record.nodes.is_empty());
    }

    #[test]
    fn test_record_serialization() {
        let mut node = NodeRecord::new(NodeId::new(), "constant");
        node.properties.insert("value".to_string(), PortValue::Int(3));
        node.outputs.push(OutputRecord {
            key: Some("value".to_string()),
            connections: vec![ConnectionRecord { node: 1, input: 0 }],
        });
        let mut record = GraphRecord::new("Serialization Test");
        record.nodes.push(node);

        let ron = record.to_ron().unwrap();
        let loaded = GraphRecord::from_ron(&ron).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.nodes[0].property("value"), Some(&PortValue::Int(3)));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let id = NodeId::new();
        let ron = format!(
            "(version: 1, name: \"g\", nodes: [(id: {}, node_type: \"recorder\")])",
            ron::to_string(&id).unwrap()
        );
        let loaded = GraphRecord::from_ron(&ron).unwrap();
        assert_eq!(loaded.nodes[0].id, id);
        assert!(loaded.nodes[0].inputs.is_empty());
        assert!(loaded.nodes[0].subgraph.is_none());
        assert!(!record_text(&loaded).contains("subgraph"));
    }

    fn record_text(record: &GraphRecord) -> String {
        record.to_ron().unwrap()
    }

    #[test]
    fn test_nested_record_serialization() {
        let mut inner = GraphRecord::new("Inner");
        inner.nodes.push(NodeRecord::new(NodeId::new(), "recorder"));
        let mut holder = NodeRecord::new(NodeId::new(), "graph");
        holder.subgraph = Some(inner.clone());
        let mut outer = GraphRecord::new("Outer");
        outer.nodes.push(holder);

        let loaded = GraphRecord::from_ron(&record_text(&outer)).unwrap();
        assert_eq!(loaded.nodes[0].subgraph.as_ref(), Some(&inner));
    }
}
