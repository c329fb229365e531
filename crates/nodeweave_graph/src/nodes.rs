// SPDX-License-Identifier: MIT OR Apache-2.0
//! A few concrete nodes, and the registry that rebuilds them.
//!
//! These exist to wire up and exercise the port machinery; real graphs bring
//! their own node catalogs.

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::input::{InputDelegate, NodeInput};
use crate::node::{Node, NodeId, NodeRegistry, SerializableNode};
use crate::output::{Delivery, NodeOutput};
use crate::port::{PortType, PortValue};
use crate::serialization::NodeRecord;
use crate::validator::Validator;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Holds a value and sends it on demand
pub struct ConstantNode {
    id: NodeId,
    value: RefCell<PortValue>,
    outputs: Vec<NodeOutput>,
}

impl ConstantNode {
    /// Type tag
    pub const TYPE: &'static str = "constant";

    /// Create a constant node
    pub fn new(value: PortValue) -> Rc<Self> {
        Self::with_id(NodeId::new(), value)
    }

    fn with_id(id: NodeId, value: PortValue) -> Rc<Self> {
        Rc::new(Self {
            id,
            value: RefCell::new(value),
            outputs: vec![NodeOutput::keyed("value")],
        })
    }

    /// Current value
    pub fn value(&self) -> PortValue {
        self.value.borrow().clone()
    }

    /// Replace the value without sending it
    pub fn set(&self, value: PortValue) {
        *self.value.borrow_mut() = value;
    }

    /// Send the value downstream
    pub fn emit(&self) -> Delivery {
        let value = self.value();
        self.outputs[0].send_result(value)
    }
}

impl Node for ConstantNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn inputs(&self) -> &[Rc<NodeInput>] {
        &[]
    }

    fn outputs(&self) -> &[NodeOutput] {
        &self.outputs
    }

    fn as_serializable(&self) -> Option<&dyn SerializableNode> {
        Some(self)
    }
}

impl SerializableNode for ConstantNode {
    fn node_type(&self) -> &str {
        Self::TYPE
    }

    fn properties(&self) -> IndexMap<String, PortValue> {
        IndexMap::from([("value".to_string(), self.value())])
    }
}

/// Splits a color into `R`, `G`, `B` and `A` float outputs.
///
/// Re-sends all four channels whenever its `color` input accepts a value.
/// Clearing the input clears every channel downstream.
pub struct SplitColorNode {
    id: NodeId,
    inputs: Vec<Rc<NodeInput>>,
    outputs: Vec<NodeOutput>,
}

impl SplitColorNode {
    /// Type tag
    pub const TYPE: &'static str = "split_color";

    /// Create a split node
    pub fn new() -> Rc<Self> {
        Self::with_id(NodeId::new())
    }

    fn with_id(id: NodeId) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Self>| {
            let delegate: Weak<dyn InputDelegate> = this.clone();
            let color = NodeInput::builder()
                .key("color")
                .validator(Validator::of_type(PortType::Color).allow_none())
                .delegate_weak(delegate)
                .build();
            Self {
                id,
                inputs: vec![color],
                outputs: ["R", "G", "B", "A"].map(NodeOutput::keyed).into(),
            }
        })
    }
}

impl InputDelegate for SplitColorNode {
    fn input_did_update(&self, _input: &NodeInput, value: Option<&PortValue>) {
        let Some(value) = value else {
            for output in &self.outputs {
                output.send_result(None);
            }
            return;
        };
        let Some(rgba) = value.as_rgba() else {
            return;
        };
        for (output, channel) in self.outputs.iter().zip(rgba) {
            output.send_result(PortValue::Float(f64::from(channel)));
        }
    }
}

impl Node for SplitColorNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn inputs(&self) -> &[Rc<NodeInput>] {
        &self.inputs
    }

    fn outputs(&self) -> &[NodeOutput] {
        &self.outputs
    }

    fn as_serializable(&self) -> Option<&dyn SerializableNode> {
        Some(self)
    }
}

impl SerializableNode for SplitColorNode {
    fn node_type(&self) -> &str {
        Self::TYPE
    }
}

/// Remembers every value its `in` input accepts, `None` for clears.
///
/// The history is part of the node's serialized state.
pub struct RecorderNode {
    id: NodeId,
    inputs: Vec<Rc<NodeInput>>,
    received: RefCell<Vec<Option<PortValue>>>,
}

impl RecorderNode {
    /// Type tag
    pub const TYPE: &'static str = "recorder";

    /// Create a recorder node
    pub fn new() -> Rc<Self> {
        Self::with_id(NodeId::new())
    }

    fn with_id(id: NodeId) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Self>| {
            let delegate: Weak<dyn InputDelegate> = this.clone();
            Self {
                id,
                inputs: vec![NodeInput::builder().key("in").delegate_weak(delegate).build()],
                received: RefCell::new(Vec::new()),
            }
        })
    }

    /// Values received so far, oldest first
    pub fn received(&self) -> Vec<Option<PortValue>> {
        self.received.borrow().clone()
    }

    const LEN: &'static str = "received.len";

    fn entry_name(index: usize) -> String {
        format!("received.{index}")
    }
}

impl InputDelegate for RecorderNode {
    fn input_did_update(&self, _input: &NodeInput, value: Option<&PortValue>) {
        self.received.borrow_mut().push(value.cloned());
    }
}

impl Node for RecorderNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn inputs(&self) -> &[Rc<NodeInput>] {
        &self.inputs
    }

    fn outputs(&self) -> &[NodeOutput] {
        &[]
    }

    fn as_serializable(&self) -> Option<&dyn SerializableNode> {
        Some(self)
    }
}

impl SerializableNode for RecorderNode {
    fn node_type(&self) -> &str {
        Self::TYPE
    }

    // Clears leave a gap in the numbered entries.
    fn properties(&self) -> IndexMap<String, PortValue> {
        let received = self.received.borrow();
        let len = i64::try_from(received.len()).unwrap_or(i64::MAX);
        let mut properties = IndexMap::from([(Self::LEN.to_string(), PortValue::Int(len))]);
        for (index, value) in received.iter().enumerate() {
            if let Some(value) = value {
                properties.insert(Self::entry_name(index), value.clone());
            }
        }
        properties
    }

    fn restore(&self, properties: &IndexMap<String, PortValue>) -> Result<()> {
        let len = match properties.get(Self::LEN) {
            None => 0,
            Some(PortValue::Int(len)) => usize::try_from(*len).map_err(|_| {
                GraphError::Construction(format!("recorder history length {len} is negative"))
            })?,
            Some(other) => {
                return Err(GraphError::Construction(format!(
                    "recorder history length must be an integer, got {:?}",
                    other.port_type()
                )));
            }
        };
        let received = (0..len)
            .map(|index| properties.get(&Self::entry_name(index)).cloned())
            .collect();
        self.received.replace(received);
        Ok(())
    }
}

/// Registry that rebuilds every node in this module
pub fn default_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(ConstantNode::TYPE, |record: &NodeRecord, _: &NodeRegistry| {
        let value = record
            .property("value")
            .cloned()
            .ok_or_else(|| GraphError::Construction("constant node needs a value".to_string()))?;
        let node: Rc<dyn Node> = ConstantNode::with_id(record.id, value);
        Ok(node)
    });

    registry.register(SplitColorNode::TYPE, |record: &NodeRecord, _: &NodeRegistry| {
        let node: Rc<dyn Node> = SplitColorNode::with_id(record.id);
        Ok(node)
    });

    registry.register(RecorderNode::TYPE, |record: &NodeRecord, _: &NodeRegistry| {
        let node: Rc<dyn Node> = RecorderNode::with_id(record.id);
        Ok(node)
    });

    registry.register(Graph::TYPE, Graph::from_node_record);

    registry
}
