// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dataflow node graph core for `nodeweave`.
//!
//! Nodes exchange values through ports:
//! - [`NodeInput`] holds one validated value and notifies a single delegate
//!   when it changes
//! - [`NodeOutput`] fans a result out to any number of inputs, holding them
//!   weakly so a connection never keeps a node alive
//! - [`Graph`] owns a set of nodes whose connections stay within the set,
//!   and can serialize it to RON when every member is serializable
//!
//! ## Threading
//!
//! Everything here is single-threaded and synchronous: a send runs every
//! validator and delegate on the calling thread before returning. The types
//! are built on `Rc` and `RefCell` and are neither `Send` nor `Sync`.
//!
//! Propagation is plain recursion through delegates. A feedback loop in the
//! wiring recurses until the stack runs out; nothing here breaks cycles.

pub mod connection;
pub mod error;
pub mod graph;
pub mod input;
pub mod node;
pub mod nodes;
pub mod output;
pub mod port;
pub mod serialization;
pub mod validator;

pub use connection::Edge;
pub use error::GraphError;
pub use graph::Graph;
pub use input::{InputBuilder, InputDelegate, NodeInput};
pub use node::{Node, NodeId, NodeRegistry, SerializableNode};
pub use output::{Delivery, NodeOutput};
pub use port::{PortId, PortType, PortValue};
pub use serialization::{GraphRecord, NodeRecord};
pub use validator::Validator;
