// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node outputs: fan-out of results to downstream inputs.
//!
//! Connections are weak references keyed by the target's [`PortId`]. An
//! output never keeps an input alive; once the input's node is dropped the
//! entry stops upgrading and is reclaimed the next time the output is used.

use crate::input::NodeInput;
use crate::port::{PortId, PortValue};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Outcome of one [`NodeOutput::send_result`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Inputs that accepted the value
    pub accepted: usize,
    /// Inputs whose validator rejected the value
    pub rejected: usize,
}

impl Delivery {
    /// Number of inputs the value was offered to
    pub fn total(&self) -> usize {
        self.accepted + self.rejected
    }
}

/// An output of a node.
///
/// The optional key names which part of the node's result it carries, for
/// example `R` on a color splitting node.
pub struct NodeOutput {
    id: PortId,
    key: Option<String>,
    connections: RefCell<IndexMap<PortId, Weak<NodeInput>>>,
}

impl NodeOutput {
    /// Create an output without a key, for nodes with a single output
    pub fn new() -> Self {
        Self {
            id: PortId::new(),
            key: None,
            connections: RefCell::new(IndexMap::new()),
        }
    }

    /// Create an output with a key
    pub fn keyed(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::new()
        }
    }

    /// Unique port ID
    pub fn id(&self) -> PortId {
        self.id
    }

    /// The optional key of this output on its node
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Add a downstream connection.
    ///
    /// Returns `false` if the input was already connected.
    pub fn add_connection(&self, input: &Rc<NodeInput>) -> bool {
        let mut connections = self.connections.borrow_mut();
        if connections.contains_key(&input.id()) {
            return false;
        }
        connections.insert(input.id(), Rc::downgrade(input));
        true
    }

    /// Remove a downstream connection.
    ///
    /// Returns `false` if the input was not connected.
    pub fn remove_connection(&self, input: &NodeInput) -> bool {
        self.connections
            .borrow_mut()
            .shift_remove(&input.id())
            .is_some()
    }

    /// Drop every connection, returning how many live ones were removed
    pub fn disconnect_all(&self) -> usize {
        self.prune();
        let mut connections = self.connections.borrow_mut();
        let count = connections.len();
        connections.clear();
        count
    }

    /// Send the result to each connected input.
    ///
    /// Every live input gets exactly one [`NodeInput::set_value`] call. A
    /// rejection by one input does not affect the others. Callers must not
    /// depend on delivery order. Sending `None` asks each input to clear.
    ///
    /// The target list is taken before delivery starts, so delegates may
    /// rewire this output while it is sending. Inputs added during the send
    /// receive the next result, and an input whose node is dropped mid-send
    /// is skipped.
    pub fn send_result(&self, result: impl Into<Option<PortValue>>) -> Delivery {
        let result = result.into();
        let targets: Vec<Weak<NodeInput>> = {
            self.prune();
            self.connections.borrow().values().cloned().collect()
        };

        let mut delivery = Delivery::default();
        for target in targets {
            let Some(input) = target.upgrade() else {
                continue;
            };
            if input.set_value(result.clone()) {
                delivery.accepted += 1;
            } else {
                delivery.rejected += 1;
            }
        }
        delivery
    }

    /// Reclaim connections whose input no longer exists.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&self) -> usize {
        let mut connections = self.connections.borrow_mut();
        let before = connections.len();
        connections.retain(|_, input| input.strong_count() > 0);
        let reclaimed = before - connections.len();
        if reclaimed > 0 {
            tracing::trace!(output = %self.id, reclaimed, "Reclaimed dropped connections");
        }
        reclaimed
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.prune();
        self.connections.borrow().len()
    }

    /// Check if an input is connected to this output
    pub fn is_connected_to(&self, input: &NodeInput) -> bool {
        self.connections
            .borrow()
            .get(&input.id())
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Live connected inputs, in connection order.
    ///
    /// The returned handles are strong; holding on to them keeps the inputs
    /// alive, so drop them once done.
    pub fn connections(&self) -> Vec<Rc<NodeInput>> {
        self.prune();
        self.connections
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// IDs of the live connected inputs, in connection order
    pub fn connected_ids(&self) -> Vec<PortId> {
        self.prune();
        self.connections.borrow().keys().copied().collect()
    }
}

impl Default for NodeOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeOutput")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("connections", &self.connections.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputDelegate;
    use crate::validator::Validator;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counter {
        calls: Cell<usize>,
    }

    impl InputDelegate for Counter {
        fn input_did_update(&self, _input: &NodeInput, _value: Option<&PortValue>) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    #[test]
    fn test_send_reaches_every_connection_once() {
        let counter = Rc::new(Counter::default());
        let output = NodeOutput::keyed("out");
        let inputs: Vec<_> = (0..4)
            .map(|_| NodeInput::builder().delegate(&counter).build())
            .collect();
        for input in &inputs {
            output.add_connection(input);
        }

        let delivery = output.send_result(PortValue::Int(9));
        assert_eq!(delivery, Delivery { accepted: 4, rejected: 0 });
        assert_eq!(counter.calls.get(), 4);
        assert!(inputs.iter().all(|input| input.value() == Some(PortValue::Int(9))));
    }

    #[test]
    fn test_even_and_unvalidated_inputs() {
        let output = NodeOutput::keyed("out");
        let a = NodeInput::builder().key("a").validator(Validator::even()).build();
        let b = NodeInput::keyed("b");
        output.add_connection(&a);
        output.add_connection(&b);

        output.send_result(PortValue::Int(4));
        assert_eq!(a.value(), Some(PortValue::Int(4)));
        assert_eq!(b.value(), Some(PortValue::Int(4)));

        let delivery = output.send_result(PortValue::Int(3));
        assert_eq!(delivery, Delivery { accepted: 1, rejected: 1 });
        assert_eq!(a.value(), Some(PortValue::Int(4)));
        assert_eq!(b.value(), Some(PortValue::Int(3)));
    }

    #[test]
    fn test_sending_none_clears_inputs_that_allow_it() {
        let output = NodeOutput::new();
        let open = NodeInput::keyed("open");
        let strict = NodeInput::builder().validator(Validator::numeric()).build();
        output.add_connection(&open);
        output.add_connection(&strict);
        output.send_result(PortValue::Int(2));

        let delivery = output.send_result(None);
        assert_eq!(delivery, Delivery { accepted: 1, rejected: 1 });
        assert!(open.value().is_none());
        assert_eq!(strict.value(), Some(PortValue::Int(2)));
    }

    #[test]
    fn test_duplicate_add_delivers_once() {
        let counter = Rc::new(Counter::default());
        let output = NodeOutput::new();
        let input = NodeInput::builder().delegate(&counter).build();

        assert!(output.add_connection(&input));
        assert!(!output.add_connection(&input));
        assert_eq!(output.connection_count(), 1);

        output.send_result(PortValue::Bool(true));
        assert_eq!(counter.calls.get(), 1);
    }

    #[test]
    fn test_remove_connection() {
        let output = NodeOutput::new();
        let connected = NodeInput::keyed("connected");
        let stranger = NodeInput::keyed("stranger");
        output.add_connection(&connected);

        assert!(!output.remove_connection(&stranger));
        assert!(output.remove_connection(&connected));
        assert!(!output.remove_connection(&connected));

        let delivery = output.send_result(PortValue::Int(1));
        assert_eq!(delivery.total(), 0);
        assert!(connected.value().is_none());
    }

    #[test]
    fn test_connection_does_not_own_input() {
        let output = NodeOutput::new();
        let kept = NodeInput::keyed("kept");
        let dropped = NodeInput::keyed("dropped");
        output.add_connection(&kept);
        output.add_connection(&dropped);
        assert_eq!(Rc::strong_count(&dropped), 1);
        assert_eq!(output.connection_count(), 2);

        drop(dropped);
        let delivery = output.send_result(PortValue::Int(2));
        assert_eq!(delivery.total(), 1);
        assert_eq!(output.connection_count(), 1);
        assert_eq!(kept.value(), Some(PortValue::Int(2)));
    }

    #[test]
    fn test_prune_reports_reclaimed() {
        let output = NodeOutput::new();
        for _ in 0..3 {
            let input = NodeInput::keyed("temp");
            output.add_connection(&input);
        }
        assert_eq!(output.prune(), 3);
        assert_eq!(output.prune(), 0);
        assert!(output.connected_ids().is_empty());
    }

    #[test]
    fn test_disconnect_all() {
        let output = NodeOutput::new();
        let a = NodeInput::keyed("a");
        let b = NodeInput::keyed("b");
        output.add_connection(&a);
        output.add_connection(&b);
        assert!(output.is_connected_to(&a));

        assert_eq!(output.disconnect_all(), 2);
        assert!(!output.is_connected_to(&a));
        assert!(output.connections().is_empty());
    }

    struct Unhook {
        output: Rc<NodeOutput>,
        other: RefCell<Option<Rc<NodeInput>>>,
    }

    impl InputDelegate for Unhook {
        fn input_did_update(&self, input: &NodeInput, _value: Option<&PortValue>) {
            self.output.remove_connection(input);
            // Dropping the only handle to the other input kills it mid-send.
            self.other.borrow_mut().take();
        }
    }

    #[test]
    fn test_rewiring_during_send() {
        let output = Rc::new(NodeOutput::new());
        let unhook = Rc::new(Unhook {
            output: output.clone(),
            other: RefCell::new(None),
        });
        let first = NodeInput::builder().delegate(&unhook).build();
        let second = NodeInput::keyed("second");
        let second_weak = Rc::downgrade(&second);
        output.add_connection(&first);
        output.add_connection(&second);
        *unhook.other.borrow_mut() = Some(second);

        let delivery = output.send_result(PortValue::Int(1));
        assert_eq!(delivery.total(), 1);
        assert!(second_weak.upgrade().is_none());
        assert_eq!(output.connection_count(), 0);
    }
}
