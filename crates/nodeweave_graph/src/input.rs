// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node inputs: validated value slots with change notification.
//!
//! An input is owned by its node through an `Rc`. Outputs only ever hold a
//! [`Weak`] to it, so connecting an input never extends its lifetime.

use crate::port::{PortId, PortValue};
use crate::validator::Validator;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Receives updates from an input.
///
/// Called synchronously from [`NodeInput::set_value`] after the value is
/// stored; `None` means the input was cleared. Setting the same input again
/// from inside the callback is allowed but recurses; nothing breaks feedback
/// loops.
pub trait InputDelegate {
    /// The input value was changed
    fn input_did_update(&self, input: &NodeInput, value: Option<&PortValue>);
}

/// A typed, validated input of a node
pub struct NodeInput {
    id: PortId,
    key: Option<String>,
    value: RefCell<Option<PortValue>>,
    validator: Option<Validator>,
    delegate: RefCell<Option<Weak<dyn InputDelegate>>>,
}

impl NodeInput {
    /// Start building an input
    pub fn builder() -> InputBuilder {
        InputBuilder::default()
    }

    /// Create an unvalidated input with a key
    pub fn keyed(key: impl Into<String>) -> Rc<Self> {
        Self::builder().key(key).build()
    }

    /// Unique port ID
    pub fn id(&self) -> PortId {
        self.id
    }

    /// The optional key of this input on its node
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The validator fixed at construction, if any
    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    /// The last accepted value, or `None` if nothing was ever accepted
    pub fn value(&self) -> Option<PortValue> {
        self.value.borrow().clone()
    }

    /// Whether a value has been accepted yet
    pub fn has_value(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Check a candidate against the validator without touching state.
    ///
    /// `None` asks whether the input may be cleared.
    pub fn value_is_valid<'a>(&self, candidate: impl Into<Option<&'a PortValue>>) -> bool {
        let candidate = candidate.into();
        self.validator
            .as_ref()
            .map_or(true, |validator| validator.check(candidate))
    }

    /// Validate and store a value, then notify the delegate.
    ///
    /// `None` clears the input, subject to the same validation. Returns
    /// `false` when the validator rejects the candidate. Rejection is silent:
    /// the stored value stays as it was and the delegate is not called.
    /// Setting a value equal to the stored one notifies again.
    pub fn set_value(&self, candidate: impl Into<Option<PortValue>>) -> bool {
        let candidate = candidate.into();
        if !self.value_is_valid(candidate.as_ref()) {
            tracing::trace!(
                input = %self.id,
                key = self.key.as_deref().unwrap_or("-"),
                value_type = ?candidate.as_ref().map(PortValue::port_type),
                "Input rejected value"
            );
            return false;
        }

        self.value.replace(candidate.clone());

        // No borrow may be live while the delegate runs, it can re-enter.
        let delegate = self.delegate.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(delegate) = delegate {
            delegate.input_did_update(self, candidate.as_ref());
        }
        true
    }

    /// Point notifications at `delegate` without owning it
    pub fn set_delegate<D: InputDelegate + 'static>(&self, delegate: &Rc<D>) {
        *self.delegate.borrow_mut() = Some(downgrade_delegate(delegate));
    }

    /// Stop notifying anyone
    pub fn clear_delegate(&self) {
        self.delegate.borrow_mut().take();
    }

    /// Whether a delegate is set and still alive
    pub fn has_delegate(&self) -> bool {
        self.delegate
            .borrow()
            .as_ref()
            .is_some_and(|delegate| delegate.strong_count() > 0)
    }
}

impl fmt::Debug for NodeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeInput")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("value", &*self.value.borrow())
            .field("validator", &self.validator)
            .field("has_delegate", &self.has_delegate())
            .finish()
    }
}

/// Builder for [`NodeInput`]
#[derive(Default)]
pub struct InputBuilder {
    key: Option<String>,
    validator: Option<Validator>,
    delegate: Option<Weak<dyn InputDelegate>>,
}

impl InputBuilder {
    /// Set the key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the validator
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Set the delegate
    pub fn delegate<D: InputDelegate + 'static>(mut self, delegate: &Rc<D>) -> Self {
        self.delegate = Some(downgrade_delegate(delegate));
        self
    }

    /// Set the delegate from a weak handle, e.g. inside `Rc::new_cyclic`
    pub fn delegate_weak(mut self, delegate: Weak<dyn InputDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Finish the input
    pub fn build(self) -> Rc<NodeInput> {
        Rc::new(NodeInput {
            id: PortId::new(),
            key: self.key,
            value: RefCell::new(None),
            validator: self.validator,
            delegate: RefCell::new(self.delegate),
        })
    }
}

fn downgrade_delegate<D: InputDelegate + 'static>(delegate: &Rc<D>) -> Weak<dyn InputDelegate> {
    let weak: Weak<D> = Rc::downgrade(delegate);
    weak
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Log {
        updates: RefCell<Vec<Option<PortValue>>>,
    }

    impl InputDelegate for Log {
        fn input_did_update(&self, _input: &NodeInput, value: Option<&PortValue>) {
            self.updates.borrow_mut().push(value.cloned());
        }
    }

    #[test]
    fn test_accepted_value_is_stored_and_notified_once() {
        let log = Rc::new(Log::default());
        let input = NodeInput::builder()
            .key("r")
            .validator(Validator::numeric())
            .delegate(&log)
            .build();

        assert_eq!(input.key(), Some("r"));
        assert!(input.value().is_none());

        assert!(input.set_value(PortValue::Int(5)));
        assert_eq!(input.value(), Some(PortValue::Int(5)));
        assert_eq!(*log.updates.borrow(), vec![Some(PortValue::Int(5))]);
    }

    #[test]
    fn test_rejected_value_is_silent() {
        let log = Rc::new(Log::default());
        let input = NodeInput::builder()
            .key("r")
            .validator(Validator::numeric())
            .delegate(&log)
            .build();

        input.set_value(PortValue::Int(5));
        assert!(!input.set_value(PortValue::from("x")));
        assert_eq!(input.value(), Some(PortValue::Int(5)));
        assert_eq!(log.updates.borrow().len(), 1);
    }

    #[test]
    fn test_rejection_before_any_value_leaves_it_empty() {
        let input = NodeInput::builder().validator(Validator::even()).build();
        assert!(!input.set_value(PortValue::Int(1)));
        assert!(!input.has_value());
    }

    #[test]
    fn test_no_validator_accepts_anything() {
        let input = NodeInput::keyed("in");
        assert!(input.set_value(PortValue::Bool(true)));
        assert!(input.set_value(PortValue::from("text")));
        assert_eq!(input.value(), Some(PortValue::from("text")));
    }

    #[test]
    fn test_value_is_valid_is_pure() {
        let log = Rc::new(Log::default());
        let input = NodeInput::builder()
            .validator(Validator::numeric())
            .delegate(&log)
            .build();
        input.set_value(PortValue::Int(1));

        for _ in 0..3 {
            assert!(input.value_is_valid(&PortValue::Float(2.0)));
            assert!(!input.value_is_valid(&PortValue::from("x")));
        }
        assert_eq!(input.value(), Some(PortValue::Int(1)));
        assert_eq!(log.updates.borrow().len(), 1);
    }

    #[test]
    fn test_clearing_goes_through_validation_and_notifies() {
        let log = Rc::new(Log::default());
        let input = NodeInput::builder().key("in").delegate(&log).build();
        input.set_value(PortValue::Int(3));

        assert!(input.value_is_valid(None));
        assert!(input.set_value(None));
        assert!(!input.has_value());
        assert_eq!(*log.updates.borrow(), vec![Some(PortValue::Int(3)), None]);
    }

    #[test]
    fn test_validator_can_refuse_clearing() {
        let log = Rc::new(Log::default());
        let strict = NodeInput::builder()
            .validator(Validator::numeric())
            .delegate(&log)
            .build();
        strict.set_value(PortValue::Int(3));

        assert!(!strict.value_is_valid(None));
        assert!(!strict.set_value(None));
        assert_eq!(strict.value(), Some(PortValue::Int(3)));
        assert_eq!(log.updates.borrow().len(), 1);

        let lenient = NodeInput::builder()
            .validator(Validator::numeric().allow_none())
            .build();
        lenient.set_value(PortValue::Int(3));
        assert!(lenient.set_value(None));
        assert_eq!(lenient.value(), None);
    }

    #[test]
    fn test_same_value_notifies_again() {
        let log = Rc::new(Log::default());
        let input = NodeInput::builder().delegate(&log).build();
        input.set_value(PortValue::Int(7));
        input.set_value(PortValue::Int(7));
        assert_eq!(log.updates.borrow().len(), 2);
    }

    #[test]
    fn test_delegate_is_not_owned() {
        let log = Rc::new(Log::default());
        let input = NodeInput::keyed("in");
        input.set_delegate(&log);
        assert!(input.has_delegate());
        assert_eq!(Rc::strong_count(&log), 1);

        drop(log);
        assert!(!input.has_delegate());
        // A dead delegate is skipped, the value is still stored.
        assert!(input.set_value(PortValue::Int(1)));
        assert_eq!(input.value(), Some(PortValue::Int(1)));
    }

    #[test]
    fn test_clear_delegate() {
        let log = Rc::new(Log::default());
        let input = NodeInput::builder().delegate(&log).build();
        input.clear_delegate();
        input.set_value(PortValue::Int(1));
        assert!(log.updates.borrow().is_empty());
    }

    struct Clamp {
        input: RefCell<Weak<NodeInput>>,
        calls: Cell<usize>,
    }

    impl InputDelegate for Clamp {
        fn input_did_update(&self, input: &NodeInput, value: Option<&PortValue>) {
            self.calls.set(self.calls.get() + 1);
            assert_eq!(input.value().as_ref(), value);
            if let Some(PortValue::Int(v)) = value {
                if *v > 10 {
                    if let Some(input) = self.input.borrow().upgrade() {
                        input.set_value(PortValue::Int(10));
                    }
                }
            }
        }
    }

    #[test]
    fn test_delegate_may_reenter_the_input() {
        let clamp = Rc::new(Clamp {
            input: RefCell::new(Weak::new()),
            calls: Cell::new(0),
        });
        let input = NodeInput::builder().delegate(&clamp).build();
        *clamp.input.borrow_mut() = Rc::downgrade(&input);

        input.set_value(PortValue::Int(42));
        assert_eq!(input.value(), Some(PortValue::Int(10)));
        assert_eq!(clamp.calls.get(), 2);
    }
}
