// SPDX-License-Identifier: MIT OR Apache-2.0
//! Accept/reject predicates attached to inputs.

use crate::port::{PortType, PortValue};
use std::fmt;
use std::rc::Rc;

/// An immutable predicate deciding whether an input accepts a candidate.
///
/// Candidates are optional: sending "no result" asks the input to clear, and
/// the validator decides that too. The built-in validators reject absence;
/// [`Validator::allow_none`] lets it through.
///
/// Validators are evaluated on every set attempt and on every
/// [`NodeInput::value_is_valid`](crate::input::NodeInput::value_is_valid)
/// query, so the wrapped function must be free of observable side effects.
/// Cloning shares the same function.
#[derive(Clone)]
pub struct Validator {
    check: Rc<dyn Fn(&PortValue) -> bool>,
    accepts_none: bool,
    label: &'static str,
}

impl Validator {
    /// Wrap an arbitrary predicate over present values
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&PortValue) -> bool + 'static,
    {
        Self::labeled("custom", check)
    }

    /// Accept values whose type the given port type accepts
    pub fn of_type(expected: PortType) -> Self {
        Self::labeled("of_type", move |value| expected.accepts(value.port_type()))
    }

    /// Accept integer and float values
    pub fn numeric() -> Self {
        Self::labeled("numeric", |value| value.port_type().is_numeric())
    }

    /// Accept integral values divisible by two
    pub fn even() -> Self {
        Self::labeled("even", |value| matches!(value, PortValue::Int(v) if v % 2 == 0))
    }

    /// Also accept the absence of a value
    pub fn allow_none(mut self) -> Self {
        self.accepts_none = true;
        self
    }

    /// Run the predicate
    pub fn check<'a>(&self, candidate: impl Into<Option<&'a PortValue>>) -> bool {
        match candidate.into() {
            Some(value) => (self.check)(value),
            None => self.accepts_none,
        }
    }

    fn labeled<F>(label: &'static str, check: F) -> Self
    where
        F: Fn(&PortValue) -> bool + 'static,
    {
        Self {
            check: Rc::new(check),
            accepts_none: false,
            label,
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("label", &self.label)
            .field("accepts_none", &self.accepts_none)
            .finish()
    }
}
