// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port identities and the values that flow between ports.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an input or output port.
///
/// Minted once per port at construction and never reassigned, so two ports
/// compare equal by id only if they are the same port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(Uuid);

impl PortId {
    /// Create a new random port ID
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of value that can flow through ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// Color (RGBA)
    Color,
    /// String value
    String,
    /// Any type (for generic inputs)
    Any,
}

impl PortType {
    /// Check if a value of type `other` is acceptable where `self` is expected.
    ///
    /// This is exact matching plus the lossless widenings a node author would
    /// expect: `Any` on either side, `Int` into `Float`, and `Color`/`Vector4`
    /// interchangeably.
    pub fn accepts(&self, other: PortType) -> bool {
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        if *self == other {
            return true;
        }

        matches!(
            (self, other),
            (Self::Float, Self::Int) | (Self::Color, Self::Vector4) | (Self::Vector4, Self::Color)
        )
    }

    /// Check if this is a scalar numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

/// Value carried from an output to its connected inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// Color
    Color([f32; 4]),
    /// String
    String(String),
}

impl PortValue {
    /// Get the port type for this value
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Bool(_) => PortType::Bool,
            Self::Int(_) => PortType::Int,
            Self::Float(_) => PortType::Float,
            Self::Vector2(_) => PortType::Vector2,
            Self::Vector3(_) => PortType::Vector3,
            Self::Vector4(_) => PortType::Vector4,
            Self::Color(_) => PortType::Color,
            Self::String(_) => PortType::String,
        }
    }

    /// The four components of a color or 4D vector.
    pub fn as_rgba(&self) -> Option<[f32; 4]> {
        match self {
            Self::Color(c) | Self::Vector4(c) => Some(*c),
            _ => None,
        }
    }
}

impl From<bool> for PortValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PortValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PortValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PortValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PortValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}
