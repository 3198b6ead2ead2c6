// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an input port: owning node plus port index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputRef {
    /// Owning node
    pub node: NodeId,
    /// Index into the node's inputs
    pub index: usize,
}

impl InputRef {
    /// Create a new input handle
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.in[{}]", self.node, self.index)
    }
}

/// Handle to an output port: owning node plus port index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    /// Owning node
    pub node: NodeId,
    /// Index into the node's outputs
    pub index: usize,
}

impl OutputRef {
    /// Create a new output handle
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.out[{}]", self.node, self.index)
    }
}

/// Either kind of port handle, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRef {
    /// An input port
    Input(InputRef),
    /// An output port
    Output(OutputRef),
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(input) => input.fmt(f),
            Self::Output(output) => output.fmt(f),
        }
    }
}

impl From<InputRef> for PortRef {
    fn from(input: InputRef) -> Self {
        Self::Input(input)
    }
}

impl From<OutputRef> for PortRef {
    fn from(output: OutputRef) -> Self {
        Self::Output(output)
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
    /// Direction-less port; only connects to another direction-less port
    None,
}

impl PortDirection {
    /// Check whether a port with this direction may feed a port with `target`
    pub fn can_feed(self, target: PortDirection) -> bool {
        matches!(
            (self, target),
            (Self::Output, Self::Input) | (Self::None, Self::None)
        )
    }
}

/// Data type that can flow through ports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// Execution flow
    Exec,
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
    /// Any type (for generic nodes)
    Any,
    /// Custom type
    Custom(String),
}

impl PortType {
    /// Check if a value of this type may be assigned to a port of type `target`
    ///
    /// Assignability is directional: a `Float` output may feed a `Vector3`
    /// input (splatted), but a `Vector3` output may not feed a `Float` input.
    pub fn is_assignable_to(&self, target: &PortType) -> bool {
        if matches!(self, Self::Any) || matches!(target, Self::Any) {
            return true;
        }

        if self == target {
            return true;
        }

        match (self, target) {
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => true,
            (Self::Float, Self::Vector2 | Self::Vector3 | Self::Vector4) => true,
            (Self::Vector2, Self::Vector3 | Self::Vector4) => true,
            (Self::Vector3, Self::Vector4) => true,
            (Self::Color, Self::Vector4) | (Self::Vector4, Self::Color) => true,
            _ => false,
        }
    }
}

/// Value that can be stored in a port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
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

    /// Check whether this value may be stored in a port declared as `port_type`
    pub fn fits(&self, port_type: &PortType) -> bool {
        matches!(port_type, PortType::Any) || self.port_type() == *port_type
    }

    /// Convert into the representation of `target`
    ///
    /// Returns `None` when the conversion is not one of the implicit
    /// conversions allowed by [`PortType::is_assignable_to`].
    pub fn convert_to(&self, target: &PortType) -> Option<PortValue> {
        if self.fits(target) {
            return Some(self.clone());
        }

        let converted = match (self, target) {
            (Self::Int(v), PortType::Float) => Self::Float(*v as f32),
            (Self::Float(v), PortType::Int) => Self::Int(v.round() as i32),
            (Self::Float(v), PortType::Vector2) => Self::Vector2([*v; 2]),
            (Self::Float(v), PortType::Vector3) => Self::Vector3([*v; 3]),
            (Self::Float(v), PortType::Vector4) => Self::Vector4([*v; 4]),
            (Self::Vector2([x, y]), PortType::Vector3) => Self::Vector3([*x, *y, 0.0]),
            (Self::Vector2([x, y]), PortType::Vector4) => Self::Vector4([*x, *y, 0.0, 0.0]),
            (Self::Vector3([x, y, z]), PortType::Vector4) => Self::Vector4([*x, *y, *z, 0.0]),
            (Self::Color(c), PortType::Vector4) => Self::Vector4(*c),
            (Self::Vector4(v), PortType::Color) => Self::Color(*v),
            _ => return None,
        };
        Some(converted)
    }

    /// Read as a float, widening integers
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Read as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Declaration of a port on a node type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSpec {
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub port_type: PortType,
    /// Default value (for inputs)
    pub default_value: Option<PortValue>,
}

impl PortSpec {
    /// Create a new input port
    pub fn input(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            port_type,
            default_value: None,
        }
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            port_type,
            default_value: None,
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: PortValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Make the port direction-less
    pub fn wildcard(mut self) -> Self {
        self.direction = PortDirection::None;
        self
    }
}

/// Input port instance on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputPort {
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Declared type
    pub port_type: PortType,
    /// Local value used while unconnected
    pub default_value: Option<PortValue>,
    /// Source output, at most one
    pub(crate) connection: Option<OutputRef>,
}

impl InputPort {
    /// Instantiate from a declaration
    pub fn from_spec(spec: &PortSpec) -> Self {
        Self {
            name: spec.name.clone(),
            direction: spec.direction,
            port_type: spec.port_type.clone(),
            default_value: spec.default_value.clone(),
            connection: None,
        }
    }

    /// Source output this input is wired to
    pub fn connection(&self) -> Option<OutputRef> {
        self.connection
    }

    /// Check if the input has a live connection
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

/// Output port instance on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPort {
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Declared type
    pub port_type: PortType,
    /// Target inputs fed by this output
    pub(crate) connections: Vec<InputRef>,
    /// Value from the last successful calculation
    pub(crate) value: Option<PortValue>,
}

impl OutputPort {
    /// Instantiate from a declaration
    pub fn from_spec(spec: &PortSpec) -> Self {
        Self {
            name: spec.name.clone(),
            direction: spec.direction,
            port_type: spec.port_type.clone(),
            connections: Vec::new(),
            value: None,
        }
    }

    /// Inputs fed by this output
    pub fn connections(&self) -> &[InputRef] {
        &self.connections
    }

    /// Cached value, unset until the owning node calculates
    pub fn value(&self) -> Option<&PortValue> {
        self.value.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignability_is_directional() {
        assert!(PortType::Float.is_assignable_to(&PortType::Vector3));
        assert!(!PortType::Vector3.is_assignable_to(&PortType::Float));
        assert!(PortType::Vector2.is_assignable_to(&PortType::Vector4));
        assert!(!PortType::Vector4.is_assignable_to(&PortType::Vector2));
        assert!(!PortType::Bool.is_assignable_to(&PortType::String));
    }

    #[test]
    fn test_any_accepts_everything() {
        assert!(PortType::Custom("Mesh".into()).is_assignable_to(&PortType::Any));
        assert!(PortType::Any.is_assignable_to(&PortType::Exec));
        assert!(!PortType::Custom("Mesh".into()).is_assignable_to(&PortType::Custom("Pose".into())));
    }

    #[test]
    fn test_value_conversion() {
        assert_eq!(
            PortValue::Int(4).convert_to(&PortType::Float),
            Some(PortValue::Float(4.0))
        );
        assert_eq!(
            PortValue::Float(2.0).convert_to(&PortType::Vector3),
            Some(PortValue::Vector3([2.0, 2.0, 2.0]))
        );
        assert_eq!(
            PortValue::Bool(true).convert_to(&PortType::Any),
            Some(PortValue::Bool(true))
        );
        assert_eq!(PortValue::String("x".into()).convert_to(&PortType::Float), None);
    }

    #[test]
    fn test_direction_roles() {
        assert!(PortDirection::Output.can_feed(PortDirection::Input));
        assert!(PortDirection::None.can_feed(PortDirection::None));
        assert!(!PortDirection::Input.can_feed(PortDirection::Output));
        assert!(!PortDirection::Output.can_feed(PortDirection::None));
    }
}
