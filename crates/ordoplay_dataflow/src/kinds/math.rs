// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scalar math nodes.

use crate::node::{CalculateContext, NodeBehavior, NodeCategory, NodeRegistry, NodeType};
use crate::port::{PortSpec, PortType, PortValue};

/// Forwards input 0 to output 0; not ready while the input is unset
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl NodeBehavior for Passthrough {
    fn calculate(&mut self, ctx: &mut CalculateContext<'_>) -> bool {
        let Some(value) = ctx.input(0).cloned() else {
            return false;
        };
        ctx.set_output(0, value).is_ok()
    }
}

/// Applies a float operation to inputs 0 and 1
#[derive(Debug, Clone, Copy)]
pub struct BinaryOp {
    op: fn(f32, f32) -> f32,
}

impl BinaryOp {
    /// Create from an operation
    pub fn new(op: fn(f32, f32) -> f32) -> Self {
        Self { op }
    }
}

impl NodeBehavior for BinaryOp {
    fn calculate(&mut self, ctx: &mut CalculateContext<'_>) -> bool {
        let (Some(a), Some(b)) = (ctx.input_float(0), ctx.input_float(1)) else {
            return false;
        };
        ctx.set_output(0, PortValue::Float((self.op)(a, b))).is_ok()
    }
}

fn binary_type(id: &str, name: &str, description: &str, b_default: f32) -> NodeType {
    NodeType {
        id: id.to_string(),
        name: name.to_string(),
        category: NodeCategory::Math,
        description: description.to_string(),
        inputs: vec![
            PortSpec::input("A", PortType::Float).with_default(PortValue::Float(0.0)),
            PortSpec::input("B", PortType::Float).with_default(PortValue::Float(b_default)),
        ],
        outputs: vec![PortSpec::output("Result", PortType::Float)],
        allow_recursion: false,
        continue_calculation: true,
    }
}

/// Create the math node registry
pub fn create_math_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(
        NodeType {
            id: "value".to_string(),
            name: "Value".to_string(),
            category: NodeCategory::Input,
            description: "Constant float value".to_string(),
            inputs: vec![PortSpec::input("Value", PortType::Float).with_default(PortValue::Float(0.0))],
            outputs: vec![PortSpec::output("Value", PortType::Float)],
            allow_recursion: false,
            continue_calculation: true,
        },
        || Passthrough,
    );

    registry.register(
        binary_type("add", "Add", "A + B", 0.0),
        || BinaryOp::new(|a, b| a + b),
    );
    registry.register(
        binary_type("subtract", "Subtract", "A - B", 0.0),
        || BinaryOp::new(|a, b| a - b),
    );
    registry.register(
        binary_type("multiply", "Multiply", "A * B", 1.0),
        || BinaryOp::new(|a, b| a * b),
    );

    registry.register(
        NodeType {
            id: "preview".to_string(),
            name: "Preview".to_string(),
            category: NodeCategory::Output,
            description: "Shows the value it receives".to_string(),
            inputs: vec![PortSpec::input("Value", PortType::Any)],
            outputs: vec![PortSpec::output("Value", PortType::Any)],
            allow_recursion: false,
            continue_calculation: true,
        },
        || Passthrough,
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;

    fn run(registry: &NodeRegistry, id: &str, inputs: &[Option<PortValue>]) -> Option<PortValue> {
        let (node_type, mut behavior) = registry.instantiate(id)?;
        let types: Vec<PortType> = node_type.outputs.iter().map(|p| p.port_type.clone()).collect();
        let mut ctx = CalculateContext::new(NodeId(0), inputs, &types);
        if !behavior.calculate(&mut ctx) {
            return None;
        }
        ctx.staged_output(0).cloned()
    }

    #[test]
    fn test_binary_ops() {
        let registry = create_math_registry();
        let a = Some(PortValue::Float(6.0));
        let b = Some(PortValue::Float(2.0));
        let inputs = [a, b];

        assert_eq!(run(&registry, "add", &inputs), Some(PortValue::Float(8.0)));
        assert_eq!(run(&registry, "subtract", &inputs), Some(PortValue::Float(4.0)));
        assert_eq!(run(&registry, "multiply", &inputs), Some(PortValue::Float(12.0)));
        assert_eq!(run(&registry, "add", &[None, Some(PortValue::Float(1.0))]), None);
    }

    #[test]
    fn test_preview_accepts_any_value() {
        let registry = create_math_registry();
        let text = Some(PortValue::String("hello".into()));
        assert_eq!(run(&registry, "preview", &[text.clone()]), text);
        assert_eq!(run(&registry, "preview", &[None]), None);
    }

    #[test]
    fn test_multiply_defaults_to_identity() {
        let registry = create_math_registry();
        let multiply = registry.get("multiply").unwrap();
        assert_eq!(multiply.inputs[1].default_value, Some(PortValue::Float(1.0)));
    }
}
