// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow control nodes.

use crate::node::{CalculateContext, NodeBehavior, NodeCategory, NodeRegistry, NodeType};
use crate::port::{PortSpec, PortType, PortValue};

/// Passes its value through only while open; a closed gate is not ready
#[derive(Debug, Default, Clone, Copy)]
pub struct Gate;

impl NodeBehavior for Gate {
    fn calculate(&mut self, ctx: &mut CalculateContext<'_>) -> bool {
        let Some(value) = ctx.input(0).cloned() else {
            return false;
        };
        if ctx.set_output(0, value).is_err() {
            return false;
        }
        ctx.input(1).and_then(PortValue::as_bool).unwrap_or(false)
    }
}

/// Create the logic node registry
pub fn create_logic_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(
        NodeType {
            id: "gate".to_string(),
            name: "Gate".to_string(),
            category: NodeCategory::Logic,
            description: "Holds back downstream calculation until Open is true".to_string(),
            inputs: vec![
                PortSpec::input("Value", PortType::Any),
                PortSpec::input("Open", PortType::Bool).with_default(PortValue::Bool(true)),
            ],
            outputs: vec![PortSpec::output("Value", PortType::Any)],
            allow_recursion: false,
            continue_calculation: true,
        },
        || Gate,
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;

    #[test]
    fn test_closed_gate_is_not_ready() {
        let types = [PortType::Any];
        let mut gate = Gate;

        let open = [Some(PortValue::Int(1)), Some(PortValue::Bool(true))];
        let mut ctx = CalculateContext::new(NodeId(0), &open, &types);
        assert!(gate.calculate(&mut ctx));
        assert_eq!(ctx.staged_output(0), Some(&PortValue::Int(1)));

        let closed = [Some(PortValue::Int(1)), Some(PortValue::Bool(false))];
        let mut ctx = CalculateContext::new(NodeId(0), &closed, &types);
        assert!(!gate.calculate(&mut ctx));

        let empty = [None, Some(PortValue::Bool(true))];
        let mut ctx = CalculateContext::new(NodeId(0), &empty, &types);
        assert!(!gate.calculate(&mut ctx));
    }
}
