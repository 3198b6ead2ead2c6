// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nodes meant to sit inside loops.
//!
//! These types opt into recursion, so connections that close a cycle
//! through them are accepted.

use crate::node::{CalculateContext, NodeBehavior, NodeCategory, NodeRegistry, NodeType};
use crate::port::{PortSpec, PortType, PortValue};

/// Adds its input to the value fed back around the loop
///
/// On the first pass of a recalculation the loop partner has not produced
/// anything yet, so `Feedback` falls back to its local value.
#[derive(Debug, Default, Clone, Copy)]
pub struct Accumulator {
    iterations: u32,
}

impl Accumulator {
    /// Successful calculations since creation
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl NodeBehavior for Accumulator {
    fn calculate(&mut self, ctx: &mut CalculateContext<'_>) -> bool {
        let input = ctx.input_float(0).unwrap_or(0.0);
        let feedback = ctx.input_float(1).unwrap_or(0.0);
        if ctx.set_output(0, PortValue::Float(input + feedback)).is_err() {
            return false;
        }
        self.iterations += 1;
        tracing::trace!("{} accumulated {} iterations", ctx.node(), self.iterations);
        true
    }
}

/// Create the feedback node registry
pub fn create_feedback_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(
        NodeType {
            id: "accumulator".to_string(),
            name: "Accumulator".to_string(),
            category: NodeCategory::Math,
            description: "In + Feedback, allowed to close a loop".to_string(),
            inputs: vec![
                PortSpec::input("In", PortType::Float).with_default(PortValue::Float(0.0)),
                PortSpec::input("Feedback", PortType::Float).with_default(PortValue::Float(0.0)),
            ],
            outputs: vec![PortSpec::output("Sum", PortType::Float)],
            allow_recursion: true,
            continue_calculation: true,
        },
        Accumulator::default,
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;

    #[test]
    fn test_accumulator_sums_inputs() {
        let types = [PortType::Float];
        let inputs = [Some(PortValue::Float(2.0)), Some(PortValue::Float(5.0))];
        let mut acc = Accumulator::default();
        let mut ctx = CalculateContext::new(NodeId(1), &inputs, &types);

        assert!(acc.calculate(&mut ctx));
        assert_eq!(ctx.staged_output(0), Some(&PortValue::Float(7.0)));
        assert_eq!(acc.iterations(), 1);
    }

    #[test]
    fn test_accumulator_type_allows_recursion() {
        let registry = create_feedback_registry();
        assert!(registry.get("accumulator").unwrap().allow_recursion);
    }
}
