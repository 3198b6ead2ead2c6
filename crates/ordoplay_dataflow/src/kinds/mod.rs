// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node kinds.
//!
//! Hosts register these (and their own kinds) explicitly at startup.

pub mod feedback;
pub mod logic;
pub mod math;

use crate::node::NodeRegistry;

/// Registry with every built-in kind
pub fn create_default_registry() -> NodeRegistry {
    let mut registry = math::create_math_registry();
    registry.merge(logic::create_logic_registry());
    registry.merge(feedback::create_feedback_registry());
    registry
}
