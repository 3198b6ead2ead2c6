// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::error::GraphError;
use crate::port::{InputPort, OutputPort, PortSpec, PortType, PortValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle to a node; never reused within a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Input nodes (constants, parameters)
    Input,
    /// Output nodes (result, preview)
    Output,
    /// Math operations
    Math,
    /// Logic/flow control
    Logic,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// Node type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Input ports
    pub inputs: Vec<PortSpec>,
    /// Output ports
    pub outputs: Vec<PortSpec>,
    /// Whether instances may take part in a dependency cycle
    pub allow_recursion: bool,
    /// Whether a successful calculation immediately cascades downstream
    pub continue_calculation: bool,
}

impl NodeType {
    /// Create a type with no ports and default flags
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            allow_recursion: false,
            continue_calculation: true,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append an input port
    pub fn with_input(mut self, port: PortSpec) -> Self {
        self.inputs.push(port);
        self
    }

    /// Append an output port
    pub fn with_output(mut self, port: PortSpec) -> Self {
        self.outputs.push(port);
        self
    }

    /// Allow instances to take part in cycles
    pub fn allowing_recursion(mut self) -> Self {
        self.allow_recursion = true;
        self
    }
}

/// Calculation inputs and staged outputs handed to [`NodeBehavior::calculate`]
///
/// A connected input carries its source's value converted to the input's
/// declared type, or `None` if there is nothing usable. An unconnected input
/// carries its local value. Inside a loop, a partner that has not run yet this
/// recalculation contributes the local value instead. Outputs written here
/// are committed to the node only if `calculate` returns `true`.
pub struct CalculateContext<'a> {
    node: NodeId,
    inputs: &'a [Option<PortValue>],
    output_types: &'a [PortType],
    staged: Vec<Option<PortValue>>,
}

impl<'a> CalculateContext<'a> {
    /// Create a context over pulled input values
    pub fn new(node: NodeId, inputs: &'a [Option<PortValue>], output_types: &'a [PortType]) -> Self {
        Self {
            node,
            inputs,
            output_types,
            staged: vec![None; output_types.len()],
        }
    }

    /// Node being calculated
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Number of inputs
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of outputs
    pub fn output_count(&self) -> usize {
        self.output_types.len()
    }

    /// Value of an input, unset if neither connected source nor local value has one
    pub fn input(&self, index: usize) -> Option<&PortValue> {
        self.inputs.get(index).and_then(Option::as_ref)
    }

    /// Value of an input read as a float
    pub fn input_float(&self, index: usize) -> Option<f32> {
        self.input(index).and_then(PortValue::as_float)
    }

    /// Stage a value for an output
    pub fn set_output(&mut self, index: usize, value: PortValue) -> Result<(), GraphError> {
        let expected = self.output_types.get(index).ok_or_else(|| {
            GraphError::InvalidOperation(format!("{} has no output {index}", self.node))
        })?;
        if !value.fits(expected) {
            return Err(GraphError::ValueTypeMismatch {
                expected: expected.clone(),
                found: value.port_type(),
            });
        }
        self.staged[index] = Some(value);
        Ok(())
    }

    /// Value staged for an output so far
    pub fn staged_output(&self, index: usize) -> Option<&PortValue> {
        self.staged.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn into_staged(self) -> Vec<Option<PortValue>> {
        self.staged
    }
}

/// Calculation logic supplied by a node kind
pub trait NodeBehavior: Send {
    /// Compute outputs from inputs; `false` means "not ready, retry later"
    fn calculate(&mut self, ctx: &mut CalculateContext<'_>) -> bool;
}

impl<F> NodeBehavior for F
where
    F: FnMut(&mut CalculateContext<'_>) -> bool + Send,
{
    fn calculate(&mut self, ctx: &mut CalculateContext<'_>) -> bool {
        self(ctx)
    }
}

/// A node instance in the graph
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type ID
    pub node_type: String,
    /// Display name (can be customized)
    pub name: String,
    pub(crate) inputs: Vec<InputPort>,
    pub(crate) outputs: Vec<OutputPort>,
    pub(crate) calculated: bool,
    pub(crate) allow_recursion: bool,
    pub(crate) continue_calculation: bool,
    pub(crate) behavior: Box<dyn NodeBehavior>,
}

impl Node {
    /// Create a new node from a type definition
    pub(crate) fn new(id: NodeId, node_type: &NodeType, behavior: Box<dyn NodeBehavior>) -> Self {
        Self {
            id,
            node_type: node_type.id.clone(),
            name: node_type.name.clone(),
            inputs: node_type.inputs.iter().map(InputPort::from_spec).collect(),
            outputs: node_type.outputs.iter().map(OutputPort::from_spec).collect(),
            calculated: false,
            allow_recursion: node_type.allow_recursion,
            continue_calculation: node_type.continue_calculation,
            behavior,
        }
    }

    /// Whether the node holds results from the current epoch
    pub fn is_calculated(&self) -> bool {
        self.calculated
    }

    /// Per-node recursion opt-in, before the graph policy is applied
    pub fn allow_recursion(&self) -> bool {
        self.allow_recursion
    }

    /// Whether a successful calculation cascades immediately
    pub fn continue_calculation(&self) -> bool {
        self.continue_calculation
    }

    /// Set the cascade flag
    pub fn set_continue_calculation(&mut self, value: bool) {
        self.continue_calculation = value;
    }

    /// Input ports
    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    /// Output ports
    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<&InputPort> {
        self.inputs.get(index)
    }

    /// Get an output port by index
    pub fn output(&self, index: usize) -> Option<&OutputPort> {
        self.outputs.get(index)
    }

    /// Find an input by name
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name == name)
    }

    /// Find an output by name
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }

    /// Reset calculated state and cached output values
    pub(crate) fn invalidate(&mut self) {
        self.calculated = false;
        for output in &mut self.outputs {
            output.value = None;
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("node_type", &self.node_type)
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("calculated", &self.calculated)
            .field("allow_recursion", &self.allow_recursion)
            .field("continue_calculation", &self.continue_calculation)
            .finish_non_exhaustive()
    }
}

type BehaviorFactory = Box<dyn Fn() -> Box<dyn NodeBehavior> + Send + Sync>;

struct RegistryEntry {
    node_type: NodeType,
    factory: BehaviorFactory,
}

/// Registry of available node types
///
/// Populated explicitly by the host at startup; see [`crate::kinds`] for the
/// built-in sets.
pub struct NodeRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Register a node type with the factory creating its behavior
    pub fn register<F, B>(&mut self, node_type: NodeType, factory: F)
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: NodeBehavior + 'static,
    {
        let factory: BehaviorFactory = Box::new(move || Box::new(factory()));
        if self.entries.contains_key(&node_type.id) {
            tracing::warn!("Replacing registered node type '{}'", node_type.id);
        }
        self.entries
            .insert(node_type.id.clone(), RegistryEntry { node_type, factory });
    }

    /// Absorb every type of another registry
    pub fn merge(&mut self, other: NodeRegistry) {
        for (id, entry) in other.entries {
            self.entries.insert(id, entry);
        }
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.entries.get(id).map(|e| &e.node_type)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.entries.values().map(|e| &e.node_type)
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types().filter(move |t| t.category == category)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a type and build a fresh behavior for it
    pub fn instantiate(&self, id: &str) -> Option<(&NodeType, Box<dyn NodeBehavior>)> {
        self.entries
            .get(id)
            .map(|e| (&e.node_type, (e.factory)()))
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough_type() -> NodeType {
        NodeType::new("pass", "Pass", NodeCategory::Utility)
            .with_description("Copies In to Out")
            .with_input(PortSpec::input("In", PortType::Float))
            .with_output(PortSpec::output("Out", PortType::Float))
    }

    #[test]
    fn test_registry_instantiate() {
        let mut registry = NodeRegistry::new();
        registry.register(passthrough_type(), || {
            |ctx: &mut CalculateContext<'_>| ctx.set_output(0, PortValue::Float(1.0)).is_ok()
        });

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.types_in_category(NodeCategory::Utility).count(), 1);
        assert!(registry.instantiate("missing").is_none());

        let (node_type, mut behavior) = registry.instantiate("pass").unwrap();
        assert_eq!(node_type.name, "Pass");
        assert_eq!(node_type.description, "Copies In to Out");

        let inputs = [None];
        let types = [PortType::Float];
        let mut ctx = CalculateContext::new(NodeId(0), &inputs, &types);
        assert!(behavior.calculate(&mut ctx));
        assert_eq!(ctx.staged_output(0), Some(&PortValue::Float(1.0)));
    }

    #[test]
    fn test_set_output_rejects_wrong_type() {
        let inputs: [Option<PortValue>; 0] = [];
        let types = [PortType::Float];
        let mut ctx = CalculateContext::new(NodeId(3), &inputs, &types);

        assert!(matches!(
            ctx.set_output(0, PortValue::Bool(true)),
            Err(GraphError::ValueTypeMismatch { .. })
        ));
        assert!(matches!(
            ctx.set_output(1, PortValue::Float(1.0)),
            Err(GraphError::InvalidOperation(_))
        ));
        assert!(ctx.staged_output(0).is_none());
    }

    #[test]
    fn test_node_from_type() {
        let node_type = passthrough_type().allowing_recursion();
        let node = Node::new(NodeId(9), &node_type, Box::new(|_: &mut CalculateContext<'_>| true));
        assert_eq!(node.input_index("In"), Some(0));
        assert_eq!(node.output_index("Out"), Some(0));
        assert!(node.allow_recursion());
        assert!(node.continue_calculation());
        assert!(!node.is_calculated());
    }
}
