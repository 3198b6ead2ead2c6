// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.
//!
//! Nodes live in an ordered arena keyed by [`NodeId`]; each connection is
//! stored on both of its ports (the input's single source and the output's
//! fan-out list). All structural edits go through [`Graph`] so the two sides
//! never disagree and every edit emits its [`GraphEvent`].

use crate::config::EngineConfig;
use crate::connection::Connection;
use crate::error::{ConnectionError, GraphError, Result};
use crate::events::{EventSink, GraphEvent};
use crate::node::{Node, NodeBehavior, NodeId, NodeRegistry, NodeType};
use crate::port::{InputPort, InputRef, OutputPort, OutputRef, PortValue};
use crate::scheduler::{self, CalculationReport};
use indexmap::{IndexMap, IndexSet};
use std::fmt;

/// A node graph
pub struct Graph {
    /// Graph name
    pub name: String,
    nodes: IndexMap<NodeId, Node>,
    next_id: u64,
    config: EngineConfig,
    sinks: Vec<Box<dyn EventSink>>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, EngineConfig::default())
    }

    /// Create a new empty graph with explicit settings
    pub fn with_config(name: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            next_id: 0,
            config,
            sinks: Vec::new(),
        }
    }

    /// Engine settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the engine settings
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    /// Register a receiver for graph events
    pub fn add_sink(&mut self, sink: impl EventSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub(crate) fn emit(&self, event: GraphEvent) {
        for sink in &self.sinks {
            sink.send(&event);
        }
    }

    /// Add a node of the given type
    pub fn add_node(&mut self, node_type: &NodeType, behavior: Box<dyn NodeBehavior>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(id, node_type, behavior));
        tracing::debug!("Added node {} ({})", id, node_type.id);
        self.emit(GraphEvent::NodeAdded { node: id });
        id
    }

    /// Create a node through a registry
    pub fn create_node(&mut self, registry: &NodeRegistry, type_id: &str) -> Result<NodeId> {
        let (node_type, behavior) = registry
            .instantiate(type_id)
            .ok_or_else(|| GraphError::UnknownNodeType(type_id.to_string()))?;
        Ok(self.add_node(node_type, behavior))
    }

    /// Sever every connection of a node, then remove it
    ///
    /// Nodes that were fed by the removed node are recalculated afterwards.
    pub fn delete_node(&mut self, node_id: NodeId) -> Result<Node> {
        let node = self.nodes.get(&node_id).ok_or_else(|| {
            GraphError::InvalidOperation(format!("cannot delete {node_id}: not in graph"))
        })?;

        let edges: Vec<Connection> = node_connections(node).collect();
        let mut affected = IndexSet::new();
        for edge in edges {
            if edge.to.node != node_id {
                affected.insert(edge.to.node);
            }
            self.unlink(edge.from, edge.to);
        }

        let node = self
            .nodes
            .shift_remove(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        tracing::debug!("Deleted node {} ({})", node_id, node.node_type);
        self.emit(GraphEvent::NodeDeleted { node: node_id });

        if self.config.auto_recalculate {
            for target in affected {
                self.recalculate_from(target)?;
            }
        }
        Ok(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub(crate) fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Check if a node is in the graph
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get an input port
    pub fn input_port(&self, input: InputRef) -> Option<&InputPort> {
        self.nodes.get(&input.node)?.inputs.get(input.index)
    }

    /// Get an output port
    pub fn output_port(&self, output: OutputRef) -> Option<&OutputPort> {
        self.nodes.get(&output.node)?.outputs.get(output.index)
    }

    fn input_port_mut(&mut self, input: InputRef) -> Option<&mut InputPort> {
        self.nodes.get_mut(&input.node)?.inputs.get_mut(input.index)
    }

    fn output_port_mut(&mut self, output: OutputRef) -> Option<&mut OutputPort> {
        self.nodes.get_mut(&output.node)?.outputs.get_mut(output.index)
    }

    /// Set a node's recursion opt-in
    pub fn set_allow_recursion(&mut self, node_id: NodeId, allow: bool) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        node.allow_recursion = allow;
        Ok(())
    }

    /// Set whether a node cascades immediately after calculating
    pub fn set_continue_calculation(&mut self, node_id: NodeId, value: bool) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        node.set_continue_calculation(value);
        Ok(())
    }

    /// Effective recursion permission after applying the graph policy
    pub fn recursion_allowed(&self, node_id: NodeId) -> bool {
        self.nodes
            .get(&node_id)
            .is_some_and(|n| self.config.recursion.resolve(n.allow_recursion))
    }

    /// Explain why an edge from `output` to `input` is illegal, if it is
    ///
    /// Loops are checked against the current wiring. When `input` already has
    /// a source that [`Graph::connect`] would replace, that edge still counts,
    /// so an edge that would only be legal after the replacement is rejected.
    /// Disconnect the input first to rewire inside an existing loop.
    pub fn validate_connection(
        &self,
        output: OutputRef,
        input: InputRef,
    ) -> std::result::Result<(), ConnectionError> {
        if !self.contains(output.node) {
            return Err(ConnectionError::NodeNotFound(output.node));
        }
        if !self.contains(input.node) {
            return Err(ConnectionError::NodeNotFound(input.node));
        }
        let source = self
            .output_port(output)
            .ok_or(ConnectionError::PortNotFound(output.into()))?;
        let target = self
            .input_port(input)
            .ok_or(ConnectionError::PortNotFound(input.into()))?;

        if output.node == input.node {
            return Err(ConnectionError::SelfConnection(output.node));
        }

        if target.connection == Some(output) {
            return Err(ConnectionError::AlreadyConnected(input.into()));
        }

        if !source.direction.can_feed(target.direction) {
            return Err(ConnectionError::DirectionMismatch);
        }

        if !source.port_type.is_assignable_to(&target.port_type) {
            return Err(ConnectionError::TypeMismatch {
                from: source.port_type.clone(),
                to: target.port_type.clone(),
            });
        }

        // The new edge closes a loop if the source already depends on the target
        if self.is_child_of(output.node, input.node)
            && !self.allows_loop_recursion(output.node, input.node)
        {
            return Err(ConnectionError::IllegalCycle {
                from: output.node,
                to: input.node,
            });
        }

        Ok(())
    }

    /// Check if an edge from `output` to `input` may be formed
    pub fn can_connect(&self, output: OutputRef, input: InputRef) -> bool {
        self.validate_connection(output, input).is_ok()
    }

    /// Connect an output to an input, replacing the input's previous source
    pub fn connect(&mut self, output: OutputRef, input: InputRef) -> Result<()> {
        if let Err(err) = self.validate_connection(output, input) {
            tracing::debug!("Rejected connection {} -> {}: {}", output, input, err);
            return Err(err.into());
        }

        if let Some(previous) = self.input_port(input).and_then(InputPort::connection) {
            self.unlink(previous, input);
        }

        if let Some(port) = self.output_port_mut(output) {
            port.connections.push(input);
        }
        if let Some(port) = self.input_port_mut(input) {
            port.connection = Some(output);
        }
        tracing::debug!("Connected {} -> {}", output, input);
        self.emit(GraphEvent::ConnectionAdded { input, output });

        if self.config.auto_recalculate {
            self.recalculate_from(input.node)?;
        }
        Ok(())
    }

    /// Remove the connection feeding `input`, if any
    pub fn disconnect(&mut self, input: InputRef) -> Result<Option<Connection>> {
        let port = self
            .input_port(input)
            .ok_or(GraphError::PortNotFound(input.into()))?;
        let Some(output) = port.connection else {
            return Ok(None);
        };

        self.unlink(output, input);
        tracing::debug!("Disconnected {} -> {}", output, input);

        if self.config.auto_recalculate {
            self.recalculate_from(input.node)?;
        }
        Ok(Some(Connection::new(output, input)))
    }

    /// Remove an edge from both ports and announce it
    fn unlink(&mut self, output: OutputRef, input: InputRef) {
        if let Some(port) = self.output_port_mut(output) {
            port.connections.retain(|c| *c != input);
        }
        if let Some(port) = self.input_port_mut(input) {
            if port.connection == Some(output) {
                port.connection = None;
            }
        }
        self.emit(GraphEvent::ConnectionRemoved { input, output });
    }

    /// Get all connections
    pub fn connections(&self) -> Vec<Connection> {
        self.nodes
            .iter()
            .flat_map(|(id, node)| {
                node.outputs.iter().enumerate().flat_map(move |(index, port)| {
                    port.connections
                        .iter()
                        .map(move |to| Connection::new(OutputRef::new(*id, index), *to))
                })
            })
            .collect()
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> Vec<Connection> {
        self.nodes
            .get(&node_id)
            .map(|node| node_connections(node).collect())
            .unwrap_or_default()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.nodes
            .values()
            .flat_map(|n| n.outputs.iter())
            .map(|p| p.connections.len())
            .sum()
    }

    /// Cached value of an output
    pub fn output_value(&self, output: OutputRef) -> Option<&PortValue> {
        self.output_port(output)?.value.as_ref()
    }

    /// Value an input currently sees
    ///
    /// A connected input reads its source output, converted to the input's
    /// declared type. It is `None` while the source is unset or holds a value
    /// that does not convert. The local value is used only while unconnected.
    pub fn input_value(&self, input: InputRef) -> Option<PortValue> {
        let port = self.input_port(input)?;
        match port.connection {
            Some(source) => self.output_value(source)?.convert_to(&port.port_type),
            None => port.default_value.clone(),
        }
    }

    /// Edit an input's local value and recalculate from its node
    pub fn set_input_value(&mut self, input: InputRef, value: PortValue) -> Result<()> {
        let port = self
            .input_port_mut(input)
            .ok_or(GraphError::PortNotFound(input.into()))?;
        let converted = value
            .convert_to(&port.port_type)
            .ok_or_else(|| GraphError::ValueTypeMismatch {
                expected: port.port_type.clone(),
                found: value.port_type(),
            })?;
        port.default_value = Some(converted);

        if self.config.auto_recalculate {
            self.recalculate_from(input.node)?;
        }
        Ok(())
    }

    /// True iff no input of the node has a live connection
    pub fn is_input(&self, node_id: NodeId) -> bool {
        self.nodes
            .get(&node_id)
            .is_some_and(|n| n.inputs.iter().all(|i| !i.is_connected()))
    }

    /// True iff every connected input's source node is calculated
    pub fn descendants_calculated(&self, node_id: NodeId) -> bool {
        self.sources(node_id)
            .all(|source| self.nodes.get(&source).is_some_and(|n| n.calculated))
    }

    /// True iff the scheduler may attempt the node
    ///
    /// Every source must be calculated. A node in a loop may go ahead of its
    /// loop partners, but still waits for every upstream node outside the loop.
    pub fn ready_to_calculate(&self, node_id: NodeId) -> bool {
        if self.descendants_calculated(node_id) {
            return true;
        }
        if !self.is_in_loop(node_id) {
            return false;
        }
        self.upstream_nodes(node_id).into_iter().all(|upstream| {
            upstream == node_id
                || self.nodes.get(&upstream).is_some_and(|n| n.calculated)
                || self.is_child_of(upstream, node_id)
        })
    }

    /// Nodes feeding this node's inputs
    pub(crate) fn sources(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.get(&node_id).into_iter().flat_map(|node| {
            node.inputs
                .iter()
                .filter_map(|i| i.connection.map(|c| c.node))
        })
    }

    /// Nodes fed by this node's outputs, in port order without duplicates
    pub(crate) fn targets(&self, node_id: NodeId) -> IndexSet<NodeId> {
        self.nodes
            .get(&node_id)
            .into_iter()
            .flat_map(|node| node.outputs.iter())
            .flat_map(|o| o.connections.iter().map(|c| c.node))
            .collect()
    }

    /// Recalculate the whole graph
    pub fn recalculate_all(&mut self) -> CalculationReport {
        scheduler::recalculate_all(self)
    }

    /// Recalculate a node and everything downstream of it
    pub fn recalculate_from(&mut self, node_id: NodeId) -> Result<CalculationReport> {
        scheduler::recalculate_from(self, node_id)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("config", &self.config)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Every edge touching a node, outgoing first
fn node_connections(node: &Node) -> impl Iterator<Item = Connection> + '_ {
    let id = node.id;
    let outgoing = node.outputs.iter().enumerate().flat_map(move |(index, port)| {
        port.connections
            .iter()
            .map(move |to| Connection::new(OutputRef::new(id, index), *to))
    });
    let incoming = node.inputs.iter().enumerate().filter_map(move |(index, port)| {
        port.connection
            .map(|from| Connection::new(from, InputRef::new(id, index)))
    });
    outgoing.chain(incoming)
}
