// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for graph mutation and engine configuration.

use crate::node::NodeId;
use crate::port::{PortType, PortRef};

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Reasons an edge cannot be formed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(PortRef),

    /// Both ports live on the same node
    #[error("Cannot connect node {0} to itself")]
    SelfConnection(NodeId),

    /// The input is already fed by this output
    #[error("Input {0} is already connected to this output")]
    AlreadyConnected(PortRef),

    /// An output must feed an input (or two direction-less ports meet)
    #[error("Port directions do not match")]
    DirectionMismatch,

    /// The output type is not assignable to the input type
    #[error("Type mismatch: {from:?} is not assignable to {to:?}")]
    TypeMismatch {
        /// Declared type of the output
        from: PortType,
        /// Declared type of the input
        to: PortType,
    },

    /// The edge would close a loop no participating node allows
    #[error("Connecting {from} to {to} would create a cycle without recursion allowed")]
    IllegalCycle {
        /// Node owning the output
        from: NodeId,
        /// Node owning the input
        to: NodeId,
    },
}

/// Error from a graph operation
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The requested edge was rejected
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(PortRef),

    /// No node type registered under this id
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Operation is not valid in the current graph state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A value does not fit the declared port type
    #[error("Value type mismatch: expected {expected:?}, found {found:?}")]
    ValueTypeMismatch {
        /// Declared port type
        expected: PortType,
        /// Type of the rejected value
        found: PortType,
    },
}

/// Error loading or saving an engine configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed RON
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),
}
