// SPDX-License-Identifier: MIT OR Apache-2.0
//! Incremental node-graph dataflow engine for `OrdoPlay` Editor.
//!
//! Nodes expose typed input/output ports, ports are wired by validated
//! connections, and the engine recalculates node outputs as the graph is
//! edited.
//!
//! ## Architecture
//!
//! - Typed ports with directional assignability rules
//! - Connection validation, including cycle legality
//! - Cycle-safe recursive queries via [`RecursionGuard`]
//! - Worklist scheduling with partial readiness, opt-in recursion and a
//!   runaway-cascade cap
//! - Change events for repaint scheduling
//!
//! ## Example
//!
//! ```
//! use ordoplay_dataflow::kinds::create_default_registry;
//! use ordoplay_dataflow::{Graph, InputRef, OutputRef, PortValue};
//!
//! let registry = create_default_registry();
//! let mut graph = Graph::new("example");
//! let value = graph.create_node(&registry, "value").unwrap();
//! let add = graph.create_node(&registry, "add").unwrap();
//!
//! graph.set_input_value(InputRef::new(value, 0), PortValue::Float(5.0)).unwrap();
//! graph.set_input_value(InputRef::new(add, 1), PortValue::Float(3.0)).unwrap();
//! graph.connect(OutputRef::new(value, 0), InputRef::new(add, 0)).unwrap();
//!
//! assert_eq!(
//!     graph.output_value(OutputRef::new(add, 0)),
//!     Some(&PortValue::Float(8.0))
//! );
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod graph;
pub mod guard;
pub mod kinds;
pub mod node;
pub mod port;
pub mod scheduler;
pub mod shared;
mod traversal;

pub use config::{EngineConfig, RecursionPolicy};
pub use connection::Connection;
pub use error::{ConfigError, ConnectionError, GraphError, Result};
pub use events::{EventLog, EventSink, GraphEvent};
pub use graph::Graph;
pub use guard::RecursionGuard;
pub use node::{CalculateContext, Node, NodeBehavior, NodeCategory, NodeId, NodeRegistry, NodeType};
pub use port::{
    InputPort, InputRef, OutputPort, OutputRef, PortDirection, PortRef, PortSpec, PortType,
    PortValue,
};
pub use scheduler::{CalculationContext, CalculationReport};
pub use shared::SharedGraph;
