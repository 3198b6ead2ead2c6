// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph handle shared across threads.
//!
//! The engine itself is single-threaded. When a host touches one graph from
//! several threads, [`SharedGraph`] holds a single lock across each whole
//! edit or recalculation, so passes never interleave.

use crate::error::Result;
use crate::graph::Graph;
use crate::node::NodeId;
use crate::port::{InputRef, OutputRef, PortValue};
use crate::scheduler::CalculationReport;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Cloneable, lock-protected graph
#[derive(Debug, Clone)]
pub struct SharedGraph {
    inner: Arc<Mutex<Graph>>,
}

impl SharedGraph {
    /// Wrap a graph
    pub fn new(graph: Graph) -> Self {
        Self {
            inner: Arc::new(Mutex::new(graph)),
        }
    }

    /// Lock the graph for a sequence of operations
    pub fn lock(&self) -> MutexGuard<'_, Graph> {
        self.inner.lock()
    }

    /// Run a closure with the graph locked
    pub fn with<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Connect under the lock
    pub fn connect(&self, output: OutputRef, input: InputRef) -> Result<()> {
        self.inner.lock().connect(output, input)
    }

    /// Disconnect under the lock
    pub fn disconnect(&self, input: InputRef) -> Result<()> {
        self.inner.lock().disconnect(input).map(|_| ())
    }

    /// Edit an input value under the lock
    pub fn set_input_value(&self, input: InputRef, value: PortValue) -> Result<()> {
        self.inner.lock().set_input_value(input, value)
    }

    /// Recalculate everything under the lock
    pub fn recalculate_all(&self) -> CalculationReport {
        self.inner.lock().recalculate_all()
    }

    /// Recalculate from a node under the lock
    pub fn recalculate_from(&self, node: NodeId) -> Result<CalculationReport> {
        self.inner.lock().recalculate_from(node)
    }

    /// Read a cached output value
    pub fn output_value(&self, output: OutputRef) -> Option<PortValue> {
        self.inner.lock().output_value(output).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::create_default_registry;
    use std::thread;

    #[test]
    fn test_edits_from_many_threads() {
        let registry = create_default_registry();
        let mut graph = Graph::new("shared");
        let value = graph.create_node(&registry, "value").unwrap();
        let add = graph.create_node(&registry, "add").unwrap();
        graph
            .connect(OutputRef::new(value, 0), InputRef::new(add, 0))
            .unwrap();

        let shared = SharedGraph::new(graph);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared
                        .set_input_value(InputRef::new(value, 0), PortValue::Float(i as f32))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Whatever edit landed last, the result is consistent with it
        let input = shared.with(|g| g.input_value(InputRef::new(value, 0)));
        let result = shared.output_value(OutputRef::new(add, 0));
        assert_eq!(input, result);
        assert!(shared.lock().node(add).unwrap().is_calculated());
    }
}
