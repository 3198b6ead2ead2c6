// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notifications emitted by the graph.
//!
//! Hosts register an [`EventSink`] to learn when connections change, nodes are
//! added or removed, or a node's computed state may have changed (so the
//! editor can schedule a repaint).

use crate::node::NodeId;
use crate::port::{InputRef, OutputRef};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Events emitted by graph mutation and recalculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphEvent {
    /// A node was added
    NodeAdded {
        /// New node
        node: NodeId,
    },
    /// A node was removed after all its connections were severed
    NodeDeleted {
        /// Removed node
        node: NodeId,
    },
    /// An edge was recorded
    ConnectionAdded {
        /// Target input
        input: InputRef,
        /// Source output
        output: OutputRef,
    },
    /// An edge was removed
    ConnectionRemoved {
        /// Target input
        input: InputRef,
        /// Source output
        output: OutputRef,
    },
    /// A node's computed state may have changed
    NodeChanged {
        /// Affected node
        node: NodeId,
    },
    /// A cascade exceeded the calculation cap and was stopped
    RunawayCalculation {
        /// Node whose cascade was cut off
        node: NodeId,
        /// Successful calculations when the cap tripped
        calculations: usize,
    },
}

/// Receiver of graph events
pub trait EventSink: Send + Sync {
    /// Deliver an event
    fn send(&self, event: &GraphEvent);
}

/// Sink that records every event, shared between clones
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<GraphEvent>>>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded events
    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.lock().clone()
    }

    /// Take the recorded events, leaving the log empty
    pub fn drain(&self) -> Vec<GraphEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for EventLog {
    fn send(&self, event: &GraphEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_shared_between_clones() {
        let log = EventLog::new();
        let sink: Box<dyn EventSink> = Box::new(log.clone());

        sink.send(&GraphEvent::NodeAdded { node: NodeId(1) });
        sink.send(&GraphEvent::NodeChanged { node: NodeId(1) });

        assert_eq!(log.len(), 2);
        assert_eq!(log.drain()[0], GraphEvent::NodeAdded { node: NodeId(1) });
        assert!(log.is_empty());
    }
}
