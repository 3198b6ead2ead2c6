// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cycle-safe recursive queries over the graph.
//!
//! Upstream walks follow each connected input to its source node; downstream
//! walks follow each output's connections to their target nodes. Every query
//! opens one [`RecursionGuard`] and passes it down, so walks over cyclic
//! graphs terminate.

use crate::events::GraphEvent;
use crate::graph::Graph;
use crate::guard::RecursionGuard;
use crate::node::NodeId;

impl Graph {
    /// True if walking upstream from `node` reaches `other`
    pub fn is_child_of(&self, node: NodeId, other: NodeId) -> bool {
        let mut guard = RecursionGuard::new();
        self.is_child_of_in(&mut guard, node, other)
    }

    fn is_child_of_in(&self, guard: &mut RecursionGuard, node: NodeId, other: NodeId) -> bool {
        if guard.begin_search(node) {
            return false;
        }
        for source in self.sources(node) {
            if source == other || self.is_child_of_in(guard, source, other) {
                guard.abort_search();
                return true;
            }
        }
        guard.end_search(node);
        false
    }

    /// True if walking upstream from `node` leads back to `node`
    pub fn is_in_loop(&self, node: NodeId) -> bool {
        self.is_child_of(node, node)
    }

    /// True if a loop closed between `node` and `other` would be permitted
    ///
    /// `node` is the node whose output would feed `other`. The loop is legal
    /// when `node` itself, or any node on the upstream path from `node` to
    /// `other` (including `other`), allows recursion.
    pub fn allows_loop_recursion(&self, node: NodeId, other: NodeId) -> bool {
        if self.recursion_allowed(node) {
            return true;
        }
        let mut guard = RecursionGuard::new();
        self.loop_allows_in(&mut guard, node, other)
    }

    fn loop_allows_in(&self, guard: &mut RecursionGuard, node: NodeId, other: NodeId) -> bool {
        if guard.begin_search(node) {
            return false;
        }
        for source in self.sources(node) {
            let on_loop = source == other || self.is_child_of(source, other);
            if !on_loop {
                continue;
            }
            if self.recursion_allowed(source)
                || (source != other && self.loop_allows_in(guard, source, other))
            {
                guard.abort_search();
                return true;
            }
        }
        guard.end_search(node);
        false
    }

    /// Reset `node` and everything downstream to "not calculated"
    ///
    /// Cached output values are dropped. Returns the invalidated nodes in
    /// visit order; each gets a [`GraphEvent::NodeChanged`].
    pub fn clear_calculation(&mut self, node: NodeId) -> Vec<NodeId> {
        let mut guard = RecursionGuard::new();
        let mut cleared = Vec::new();
        self.clear_calculation_in(&mut guard, node, &mut cleared);
        for id in &cleared {
            self.emit(GraphEvent::NodeChanged { node: *id });
        }
        cleared
    }

    fn clear_calculation_in(
        &mut self,
        guard: &mut RecursionGuard,
        node: NodeId,
        cleared: &mut Vec<NodeId>,
    ) {
        if guard.begin_search(node) {
            return;
        }
        if let Some(n) = self.node_mut(node) {
            n.invalidate();
            cleared.push(node);
        }
        for target in self.targets(node) {
            self.clear_calculation_in(guard, target, cleared);
        }
        guard.end_search(node);
    }

    /// Every node reachable upstream of `node`, excluding `node` unless it is in a loop
    pub fn upstream_nodes(&self, node: NodeId) -> Vec<NodeId> {
        let mut guard = RecursionGuard::new();
        let mut found = Vec::new();
        self.collect_upstream(&mut guard, node, &mut found);
        found
    }

    fn collect_upstream(&self, guard: &mut RecursionGuard, node: NodeId, found: &mut Vec<NodeId>) {
        if guard.begin_search(node) {
            return;
        }
        for source in self.sources(node) {
            if !found.contains(&source) {
                found.push(source);
            }
            self.collect_upstream(guard, source, found);
        }
        guard.end_search(node);
    }

    /// Every node reachable downstream of `node`, excluding `node` unless it is in a loop
    pub fn downstream_nodes(&self, node: NodeId) -> Vec<NodeId> {
        let mut guard = RecursionGuard::new();
        let mut found = Vec::new();
        self.collect_downstream(&mut guard, node, &mut found);
        found
    }

    fn collect_downstream(&self, guard: &mut RecursionGuard, node: NodeId, found: &mut Vec<NodeId>) {
        if guard.begin_search(node) {
            return;
        }
        for target in self.targets(node) {
            if !found.contains(&target) {
                found.push(target);
            }
            self.collect_downstream(guard, target, found);
        }
        guard.end_search(node);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{EngineConfig, RecursionPolicy};
    use crate::error::{ConnectionError, GraphError};
    use crate::graph::Graph;
    use crate::node::{CalculateContext, NodeCategory, NodeId, NodeType};
    use crate::port::{InputRef, OutputRef, PortSpec, PortType, PortValue};

    fn relay() -> NodeType {
        NodeType::new("relay", "Relay", NodeCategory::Utility)
            .with_input(PortSpec::input("In", PortType::Float))
            .with_output(PortSpec::output("Out", PortType::Float))
    }

    fn add_relay(graph: &mut Graph) -> NodeId {
        graph.add_node(
            &relay(),
            Box::new(|ctx: &mut CalculateContext<'_>| {
                let value = ctx.input_float(0).unwrap_or(1.0);
                ctx.set_output(0, PortValue::Float(value)).is_ok()
            }),
        )
    }

    fn link(graph: &mut Graph, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        graph.connect(OutputRef::new(from, 0), InputRef::new(to, 0))
    }

    #[test]
    fn test_is_child_of() {
        let mut graph = Graph::default();
        let a = add_relay(&mut graph);
        let b = add_relay(&mut graph);
        let c = add_relay(&mut graph);
        link(&mut graph, a, b).unwrap();
        link(&mut graph, b, c).unwrap();

        assert!(graph.is_child_of(c, a));
        assert!(graph.is_child_of(c, b));
        assert!(!graph.is_child_of(a, c));
        assert!(!graph.is_in_loop(b));
        assert_eq!(graph.upstream_nodes(c), vec![b, a]);
        assert_eq!(graph.downstream_nodes(a), vec![b, c]);
    }

    #[test]
    fn test_unapproved_cycle_rejected() {
        let mut graph = Graph::default();
        let a = add_relay(&mut graph);
        let b = add_relay(&mut graph);
        link(&mut graph, a, b).unwrap();

        let err = link(&mut graph, b, a).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Connection(ConnectionError::IllegalCycle { .. })
        ));
        assert!(graph.input_port(InputRef::new(a, 0)).unwrap().connection().is_none());
    }

    #[test]
    fn test_cycle_allowed_by_any_participant() {
        let mut graph = Graph::default();
        let a = add_relay(&mut graph);
        let b = add_relay(&mut graph);
        let c = add_relay(&mut graph);
        link(&mut graph, a, b).unwrap();
        link(&mut graph, b, c).unwrap();

        // Only the middle node opts in
        graph.set_allow_recursion(b, true).unwrap();
        assert!(graph.allows_loop_recursion(c, a));
        link(&mut graph, c, a).unwrap();

        assert!(graph.is_in_loop(a));
        assert!(graph.is_in_loop(b));
        assert!(graph.is_in_loop(c));
        assert!(graph.downstream_nodes(a).contains(&a));
    }

    #[test]
    fn test_recursion_outside_loop_does_not_count() {
        let mut graph = Graph::default();
        let a = add_relay(&mut graph);
        let b = add_relay(&mut graph);
        let side = add_relay(&mut graph);
        graph.set_allow_recursion(side, true).unwrap();
        link(&mut graph, side, a).unwrap();

        let source = add_relay(&mut graph);
        let extra = NodeType::new("mix", "Mix", NodeCategory::Math)
            .with_input(PortSpec::input("A", PortType::Float))
            .with_input(PortSpec::input("B", PortType::Float))
            .with_output(PortSpec::output("Out", PortType::Float));
        let mix = graph.add_node(&extra, Box::new(|_: &mut CalculateContext<'_>| true));
        graph
            .connect(OutputRef::new(a, 0), InputRef::new(mix, 0))
            .unwrap();
        graph
            .connect(OutputRef::new(source, 0), InputRef::new(mix, 1))
            .unwrap();
        link(&mut graph, mix, b).unwrap();

        // Loop would be a -> mix -> b -> a; `side` feeds `a` but is not on it
        assert!(!graph.allows_loop_recursion(b, a));
        assert!(!graph.can_connect(OutputRef::new(b, 0), InputRef::new(a, 0)));
    }

    #[test]
    fn test_policy_overrides_node_flags() {
        let config = EngineConfig {
            recursion: RecursionPolicy::Forbid,
            ..EngineConfig::default()
        };
        let mut graph = Graph::with_config("forbid", config);
        let a = add_relay(&mut graph);
        let b = add_relay(&mut graph);
        graph.set_allow_recursion(a, true).unwrap();
        link(&mut graph, a, b).unwrap();
        assert!(!graph.can_connect(OutputRef::new(b, 0), InputRef::new(a, 0)));

        graph.set_config(EngineConfig {
            recursion: RecursionPolicy::AlwaysAllow,
            ..EngineConfig::default()
        });
        graph.set_allow_recursion(a, false).unwrap();
        assert!(graph.can_connect(OutputRef::new(b, 0), InputRef::new(a, 0)));
    }

    #[test]
    fn test_clear_calculation_stops_at_loops() {
        let mut graph = Graph::default();
        let a = add_relay(&mut graph);
        let b = add_relay(&mut graph);
        graph.set_allow_recursion(a, true).unwrap();
        link(&mut graph, a, b).unwrap();
        link(&mut graph, b, a).unwrap();
        graph.recalculate_all();
        assert!(graph.node(a).unwrap().is_calculated());

        let cleared = graph.clear_calculation(b);
        assert_eq!(cleared, vec![b, a]);
        assert!(!graph.node(a).unwrap().is_calculated());
        assert!(graph.output_value(OutputRef::new(a, 0)).is_none());
    }
}
