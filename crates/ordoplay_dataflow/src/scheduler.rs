// SPDX-License-Identifier: MIT OR Apache-2.0
//! Incremental worklist recalculation.
//!
//! A recalculation invalidates a region of the graph, seeds a worklist and
//! then runs full passes over a snapshot of that worklist until a pass makes
//! no progress. A node is eligible once every connected source is calculated.
//! A node in a (permitted) loop, where no strict order exists, only waits for
//! the upstream nodes outside its loop; loop partners that have not run yet
//! feed it their local input values.
//! A successful calculation cascades depth-first into downstream nodes right
//! away; nodes that are not ready stay pending for the next pass.
//!
//! # Runaway protection
//!
//! Successful calculations are counted per top-level call. Once the count
//! exceeds [`EngineConfig::max_calculations`](crate::EngineConfig) and a
//! cascade would continue, cascading stops: the targets go back on the
//! worklist and later passes pick them up one level at a time. The first time
//! this happens the recalculation reports [`CalculationReport::runaway`] and
//! emits [`GraphEvent::RunawayCalculation`]. Each node still calculates at most
//! once per recalculation, so the passes reach their fixed point.

use crate::error::{GraphError, Result};
use crate::events::GraphEvent;
use crate::graph::Graph;
use crate::node::{CalculateContext, Node, NodeId};
use crate::port::{InputRef, PortType, PortValue};
use indexmap::IndexSet;

/// Worklist and counters for one top-level recalculation
#[derive(Debug, Clone)]
pub struct CalculationContext {
    worklist: IndexSet<NodeId>,
    calculation_count: usize,
    max_calculations: usize,
    passes: usize,
    runaway: bool,
}

impl CalculationContext {
    /// Create an empty context with the given calculation cap
    pub fn new(max_calculations: usize) -> Self {
        Self {
            worklist: IndexSet::new(),
            calculation_count: 0,
            max_calculations,
            passes: 0,
            runaway: false,
        }
    }

    /// Add a node to the worklist
    pub fn seed(&mut self, node: NodeId) {
        self.worklist.insert(node);
    }

    /// Nodes still pending
    pub fn worklist(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.worklist.iter().copied()
    }

    /// Successful calculations so far
    pub fn calculation_count(&self) -> usize {
        self.calculation_count
    }

    /// Whether the cascade cap tripped
    pub fn is_runaway(&self) -> bool {
        self.runaway
    }
}

/// Outcome of one recalculation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationReport {
    /// Nodes calculated successfully
    pub calculated: usize,
    /// Full passes over the worklist
    pub passes: usize,
    /// Nodes left pending at the fixed point
    pub pending: Vec<NodeId>,
    /// The cascade cap tripped and later nodes ran in extra passes
    pub runaway: bool,
}

impl CalculationReport {
    /// True if every node reached was calculated
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Recalculate every graph source (and every loop) and all that depends on them
pub fn recalculate_all(graph: &mut Graph) -> CalculationReport {
    let mut ctx = CalculationContext::new(graph.config().max_calculations);

    // Loops fed by no source would never be reached from a source
    let seeds: Vec<NodeId> = graph
        .node_ids()
        .filter(|&id| graph.is_input(id) || graph.is_in_loop(id))
        .collect();
    for id in seeds {
        graph.clear_calculation(id);
        ctx.seed(id);
    }

    run_to_fixed_point(graph, &mut ctx)
}

/// Recalculate `node` and everything downstream of it
pub fn recalculate_from(graph: &mut Graph, node: NodeId) -> Result<CalculationReport> {
    if !graph.contains(node) {
        return Err(GraphError::NodeNotFound(node));
    }
    let mut ctx = CalculationContext::new(graph.config().max_calculations);
    graph.clear_calculation(node);
    ctx.seed(node);
    Ok(run_to_fixed_point(graph, &mut ctx))
}

/// Run passes over the worklist until one makes no progress
pub fn run_to_fixed_point(graph: &mut Graph, ctx: &mut CalculationContext) -> CalculationReport {
    let start = ctx.calculation_count;

    while !ctx.worklist.is_empty() {
        ctx.passes += 1;
        let before = ctx.calculation_count;
        let snapshot: Vec<NodeId> = ctx.worklist.iter().copied().collect();
        for node in snapshot {
            continue_calculation(graph, ctx, node);
        }
        if ctx.calculation_count == before {
            break;
        }
    }

    let report = CalculationReport {
        calculated: ctx.calculation_count - start,
        passes: ctx.passes,
        pending: ctx.worklist.iter().copied().collect(),
        runaway: ctx.runaway,
    };

    tracing::debug!(
        "Recalculated {} nodes in {} passes ({} pending)",
        report.calculated,
        report.passes,
        report.pending.len()
    );
    if !report.pending.is_empty() {
        tracing::warn!(
            "{} nodes never became ready: {:?}",
            report.pending.len(),
            report.pending
        );
    }
    report
}

/// Attempt one node, cascading into its targets on success
///
/// Returns `true` if the node was calculated by this call.
pub fn continue_calculation(graph: &mut Graph, ctx: &mut CalculationContext, node: NodeId) -> bool {
    let Some(current) = graph.node(node) else {
        ctx.worklist.shift_remove(&node);
        return false;
    };
    if current.is_calculated() {
        ctx.worklist.shift_remove(&node);
        return false;
    }

    if !graph.ready_to_calculate(node) {
        tracing::trace!("{} waiting on its sources", node);
        ctx.worklist.insert(node);
        return false;
    }

    if !calculate_node(graph, node) {
        tracing::trace!("{} not ready", node);
        ctx.worklist.insert(node);
        return false;
    }

    ctx.calculation_count += 1;
    ctx.worklist.shift_remove(&node);
    graph.emit(GraphEvent::NodeChanged { node });

    let targets = graph.targets(node);
    let cascade = graph.node(node).is_some_and(|n| n.continue_calculation());
    if !cascade {
        // Picked up by the next pass instead
        ctx.worklist.extend(targets);
        return true;
    }

    if !targets.is_empty() && ctx.calculation_count > ctx.max_calculations {
        if !ctx.runaway {
            ctx.runaway = true;
            tracing::error!(
                "Calculation cascade from {} exceeded {} steps; continuing in later passes",
                node,
                ctx.max_calculations
            );
            graph.emit(GraphEvent::RunawayCalculation {
                node,
                calculations: ctx.calculation_count,
            });
        }
        ctx.worklist.extend(targets);
        return true;
    }

    for target in targets {
        continue_calculation(graph, ctx, target);
    }
    true
}

/// Value handed to `calculate` for one input
///
/// Only a loop partner can still be uncalculated once a node is eligible; it
/// has produced nothing this recalculation, so the local value seeds the loop.
fn pull_input(graph: &Graph, input: InputRef) -> Option<PortValue> {
    let port = graph.input_port(input)?;
    match port.connection() {
        Some(source) if !graph.node(source.node).is_some_and(Node::is_calculated) => {
            port.default_value.clone()
        }
        _ => graph.input_value(input),
    }
}

/// Pull inputs, run the node's behavior and commit its outputs on success
fn calculate_node(graph: &mut Graph, node: NodeId) -> bool {
    let input_count = graph.node(node).map_or(0, |n| n.inputs().len());
    let inputs: Vec<Option<PortValue>> = (0..input_count)
        .map(|index| pull_input(graph, InputRef::new(node, index)))
        .collect();

    let Some(target) = graph.node_mut(node) else {
        return false;
    };
    let output_types: Vec<PortType> = target
        .outputs
        .iter()
        .map(|o| o.port_type.clone())
        .collect();

    let mut ctx = CalculateContext::new(node, &inputs, &output_types);
    if !target.behavior.calculate(&mut ctx) {
        return false;
    }

    for (port, value) in target.outputs.iter_mut().zip(ctx.into_staged()) {
        port.value = value;
    }
    target.calculated = true;
    true
}
