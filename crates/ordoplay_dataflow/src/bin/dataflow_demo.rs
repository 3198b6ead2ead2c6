// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builds a small graph, recalculates it and logs the results.
//!
//! Usage: `dataflow_demo [config.ron]`

use ordoplay_dataflow::kinds::create_default_registry;
use ordoplay_dataflow::{
    EngineConfig, EventLog, Graph, GraphError, GraphEvent, InputRef, OutputRef, PortValue,
};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ordoplay_dataflow=debug,dataflow_demo=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => match EngineConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config {:?}: {}. Using defaults.", path, e);
                EngineConfig::default()
            }
        },
        None => EngineConfig::default(),
    };

    if let Err(e) = run(config) {
        tracing::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run(config: EngineConfig) -> Result<(), GraphError> {
    let registry = create_default_registry();
    let events = EventLog::new();

    let mut graph = Graph::with_config("demo", config);
    graph.add_sink(events.clone());

    let input = graph.create_node(&registry, "value")?;
    let add = graph.create_node(&registry, "add")?;
    let preview = graph.create_node(&registry, "preview")?;

    graph.set_input_value(InputRef::new(input, 0), PortValue::Float(5.0))?;
    graph.set_input_value(InputRef::new(add, 1), PortValue::Float(3.0))?;
    graph.connect(OutputRef::new(input, 0), InputRef::new(add, 0))?;
    graph.connect(OutputRef::new(add, 0), InputRef::new(preview, 0))?;

    let report = graph.recalculate_all();
    tracing::info!(
        "Value(5) + 3 = {:?} ({} nodes, {} passes)",
        graph.output_value(OutputRef::new(preview, 0)),
        report.calculated,
        report.passes
    );

    graph.set_input_value(InputRef::new(input, 0), PortValue::Float(10.0))?;
    tracing::info!(
        "Value(10) + 3 = {:?}",
        graph.output_value(OutputRef::new(preview, 0))
    );

    let repaints = events
        .events()
        .iter()
        .filter(|e| matches!(e, GraphEvent::NodeChanged { .. }))
        .count();
    tracing::info!("{} change notifications emitted", repaints);
    Ok(())
}
