// SPDX-License-Identifier: MIT OR Apache-2.0
//! `nodeweave` demo
//!
//! Builds `constant -> split_color -> recorders`, pushes a color through it,
//! prints the graph as RON and rebuilds it from that text.
//!
//! Log verbosity follows `RUST_LOG`, e.g. `RUST_LOG=nodeweave_graph=trace`
//! shows rejected values and reclaimed connections.

use std::rc::Rc;

use nodeweave_graph::nodes::{default_registry, ConstantNode, RecorderNode, SplitColorNode};
use nodeweave_graph::{Graph, GraphError, Node, PortValue};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting nodeweave demo v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        tracing::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), GraphError> {
    let color = ConstantNode::new(PortValue::Color([0.9, 0.4, 0.1, 1.0]));
    let split = SplitColorNode::new();
    let red = RecorderNode::new();
    let alpha = RecorderNode::new();

    color.outputs()[0].add_connection(&split.inputs()[0]);
    if let Some(output) = split.output("R") {
        output.add_connection(&red.inputs()[0]);
    }
    if let Some(output) = split.output("A") {
        output.add_connection(&alpha.inputs()[0]);
    }

    let mut graph = Graph::new("Color Split");
    let members: [Rc<dyn Node>; 4] = [color.clone(), split, red.clone(), alpha];
    graph.set_node_set(members);
    graph.validate()?;

    let delivery = color.emit();
    tracing::info!(accepted = delivery.accepted, rejected = delivery.rejected, "Sent color");
    tracing::info!(received = ?red.received(), "Red channel");

    // Rejected at the split input; nothing downstream changes.
    color.set(PortValue::from("not a color"));
    let delivery = color.emit();
    tracing::info!(accepted = delivery.accepted, rejected = delivery.rejected, "Sent string");

    // Clearing the split input clears every channel downstream.
    color.outputs()[0].send_result(None);
    tracing::info!(received = ?red.received(), "Red channel after clear");

    color.set(PortValue::Color([0.2, 0.4, 0.6, 1.0]));
    color.emit();

    let ron = graph.to_ron()?;
    println!("{ron}");

    let rebuilt = Graph::from_ron(&ron, &default_registry())?;
    rebuilt.validate()?;
    tracing::info!(
        nodes = rebuilt.node_count(),
        edges = rebuilt.edges().len(),
        serializable = rebuilt.is_serializable(),
        "Rebuilt graph"
    );

    Ok(())
}
