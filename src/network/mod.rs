//! Multi-hop communication between sensor nodes and the sink.

/// Graph of nodes and weighted links, plus random forest deployments.
pub mod graph;
/// Least-cost routing and per-node cost attribution.
pub mod router;

pub use graph::{ForestLayout, GraphBuilder, NetworkGraph, NodeId, NodeInfo, NodeRole, link_cost};
pub use router::{CostLedger, HopCost, NetworkRouter, Route};
