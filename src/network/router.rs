//! Least-cost routing from a child node to the sink.

use std::collections::BTreeMap;

use petgraph::algo::astar;
use petgraph::visit::EdgeRef;
use tracing::warn;

use crate::error::{SimError, SimResult};

use super::graph::{NetworkGraph, NodeId};

/// Energy spent by one node to forward a message one hop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HopCost {
    /// Node performing the transmission.
    pub node: NodeId,
    /// Receiving node.
    pub next: NodeId,
    /// Edge weight (J).
    pub cost: f64,
}

/// Least-cost path between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Node ids from source to destination; empty when unreachable.
    pub path: Vec<NodeId>,
    /// Sum of hop weights (J); infinite when unreachable.
    pub total_cost: f64,
    /// One entry per hop, in path order.
    pub hops: Vec<HopCost>,
}

impl Route {
    fn unreachable() -> Self {
        Self {
            path: Vec::new(),
            total_cost: f64::INFINITY,
            hops: Vec::new(),
        }
    }

    pub fn is_reachable(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Shortest-path router over a [`NetworkGraph`].
///
/// Non-negative edge weights make Dijkstra (A* with a zero heuristic) exact.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkRouter;

impl NetworkRouter {
    pub fn new() -> Self {
        Self
    }

    /// Finds the minimum-cost path from `source` to `sink`.
    ///
    /// An unreachable destination is not an error: it yields an empty path
    /// with infinite cost and a warning.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownNode`] if either endpoint is not in the graph.
    pub fn route(&self, graph: &NetworkGraph, source: NodeId, sink: NodeId) -> SimResult<Route> {
        let start = graph.index_of(source).ok_or(SimError::UnknownNode(source))?;
        let goal = graph.index_of(sink).ok_or(SimError::UnknownNode(sink))?;
        let inner = graph.inner();

        let Some((_, indices)) = astar(inner, start, |n| n == goal, |e| *e.weight(), |_| 0.0)
        else {
            warn!(%source, %sink, "sink unreachable, message dropped");
            return Ok(Route::unreachable());
        };

        let hops = indices
            .windows(2)
            .map(|w| {
                let (node, next) = (inner[w[0]].id, inner[w[1]].id);
                inner
                    .find_edge(w[0], w[1])
                    .map(|edge| HopCost {
                        node,
                        next,
                        cost: inner[edge],
                    })
                    .ok_or_else(|| SimError::Graph(format!("route hop {node}-{next} has no edge")))
            })
            .collect::<SimResult<Vec<HopCost>>>()?;
        let path: Vec<NodeId> = indices.iter().map(|&ix| inner[ix].id).collect();
        let total_cost = hops.iter().map(|h| h.cost).sum();

        Ok(Route {
            path,
            total_cost,
            hops,
        })
    }
}

/// Running totals of forwarding energy per node.
///
/// Each hop's cost is charged to the node performing the transmission; the
/// sink never transmits and so never accrues cost.
#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    per_node: BTreeMap<NodeId, f64>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charges every hop of `route` to its forwarding node.
    pub fn attribute(&mut self, route: &Route) {
        for hop in &route.hops {
            *self.per_node.entry(hop.node).or_insert(0.0) += hop.cost;
        }
    }

    /// Energy charged to `node` so far (J).
    pub fn get(&self, node: NodeId) -> f64 {
        self.per_node.get(&node).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.per_node.values().sum()
    }

    pub fn into_inner(self) -> BTreeMap<NodeId, f64> {
        self.per_node
    }
}
