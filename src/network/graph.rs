//! Static communication graph between child nodes and the sink.

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{NodeIndex, UnGraph};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::debug;

use crate::error::{SimError, SimResult};

/// Identifier of a node in the communication graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Child,
    /// Data sink with unlimited energy.
    Sink,
}

/// Per-node attributes carried by the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub role: NodeRole,
    /// Initial energy budget (J); infinite for the sink.
    pub initial_energy_j: f64,
    /// Placement in metres, if known.
    pub position: Option<(f64, f64)>,
}

/// Hop weight for a link of length `distance_m`: `k·d²` (J per transmission).
pub fn link_cost(cost_coefficient: f64, distance_m: f64) -> f64 {
    cost_coefficient * distance_m * distance_m
}

/// Immutable undirected graph with one sink.
///
/// Edge weights are communication energy per transmission (J). The topology
/// is fixed for the duration of a run.
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    graph: UnGraph<NodeInfo, f64>,
    index: HashMap<NodeId, NodeIndex>,
    sink: NodeId,
}

impl NetworkGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    pub fn sink(&self) -> NodeId {
        self.sink
    }

    /// Child node ids in ascending order.
    pub fn children(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .graph
            .node_weights()
            .filter(|n| n.role == NodeRole::Child)
            .map(|n| n.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeInfo> {
        self.index.get(&id).map(|&ix| &self.graph[ix])
    }

    /// Weight of the edge between `a` and `b`, if linked.
    pub fn edge_weight(&self, a: NodeId, b: NodeId) -> Option<f64> {
        let (ia, ib) = (self.index_of(a)?, self.index_of(b)?);
        self.graph.find_edge(ia, ib).map(|e| self.graph[e])
    }

    /// Neighbours of `id` in ascending order.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let Some(ix) = self.index_of(id) else {
            return Vec::new();
        };
        let mut ids: Vec<NodeId> = self
            .graph
            .neighbors(ix)
            .map(|n| self.graph[n].id)
            .collect();
        ids.sort();
        ids
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub(crate) fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.index.get(&id).copied()
    }

    pub(crate) fn inner(&self) -> &UnGraph<NodeInfo, f64> {
        &self.graph
    }
}

/// Builder collecting nodes and links before validating them into a
/// [`NetworkGraph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<NodeInfo>,
    edges: Vec<(NodeId, NodeId, f64)>,
}

impl GraphBuilder {
    /// Adds a child node with an initial energy budget.
    pub fn add_child(&mut self, id: NodeId, initial_energy_j: f64) -> &mut Self {
        self.nodes.push(NodeInfo {
            id,
            role: NodeRole::Child,
            initial_energy_j,
            position: None,
        });
        self
    }

    /// Adds the sink node.
    pub fn add_sink(&mut self, id: NodeId) -> &mut Self {
        self.nodes.push(NodeInfo {
            id,
            role: NodeRole::Sink,
            initial_energy_j: f64::INFINITY,
            position: None,
        });
        self
    }

    /// Records the position of an already-added node.
    pub fn place(&mut self, id: NodeId, x: f64, y: f64) -> &mut Self {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.position = Some((x, y));
        }
        self
    }

    /// Adds an undirected edge with an explicit weight (J).
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, weight: f64) -> &mut Self {
        self.edges.push((a, b, weight));
        self
    }

    /// Adds an undirected link whose weight is `k·distance²`.
    pub fn add_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        distance_m: f64,
        cost_coefficient: f64,
    ) -> &mut Self {
        self.add_edge(a, b, link_cost(cost_coefficient, distance_m))
    }

    /// Validates and freezes the graph.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Graph`] on duplicate ids, a sink count other than
    /// one, edges to unknown nodes, self-loops, duplicate edges, or weights
    /// that are negative or not finite.
    pub fn build(&self) -> SimResult<NetworkGraph> {
        let mut graph = UnGraph::<NodeInfo, f64>::default();
        let mut index = HashMap::new();
        let mut sink = None;

        for node in &self.nodes {
            if index.contains_key(&node.id) {
                return Err(SimError::Graph(format!("duplicate node id {}", node.id)));
            }
            if node.role == NodeRole::Sink {
                if sink.is_some() {
                    return Err(SimError::Graph("more than one sink".into()));
                }
                sink = Some(node.id);
            }
            let ix = graph.add_node(node.clone());
            index.insert(node.id, ix);
        }
        let sink = sink.ok_or_else(|| SimError::Graph("no sink node".into()))?;

        for &(a, b, w) in &self.edges {
            let (Some(&ia), Some(&ib)) = (index.get(&a), index.get(&b)) else {
                return Err(SimError::Graph(format!("edge {a}-{b} references unknown node")));
            };
            if a == b {
                return Err(SimError::Graph(format!("self-loop on node {a}")));
            }
            if !w.is_finite() || w < 0.0 {
                return Err(SimError::Graph(format!("edge {a}-{b} has invalid weight {w}")));
            }
            if graph.find_edge(ia, ib).is_some() {
                return Err(SimError::Graph(format!("duplicate edge {a}-{b}")));
            }
            graph.add_edge(ia, ib, w);
        }

        Ok(NetworkGraph { graph, index, sink })
    }
}

/// Random forest deployment around a central sink.
///
/// Children are placed uniformly (in angle and radius) inside a disk. The
/// first child is redrawn until it is within radio range of the sink; each
/// later child is accepted only with at least `min_neighbors` placed children
/// in range. Every in-range pair is linked with weight `k·d²`.
#[derive(Debug, Clone)]
pub struct ForestLayout {
    pub child_nodes: u32,
    pub forest_radius_m: f64,
    pub min_neighbors: usize,
    pub radio_range_m: f64,
    pub cost_coefficient: f64,
    pub initial_energy_j: f64,
    pub seed: u64,
    /// Upper bound on candidate positions drawn before giving up.
    pub max_attempts: usize,
}

impl Default for ForestLayout {
    fn default() -> Self {
        Self {
            child_nodes: 10,
            forest_radius_m: 500.0,
            min_neighbors: 1,
            radio_range_m: 100.0,
            cost_coefficient: 0.001,
            initial_energy_j: 100.0,
            seed: 81,
            max_attempts: 1_000_000,
        }
    }
}

impl ForestLayout {
    /// Sink id used by this layout: one past the last child.
    pub fn sink_id(&self) -> NodeId {
        NodeId(self.child_nodes)
    }

    /// Draws positions and builds the graph.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Placement`] if the constraints cannot be met within
    /// `max_attempts` draws.
    pub fn build(&self) -> SimResult<NetworkGraph> {
        let positions = self.place_children()?;
        let sink = self.sink_id();
        let mut builder = NetworkGraph::builder();

        for (i, &(x, y)) in positions.iter().enumerate() {
            let id = NodeId(i as u32);
            builder.add_child(id, self.initial_energy_j).place(id, x, y);
        }
        builder.add_sink(sink).place(sink, 0.0, 0.0);

        for (i, &(x, y)) in positions.iter().enumerate() {
            let d = x.hypot(y);
            if d <= self.radio_range_m {
                builder.add_link(NodeId(i as u32), sink, d, self.cost_coefficient);
            }
        }
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let d = distance(positions[i], positions[j]);
                if d <= self.radio_range_m {
                    builder.add_link(
                        NodeId(i as u32),
                        NodeId(j as u32),
                        d,
                        self.cost_coefficient,
                    );
                }
            }
        }

        let graph = builder.build()?;
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "forest topology built"
        );
        Ok(graph)
    }

    fn place_children(&self) -> SimResult<Vec<(f64, f64)>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut placed: Vec<(f64, f64)> = Vec::with_capacity(self.child_nodes as usize);
        let mut attempts = 0;

        while placed.len() < self.child_nodes as usize {
            attempts += 1;
            if attempts > self.max_attempts {
                return Err(SimError::Placement { attempts: self.max_attempts });
            }
            let candidate = self.random_position(&mut rng);
            let accept = if placed.is_empty() {
                candidate.0.hypot(candidate.1) <= self.radio_range_m
            } else {
                let nearby = placed
                    .iter()
                    .filter(|&&p| distance(candidate, p) <= self.radio_range_m)
                    .count();
                nearby >= self.min_neighbors
            };
            if accept {
                placed.push(candidate);
            }
        }
        Ok(placed)
    }

    fn random_position(&self, rng: &mut StdRng) -> (f64, f64) {
        let angle = rng.random_range(0.0..std::f64::consts::TAU);
        let radius = rng.random_range(0.0..=self.forest_radius_m);
        (radius * angle.cos(), radius * angle.sin())
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> NetworkGraph {
        let mut b = NetworkGraph::builder();
        b.add_child(NodeId(0), 100.0)
            .add_child(NodeId(1), 100.0)
            .add_sink(NodeId(2))
            .add_edge(NodeId(0), NodeId(2), 10.0)
            .add_link(NodeId(1), NodeId(0), 50.0, 0.001);
        b.build().expect("valid graph")
    }

    #[test]
    fn builds_with_sink_and_children() {
        let g = triangle();
        assert_eq!(g.sink(), NodeId(2));
        assert_eq!(g.children(), vec![NodeId(0), NodeId(1)]);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert!(g.node(NodeId(2)).is_some_and(|n| n.initial_energy_j.is_infinite()));
    }

    #[test]
    fn edges_are_undirected_with_squared_distance_weight() {
        let g = triangle();
        assert_eq!(g.edge_weight(NodeId(0), NodeId(1)), Some(2.5));
        assert_eq!(g.edge_weight(NodeId(1), NodeId(0)), Some(2.5));
        assert_eq!(g.edge_weight(NodeId(1), NodeId(2)), None);
        assert_eq!(g.neighbors(NodeId(0)), vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn rejects_missing_sink() {
        let mut b = NetworkGraph::builder();
        b.add_child(NodeId(0), 1.0);
        assert!(matches!(b.build(), Err(SimError::Graph(_))));
    }

    #[test]
    fn rejects_bad_edges() {
        let mut b = NetworkGraph::builder();
        b.add_child(NodeId(0), 1.0)
            .add_sink(NodeId(1))
            .add_edge(NodeId(0), NodeId(5), 1.0);
        assert!(b.build().is_err());

        let mut b = NetworkGraph::builder();
        b.add_child(NodeId(0), 1.0)
            .add_sink(NodeId(1))
            .add_edge(NodeId(0), NodeId(1), -1.0);
        assert!(b.build().is_err());

        let mut b = NetworkGraph::builder();
        b.add_child(NodeId(0), 1.0)
            .add_sink(NodeId(1))
            .add_edge(NodeId(0), NodeId(1), 1.0)
            .add_edge(NodeId(1), NodeId(0), 2.0);
        assert!(b.build().is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut b = NetworkGraph::builder();
        b.add_child(NodeId(0), 1.0).add_child(NodeId(0), 1.0).add_sink(NodeId(1));
        assert!(b.build().is_err());
    }

    #[test]
    fn forest_layout_respects_range_constraints() {
        let layout = ForestLayout {
            child_nodes: 8,
            ..ForestLayout::default()
        };
        let g = layout.build().expect("layout succeeds");
        assert_eq!(g.children().len(), 8);
        assert_eq!(g.sink(), NodeId(8));
        // First child is always linked to the sink
        assert!(g.edge_weight(NodeId(0), NodeId(8)).is_some());
        for id in g.children().into_iter().skip(1) {
            assert!(!g.neighbors(id).is_empty());
        }
        for id in g.children() {
            let (x, y) = g.node(id).and_then(|n| n.position).unwrap_or_default();
            assert!(x.hypot(y) <= 500.0 + 1e-9);
        }
    }

    #[test]
    fn forest_layout_is_deterministic_for_seed() {
        let a = ForestLayout::default().build().expect("layout a");
        let b = ForestLayout::default().build().expect("layout b");
        for id in a.children() {
            assert_eq!(a.node(id), b.node(id));
            assert_eq!(a.neighbors(id), b.neighbors(id));
        }
    }

    #[test]
    fn forest_layout_gives_up_when_impossible() {
        let layout = ForestLayout {
            child_nodes: 3,
            radio_range_m: 0.0,
            max_attempts: 1000,
            ..ForestLayout::default()
        };
        assert!(matches!(layout.build(), Err(SimError::Placement { .. })));
    }
}
