//! Step-synchronous multi-node execution over a shared network graph.
//!
//! Each step runs in three phases:
//!
//! 1. every [`NodeSimulator`] advances its own system in parallel;
//! 2. the coordinator routes the step's messages in ascending source order,
//!    books hop costs and posts a [`RelayCharge`] to each forwarding node's
//!    mailbox;
//! 3. every simulator drains its own mailbox in parallel.
//!
//! A node's system is only ever touched by its own simulator, and phase 2 is
//! sequential, so results do not depend on thread scheduling.

use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::{self, Sender};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{SimError, SimResult};
use crate::network::{CostLedger, NetworkGraph, NetworkRouter, NodeId};

use super::clock::Clock;
use super::node::NodeEnergySystem;
use super::simulator::{NodeSimulator, RelayCharge, StepOutcome};
use super::types::{CommunicationEvent, SimConfig, SimulationResult, Termination};

/// Merged output of a network run.
#[derive(Debug, Clone)]
pub struct NetworkRunResult {
    /// Per-node results keyed by node id.
    pub results: BTreeMap<NodeId, SimulationResult>,
    /// Every routed message in step order, ascending source within a step.
    pub communication_log: Vec<CommunicationEvent>,
    /// Forwarding energy booked against each node (J).
    pub communication_energy: BTreeMap<NodeId, f64>,
}

impl NetworkRunResult {
    /// Nodes that stopped before the last step.
    pub fn stopped_early(&self) -> impl Iterator<Item = &SimulationResult> {
        self.results
            .values()
            .filter(|r| r.termination != Termination::Completed)
    }
}

/// Runs every child node of a graph against one irradiance series.
#[derive(Debug, Clone)]
pub struct MultiNodeOrchestrator {
    config: SimConfig,
    router: NetworkRouter,
}

impl MultiNodeOrchestrator {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            router: NetworkRouter::new(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Simulates all child nodes of `graph`.
    ///
    /// # Errors
    ///
    /// Fails before any step runs if a child lacks an energy system or event
    /// series, if an event series length differs from the step count, if the
    /// irradiance series is too short, or if `systems` names the sink or a
    /// node outside the graph.
    pub fn run(
        &self,
        graph: &NetworkGraph,
        mut systems: BTreeMap<NodeId, NodeEnergySystem>,
        irradiance: &[f64],
        events: &BTreeMap<NodeId, Vec<bool>>,
    ) -> SimResult<NetworkRunResult> {
        let num_steps = self.config.num_steps;
        self.validate(graph, &systems, irradiance, events)?;

        let children = graph.children();
        let mut mailboxes: HashMap<NodeId, Sender<RelayCharge>> = HashMap::new();
        let mut sims = Vec::with_capacity(children.len());
        for &id in &children {
            let system = systems
                .remove(&id)
                .ok_or(SimError::MissingEnergySystem(id))?;
            let (tx, rx) = mpsc::channel();
            mailboxes.insert(id, tx);
            sims.push(NodeSimulator::new(id, system, &self.config).with_mailbox(rx));
        }
        let position: HashMap<NodeId, usize> =
            children.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        info!(
            nodes = sims.len(),
            steps = num_steps,
            edges = graph.edge_count(),
            "starting network run"
        );

        let sink = graph.sink();
        let mut ledger = CostLedger::new();
        let mut log = Vec::new();
        let mut clock = Clock::new(num_steps, self.config.dt_s);

        while let Some(step) = clock.tick() {
            let irr = irradiance[step];

            // Phase 1: own timelines
            let raised: Vec<NodeId> = sims
                .par_iter_mut()
                .map(|sim| {
                    let flag = events.get(&sim.id()).is_some_and(|e| e[step]);
                    match sim.advance(step, irr, flag) {
                        StepOutcome::Recorded { event: true } => Some(sim.id()),
                        _ => None,
                    }
                })
                .collect::<Vec<_>>()
                .into_iter()
                .flatten()
                .collect();

            // Phase 2: routing and cost attribution
            for source in &raised {
                let route = self.router.route(graph, *source, sink)?;
                if !route.is_reachable() {
                    continue;
                }
                ledger.attribute(&route);
                for hop in &route.hops {
                    let Some(tx) = mailboxes.get(&hop.node) else {
                        continue;
                    };
                    let charge = RelayCharge {
                        step,
                        origin: *source,
                        cost_j: hop.cost,
                    };
                    if tx.send(charge).is_err() {
                        debug!(node = %hop.node, step, "relay mailbox closed");
                    }
                }
                let event = CommunicationEvent {
                    step,
                    path: route.path,
                    total_cost: route.total_cost,
                };
                if let Some(&i) = position.get(source) {
                    sims[i].log_communication(event.clone());
                }
                log.push(event);
            }

            // Phase 3: owners apply their relay charges
            if !raised.is_empty() {
                sims.par_iter_mut().for_each(|sim| {
                    sim.apply_relay_charges();
                });
            }

            if sims.iter().all(NodeSimulator::is_stopped) {
                debug!(step, "all nodes stopped");
                break;
            }
        }

        let results: BTreeMap<NodeId, SimulationResult> = sims
            .into_iter()
            .map(|sim| (sim.id(), sim.finish()))
            .collect();
        info!(
            messages = log.len(),
            forwarding_j = ledger.total(),
            "network run finished"
        );

        Ok(NetworkRunResult {
            results,
            communication_log: log,
            communication_energy: ledger.into_inner(),
        })
    }

    fn validate(
        &self,
        graph: &NetworkGraph,
        systems: &BTreeMap<NodeId, NodeEnergySystem>,
        irradiance: &[f64],
        events: &BTreeMap<NodeId, Vec<bool>>,
    ) -> SimResult<()> {
        let num_steps = self.config.num_steps;
        if irradiance.len() < num_steps {
            return Err(SimError::IrradianceLength {
                len: irradiance.len(),
                expected: num_steps,
            });
        }
        for &id in systems.keys() {
            if !graph.contains(id) {
                return Err(SimError::UnknownNode(id));
            }
            if id == graph.sink() {
                return Err(SimError::SinkEnergySystem(id));
            }
        }
        for id in graph.children() {
            if !systems.contains_key(&id) {
                return Err(SimError::MissingEnergySystem(id));
            }
            let series = events.get(&id).ok_or(SimError::MissingEventSeries(id))?;
            if series.len() != num_steps {
                return Err(SimError::EventSeriesLength {
                    node: id,
                    len: series.len(),
                    expected: num_steps,
                });
            }
        }
        Ok(())
    }
}
