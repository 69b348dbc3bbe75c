//! Drives one node's energy system along the shared timeline.

use std::sync::mpsc::Receiver;

use tracing::{debug, info};

use crate::devices::StorageDevice;
use crate::error::{SimError, SimResult};
use crate::network::{NetworkGraph, NetworkRouter, NodeId};

use super::clock::Clock;
use super::node::NodeEnergySystem;
use super::types::{CommunicationEvent, SimConfig, SimulationResult, StepRecord, Termination};

/// Forwarding cost owed by a relaying node, delivered to its owner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayCharge {
    /// Step during which the message was forwarded.
    pub step: usize,
    /// Node that originated the message.
    pub origin: NodeId,
    /// Hop weight (J).
    pub cost_j: f64,
}

/// Outcome of advancing a simulator by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step was recorded; `event` is the communication flag it carried.
    Recorded { event: bool },
    /// The node has stopped; nothing was recorded.
    Stopped,
}

/// Sole owner of one node's [`NodeEnergySystem`] during a run.
///
/// Every mutation of the system, including forwarding costs raised by other
/// nodes' messages, goes through this type from a single timeline.
#[derive(Debug)]
pub struct NodeSimulator {
    id: NodeId,
    system: NodeEnergySystem,
    degradation_limit: f64,
    charge_relays: bool,
    initial_qloss: f64,
    result: SimulationResult,
    battery_serving: Option<bool>,
    stopped: bool,
    mailbox: Option<Receiver<RelayCharge>>,
}

impl NodeSimulator {
    pub fn new(id: NodeId, system: NodeEnergySystem, config: &SimConfig) -> Self {
        let initial_qloss = system.battery().qloss();
        Self {
            id,
            system,
            degradation_limit: config.degradation_limit,
            charge_relays: config.charge_relays,
            initial_qloss,
            result: SimulationResult::new(id),
            battery_serving: None,
            stopped: false,
            mailbox: None,
        }
    }

    /// Attaches the receiving end of this node's relay-charge channel.
    pub fn with_mailbox(mut self, mailbox: Receiver<RelayCharge>) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn system(&self) -> &NodeEnergySystem {
        &self.system
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Runs one step of the node's own timeline.
    ///
    /// The step is not recorded if the system refuses it (dead) or if capacity
    /// loss has crossed the degradation limit; either stops the node.
    pub fn advance(&mut self, step: usize, irradiance: f64, event: bool) -> StepOutcome {
        if self.stopped {
            return StepOutcome::Stopped;
        }
        let Some(out) = self.system.step(event, irradiance) else {
            self.stop(step, Termination::Dead);
            return StepOutcome::Stopped;
        };

        self.result.energy_consumed_j += out.demand_w * self.system.dt_s();

        let battery_serving = out.battery_w > 0.0;
        if self.battery_serving.is_some_and(|prev| prev != battery_serving) {
            self.result.switch_count += 1;
        }
        self.battery_serving = Some(battery_serving);

        if self.system.battery().qloss() > self.degradation_limit {
            self.stop(step, Termination::DegradationLimit);
            return StepOutcome::Stopped;
        }

        let battery = self.system.battery();
        self.result.records.push(StepRecord {
            step,
            capacity_loss: battery.qloss() - self.initial_qloss,
            battery_voc: battery.voc(),
            battery_soc: battery.soc(),
            battery_current_a: battery.current_a(),
            sc_soc: self.system.supercap().soc(),
            efficiency: self.system.efficiency(),
            battery_w: out.battery_w,
            sc_w: out.sc_w,
            demand_w: out.demand_w,
        });
        StepOutcome::Recorded { event }
    }

    /// Appends a message this node originated.
    pub fn log_communication(&mut self, event: CommunicationEvent) {
        self.result.communication_log.push(event);
    }

    /// Books a forwarding cost against this node and, if enabled, draws it
    /// from storage as extra demand over one step.
    ///
    /// The cost is still booked after the node has stopped, but nothing is
    /// drawn.
    pub fn charge_relay(&mut self, charge: RelayCharge) {
        self.result.communication_energy_j += charge.cost_j;
        if !self.charge_relays {
            return;
        }
        if self.stopped {
            debug!(
                node = %self.id,
                step = charge.step,
                origin = %charge.origin,
                cost_j = charge.cost_j,
                "relay charge dropped for stopped node"
            );
            return;
        }
        let demand_w = charge.cost_j / self.system.dt_s();
        self.system.absorb(demand_w);
    }

    /// Applies every relay charge waiting in the mailbox; returns how many.
    pub fn apply_relay_charges(&mut self) -> usize {
        let Some(mailbox) = self.mailbox.take() else {
            return 0;
        };
        let mut applied = 0;
        while let Ok(charge) = mailbox.try_recv() {
            self.charge_relay(charge);
            applied += 1;
        }
        self.mailbox = Some(mailbox);
        applied
    }

    fn stop(&mut self, step: usize, reason: Termination) {
        self.stopped = true;
        self.result.termination = reason;
        info!(node = %self.id, step, reason = %reason, "node stopped");
    }

    /// Consumes the simulator and returns its result.
    pub fn finish(mut self) -> SimulationResult {
        self.result.runtime_s = self.result.records.len() as f64 * self.system.dt_s();
        self.result
    }

    /// Runs a single node over the whole timeline.
    ///
    /// Messages are routed to the graph's sink; only hops this node forwards
    /// itself are charged here, since other nodes' systems are not owned.
    ///
    /// # Errors
    ///
    /// Fails before any step runs if either input series is too short or the
    /// event series length differs from `config.num_steps`, or if `self_id`
    /// is not in the graph.
    pub fn run(
        system: NodeEnergySystem,
        config: &SimConfig,
        irradiance: &[f64],
        events: &[bool],
        router: &NetworkRouter,
        graph: &NetworkGraph,
        self_id: NodeId,
    ) -> SimResult<SimulationResult> {
        if events.len() != config.num_steps {
            return Err(SimError::EventSeriesLength {
                node: self_id,
                len: events.len(),
                expected: config.num_steps,
            });
        }
        if irradiance.len() < config.num_steps {
            return Err(SimError::IrradianceLength {
                len: irradiance.len(),
                expected: config.num_steps,
            });
        }
        if !graph.contains(self_id) {
            return Err(SimError::UnknownNode(self_id));
        }

        let sink = graph.sink();
        let mut sim = NodeSimulator::new(self_id, system, config);
        let mut clock = Clock::new(config.num_steps, config.dt_s);

        while let Some(step) = clock.tick() {
            match sim.advance(step, irradiance[step], events[step]) {
                StepOutcome::Stopped => break,
                StepOutcome::Recorded { event: false } => {}
                StepOutcome::Recorded { event: true } => {
                    let route = router.route(graph, self_id, sink)?;
                    if !route.is_reachable() {
                        continue;
                    }
                    for hop in route.hops.iter().filter(|h| h.node == self_id) {
                        sim.charge_relay(RelayCharge {
                            step,
                            origin: self_id,
                            cost_j: hop.cost,
                        });
                    }
                    sim.log_communication(CommunicationEvent {
                        step,
                        path: route.path,
                        total_cost: route.total_cost,
                    });
                }
            }
        }
        Ok(sim.finish())
    }
}
