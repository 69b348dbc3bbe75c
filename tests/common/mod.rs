//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use wsn_energy_sim::config::ScenarioConfig;
use wsn_energy_sim::devices::{Battery, SensorLoad, SolarHarvester, SuperCapacitor};
use wsn_energy_sim::network::{NetworkGraph, NodeId};
use wsn_energy_sim::sim::manager::{AdaptiveParams, DEFAULT_POLICY_K, EnergyPolicy};
use wsn_energy_sim::sim::node::NodeEnergySystem;

/// Default sensor profile (10 s period, 2 s active, 10/20/100 mW).
pub fn default_sensor() -> SensorLoad {
    SensorLoad::from_milliwatts(10.0, 2.0, 10.0, 20.0, 100.0)
}

/// Policy `id` with parameters derived from the default sensor and supercap.
pub fn policy(id: u8) -> EnergyPolicy {
    let params = AdaptiveParams::derive(DEFAULT_POLICY_K, default_sensor().average_power_w(), 5.0);
    EnergyPolicy::from_id(id, params).expect("policy id in 1..=6")
}

/// Default node system (3 Ah battery, 60 cm² panel, 1 F supercap) at step `dt_s`.
pub fn default_system(dt_s: f64, policy_id: u8) -> NodeEnergySystem {
    NodeEnergySystem::new(
        dt_s,
        default_sensor(),
        SolarHarvester::new(60.0),
        SuperCapacitor::default(),
        Battery::new(3.0),
        policy(policy_id),
    )
}

/// Two children and a sink; only child A (0) has a link, to the sink, 100 m long.
pub fn two_children_one_link() -> NetworkGraph {
    let mut b = NetworkGraph::builder();
    b.add_child(NodeId(0), 100.0)
        .add_child(NodeId(1), 100.0)
        .add_sink(NodeId(2))
        .add_link(NodeId(0), NodeId(2), 100.0, 0.001);
    b.build().expect("valid graph")
}

/// Small, fast scenario: five nodes, ten-minute steps, one day.
pub fn small_scenario(policy_id: u8) -> ScenarioConfig {
    let mut cfg = ScenarioConfig::baseline();
    cfg.simulation.dt_s = 600.0;
    cfg.network.child_nodes = 5;
    cfg.policy.id = policy_id;
    cfg
}

/// Synthetic day at one-minute steps: dark, a sunny noon block, dark again.
pub fn sunny_block_irradiance(num_steps: usize) -> Vec<f64> {
    (0..num_steps)
        .map(|t| if (num_steps / 3..2 * num_steps / 3).contains(&t) { 800.0 } else { 0.0 })
        .collect()
}
