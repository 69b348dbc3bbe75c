mod common;

use std::collections::BTreeMap;

use wsn_energy_sim::network::{NetworkRouter, NodeId};
use wsn_energy_sim::sim::orchestrator::MultiNodeOrchestrator;
use wsn_energy_sim::sim::simulator::NodeSimulator;
use wsn_energy_sim::sim::types::{SimConfig, Termination};

#[test]
fn single_event_is_routed_and_charged_to_its_source() {
    let graph = common::two_children_one_link();
    let config = SimConfig::new(1.0, 4);
    let systems: BTreeMap<_, _> = [
        (NodeId(0), common::default_system(1.0, 1)),
        (NodeId(1), common::default_system(1.0, 1)),
    ]
    .into_iter()
    .collect();
    let events: BTreeMap<_, _> = [
        (NodeId(0), vec![false, false, true, false]),
        (NodeId(1), vec![false; 4]),
    ]
    .into_iter()
    .collect();

    let out = MultiNodeOrchestrator::new(config)
        .run(&graph, systems, &[500.0; 4], &events)
        .expect("inputs are consistent");

    assert_eq!(out.communication_log.len(), 1);
    let ev = &out.communication_log[0];
    assert_eq!(ev.step, 2);
    assert_eq!(ev.path, vec![NodeId(0), NodeId(2)]);
    assert!((ev.total_cost - 10.0).abs() < 1e-9);

    assert!((out.communication_energy[&NodeId(0)] - 10.0).abs() < 1e-9);
    assert!((out.results[&NodeId(0)].communication_energy_j - 10.0).abs() < 1e-9);
    assert_eq!(out.results[&NodeId(1)].communication_energy_j, 0.0);

    for result in out.results.values() {
        assert_eq!(result.records.len(), 4);
        assert_eq!(result.termination, Termination::Completed);
        assert_eq!(result.runtime_s, 4.0);
    }
}

#[test]
fn standalone_simulator_agrees_with_orchestrator_for_a_lone_source() {
    let graph = common::two_children_one_link();
    let config = SimConfig::new(1.0, 4);
    let events = vec![false, false, true, false];

    let alone = NodeSimulator::run(
        common::default_system(1.0, 1),
        &config,
        &[500.0; 4],
        &events,
        &NetworkRouter::new(),
        &graph,
        NodeId(0),
    )
    .expect("inputs are consistent");

    let systems: BTreeMap<_, _> = [
        (NodeId(0), common::default_system(1.0, 1)),
        (NodeId(1), common::default_system(1.0, 1)),
    ]
    .into_iter()
    .collect();
    let all_events: BTreeMap<_, _> = [(NodeId(0), events), (NodeId(1), vec![false; 4])]
        .into_iter()
        .collect();
    let together = MultiNodeOrchestrator::new(config)
        .run(&graph, systems, &[500.0; 4], &all_events)
        .expect("inputs are consistent");

    let a = &together.results[&NodeId(0)];
    assert_eq!(alone.records, a.records);
    assert_eq!(alone.communication_log, a.communication_log);
    assert_eq!(alone.communication_energy_j, a.communication_energy_j);
}

#[test]
fn unreachable_child_keeps_simulating() {
    let graph = common::two_children_one_link();
    let systems: BTreeMap<_, _> = [
        (NodeId(0), common::default_system(1.0, 1)),
        (NodeId(1), common::default_system(1.0, 1)),
    ]
    .into_iter()
    .collect();
    let events: BTreeMap<_, _> = [(NodeId(0), vec![false; 6]), (NodeId(1), vec![true; 6])]
        .into_iter()
        .collect();

    let out = MultiNodeOrchestrator::new(SimConfig::new(1.0, 6))
        .run(&graph, systems, &[0.0; 6], &events)
        .expect("inputs are consistent");

    assert!(out.communication_log.is_empty());
    assert_eq!(out.results[&NodeId(1)].records.len(), 6);
}

#[test]
fn relay_charges_leave_a_mark_on_the_relay_battery() {
    let mut b = wsn_energy_sim::network::NetworkGraph::builder();
    b.add_child(NodeId(0), 100.0)
        .add_child(NodeId(1), 100.0)
        .add_sink(NodeId(2))
        .add_link(NodeId(0), NodeId(1), 30.0, 0.001)
        .add_link(NodeId(1), NodeId(2), 30.0, 0.001);
    let graph = b.build().expect("valid graph");

    let run = |charge: bool| {
        let systems: BTreeMap<_, _> = [
            (NodeId(0), common::default_system(1.0, 1)),
            (NodeId(1), common::default_system(1.0, 1)),
        ]
        .into_iter()
        .collect();
        let events: BTreeMap<_, _> = [(NodeId(0), vec![true; 20]), (NodeId(1), vec![false; 20])]
            .into_iter()
            .collect();
        MultiNodeOrchestrator::new(SimConfig::new(1.0, 20).with_relay_charging(charge))
            .run(&graph, systems, &[0.0; 20], &events)
            .expect("inputs are consistent")
    };

    let charged = run(true);
    let free = run(false);
    let soc = |r: &wsn_energy_sim::sim::orchestrator::NetworkRunResult| {
        r.results[&NodeId(1)].last().map(|s| s.battery_soc).unwrap_or_default()
    };
    assert!(soc(&charged) < soc(&free));
    // Forwarding energy is booked either way
    assert_eq!(
        charged.communication_energy[&NodeId(1)],
        free.communication_energy[&NodeId(1)]
    );
    assert_eq!(charged.communication_log.len(), 20);
}
