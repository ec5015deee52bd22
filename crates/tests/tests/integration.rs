//! Integration tests for end-to-end network execution.
//!
//! These tests verify the full pipeline:
//! Assemble network → Build plan → Parallel + sequential run → Compare

use std::time::Duration;

use hydronet_foundation::{DeployMode, Device, ElementId, IndexWindow, NodeId};
use hydronet_runtime::models::{Lag, LinearStorage};
use hydronet_runtime::{Element, Error, Network, Node, RunConfig, Simulator};
use hydronet_tests::{
    FailingModel, FixtureError, NetworkFixture, PanickingModel, PassThrough, assert_same_series,
    init_tracing,
};

const HORIZON: usize = 48;

/// Every thread count produces the sequential result, for every combination
/// of outlet and reach deploy modes.
#[test]
fn test_thread_count_equivalence_across_modes() {
    init_tracing();
    for outlet_mode in DeployMode::ALL {
        for offset in 0..DeployMode::ALL.len() {
            let expected = NetworkFixture::river(HORIZON, 6, outlet_mode, offset)
                .run_threads(0)
                .unwrap();
            for threads in [1, 2, 4] {
                let actual = NetworkFixture::river(HORIZON, 6, outlet_mode, offset)
                    .run_threads(threads)
                    .unwrap();
                assert_same_series(
                    &expected,
                    &actual,
                    &format!("outlet {outlet_mode}, offset {offset}, {threads} threads"),
                );
            }
        }
    }
}

/// Scenario: diamond with an external downstream node is fully parallel, and
/// the pool releases `b` and `c` only after `a`, `d` only after both.
#[test]
fn test_diamond_scenario_parallel() {
    let mut fixture = NetworkFixture::diamond(HORIZON, DeployMode::Observed, false);
    fixture
        .network_mut()
        .set_deploy_mode(&NodeId::new("a"), DeployMode::Fresh)
        .unwrap();
    let mut simulator = Simulator::new(RunConfig::default().with_threads(2));
    let report = simulator.simulate(fixture.network_mut()).unwrap();

    assert_eq!(report.parallel_devices, 4);
    assert_eq!(report.sequential_devices, 0);

    let plan = simulator.plan().unwrap();
    let a = Device::Node(NodeId::new("a"));
    let b = Device::Element(ElementId::new("b"));
    let c = Device::Element(ElementId::new("c"));
    let d = Device::Node(NodeId::new("d"));
    assert!(plan.partition().is_parallel(&a));
    assert_eq!(plan.queue().starters(), vec![&a]);
    assert_eq!(plan.queue().dependencies(&b), Some(1));
    assert_eq!(plan.queue().dependencies(&c), Some(1));
    assert_eq!(plan.queue().dependencies(&d), Some(2));
    assert_eq!(plan.queue().downstream(&a), vec![&b, &c]);

    let queue = plan.queue().from_existing();
    queue.register();
    let first = queue.take().unwrap();
    assert_eq!(first.device(), &a);
    queue.shutdown(1);
    assert!(queue.take().is_none(), "b and c wait for a");
    queue.complete(first).unwrap();

    let second = queue.take().unwrap();
    let third = queue.take().unwrap();
    assert_eq!((second.device(), third.device()), (&b, &c));
    queue.complete(second).unwrap();
    queue.shutdown(1);
    assert!(queue.take().is_none(), "d waits for c");
    queue.complete(third).unwrap();

    let last = queue.take().unwrap();
    assert_eq!(last.device(), &d);
    queue.complete(last).unwrap();
    queue.join().unwrap();
}

/// Scenario: a fresh receiver at `d` makes its reader sequential; a, b and c
/// stay parallel.
#[test]
fn test_diamond_scenario_receiver() {
    let mut fixture = NetworkFixture::diamond(HORIZON, DeployMode::Fresh, true);
    let mut simulator = Simulator::new(RunConfig::default().with_threads(2));
    simulator.simulate(fixture.network_mut()).unwrap();

    let partition = simulator.plan().unwrap().partition();
    let names: Vec<String> = partition.parallel().iter().map(ToString::to_string).collect();
    assert_eq!(names, vec!["node.a", "element.b", "element.c"]);
    assert!(partition.sequential().contains(&Device::Element(ElementId::new("e"))));
    assert!(partition.transition().contains(&NodeId::new("d")));
}

#[test]
fn test_diamond_receiver_equivalence() {
    for mode in DeployMode::ALL {
        let expected = NetworkFixture::diamond(HORIZON, mode, true)
            .run_threads(0)
            .unwrap();
        for threads in [1, 3] {
            let actual = NetworkFixture::diamond(HORIZON, mode, true)
                .run_threads(threads)
                .unwrap();
            assert_same_series(&expected, &actual, &format!("{mode}, {threads} threads"));
        }
    }
}

/// A receiver sees the same-step value of a fresh node it is downstream of.
#[test]
fn test_receiver_sees_same_step_value() {
    let build = || {
        let mut network = Network::new(4);
        network
            .add_node(
                Node::new("rain", 4)
                    .with_mode(DeployMode::Observed)
                    .with_observed(vec![1.0, 2.0, 3.0, 4.0])
                    .unwrap(),
            )
            .unwrap();
        network.add_node(Node::new("river", 4)).unwrap();
        network.add_node(Node::new("gauge", 4)).unwrap();
        network
            .add_element(Element::new("catchment", PassThrough).inlet("rain").outlet("river"))
            .unwrap();
        network
            .add_element(Element::new("sensor", PassThrough).receiver("river").outlet("gauge"))
            .unwrap();
        network
    };

    for threads in [0, 2] {
        let mut fixture = NetworkFixture::new(build());
        fixture.run_threads(threads).unwrap();
        assert_eq!(fixture.simulated("gauge"), vec![1.0, 2.0, 3.0, 4.0]);
    }
}

/// A receiver reading a node it feeds sees the previous step.
#[test]
fn test_receiver_loop_sees_previous_step() {
    let build = || {
        let mut network = Network::new(4);
        network
            .add_node(
                Node::new("rain", 4)
                    .with_mode(DeployMode::Observed)
                    .with_observed(vec![1.0, 1.0, 1.0, 1.0])
                    .unwrap(),
            )
            .unwrap();
        network.add_node(Node::new("pond", 4)).unwrap();
        network
            .add_element(
                Element::new("echo", PassThrough)
                    .inlet("rain")
                    .receiver("pond")
                    .outlet("pond"),
            )
            .unwrap();
        network
    };

    for threads in [0, 2] {
        let mut fixture = NetworkFixture::new(build());
        fixture.run_threads(threads).unwrap();
        assert_eq!(fixture.simulated("pond"), vec![1.0, 2.0, 3.0, 4.0]);
    }
}

/// A receiver loop elsewhere in the network does not delay a fresh receiver
/// outside the loop.
#[test]
fn test_receiver_loop_leaves_other_receivers_same_step() {
    let build = || {
        let mut network = Network::new(6);
        network
            .add_node(
                Node::new("n1", 6)
                    .with_mode(DeployMode::ObservedElseCarried)
                    .with_observed(vec![2.0; 6])
                    .unwrap(),
            )
            .unwrap();
        network.add_node(Node::new("nf", 6)).unwrap();
        network.add_node(Node::new("taken", 6)).unwrap();
        network
            .add_element(
                Element::new("e1", LinearStorage::with_storage(0.5, 8.0))
                    .outlet("n1")
                    .receiver("n1"),
            )
            .unwrap();
        network
            .add_element(Element::new("x_up", PassThrough).inlet("n1").outlet("nf"))
            .unwrap();
        network
            .add_element(
                Element::new("a_z", LinearStorage::with_storage(0.5, 20.0))
                    .inlet("n1")
                    .receiver("nf")
                    .output("taken"),
            )
            .unwrap();
        network
    };

    let expected = NetworkFixture::new(build()).run_threads(0).unwrap();
    assert_eq!(expected["taken"], vec![2.0; 6]);
    for threads in [1, 2] {
        let actual = NetworkFixture::new(build()).run_threads(threads).unwrap();
        assert_same_series(&expected, &actual, &format!("{threads} threads"));
    }
}

/// An element reading and feeding an observed node is no dependency loop.
#[test]
fn test_loop_through_observed_node_runs() {
    let build = || {
        let mut network = Network::new(4);
        network
            .add_node(
                Node::new("x", 4)
                    .with_mode(DeployMode::Observed)
                    .with_observed(vec![1.0, 2.0, 3.0, 4.0])
                    .unwrap(),
            )
            .unwrap();
        network
            .add_element(Element::new("spin", Lag::new(1)).inlet("x").outlet("x"))
            .unwrap();
        network
    };

    for threads in [0, 2] {
        let mut fixture = NetworkFixture::new(build());
        fixture.run_threads(threads).unwrap();
        assert_eq!(fixture.simulated("x"), vec![0.0, 1.0, 2.0, 3.0]);
    }
}

#[test]
fn test_first_error_wins() {
    init_tracing();
    let mut network = Network::new(HORIZON);
    network.add_node(Node::new("sink", HORIZON)).unwrap();
    network
        .add_element(Element::new("fast", FailingModel::new("fast")).outlet("sink"))
        .unwrap();
    network
        .add_element(
            Element::new("slow", FailingModel::after("slow", Duration::from_millis(200)))
                .outlet("sink"),
        )
        .unwrap();

    let err = Simulator::new(RunConfig::default().with_threads(2))
        .simulate(&mut network)
        .unwrap_err();

    assert_eq!(err.failed_element(), Some(&ElementId::new("fast")));
    let source = err
        .model_error()
        .and_then(|source| source.downcast_ref::<FixtureError>())
        .unwrap();
    assert_eq!(source, &FixtureError("fast".into()));
}

#[test]
fn test_model_error_in_sequential_run() {
    let mut network = Network::new(HORIZON);
    network.add_node(Node::new("sink", HORIZON)).unwrap();
    network
        .add_element(Element::new("broken", FailingModel::new("broken")).outlet("sink"))
        .unwrap();

    let err = Simulator::new(RunConfig::sequential())
        .simulate(&mut network)
        .unwrap_err();
    assert!(matches!(err, Error::Model { .. }));
    assert_eq!(err.failed_element(), Some(&ElementId::new("broken")));
}

#[test]
fn test_panicking_model_surfaces_as_error() {
    let mut network = Network::new(HORIZON);
    network.add_node(Node::new("sink", HORIZON)).unwrap();
    network
        .add_element(Element::new("boom", PanickingModel).outlet("sink"))
        .unwrap();
    network
        .add_element(Element::new("fine", LinearStorage::new(0.5)).outlet("sink"))
        .unwrap();

    let err = Simulator::new(RunConfig::default().with_threads(2))
        .simulate(&mut network)
        .unwrap_err();
    match err {
        Error::WorkerPanicked { device, message } => {
            assert_eq!(device, Device::Element(ElementId::new("boom")));
            assert!(message.contains("boom"));
        }
        other => panic!("expected WorkerPanicked, got {other:?}"),
    }
}

#[test]
fn test_unknown_node_is_topology_error() {
    let mut network = Network::new(HORIZON);
    network
        .add_element(Element::new("orphan", LinearStorage::new(0.5)).inlet("ghost"))
        .unwrap();

    let err = Simulator::new(RunConfig::default().with_threads(2))
        .simulate(&mut network)
        .unwrap_err();
    match err {
        Error::UnknownDevice { referrer, missing } => {
            assert_eq!(referrer, Device::Element(ElementId::new("orphan")));
            assert_eq!(missing, Device::Node(NodeId::new("ghost")));
        }
        other => panic!("expected UnknownDevice, got {other:?}"),
    }
}

#[test]
fn test_inlet_cycle_is_rejected() {
    let mut network = Network::new(HORIZON);
    network.add_node(Node::new("x", HORIZON)).unwrap();
    network
        .add_element(Element::new("spin", LinearStorage::new(0.5)).inlet("x").outlet("x"))
        .unwrap();

    for threads in [0, 2] {
        let err = Simulator::new(RunConfig::default().with_threads(threads))
            .simulate(&mut network)
            .unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }), "{err}");
    }
}

#[test]
fn test_repeated_runs_reuse_plan() {
    let mut fixture = NetworkFixture::river(HORIZON, 4, DeployMode::Fresh, 0);
    let mut simulator = Simulator::new(RunConfig::default().with_threads(3));

    simulator.simulate(fixture.network_mut()).unwrap();
    let first = fixture.series();
    for _ in 0..3 {
        simulator.simulate(fixture.network_mut()).unwrap();
        assert_same_series(&first, &fixture.series(), "repeated run");
    }
    assert_eq!(simulator.plan_rebuilds(), 1);
}

#[test]
fn test_mode_change_triggers_rebuild() {
    let mut fixture = NetworkFixture::river(HORIZON, 4, DeployMode::Fresh, 0);
    let mut simulator = Simulator::new(RunConfig::default().with_threads(2));
    simulator.simulate(fixture.network_mut()).unwrap();
    assert!(!simulator.plan().unwrap().partition().sequential().is_empty());

    fixture
        .network_mut()
        .set_deploy_mode(&"outlet".into(), DeployMode::Observed)
        .unwrap();
    simulator.simulate(fixture.network_mut()).unwrap();

    assert_eq!(simulator.plan_rebuilds(), 2);
    let partition = simulator.plan().unwrap().partition();
    assert!(partition.is_parallel(&Device::Element(ElementId::new("dam"))));
}

#[test]
fn test_partial_window() {
    let window = IndexWindow::new(10, 30);
    let mut expected = NetworkFixture::river(HORIZON, 3, DeployMode::Fresh, 1);
    expected
        .run(RunConfig::sequential().with_window(window))
        .unwrap();
    let mut actual = NetworkFixture::river(HORIZON, 3, DeployMode::Fresh, 1);
    actual
        .run(RunConfig::default().with_threads(2).with_window(window))
        .unwrap();

    assert_same_series(&expected.series(), &actual.series(), "partial window");
}

#[test]
fn test_window_outside_horizon_rejected() {
    let mut fixture = NetworkFixture::diamond(HORIZON, DeployMode::Fresh, false);
    let err = fixture
        .run(RunConfig::default().with_window(IndexWindow::new(0, HORIZON + 1)))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_empty_network_runs() {
    let mut network = Network::new(HORIZON);
    for threads in [0, 2] {
        let report = Simulator::new(RunConfig::default().with_threads(threads))
            .simulate(&mut network)
            .unwrap();
        assert_eq!(report.parallel_devices, 0);
        assert_eq!(report.sequential_devices, 0);
    }
}
