use crate::fixtures::{pair, ring};
use crate::{ActorId, ApplicationGraph, ModelError, PortDirection, ScenarioGraph};

#[test]
fn connect_creates_directed_ports() {
    let (g, a, b) = pair(2, 3, 1, 1);
    let ch = g.channel_by_name("ab").unwrap();
    assert_eq!(g.src_rate(ch), 2);
    assert_eq!(g.dst_rate(ch), 3);
    assert_eq!(g.port(g.channel(ch).src).direction, PortDirection::Out);
    assert_eq!(g.port(g.channel(ch).dst).direction, PortDirection::In);
    assert_eq!(g.out_channels(a).collect::<Vec<_>>(), vec![ch]);
    assert_eq!(g.in_channels(b).collect::<Vec<_>>(), vec![ch]);
    assert!(g.validate().is_ok());
}

#[test]
fn initial_tokens_get_persistent_names() {
    let mut g = ring(1, 1, 2);
    let ba = g.channel_by_name("ba").unwrap();
    assert_eq!(g.channel(ba).persistent_tokens, vec!["ba_0", "ba_1"]);
    g.set_initial_tokens(ba, 3);
    assert_eq!(g.channel(ba).persistent_tokens.len(), 3);
    assert_eq!(g.channel(ba).persistent_tokens[2], "ba_2");
}

#[test]
fn execution_time_prefers_default_type() {
    let mut g = ScenarioGraph::new("g");
    let a = g.add_actor("a");
    g.set_execution_time(a, "arm", 10);
    g.set_execution_time(a, "dsp", 30);
    assert_eq!(g.actor(a).default_processor_type.as_deref(), Some("arm"));
    assert_eq!(g.actor(a).execution_time(), 10);
    assert_eq!(g.actor(a).max_execution_time(), 30);
    g.actor_mut(a).default_processor_type = None;
    assert_eq!(g.actor(a).execution_time(), 30);
    assert_eq!(g.actor(a).processor_types(), vec!["arm", "dsp"]);
}

#[test]
fn timed_sdf_keeps_only_default_time() {
    let mut g = ScenarioGraph::new("g");
    let a = g.add_actor("a");
    g.set_execution_time(a, "dsp", 7);
    g.set_execution_time(a, "arm", 3);
    let t = g.timed_sdf();
    assert_eq!(t.actor(a).execution_times.len(), 1);
    assert_eq!(t.actor(a).execution_time(), 7);
}

#[test]
fn unit_self_loops_forbid_auto_concurrency() {
    let (mut g, a, b) = pair(1, 1, 1, 1);
    assert!(!g.has_self_loop(a));
    g.add_unit_self_loops();
    assert!(g.has_self_loop(a));
    assert!(g.has_self_loop(b));
    assert!(g.channel_by_name("a_selfloop").is_some());
}

#[test]
fn duplicate_actor_names_are_rejected() {
    let mut g = ScenarioGraph::new("g");
    g.add_actor("a");
    g.add_actor("a");
    assert!(matches!(g.validate(), Err(ModelError::DuplicateName(n)) if n == "a"));
}

#[test]
fn zero_rate_is_rejected() {
    let (mut g, _, _) = pair(1, 1, 1, 1);
    g.actors[0].ports[0].rate = 0;
    assert!(matches!(g.validate(), Err(ModelError::ZeroRate { .. })));
}

#[test]
fn reversed_port_is_rejected() {
    let (mut g, _, _) = pair(1, 1, 1, 1);
    g.actors[0].ports[0].direction = PortDirection::In;
    assert!(matches!(g.validate(), Err(ModelError::PortDirection { .. })));
}

#[test]
fn isolation_gives_private_graphs() {
    let mut app = ApplicationGraph::single_scenario("app", ring(1, 2, 1), 0.5);
    app.scenarios.push(crate::Scenario {
        name: String::from("other"),
        frequency: 2.0,
        graph: 0,
    });
    assert!(!app.has_isolated_scenarios());
    app.isolate_scenarios();
    assert!(app.has_isolated_scenarios());
    assert_eq!(app.scenario_graphs.len(), 2);
    app.scenario_graph_mut(crate::ScenarioId(1)).actor_mut(ActorId(0)).state_size = 4;
    assert_eq!(app.scenario_graph(crate::ScenarioId(0)).actor(ActorId(0)).state_size, 0);
}

#[test]
fn negative_throughput_constraint_is_rejected() {
    let app = ApplicationGraph::single_scenario("app", ring(1, 2, 1), -1.0);
    assert!(matches!(app.validate(), Err(ModelError::ThroughputConstraint(_))));
}
