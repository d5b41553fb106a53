use assert_approx_eq::assert_approx_eq;
use sdfmap_core::{
    to_hsdf, ActorId, ApplicationGraph, ChannelId, BalanceEquations, MaxCycleRatioThroughput, ModelError,
    RepetitionVector, RepetitionVectorComputer, ScenarioGraph, ScenarioId, ThroughputAnalysis,
};

use super::*;
use crate::binding::{BufferSize, GraphBinding};
use crate::binding_aware::{build_binding_aware_graph, GenericCommunication};
use crate::fixtures::{bound, constrained, on, producer_consumer, tiles, CountingRepetition};

const S0: ScenarioId = ScenarioId(0);

fn repetition(app: &ApplicationGraph) -> Vec<RepetitionVector> {
    app.scenarios()
        .map(|(s, _)| BalanceEquations.compute(app.scenario_graph(s)).unwrap())
        .collect()
}

fn buffer(mem: u64) -> BufferSize {
    BufferSize {
        src: mem,
        dst: mem,
        mem,
    }
}

fn graph_channel(app: &ApplicationGraph, name: &str) -> ChannelId {
    app.scenario_graph(S0).channel_by_name(name).unwrap()
}

#[test]
fn bisection_finds_smallest_feasible_slice() {
    let app = producer_consumer(1, 1.0 / 2000.0);
    let platform = tiles(1, 1000);
    let pb = constrained(&platform, &app, buffer(2));
    let g = bound(&app, &platform, &pb, 0, 0);
    let rep = repetition(&app);
    let ctx = ScheduleContext {
        throughput: &MaxCycleRatioThroughput::default(),
        communication: &GenericCommunication,
        repetition: &BalanceEquations,
        repetition_vectors: &rep,
    };
    let scheduled = TdmaBisection.construct_schedules(vec![g], &ctx, 4).unwrap();
    assert_eq!(scheduled.len(), 1);
    let p0 = on(0).processor;
    // a needs a whole slice of 100 to finish within one wheel
    assert_eq!(scheduled[0].binding.processor(p0).slice(S0), Some(100));
    assert_approx_eq!(scheduled[0].pareto_quantities().processing[&p0], 0.1);
}

#[test]
fn bisection_drops_infeasible_candidates() {
    let app = producer_consumer(1, 1.0);
    let platform = tiles(1, 1000);
    let pb = constrained(&platform, &app, buffer(2));
    let g = bound(&app, &platform, &pb, 0, 0);
    let rep = repetition(&app);
    let ctx = ScheduleContext {
        throughput: &MaxCycleRatioThroughput::default(),
        communication: &GenericCommunication,
        repetition: &BalanceEquations,
        repetition_vectors: &rep,
    };
    let scheduled = TdmaBisection.construct_schedules(vec![g], &ctx, 4).unwrap();
    assert!(scheduled.is_empty());
}

#[test]
fn bisection_drops_processors_without_wheel() {
    let app = producer_consumer(1, 0.0);
    let mut platform = tiles(1, 1000);
    platform.tiles[0].processors[0].reserved = 1000;
    let pb = constrained(&platform, &app, buffer(2));
    let g = bound(&app, &platform, &pb, 0, 0);
    let rep = repetition(&app);
    let ctx = ScheduleContext {
        throughput: &MaxCycleRatioThroughput::default(),
        communication: &GenericCommunication,
        repetition: &BalanceEquations,
        repetition_vectors: &rep,
    };
    let scheduled = TdmaBisection.construct_schedules(vec![g], &ctx, 4).unwrap();
    assert!(scheduled.is_empty());
}

#[test]
fn deadlines_follow_the_critical_path() {
    let mut g = ScenarioGraph::new("chain");
    let x = g.add_actor("x");
    let y = g.add_actor("y");
    let z = g.add_actor("z");
    g.set_execution_time(x, "arm", 1);
    g.set_execution_time(y, "arm", 2);
    g.set_execution_time(z, "arm", 3);
    g.connect("xy", x, 1, y, 1, 0);
    g.connect("yz", y, 1, z, 1, 0);
    let hsdf = to_hsdf(&g, &BalanceEquations.compute(&g).unwrap()).unwrap();
    let deadlines = alap_deadlines(&hsdf.graph, &hsdf.precedence_graph()).unwrap();
    assert_eq!(deadlines, vec![1, 3, 6]);
}

#[test]
fn deadlines_reject_token_free_cycles() {
    let mut g = ScenarioGraph::new("stuck");
    let x = g.add_actor("x");
    let y = g.add_actor("y");
    g.connect("xy", x, 1, y, 1, 0);
    g.connect("yx", y, 1, x, 1, 0);
    let hsdf = to_hsdf(&g, &BalanceEquations.compute(&g).unwrap()).unwrap();
    assert!(matches!(
        alap_deadlines(&hsdf.graph, &hsdf.precedence_graph()),
        Err(ModelError::Deadlock(_))
    ));
}

#[test]
fn edf_orders_actors_per_processor() {
    let app = producer_consumer(1, 0.0);
    let platform = tiles(2, 1000);
    let pb = constrained(&platform, &app, buffer(2));
    let mut g = bound(&app, &platform, &pb, 0, 1);
    let rep = repetition(&app);
    let ctx = ScheduleContext {
        throughput: &MaxCycleRatioThroughput::default(),
        communication: &GenericCommunication,
        repetition: &BalanceEquations,
        repetition_vectors: &rep,
    };
    edf_schedule(&mut g, &ctx).unwrap();
    let s0 = &g.binding.processor(on(0).processor).schedules[&S0];
    let s1 = &g.binding.processor(on(1).processor).schedules[&S0];
    assert_eq!(s0.entries, vec![ActorId(0)]);
    assert_eq!(s1.entries, vec![ActorId(1)]);
    assert_eq!(s0.start_periodic, 0);
}

#[test]
fn edf_interleaves_multirate_firings() {
    let mut graph = ScenarioGraph::new("multirate");
    let a = graph.add_actor("a");
    let b = graph.add_actor("b");
    graph.set_execution_time(a, "arm", 1);
    graph.set_execution_time(b, "arm", 1);
    graph.connect("ab", a, 2, b, 3, 0);
    let app = ApplicationGraph::single_scenario("app", graph, 0.0);
    let platform = tiles(1, 1000);
    let pb = constrained(&platform, &app, buffer(6));
    let mut g = GraphBinding::new(&app, &platform, &pb);
    assert!(g.bind_actor_to_tile(S0, a, on(0)).unwrap());
    assert!(g.bind_actor_to_tile(S0, b, on(0)).unwrap());
    assert!(g
        .bind_channel_to_tile(S0, graph_channel(&app, "ab"), on(0).memory)
        .unwrap());
    let rep = repetition(&app);
    let ctx = ScheduleContext {
        throughput: &MaxCycleRatioThroughput::default(),
        communication: &GenericCommunication,
        repetition: &BalanceEquations,
        repetition_vectors: &rep,
    };
    edf_schedule(&mut g, &ctx).unwrap();
    let schedule = &g.binding.processor(on(0).processor).schedules[&S0];
    assert_eq!(schedule.entries, vec![a, a, a, b, b]);
}

#[test]
fn static_order_is_encoded_as_a_cycle() {
    let app = producer_consumer(1, 0.0);
    let platform = tiles(1, 1000);
    let pb = constrained(&platform, &app, buffer(2));
    let mut g = bound(&app, &platform, &pb, 0, 0);
    let rep = repetition(&app);
    let th = MaxCycleRatioThroughput::default();
    let ctx = ScheduleContext {
        throughput: &th,
        communication: &GenericCommunication,
        repetition: &BalanceEquations,
        repetition_vectors: &rep,
    };
    edf_schedule(&mut g, &ctx).unwrap();
    let bag = build_binding_aware_graph(&g, S0, &GenericCommunication).unwrap();
    let hsdf = encode_static_order(&g, S0, &bag, &BalanceEquations).unwrap();
    let first = hsdf.graph.channel_by_name("p0_so_0").unwrap();
    let back = hsdf.graph.channel_by_name("p0_so_1").unwrap();
    assert_eq!(hsdf.graph.channel(first).initial_tokens, 0);
    assert_eq!(hsdf.graph.channel(back).initial_tokens, 1);
    assert_eq!(hsdf.graph.channel(back).persistent_tokens, vec!["p0_so_1_0"]);
    assert_eq!(hsdf.graph.channel(back).dst.actor, hsdf.firing(ActorId(0), 0));
    assert_approx_eq!(th.analyze(&hsdf.graph).unwrap(), 1.0 / 150.0);
}

#[test]
fn scheduling_solves_balance_equations_with_the_given_computer() {
    let app = producer_consumer(1, 0.0);
    let platform = tiles(1, 1000);
    let pb = constrained(&platform, &app, buffer(2));
    let mut g = bound(&app, &platform, &pb, 0, 0);
    let rep = repetition(&app);
    let counting = CountingRepetition::default();
    let ctx = ScheduleContext {
        throughput: &MaxCycleRatioThroughput::default(),
        communication: &GenericCommunication,
        repetition: &counting,
        repetition_vectors: &rep,
    };
    edf_schedule(&mut g, &ctx).unwrap();
    assert_eq!(counting.calls(), 1);
    let bag = build_binding_aware_graph(&g, S0, &GenericCommunication).unwrap();
    encode_static_order(&g, S0, &bag, &counting).unwrap();
    assert_eq!(counting.calls(), 2);
}
