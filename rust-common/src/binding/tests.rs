use assert_approx_eq::assert_approx_eq;
use sdfmap_core::{
    ActorId, BalanceEquations, ChannelId, ConnectionId, MemoryId, NetworkInterfaceId, ProcessorId,
    RepetitionVectorComputer, ScenarioId, TileId,
};

use super::*;
use crate::fixtures::{constrained, producer_consumer, tiles};
use crate::MappingError;

const S0: ScenarioId = ScenarioId(0);
const A: ActorId = ActorId(0);
const B: ActorId = ActorId(1);
const AB: ChannelId = ChannelId(0);

fn on(tile: usize) -> ActorBinding {
    ActorBinding {
        processor: ProcessorId {
            tile: TileId(tile),
            index: 0,
        },
        memory: MemoryId {
            tile: TileId(tile),
            index: 0,
        },
    }
}

fn route(src: usize, dst: usize, connection: usize) -> ConnectionRoute {
    ConnectionRoute {
        src_memory: on(src).memory,
        src_network_interface: NetworkInterfaceId {
            tile: TileId(src),
            index: 0,
        },
        dst_memory: on(dst).memory,
        dst_network_interface: NetworkInterfaceId {
            tile: TileId(dst),
            index: 0,
        },
        connection: ConnectionId(connection),
    }
}

fn buffer(size: u64) -> BufferSize {
    BufferSize {
        src: size,
        dst: size,
        mem: size,
    }
}

#[test]
fn cross_tile_actor_binding_is_fatal() {
    let platform = tiles(2, 1000);
    let app = producer_consumer(1, 0.0);
    let pb = constrained(&platform, &app, buffer(2));
    for (p, m) in [(0, 1), (1, 0)] {
        let mut g = GraphBinding::new(&app, &platform, &pb);
        let target = ActorBinding {
            processor: on(p).processor,
            memory: on(m).memory,
        };
        assert!(matches!(
            g.bind_actor_to_tile(S0, A, target),
            Err(MappingError::CrossTileBinding { .. })
        ));
        assert!(g.actor_binding(S0, A).is_none());
    }
}

#[test]
fn actor_binding_claims_processor_and_memory() {
    let platform = tiles(2, 1000);
    let app = producer_consumer(1, 0.0);
    let pb = constrained(&platform, &app, buffer(2));
    let mut g = GraphBinding::new(&app, &platform, &pb);
    assert!(g.bind_actor_to_tile(S0, A, on(0)).unwrap());
    assert!(g.binding.processor(on(0).processor).has_actor(S0, A));
    assert_eq!(g.binding.memory(on(0).memory).used(S0), 8);
    // an actor is bound at most once
    assert!(!g.bind_actor_to_tile(S0, A, on(1)).unwrap());
    g.remove_actor_binding(S0, A);
    assert!(!g.binding.processor(on(0).processor).has_actor(S0, A));
    assert_eq!(g.binding.memory(on(0).memory).used(S0), 0);
    // the wrapped binding is a private copy
    assert!(pb.actors.is_empty());
}

#[test]
fn full_memory_rolls_back_processor_claim() {
    let platform = tiles(1, 12);
    let app = producer_consumer(1, 0.0);
    let pb = constrained(&platform, &app, buffer(2));
    let mut g = GraphBinding::new(&app, &platform, &pb);
    assert!(g.bind_actor_to_tile(S0, A, on(0)).unwrap());
    assert!(!g.bind_actor_to_tile(S0, B, on(0)).unwrap());
    assert!(!g.binding.processor(on(0).processor).has_actor(S0, B));
    assert!(g.actor_binding(S0, B).is_none());
}

#[test]
fn unsupported_processor_type_is_not_a_candidate() {
    let mut platform = tiles(1, 1000);
    platform.tiles[0].processors[0].processor_type = String::from("dsp");
    let app = producer_consumer(1, 0.0);
    let pb = constrained(&platform, &app, buffer(2));
    let mut g = GraphBinding::new(&app, &platform, &pb);
    assert!(!g.bind_actor_to_tile(S0, A, on(0)).unwrap());
}

#[test]
fn intra_tile_channel_uses_one_memory() {
    let platform = tiles(2, 1000);
    let app = producer_consumer(1, 0.0);
    let pb = constrained(&platform, &app, buffer(3));
    let mut g = GraphBinding::new(&app, &platform, &pb);
    assert!(g.bind_channel_to_tile(S0, AB, on(0).memory).unwrap());
    let cb = g.channel_binding(S0, AB).unwrap();
    assert_eq!(cb.memory(), Some(on(0).memory));
    assert!(cb.connection().is_none());
    assert!(cb.route().is_none());
    assert_eq!(g.binding.memory(on(0).memory).used(S0), 3);
}

#[test]
fn inter_tile_channel_uses_connection() {
    let platform = tiles(2, 1000);
    let app = producer_consumer(1, 0.0);
    let mut pb = constrained(&platform, &app, buffer(2));
    pb.constraints.entry(S0, AB).bandwidth = 10.0;
    let mut g = GraphBinding::new(&app, &platform, &pb);
    assert!(g.bind_channel_to_connection(S0, AB, route(0, 1, 0)).unwrap());
    let cb = g.channel_binding(S0, AB).unwrap();
    assert!(cb.memory().is_none());
    assert_eq!(cb.connection(), Some(ConnectionId(0)));
    let ni0 = route(0, 1, 0).src_network_interface;
    assert_approx_eq!(g.binding.network_interface(ni0).out_used(S0), 10.0);
    g.remove_channel_binding(S0, AB);
    assert_eq!(g.binding.network_interface(ni0).out_used(S0), 0.0);
    assert!(g.binding.connection(ConnectionId(0)).channels.is_empty());
}

#[test]
fn failed_connection_claim_releases_everything() {
    let platform = tiles(2, 1000);
    let app = producer_consumer(1, 0.0);
    let pb = constrained(&platform, &app, buffer(2));
    let mut g = GraphBinding::new(&app, &platform, &pb);
    assert!(g.bind_channel_to_connection(S0, AB, route(0, 1, 0)).unwrap());
    let before = g.binding.clone();
    // the connection already carries a channel in this scenario
    assert!(!g
        .bind_channel_to_connection(S0, ChannelId(1), route(0, 1, 0))
        .unwrap());
    assert_eq!(g.binding, before);
}

#[test]
fn missing_constraint_is_fatal() {
    let platform = tiles(1, 1000);
    let app = producer_consumer(1, 0.0);
    let pb = PlatformBinding::new("working", &platform);
    let mut g = GraphBinding::new(&app, &platform, &pb);
    assert!(matches!(
        g.bind_channel_to_tile(S0, AB, on(0).memory),
        Err(MappingError::MissingConstraint { .. })
    ));
}

#[test]
fn tdma_bounds_default_to_available_wheel() {
    let mut platform = tiles(1, 1000);
    platform.tiles[0].processors[0].reserved = 300;
    let app = producer_consumer(1, 0.0);
    let pb = constrained(&platform, &app, buffer(2));
    let mut g = GraphBinding::new(&app, &platform, &pb);
    let p = on(0).processor;
    assert_eq!(g.min_tdma_slice(S0, p), 0);
    assert_eq!(g.max_tdma_slice(S0, p), 700);
    assert!(!g.allocate_tdma_slice(S0, p, 701));
    assert!(g.allocate_tdma_slice(S0, p, 700));
    assert_eq!(g.tdma_slice(S0, p), 700);
}

#[test]
fn clone_is_deep_and_equal() {
    let platform = tiles(2, 1000);
    let app = producer_consumer(1, 0.0);
    let q = vec![BalanceEquations.compute(app.scenario_graph(S0)).unwrap()];
    let pb = constrained(&platform, &app, buffer(2));
    let mut g = GraphBinding::new(&app, &platform, &pb);
    g.bind_actor_to_tile(S0, A, on(0)).unwrap();
    g.bind_actor_to_tile(S0, B, on(1)).unwrap();
    g.bind_channel_to_connection(S0, AB, route(0, 1, 0)).unwrap();
    g.set_tdma_bounds(S0, on(0).processor, 10, 400);
    g.compute_pareto_quantities(&q, ParetoBasis::Tdma);
    let mut copy = g.clone();
    assert_eq!(copy, g);
    assert_eq!(copy.actor_binding(S0, B), g.actor_binding(S0, B));
    assert_eq!(copy.channel_binding(S0, AB), g.channel_binding(S0, AB));
    assert_eq!(copy.max_tdma_slice(S0, on(0).processor), 400);
    assert_eq!(copy.pareto_quantities(), g.pareto_quantities());
    copy.remove_actor_binding(S0, A);
    assert!(g.actor_binding(S0, A).is_some());
}

#[test]
fn tdma_basis_loads() {
    let platform = tiles(2, 1000);
    let app = producer_consumer(1, 0.0);
    let q = vec![BalanceEquations.compute(app.scenario_graph(S0)).unwrap()];
    let pb = constrained(&platform, &app, buffer(2));
    let mut g = GraphBinding::new(&app, &platform, &pb);
    g.bind_actor_to_tile(S0, A, on(0)).unwrap();
    assert!(g.allocate_tdma_slice(S0, on(0).processor, 200));
    g.compute_pareto_quantities(&q, ParetoBasis::Tdma);
    let pq = g.pareto_quantities();
    assert_approx_eq!(pq.processing[&on(0).processor], 0.2);
    assert_eq!(pq.processing[&on(1).processor], 0.0);
    assert_approx_eq!(pq.memory[&on(0).memory], 8.0 / 1000.0);
}

#[test]
fn execution_time_basis_is_normalised() {
    let platform = tiles(2, 1000);
    let app = producer_consumer(1, 0.0);
    let q = vec![BalanceEquations.compute(app.scenario_graph(S0)).unwrap()];
    let pb = constrained(&platform, &app, buffer(2));
    let mut g = GraphBinding::new(&app, &platform, &pb);
    g.bind_actor_to_tile(S0, A, on(0)).unwrap();
    g.bind_actor_to_tile(S0, B, on(1)).unwrap();
    g.compute_pareto_quantities(&q, ParetoBasis::ExecutionTime);
    let pq = g.pareto_quantities();
    assert_approx_eq!(pq.processing[&on(0).processor], 100.0 / 150.0);
    assert_approx_eq!(pq.processing[&on(1).processor], 50.0 / 150.0);
}

fn loads(values: &[f64]) -> ParetoQuantities {
    let mut pq = ParetoQuantities::default();
    for (i, v) in values.iter().enumerate() {
        pq.processing.insert(
            ProcessorId {
                tile: TileId(i),
                index: 0,
            },
            *v,
        );
    }
    pq
}

#[test]
fn dominance_and_distance() {
    let low = loads(&[0.1, 0.2]);
    let high = loads(&[0.4, 0.6]);
    let mixed = loads(&[0.5, 0.1]);
    assert!(low.dominates(&high));
    assert!(!high.dominates(&low));
    assert!(!mixed.dominates(&high) && !high.dominates(&mixed));
    assert!(low.dominates(&low));
    assert_approx_eq!(low.distance(&high), 0.5);
}

#[test]
#[should_panic]
fn dominance_needs_same_resources() {
    loads(&[0.1]).dominates(&loads(&[0.1, 0.2]));
}

#[test]
fn cull_keeps_mutually_non_dominated() {
    let candidates = vec![
        loads(&[0.5, 0.5]),
        loads(&[0.2, 0.9]),
        loads(&[0.4, 0.4]),
        loads(&[0.9, 0.1]),
        loads(&[0.4, 0.4]),
        loads(&[0.95, 0.95]),
    ];
    let kept = simple_cull(candidates);
    assert_eq!(kept.len(), 3);
    for (i, a) in kept.iter().enumerate() {
        for (j, b) in kept.iter().enumerate() {
            if i != j {
                assert!(!a.dominates(b));
            }
        }
    }
}

#[test]
fn diversity_reduction_returns_exactly_max() {
    let candidates: Vec<_> = (0..10)
        .map(|i| loads(&[i as f64 / 10.0, 1.0 - i as f64 / 10.0]))
        .collect();
    for max in [1, 3, 9, 10, 12] {
        let reduced = reduce_diversity(candidates.clone(), max);
        assert_eq!(reduced.len(), max.min(10));
        assert!(reduced.iter().all(|r| candidates.contains(r)));
    }
}

#[test]
fn diversity_reduction_spreads_out() {
    let candidates = vec![
        loads(&[0.1, 0.1]),
        loads(&[0.12, 0.1]),
        loads(&[0.9, 0.9]),
    ];
    let reduced = reduce_diversity(candidates, 2);
    assert_eq!(reduced, vec![loads(&[0.1, 0.1]), loads(&[0.9, 0.9])]);
}

#[test]
fn unknown_binding_name() {
    let platform = tiles(1, 1000);
    let bindings = vec![PlatformBinding::initial(&platform)];
    assert!(find_binding(&bindings, "initial").unwrap().is_initial());
    assert!(matches!(
        find_binding(&bindings, "nope"),
        Err(MappingError::UnknownPlatformBinding(_))
    ));
}
