use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sdfmap_core::{
    ActorId, ApplicationGraph, BalanceEquations, ChannelId, ConnectionId, Memory, MemoryId, NetworkInterface,
    ModelError, NetworkInterfaceId, PlatformGraph, Processor, ProcessorId, RepetitionVector,
    RepetitionVectorComputer, ScenarioGraph, ScenarioId, Time, TileId,
};

use crate::binding::{ActorBinding, BufferSize, ConnectionRoute, GraphBinding, PlatformBinding};

const S0: ScenarioId = ScenarioId(0);

pub fn processor(name: &str, wheel_size: Time) -> Processor {
    Processor {
        name: name.to_owned(),
        processor_type: String::from("arm"),
        wheel_size,
        context_switch: 0,
        slot_length: None,
        reserved: 0,
    }
}

/// `nr_tiles` tiles with one `arm` processor (wheel 1000), one memory of
/// `memory_size` bytes and one network interface each, fully connected
/// with latency 10.
pub fn tiles(nr_tiles: usize, memory_size: u64) -> PlatformGraph {
    let mut p = PlatformGraph::new("tiles");
    let mut nis = Vec::new();
    for i in 0..nr_tiles {
        let t = p.add_tile(&format!("t{}", i));
        p.add_processor(t, processor(&format!("p{}", i), 1000));
        p.add_memory(
            t,
            Memory {
                name: format!("m{}", i),
                size: memory_size,
                reserved: 0,
            },
        );
        nis.push(p.add_network_interface(
            t,
            NetworkInterface {
                name: format!("ni{}", i),
                max_connections: 4,
                in_bandwidth: 100.0,
                out_bandwidth: 100.0,
            },
        ));
    }
    for (i, src) in nis.iter().enumerate() {
        for (j, dst) in nis.iter().enumerate() {
            if i != j {
                p.add_connection(&format!("c{}{}", i, j), *src, *dst, 10);
            }
        }
    }
    p
}

/// `a -> b` with unit rates, execution times 100 and 50 on `arm`, and a
/// back channel `b -> a` holding `tokens` tokens.
pub fn producer_consumer(tokens: u64, throughput_constraint: f64) -> ApplicationGraph {
    let mut g = ScenarioGraph::new("pc");
    let a = g.add_actor("a");
    let b = g.add_actor("b");
    g.set_execution_time(a, "arm", 100);
    g.set_execution_time(b, "arm", 50);
    g.actor_mut(a).state_size = 8;
    g.actor_mut(b).state_size = 8;
    g.connect("ab", a, 1, b, 1, 0);
    g.connect("ba", b, 1, a, 1, tokens);
    ApplicationGraph::single_scenario("pc", g, throughput_constraint)
}

/// A working binding where every channel of every scenario has `buffer`.
pub fn constrained(
    platform: &PlatformGraph,
    application: &ApplicationGraph,
    buffer: BufferSize,
) -> PlatformBinding {
    let mut b = PlatformBinding::new("working", platform);
    for (s, _) in application.scenarios() {
        for (c, _) in application.scenario_graph(s).channels() {
            b.constraints.entry(s, c).buffer = buffer;
        }
    }
    b
}

pub fn on(tile: usize) -> ActorBinding {
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

pub fn route(src: usize, dst: usize) -> ConnectionRoute {
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
        // tiles() adds c01 before c10
        connection: ConnectionId(if src < dst { 0 } else { 1 }),
    }
}

/// Binds `a` to tile `ta`, `b` to tile `tb` and both channels accordingly.
pub fn bound<'a>(
    app: &'a ApplicationGraph,
    platform: &'a PlatformGraph,
    pb: &PlatformBinding,
    ta: usize,
    tb: usize,
) -> GraphBinding<'a> {
    let mut g = GraphBinding::new(app, platform, pb);
    assert!(g.bind_actor_to_tile(S0, ActorId(0), on(ta)).unwrap());
    assert!(g.bind_actor_to_tile(S0, ActorId(1), on(tb)).unwrap());
    for (c, src, dst) in [(ChannelId(0), ta, tb), (ChannelId(1), tb, ta)] {
        let ok = if src == dst {
            g.bind_channel_to_tile(S0, c, on(src).memory).unwrap()
        } else {
            g.bind_channel_to_connection(S0, c, route(src, dst)).unwrap()
        };
        assert!(ok);
    }
    g
}

/// Balance equations that count how often they are solved.
#[derive(Default, Clone)]
pub struct CountingRepetition(pub Arc<AtomicUsize>);

impl CountingRepetition {
    pub fn calls(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl RepetitionVectorComputer for CountingRepetition {
    fn compute(&self, graph: &ScenarioGraph) -> Result<RepetitionVector, ModelError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        BalanceEquations.compute(graph)
    }
}
