use crate::{ActorId, ScenarioGraph};

/// `a -(p:c)-> b` without initial tokens, both actors on processor type `arm`.
pub fn pair(p: u64, c: u64, exec_a: u64, exec_b: u64) -> (ScenarioGraph, ActorId, ActorId) {
    let mut g = ScenarioGraph::new("pair");
    let a = g.add_actor("a");
    let b = g.add_actor("b");
    g.set_execution_time(a, "arm", exec_a);
    g.set_execution_time(b, "arm", exec_b);
    g.connect("ab", a, p, b, c, 0);
    (g, a, b)
}

/// Two actors in a homogeneous cycle; the back edge carries `tokens`.
pub fn ring(exec_a: u64, exec_b: u64, tokens: u64) -> ScenarioGraph {
    let (mut g, a, b) = pair(1, 1, exec_a, exec_b);
    g.name = String::from("ring");
    g.connect("ba", b, 1, a, 1, tokens);
    g
}
