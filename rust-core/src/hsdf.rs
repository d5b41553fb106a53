use std::collections::BTreeMap;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::{ActorId, ModelError, RepetitionVector, ScenarioGraph};

/// Homogeneous unfolding of a scenario graph: one actor per firing within a
/// graph iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct HsdfGraph {
    pub graph: ScenarioGraph,
    /// For every HSDF actor, the unfolded actor and its firing index.
    pub origin: Vec<(ActorId, u64)>,
    /// First HSDF actor of every unfolded actor.
    first_firing: Vec<usize>,
}

impl HsdfGraph {
    pub fn firing(&self, actor: ActorId, index: u64) -> ActorId {
        ActorId(self.first_firing[actor.0] + index as usize)
    }

    /// Precedence relation within one iteration: the HSDF edges carrying no
    /// tokens. Node weights are the HSDF actor ids.
    pub fn precedence_graph(&self) -> DiGraph<ActorId, ()> {
        let mut g = DiGraph::with_capacity(self.graph.nr_actors(), self.graph.nr_channels());
        let nodes: Vec<NodeIndex> = self.graph.actors().map(|(id, _)| g.add_node(id)).collect();
        for (_, c) in self.graph.channels() {
            if c.initial_tokens == 0 {
                g.update_edge(nodes[c.src.actor.0], nodes[c.dst.actor.0], ());
            }
        }
        g
    }
}

/// Converts a consistent SDF graph into its HSDF equivalent.
///
/// An HSDF edge carries as many tokens as iterations separate the producing
/// firing from the consuming one. Multiple dependencies between the same
/// pair of firings are merged into the one with the fewest tokens.
pub fn to_hsdf(graph: &ScenarioGraph, repetition: &RepetitionVector) -> Result<HsdfGraph, ModelError> {
    let mut hsdf = ScenarioGraph::new(&format!("{}_hsdf", graph.name));
    let mut origin = Vec::new();
    let mut first_firing = Vec::with_capacity(graph.nr_actors());
    for (id, a) in graph.actors() {
        let q = repetition.get(id);
        if q == 0 {
            return Err(ModelError::MissingRepetition(a.name.clone()));
        }
        first_firing.push(origin.len());
        for k in 0..q {
            let h = hsdf.add_actor(&format!("{}_{}", a.name, k));
            let ha = hsdf.actor_mut(h);
            ha.execution_times = a.execution_times.clone();
            ha.default_processor_type = a.default_processor_type.clone();
            ha.state_size = a.state_size;
            ha.original = a.original;
            origin.push((id, k));
        }
    }
    for (cid, c) in graph.channels() {
        let p = graph.src_rate(cid) as i64;
        let cons = graph.dst_rate(cid) as i64;
        let produced = p * repetition.get(c.src.actor) as i64;
        let tokens = c.initial_tokens as i64;
        // (producer firing, consumer firing) -> fewest iterations of delay
        let mut edges: BTreeMap<(u64, u64), u64> = BTreeMap::new();
        for j in 0..repetition.get(c.dst.actor) as i64 {
            for r in 0..cons {
                let k = j * cons + r - tokens;
                let delay = (-k.div_euclid(produced)) as u64;
                let firing = (k.rem_euclid(produced) / p) as u64;
                let e = edges.entry((firing, j as u64)).or_insert(delay);
                *e = (*e).min(delay);
            }
        }
        for ((src, dst), delay) in edges {
            let s = ActorId(first_firing[c.src.actor.0] + src as usize);
            let d = ActorId(first_firing[c.dst.actor.0] + dst as usize);
            let name = format!("{}_{}_{}", c.name, src, dst);
            let ch = hsdf.connect(&name, s, 1, d, 1, delay);
            hsdf.channel_mut(ch).token_size = c.token_size;
        }
    }
    Ok(HsdfGraph {
        graph: hsdf,
        origin,
        first_firing,
    })
}
