use std::ops::Index;

use num::integer::gcd;
use num::rational::Ratio;
use num::{CheckedMul, One};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};

use crate::{ActorId, ChannelId, ModelError, RepetitionVectorComputer, ScenarioGraph};

/// Minimal number of firings per actor that returns every channel of a
/// consistent graph to its initial token count.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepetitionVector(pub Vec<u64>);

impl RepetitionVector {
    pub fn get(&self, actor: ActorId) -> u64 {
        self.0.get(actor.0).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActorId, u64)> + '_ {
        self.0.iter().enumerate().map(|(i, q)| (ActorId(i), *q))
    }

    pub fn max(&self) -> u64 {
        self.0.iter().copied().max().unwrap_or(0)
    }
}

impl Index<ActorId> for RepetitionVector {
    type Output = u64;

    fn index(&self, actor: ActorId) -> &u64 {
        &self.0[actor.0]
    }
}

/// Solves the balance equations of every weakly connected component of a
/// scenario graph independently.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceEquations;

impl RepetitionVectorComputer for BalanceEquations {
    fn compute(&self, graph: &ScenarioGraph) -> Result<RepetitionVector, ModelError> {
        let n = graph.nr_actors();
        let mut topology: UnGraph<(), ChannelId> = UnGraph::with_capacity(n, graph.nr_channels());
        for _ in 0..n {
            topology.add_node(());
        }
        for (id, c) in graph.channels() {
            if graph.src_rate(id) == 0 || graph.dst_rate(id) == 0 {
                return Err(ModelError::ZeroRate {
                    channel: c.name.clone(),
                });
            }
            topology.add_edge(NodeIndex::new(c.src.actor.0), NodeIndex::new(c.dst.actor.0), id);
        }
        let overflow = || ModelError::RepetitionOverflow(graph.name.clone());
        let mut ratios: Vec<Option<Ratio<u64>>> = vec![None; n];
        let mut result = vec![0u64; n];
        for root in topology.node_indices() {
            if ratios[root.index()].is_some() {
                continue;
            }
            ratios[root.index()] = Some(Ratio::one());
            let mut component = Vec::new();
            let mut bfs = Bfs::new(&topology, root);
            while let Some(node) = bfs.next(&topology) {
                let a = node.index();
                component.push(a);
                let ra = ratios[a].unwrap_or_else(Ratio::one);
                for edge in topology.edges(node) {
                    let id = *edge.weight();
                    let c = graph.channel(id);
                    // r(src) * p == r(dst) * q
                    let (other, step) = if c.src.actor.0 == a {
                        (c.dst.actor.0, Ratio::new(graph.src_rate(id), graph.dst_rate(id)))
                    } else {
                        (c.src.actor.0, Ratio::new(graph.dst_rate(id), graph.src_rate(id)))
                    };
                    let expected = ra.checked_mul(&step).ok_or_else(overflow)?;
                    match ratios[other] {
                        Some(r) if r != expected => {
                            return Err(ModelError::Inconsistent {
                                channel: c.name.clone(),
                            })
                        }
                        Some(_) => {}
                        None => ratios[other] = Some(expected),
                    }
                }
            }
            let mut den_lcm = 1u64;
            for r in component.iter().filter_map(|a| ratios[*a]) {
                den_lcm = (den_lcm / gcd(den_lcm, *r.denom()))
                    .checked_mul(*r.denom())
                    .ok_or_else(overflow)?;
            }
            let mut scaled = Vec::with_capacity(component.len());
            for a in component {
                if let Some(r) = ratios[a] {
                    let v = (*r.numer()).checked_mul(den_lcm / r.denom()).ok_or_else(overflow)?;
                    scaled.push((a, v));
                }
            }
            let num_gcd = scaled.iter().fold(0, |acc, (_, v)| gcd(acc, *v)).max(1);
            for (a, v) in scaled {
                result[a] = v / num_gcd;
            }
        }
        Ok(RepetitionVector(result))
    }
}

#[cfg(test)]
mod tests;
