use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;

use crate::hsdf::to_hsdf;
use crate::{BalanceEquations, ModelError, RepetitionVectorComputer, ScenarioGraph, ThroughputAnalysis};

const EPSILON: f64 = 1e-9;
const MAX_POLICY_ITERATIONS: usize = 100_000;

/// Throughput analysis in the max-plus sense: the graph is unfolded into
/// its HSDF equivalent and the throughput is the inverse of the maximum
/// cycle ratio (execution time over tokens) of that HSDF graph.
///
/// Actors use the execution time of their default processor type. A cycle
/// without tokens deadlocks the graph and yields throughput zero, a graph
/// without cycles has unbounded throughput.
#[derive(Debug, Clone)]
pub struct MaxCycleRatioThroughput<R: RepetitionVectorComputer = BalanceEquations> {
    repetition: R,
}

impl Default for MaxCycleRatioThroughput {
    fn default() -> Self {
        MaxCycleRatioThroughput {
            repetition: BalanceEquations,
        }
    }
}

impl<R: RepetitionVectorComputer> MaxCycleRatioThroughput<R> {
    pub fn with_repetition(repetition: R) -> Self {
        MaxCycleRatioThroughput { repetition }
    }
}

impl<R: RepetitionVectorComputer> ThroughputAnalysis for MaxCycleRatioThroughput<R> {
    fn analyze(&self, graph: &ScenarioGraph) -> Result<f64, ModelError> {
        if graph.nr_actors() == 0 {
            return Ok(f64::INFINITY);
        }
        let repetition = self.repetition.compute(graph)?;
        let hsdf = to_hsdf(graph, &repetition)?;
        if is_cyclic_directed(&hsdf.precedence_graph()) {
            return Ok(0.0);
        }
        match max_cycle_ratio(&hsdf.graph) {
            Some(ratio) if ratio > 0.0 => Ok(1.0 / ratio),
            _ => Ok(f64::INFINITY),
        }
    }
}

/// Maximum over all cycles of (sum of execution times) / (sum of tokens),
/// or `None` when the graph is acyclic. Every cycle must carry tokens.
pub fn max_cycle_ratio(graph: &ScenarioGraph) -> Option<f64> {
    let mut g: DiGraph<f64, (f64, f64)> = DiGraph::new();
    let nodes: Vec<_> = graph
        .actors()
        .map(|(_, a)| g.add_node(a.execution_time() as f64))
        .collect();
    for (_, c) in graph.channels() {
        let w = g[nodes[c.src.actor.0]];
        g.add_edge(
            nodes[c.src.actor.0],
            nodes[c.dst.actor.0],
            (w, c.initial_tokens as f64),
        );
    }
    let mut best: Option<f64> = None;
    for scc in tarjan_scc(&g) {
        let mut local = vec![usize::MAX; g.node_count()];
        for (i, n) in scc.iter().enumerate() {
            local[n.index()] = i;
        }
        let mut out: Vec<Vec<(usize, f64, f64)>> = vec![Vec::new(); scc.len()];
        for n in &scc {
            for e in g.edges(*n) {
                let t = local[e.target().index()];
                if t != usize::MAX {
                    let (w, tokens) = *e.weight();
                    out[local[n.index()]].push((t, w, tokens));
                }
            }
        }
        if out.iter().any(|edges| edges.is_empty()) {
            // a single node without a self-edge is not a cycle
            continue;
        }
        let ratio = howard(&out);
        best = Some(best.map_or(ratio, |b: f64| b.max(ratio)));
    }
    best
}

/// Howard's policy iteration for the maximum cycle ratio of a strongly
/// connected graph given as adjacency lists of (target, weight, tokens).
fn howard(out: &[Vec<(usize, f64, f64)>]) -> f64 {
    let n = out.len();
    let mut policy: Vec<usize> = out
        .iter()
        .map(|edges| {
            edges
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.1.total_cmp(&b.1))
                .map(|(i, _)| i)
                .unwrap_or(0)
        })
        .collect();
    let mut eta = vec![0.0; n];
    let mut x = vec![0.0; n];
    for _ in 0..MAX_POLICY_ITERATIONS {
        evaluate_policy(out, &policy, &mut eta, &mut x);
        let mut changed = false;
        // first improve the cycle ratio reached, then the bias
        for u in 0..n {
            let (best_edge, best_eta) = out[u]
                .iter()
                .enumerate()
                .map(|(i, (v, _, _))| (i, eta[*v]))
                .fold((policy[u], eta[u]), |acc, cur| {
                    if cur.1 > acc.1 + EPSILON {
                        cur
                    } else {
                        acc
                    }
                });
            if best_eta > eta[u] + EPSILON {
                policy[u] = best_edge;
                changed = true;
            }
        }
        if !changed {
            for u in 0..n {
                let mut best = x[u];
                for (i, (v, w, t)) in out[u].iter().enumerate() {
                    if (eta[*v] - eta[u]).abs() > EPSILON {
                        continue;
                    }
                    let value = w - eta[u] * t + x[*v];
                    if value > best + EPSILON * (1.0 + best.abs()) {
                        best = value;
                        policy[u] = i;
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }
    eta.into_iter().fold(f64::NEG_INFINITY, f64::max)
}

/// Computes the ratio `eta` of the cycle each node reaches under `policy`
/// and the bias `x` of every node relative to that cycle.
fn evaluate_policy(out: &[Vec<(usize, f64, f64)>], policy: &[usize], eta: &mut [f64], x: &mut [f64]) {
    let n = out.len();
    // 0: unvisited, 1: on the current path, 2: evaluated
    let mut state = vec![0u8; n];
    for start in 0..n {
        if state[start] != 0 {
            continue;
        }
        let mut path = Vec::new();
        let mut u = start;
        while state[u] == 0 {
            state[u] = 1;
            path.push(u);
            u = out[u][policy[u]].0;
        }
        if state[u] == 1 {
            // closed a new cycle starting at u
            let pos = path.iter().position(|p| *p == u).unwrap_or(0);
            let cycle = &path[pos..];
            let (w, t) = cycle.iter().fold((0.0, 0.0), |(w, t), c| {
                let (_, cw, ct) = out[*c][policy[*c]];
                (w + cw, t + ct)
            });
            let ratio = if t > 0.0 { w / t } else { f64::INFINITY };
            x[cycle[0]] = 0.0;
            eta[cycle[0]] = ratio;
            for c in cycle.iter().skip(1).rev() {
                let (v, cw, ct) = out[*c][policy[*c]];
                eta[*c] = ratio;
                x[*c] = cw - ratio * ct + x[v];
            }
            for c in cycle {
                state[*c] = 2;
            }
            path.truncate(pos);
        }
        for c in path.iter().rev() {
            let (v, cw, ct) = out[*c][policy[*c]];
            eta[*c] = eta[v];
            x[*c] = cw - eta[v] * ct + x[v];
            state[*c] = 2;
        }
    }
}
