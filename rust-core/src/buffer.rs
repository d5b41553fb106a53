use std::collections::BTreeMap;

use log::debug;
use num::integer::gcd;
use serde::{Deserialize, Serialize};

use crate::{
    BufferTradeoffExplorer, ChannelId, MaxCycleRatioThroughput, ModelError, ScenarioGraph,
    ThroughputAnalysis,
};

/// One point of a throughput versus buffer size trade-off: the throughput
/// reached when every channel is limited to the given number of tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeoffPoint {
    pub throughput: f64,
    pub sizes: BTreeMap<ChannelId, u64>,
}

impl TradeoffPoint {
    pub fn total_size(&self) -> u64 {
        self.sizes.values().sum()
    }
}

/// Greedy exploration of the buffer trade-off space.
///
/// Starting from the smallest buffer each channel can possibly work with,
/// the channel whose enlargement gives the largest throughput gain is
/// grown by the gcd of its rates. If no single channel helps, all of them
/// grow at once. A point is emitted on every strict throughput increase
/// until the throughput of the unbounded graph is reached or `max_steps`
/// enlargements were made.
#[derive(Debug, Clone)]
pub struct GreedyBufferExplorer<T: ThroughputAnalysis = MaxCycleRatioThroughput> {
    throughput: T,
    pub max_steps: usize,
}

impl Default for GreedyBufferExplorer {
    fn default() -> Self {
        GreedyBufferExplorer {
            throughput: MaxCycleRatioThroughput::default(),
            max_steps: 256,
        }
    }
}

impl<T: ThroughputAnalysis> GreedyBufferExplorer<T> {
    pub fn new(throughput: T, max_steps: usize) -> Self {
        GreedyBufferExplorer {
            throughput,
            max_steps,
        }
    }

    /// Smallest capacity of a channel with rates `p`, `c` and `t` initial
    /// tokens that does not deadlock on its own.
    pub fn lower_bound(p: u64, c: u64, t: u64) -> u64 {
        let g = gcd(p, c).max(1);
        (p + c - g + t % g).max(t)
    }

    /// Throughput of `graph` when every channel in `sizes` is bounded by a
    /// reverse channel holding the free space.
    pub fn bounded_throughput(
        &self,
        graph: &ScenarioGraph,
        sizes: &BTreeMap<ChannelId, u64>,
    ) -> Result<f64, ModelError> {
        let mut bounded = graph.clone();
        for (id, size) in sizes {
            let c = graph.channel(*id);
            if c.is_self_loop() {
                continue;
            }
            let space = size.saturating_sub(c.initial_tokens);
            bounded.connect(
                &format!("{}_space", c.name),
                c.dst.actor,
                graph.dst_rate(*id),
                c.src.actor,
                graph.src_rate(*id),
                space,
            );
        }
        self.throughput.analyze(&bounded)
    }
}

fn improves(candidate: f64, current: f64) -> bool {
    candidate > current + 1e-12 + current.abs() * 1e-9
}

impl<T: ThroughputAnalysis> BufferTradeoffExplorer for GreedyBufferExplorer<T> {
    fn explore(&self, graph: &ScenarioGraph) -> Result<Vec<TradeoffPoint>, ModelError> {
        let unbounded = self.throughput.analyze(graph)?;
        let mut sizes = BTreeMap::new();
        let mut steps = BTreeMap::new();
        for (id, c) in graph.channels() {
            if c.is_self_loop() {
                sizes.insert(id, c.initial_tokens);
                continue;
            }
            let (p, q) = (graph.src_rate(id), graph.dst_rate(id));
            sizes.insert(id, Self::lower_bound(p, q, c.initial_tokens));
            steps.insert(id, gcd(p, q).max(1));
        }
        let mut points = Vec::new();
        let mut current = self.bounded_throughput(graph, &sizes)?;
        if current > 0.0 {
            points.push(TradeoffPoint {
                throughput: current,
                sizes: sizes.clone(),
            });
        }
        let mut nr_steps = 0;
        while nr_steps < self.max_steps && improves(unbounded, current) && !steps.is_empty() {
            nr_steps += 1;
            let mut best: Option<(f64, ChannelId)> = None;
            for (id, step) in &steps {
                let mut trial = sizes.clone();
                trial.entry(*id).and_modify(|s| *s += step);
                let th = self.bounded_throughput(graph, &trial)?;
                if improves(th, best.map_or(current, |(b, _)| b)) {
                    best = Some((th, *id));
                }
            }
            match best {
                Some((th, id)) => {
                    sizes.entry(id).and_modify(|s| *s += steps[&id]);
                    current = th;
                }
                None => {
                    for (id, step) in &steps {
                        sizes.entry(*id).and_modify(|s| *s += step);
                    }
                    let th = self.bounded_throughput(graph, &sizes)?;
                    if !improves(th, current) {
                        continue;
                    }
                    current = th;
                }
            }
            debug!(
                "buffer exploration of {}: throughput {} at total size {}",
                graph.name,
                current,
                sizes.values().sum::<u64>()
            );
            points.push(TradeoffPoint {
                throughput: current,
                sizes: sizes.clone(),
            });
        }
        Ok(points)
    }
}
