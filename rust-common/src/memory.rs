//! Buffer sizing: from the throughput versus storage trade-off of every
//! scenario to the buffer constraints of the working bindings.

use std::collections::BTreeMap;

use log::{debug, info};
use sdfmap_core::{
    ApplicationGraph, BufferTradeoffExplorer, ChannelId, ScenarioId, TradeoffPoint,
};

use crate::binding::{BufferSize, PlatformBinding};
use crate::MappingError;

/// Buffer size per channel, with the throughput it allows.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageDistribution {
    pub sizes: BTreeMap<ChannelId, u64>,
    pub throughput: f64,
}

impl StorageDistribution {
    pub fn total_size(&self) -> u64 {
        self.sizes.values().sum()
    }

    pub fn size(&self, channel: ChannelId) -> u64 {
        self.sizes.get(&channel).copied().unwrap_or(0)
    }
}

/// The distributions of one scenario, ordered by total size and then by
/// throughput, with a cursor on the selected one.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageDistributionSet {
    distributions: Vec<StorageDistribution>,
    selected: Option<usize>,
}

impl StorageDistributionSet {
    /// Orders `distributions` and adds an all-zero distribution with
    /// throughput zero when none is present.
    pub fn new(mut distributions: Vec<StorageDistribution>, channels: impl Iterator<Item = ChannelId>) -> Self {
        if !distributions.iter().any(|d| d.throughput == 0.0) {
            distributions.push(StorageDistribution {
                sizes: channels.map(|c| (c, 0)).collect(),
                throughput: 0.0,
            });
        }
        distributions.sort_by(|a, b| {
            a.total_size()
                .cmp(&b.total_size())
                .then(a.throughput.total_cmp(&b.throughput))
        });
        StorageDistributionSet {
            distributions,
            selected: None,
        }
    }

    pub fn distributions(&self) -> &[StorageDistribution] {
        &self.distributions
    }

    pub fn selected(&self) -> Option<&StorageDistribution> {
        self.selected.map(|i| &self.distributions[i])
    }

    /// First distribution able to sustain any throughput at all.
    pub fn first_positive(&self) -> Option<&StorageDistribution> {
        self.distributions.iter().find(|d| d.throughput > 0.0)
    }

    fn advance(&mut self) -> bool {
        let next = self.selected.map_or(0, |i| i + 1);
        if next < self.distributions.len() {
            self.selected = Some(next);
            true
        } else {
            false
        }
    }
}

/// Worst-case demands of the instances of one channel across scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelDemand {
    /// Largest size in the selected distributions.
    pub max_size: u64,
    /// Largest size in the first distributions with a positive throughput.
    pub min_size: u64,
    pub max_tokens: u64,
    pub max_src_rate: u64,
    pub max_dst_rate: u64,
}

/// Policy dividing the buffer of a channel over the source side, the
/// destination side and a shared memory.
pub trait StorageSplit: Send + Sync {
    fn split(&self, demand: &ChannelDemand) -> BufferSize;
}

/// Half of the buffer at each side of a connection, source side rounded
/// up, never below the rates or the initial tokens. Tile-local channels
/// get the whole buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfSplit;

impl StorageSplit for HalfSplit {
    fn split(&self, d: &ChannelDemand) -> BufferSize {
        let total = d.max_size.max(d.min_size);
        let src = (total + 1) / 2;
        let dst = total - src;
        BufferSize {
            src: src.max(d.max_tokens).max(d.max_src_rate),
            dst: dst.max(d.max_tokens).max(d.max_dst_rate),
            mem: total,
        }
    }
}

/// Keeps the connection sides at exactly one firing worth of tokens and
/// puts the remaining buffering in the shared memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedBufferSplit;

impl StorageSplit for SharedBufferSplit {
    fn split(&self, d: &ChannelDemand) -> BufferSize {
        let mem = d
            .max_size
            .checked_sub(d.max_src_rate + d.max_dst_rate)
            .map_or(d.min_size, |rest| rest.max(d.min_size));
        BufferSize {
            src: d.max_src_rate,
            dst: d.max_dst_rate.max(d.max_tokens),
            mem,
        }
    }
}

pub struct MemoryDimensioning<'a> {
    application: &'a ApplicationGraph,
    sets: Vec<StorageDistributionSet>,
}

impl<'a> MemoryDimensioning<'a> {
    pub fn new(application: &'a ApplicationGraph) -> Self {
        MemoryDimensioning {
            application,
            sets: Vec::new(),
        }
    }

    /// Starts from distributions computed elsewhere, one set per scenario.
    pub fn with_distributions(application: &'a ApplicationGraph, sets: Vec<StorageDistributionSet>) -> Self {
        MemoryDimensioning { application, sets }
    }

    pub fn sets(&self) -> &[StorageDistributionSet] {
        &self.sets
    }

    /// Explores the storage trade-off of every scenario, assuming actors
    /// never fire concurrently with themselves.
    pub fn compute_storage_dist(&mut self, explorer: &dyn BufferTradeoffExplorer) -> Result<(), MappingError> {
        self.sets.clear();
        for (s, scenario) in self.application.scenarios() {
            let graph = self.application.scenario_graph(s);
            let mut single = graph.timed_sdf();
            single.add_unit_self_loops();
            let points: Vec<TradeoffPoint> = explorer.explore(&single)?;
            let nr_channels = graph.nr_channels();
            let distributions = points
                .into_iter()
                .map(|p| StorageDistribution {
                    sizes: p
                        .sizes
                        .into_iter()
                        .filter(|(c, _)| c.0 < nr_channels)
                        .collect(),
                    throughput: p.throughput,
                })
                .collect();
            let set = StorageDistributionSet::new(distributions, graph.channels().map(|(c, _)| c));
            debug!(
                "scenario {}: {} storage distributions",
                scenario.name,
                set.distributions.len()
            );
            self.sets.push(set);
        }
        Ok(())
    }

    /// Moves every scenario to its next larger distribution. Answers
    /// `false` once no scenario has one left.
    pub fn select_storage_dist(&mut self) -> bool {
        let mut advanced = false;
        for set in self.sets.iter_mut() {
            advanced |= set.advance();
        }
        advanced
    }

    fn demands(&self) -> BTreeMap<String, ChannelDemand> {
        let mut demands: BTreeMap<String, ChannelDemand> = BTreeMap::new();
        for (s, _) in self.application.scenarios() {
            let graph = self.application.scenario_graph(s);
            let set = self.sets.get(s.0);
            for (id, c) in graph.channels() {
                let d = demands.entry(c.name.clone()).or_default();
                if let Some(set) = set {
                    d.max_size = d.max_size.max(set.selected().map_or(0, |x| x.size(id)));
                    d.min_size = d.min_size.max(set.first_positive().map_or(0, |x| x.size(id)));
                }
                d.max_tokens = d.max_tokens.max(c.initial_tokens);
                d.max_src_rate = d.max_src_rate.max(graph.src_rate(id));
                d.max_dst_rate = d.max_dst_rate.max(graph.dst_rate(id));
            }
        }
        demands
    }

    /// Writes buffer constraints derived from the selected distributions
    /// into every non-initial binding.
    pub fn estimate_storage_dist(
        &self,
        bindings: &mut [PlatformBinding],
        split: &dyn StorageSplit,
    ) -> Result<(), MappingError> {
        let sizes: BTreeMap<String, BufferSize> = self
            .demands()
            .into_iter()
            .map(|(name, d)| {
                let size = split.split(&d);
                if size.mem < d.max_tokens {
                    return Err(MappingError::InsufficientBuffer {
                        channel: name,
                        tokens: d.max_tokens,
                        capacity: size.mem,
                    });
                }
                Ok((name, size))
            })
            .collect::<Result<_, _>>()?;
        for binding in bindings.iter_mut().filter(|b| !b.is_initial()) {
            for (s, _) in self.application.scenarios() {
                for (id, c) in self.application.scenario_graph(s).channels() {
                    if let Some(size) = sizes.get(&c.name) {
                        binding.constraints.entry(s, id).buffer = *size;
                    }
                }
            }
        }
        info!("estimated buffer sizes of {} channels", sizes.len());
        Ok(())
    }

    pub fn selected(&self, scenario: ScenarioId) -> Option<&StorageDistribution> {
        self.sets.get(scenario.0).and_then(|s| s.selected())
    }
}
