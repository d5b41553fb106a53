//! The complete mapping flow: buffer sizing, tile binding, TDMA slice
//! allocation and static-order scheduling of one application.

use std::collections::BTreeMap;

use derive_builder::Builder;
use log::{info, warn};
use schemars::JsonSchema;
use sdfmap_core::{
    ApplicationGraph, BalanceEquations, BufferTradeoffExplorer, GreedyBufferExplorer,
    MaxCycleRatioThroughput, PlatformGraph, RepetitionVectorComputer, ThroughputAnalysis, Time,
};
use serde::{Deserialize, Serialize};

use crate::binding::{BufferSize, ChannelBinding, GraphBinding, ParetoBasis};
use crate::binding_aware::{
    binding_throughput, CommunicationModel, DmaCommunication, GenericCommunication,
};
use crate::memory::{HalfSplit, MemoryDimensioning, SharedBufferSplit, StorageSplit};
use crate::scheduling::{edf_schedule, ScheduleContext, SchedulingStrategy, TdmaBisection};
use crate::tile_binding::TileBindingAlgo;
use crate::MappingError;

const WORKING_BINDING: &str = "working";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationKind {
    #[default]
    Generic,
    Dma,
}

impl CommunicationKind {
    pub fn model(&self) -> &'static dyn CommunicationModel {
        match self {
            CommunicationKind::Generic => &GenericCommunication,
            CommunicationKind::Dma => &DmaCommunication,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageSplitKind {
    #[default]
    Half,
    Shared,
}

impl StorageSplitKind {
    pub fn split(&self) -> &'static dyn StorageSplit {
        match self {
            StorageSplitKind::Half => &HalfSplit,
            StorageSplitKind::Shared => &SharedBufferSplit,
        }
    }
}

#[derive(Debug, Clone, Builder)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct FlowSettings {
    /// Candidate bindings kept after every pruning step.
    pub max_app_bindings: usize,
    pub communication: CommunicationKind,
    pub storage_split: StorageSplitKind,
    /// Basis of the loads ranking the scheduled bindings.
    pub pareto_basis: ParetoBasis,
}

impl FlowSettingsBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_app_bindings == Some(0) {
            return Err(String::from("at least one candidate binding must be kept"));
        }
        Ok(())
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        FlowSettings {
            max_app_bindings: 8,
            communication: CommunicationKind::default(),
            storage_split: StorageSplitKind::default(),
            pareto_basis: ParetoBasis::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActorPlacement {
    pub processor: String,
    pub memory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelPlacement {
    Tile {
        memory: String,
        buffer: BufferSize,
    },
    Connection {
        connection: String,
        src_memory: String,
        dst_memory: String,
        buffer: BufferSize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioReport {
    pub scenario: String,
    pub actors: BTreeMap<String, ActorPlacement>,
    pub channels: BTreeMap<String, ChannelPlacement>,
    /// TDMA slice per processor.
    pub slices: BTreeMap<String, Time>,
    /// Static order per processor, by actor name.
    pub schedules: BTreeMap<String, Vec<String>>,
}

/// The chosen binding, by resource and actor names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MappingReport {
    pub application: String,
    pub platform: String,
    pub binding: String,
    /// Storage distributions tried up to and including the successful one.
    pub storage_steps: usize,
    /// Guaranteed throughput in iterations per time unit.
    pub throughput: f64,
    /// Normalised load of every platform resource.
    pub loads: BTreeMap<String, f64>,
    pub scenarios: Vec<ScenarioReport>,
}

impl MappingReport {
    pub fn from_binding(binding: &GraphBinding, throughput: f64, storage_steps: usize) -> MappingReport {
        let platform = binding.platform;
        let application = binding.application;
        let pareto = binding.pareto_quantities();
        let loads = pareto
            .processing
            .iter()
            .map(|(p, l)| (platform.processor(*p).name.clone(), *l))
            .chain(
                pareto
                    .memory
                    .iter()
                    .map(|(m, l)| (platform.memory(*m).name.clone(), *l)),
            )
            .chain(
                pareto
                    .communication
                    .iter()
                    .map(|(n, l)| (platform.network_interface(*n).name.clone(), *l)),
            )
            .collect();
        let scenarios = application
            .scenarios()
            .map(|(s, scenario)| {
                let graph = application.scenario_graph(s);
                let actors = graph
                    .actors()
                    .filter_map(|(id, a)| {
                        let target = binding.actor_binding(s, id)?;
                        Some((
                            a.name.clone(),
                            ActorPlacement {
                                processor: platform.processor(target.processor).name.clone(),
                                memory: platform.memory(target.memory).name.clone(),
                            },
                        ))
                    })
                    .collect();
                let channels = graph
                    .channels()
                    .filter_map(|(id, c)| {
                        let buffer = binding
                            .binding
                            .constraints
                            .get(s, id)
                            .map(|k| k.buffer)
                            .unwrap_or_default();
                        let placement = match binding.channel_binding(s, id)? {
                            ChannelBinding::Tile { memory } => ChannelPlacement::Tile {
                                memory: platform.memory(*memory).name.clone(),
                                buffer,
                            },
                            ChannelBinding::Connection(route) => ChannelPlacement::Connection {
                                connection: platform.connection(route.connection).name.clone(),
                                src_memory: platform.memory(route.src_memory).name.clone(),
                                dst_memory: platform.memory(route.dst_memory).name.clone(),
                                buffer,
                            },
                        };
                        Some((c.name.clone(), placement))
                    })
                    .collect();
                let slices = binding
                    .processors_used(s)
                    .into_iter()
                    .map(|p| (platform.processor(p).name.clone(), binding.tdma_slice(s, p)))
                    .collect();
                let schedules = binding
                    .binding
                    .processors()
                    .filter_map(|p| {
                        let order = p.schedules.get(&s)?;
                        Some((
                            platform.processor(p.processor).name.clone(),
                            order
                                .entries
                                .iter()
                                .map(|a| graph.actor(*a).name.clone())
                                .collect(),
                        ))
                    })
                    .collect();
                ScenarioReport {
                    scenario: scenario.name.clone(),
                    actors,
                    channels,
                    slices,
                    schedules,
                }
            })
            .collect();
        MappingReport {
            application: application.name.clone(),
            platform: platform.name.clone(),
            binding: binding.binding.name.clone(),
            storage_steps,
            throughput,
            loads,
            scenarios,
        }
    }
}

/// Maps one application onto one platform.
///
/// Storage distributions are tried from the smallest up; the first one
/// for which a binding meets the throughput constraint wins.
pub struct MappingFlow<'a> {
    application: &'a ApplicationGraph,
    platform: &'a PlatformGraph,
    settings: FlowSettings,
    throughput: Box<dyn ThroughputAnalysis>,
    explorer: Box<dyn BufferTradeoffExplorer>,
    repetition: Box<dyn RepetitionVectorComputer>,
    scheduling: Box<dyn SchedulingStrategy>,
}

impl<'a> MappingFlow<'a> {
    pub fn new(application: &'a ApplicationGraph, platform: &'a PlatformGraph, settings: FlowSettings) -> Self {
        MappingFlow {
            application,
            platform,
            settings,
            throughput: Box::new(MaxCycleRatioThroughput::default()),
            explorer: Box::new(GreedyBufferExplorer::default()),
            repetition: Box::new(BalanceEquations),
            scheduling: Box::new(TdmaBisection),
        }
    }

    pub fn with_throughput(mut self, throughput: Box<dyn ThroughputAnalysis>) -> Self {
        self.throughput = throughput;
        self
    }

    pub fn with_explorer(mut self, explorer: Box<dyn BufferTradeoffExplorer>) -> Self {
        self.explorer = explorer;
        self
    }

    pub fn with_repetition(mut self, repetition: Box<dyn RepetitionVectorComputer>) -> Self {
        self.repetition = repetition;
        self
    }

    pub fn with_scheduling(mut self, scheduling: Box<dyn SchedulingStrategy>) -> Self {
        self.scheduling = scheduling;
        self
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Runs the flow. Answers `None` when every storage distribution was
    /// tried without finding a binding that meets the throughput
    /// constraint.
    pub fn run(&self) -> Result<Option<MappingReport>, MappingError> {
        let max = self.settings.max_app_bindings;
        let communication = self.settings.communication.model();
        let split = self.settings.storage_split.split();
        let mut memory = MemoryDimensioning::new(self.application);
        memory.compute_storage_dist(self.explorer.as_ref())?;
        let mut algo = TileBindingAlgo::new(
            self.application,
            self.platform,
            Vec::new(),
            self.repetition.as_ref(),
            self.settings.pareto_basis,
        )?;
        let repetition_vectors = algo.repetition_vectors().to_vec();
        let ctx = ScheduleContext {
            throughput: self.throughput.as_ref(),
            communication,
            repetition: self.repetition.as_ref(),
            repetition_vectors: &repetition_vectors,
        };
        let mut step = 0;
        while memory.select_storage_dist() {
            step += 1;
            algo.reset_working_bindings(WORKING_BINDING);
            memory.estimate_storage_dist(&mut algo.bindings, split)?;
            algo.estimate_bandwidth_constraints();
            if !algo.bind_graph_to_tiles(max)? {
                info!("storage distribution {}: no binding to tiles", step);
                continue;
            }
            algo.estimate_connection_delay();
            if !algo.construct_tile_schedules(max, self.scheduling.as_ref(), &ctx)? {
                info!("storage distribution {}: no binding meets the throughput constraint", step);
                continue;
            }
            let Some(mut best) = algo.graph_bindings().into_iter().min_by(|a, b| {
                a.pareto_quantities()
                    .total()
                    .total_cmp(&b.pareto_quantities().total())
            }) else {
                continue;
            };
            edf_schedule(&mut best, &ctx)?;
            let throughput = binding_throughput(&best, communication, self.throughput.as_ref())?;
            info!(
                "mapped {} with binding {} at throughput {}",
                self.application.name, best.binding.name, throughput
            );
            return Ok(Some(MappingReport::from_binding(&best, throughput, step)));
        }
        warn!(
            "no binding of {} meets throughput {} after {} storage distributions",
            self.application.name, self.application.throughput_constraint, step
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests;
