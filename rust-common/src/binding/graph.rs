use std::collections::BTreeMap;

use sdfmap_core::{
    ActorId, ApplicationGraph, ChannelId, MemoryId, PlatformGraph, ProcessorId, RepetitionVector,
    ScenarioGraph, ScenarioId, Time,
};

use super::{
    ActorBinding, ChannelBinding, ChannelConstraints, ConnectionRoute, ParetoCandidate,
    ParetoQuantities, PlatformBinding,
};
use crate::MappingError;

/// Which figure of merit the processing loads of [ParetoQuantities] use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParetoBasis {
    /// Share of the TDMA wheel given to the application.
    #[default]
    Tdma,
    /// Share of the total execution time of one iteration.
    ExecutionTime,
}

/// A candidate binding under exploration: a private copy of a
/// [PlatformBinding] together with TDMA slice bounds and the resulting
/// Pareto quantities.
#[derive(Debug, Clone)]
pub struct GraphBinding<'a> {
    pub application: &'a ApplicationGraph,
    pub platform: &'a PlatformGraph,
    pub binding: PlatformBinding,
    tdma_bounds: BTreeMap<(ScenarioId, ProcessorId), (Time, Time)>,
    pareto: ParetoQuantities,
}

impl<'a> PartialEq for GraphBinding<'a> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.application, other.application)
            && std::ptr::eq(self.platform, other.platform)
            && self.binding == other.binding
            && self.tdma_bounds == other.tdma_bounds
            && self.pareto == other.pareto
    }
}

impl<'a> ParetoCandidate for GraphBinding<'a> {
    fn pareto(&self) -> &ParetoQuantities {
        &self.pareto
    }
}

impl<'a> GraphBinding<'a> {
    /// Wraps a clone of `binding`; the caller's binding is never touched.
    pub fn new(
        application: &'a ApplicationGraph,
        platform: &'a PlatformGraph,
        binding: &PlatformBinding,
    ) -> GraphBinding<'a> {
        GraphBinding {
            application,
            platform,
            binding: binding.clone(),
            tdma_bounds: BTreeMap::new(),
            pareto: ParetoQuantities::default(),
        }
    }

    pub fn scenario_graph(&self, scenario: ScenarioId) -> &'a ScenarioGraph {
        self.application.scenario_graph(scenario)
    }

    pub fn actor_binding(&self, scenario: ScenarioId, actor: ActorId) -> Option<&ActorBinding> {
        self.binding.actor_binding(scenario, actor)
    }

    pub fn channel_binding(&self, scenario: ScenarioId, channel: ChannelId) -> Option<&ChannelBinding> {
        self.binding.channel_binding(scenario, channel)
    }

    /// Claims processor and memory for `actor`. Answers `false`, with
    /// nothing claimed, when a resource is full or already holds the actor.
    pub fn bind_actor_to_tile(
        &mut self,
        scenario: ScenarioId,
        actor: ActorId,
        target: ActorBinding,
    ) -> Result<bool, MappingError> {
        let a = self.scenario_graph(scenario).actor(actor);
        if target.processor.tile != target.memory.tile {
            return Err(MappingError::CrossTileBinding {
                actor: a.name.clone(),
                processor: self.platform.processor(target.processor).name.clone(),
                memory: self.platform.memory(target.memory).name.clone(),
            });
        }
        if self.actor_binding(scenario, actor).is_some() {
            return Ok(false);
        }
        let processor_type = &self.platform.processor(target.processor).processor_type;
        if a.execution_time_on(processor_type).is_none() {
            return Ok(false);
        }
        if !self
            .binding
            .processor_mut(target.processor)
            .bind_actor(scenario, actor)
        {
            return Ok(false);
        }
        if !self
            .binding
            .memory_mut(target.memory)
            .bind_actor(scenario, actor, a.state_size)
        {
            self.binding
                .processor_mut(target.processor)
                .unbind_actor(scenario, actor);
            return Ok(false);
        }
        self.binding
            .actors
            .entry(scenario)
            .or_default()
            .insert(actor, target);
        Ok(true)
    }

    pub fn remove_actor_binding(&mut self, scenario: ScenarioId, actor: ActorId) {
        let removed = self
            .binding
            .actors
            .get_mut(&scenario)
            .and_then(|m| m.remove(&actor));
        if let Some(target) = removed {
            self.binding
                .processor_mut(target.processor)
                .unbind_actor(scenario, actor);
            self.binding
                .memory_mut(target.memory)
                .unbind_actor(scenario, actor);
        }
    }

    fn token_bytes(&self, scenario: ScenarioId, channel: ChannelId, tokens: u64) -> u64 {
        tokens * self.scenario_graph(scenario).channel(channel).token_size
    }

    fn constraints(
        &self,
        scenario: ScenarioId,
        channel: ChannelId,
    ) -> Result<ChannelConstraints, MappingError> {
        self.binding
            .constraints
            .get(scenario, channel)
            .copied()
            .ok_or_else(|| MappingError::MissingConstraint {
                channel: self.scenario_graph(scenario).channel(channel).name.clone(),
                scenario: self.application.scenario(scenario).name.clone(),
            })
    }

    /// Places the whole buffer of `channel` in `memory`.
    pub fn bind_channel_to_tile(
        &mut self,
        scenario: ScenarioId,
        channel: ChannelId,
        memory: MemoryId,
    ) -> Result<bool, MappingError> {
        if self.channel_binding(scenario, channel).is_some() {
            return Ok(false);
        }
        let c = self.constraints(scenario, channel)?;
        let bytes = self.token_bytes(scenario, channel, c.buffer.mem);
        if !self
            .binding
            .memory_mut(memory)
            .bind_channel(scenario, channel, bytes)
        {
            return Ok(false);
        }
        self.binding
            .channels
            .entry(scenario)
            .or_default()
            .insert(channel, ChannelBinding::Tile { memory });
        Ok(true)
    }

    /// Claims source and destination buffers, network interface bandwidth
    /// and the connection for `channel`, all or nothing.
    pub fn bind_channel_to_connection(
        &mut self,
        scenario: ScenarioId,
        channel: ChannelId,
        route: ConnectionRoute,
    ) -> Result<bool, MappingError> {
        if self.channel_binding(scenario, channel).is_some() {
            return Ok(false);
        }
        let c = self.constraints(scenario, channel)?;
        let src_bytes = self.token_bytes(scenario, channel, c.buffer.src);
        let dst_bytes = self.token_bytes(scenario, channel, c.buffer.dst);
        let b = &mut self.binding;
        if !b.memory_mut(route.src_memory).bind_channel(scenario, channel, src_bytes) {
            return Ok(false);
        }
        if !b.memory_mut(route.dst_memory).bind_channel(scenario, channel, dst_bytes) {
            b.memory_mut(route.src_memory).unbind_channel(scenario, channel);
            return Ok(false);
        }
        if !b
            .network_interface_mut(route.src_network_interface)
            .bind_outgoing(scenario, channel, c.bandwidth)
        {
            b.memory_mut(route.dst_memory).unbind_channel(scenario, channel);
            b.memory_mut(route.src_memory).unbind_channel(scenario, channel);
            return Ok(false);
        }
        if !b
            .network_interface_mut(route.dst_network_interface)
            .bind_incoming(scenario, channel, c.bandwidth)
        {
            b.network_interface_mut(route.src_network_interface)
                .unbind_channel(scenario, channel);
            b.memory_mut(route.dst_memory).unbind_channel(scenario, channel);
            b.memory_mut(route.src_memory).unbind_channel(scenario, channel);
            return Ok(false);
        }
        if !b.connection_mut(route.connection).bind_channel(scenario, channel) {
            b.network_interface_mut(route.dst_network_interface)
                .unbind_channel(scenario, channel);
            b.network_interface_mut(route.src_network_interface)
                .unbind_channel(scenario, channel);
            b.memory_mut(route.dst_memory).unbind_channel(scenario, channel);
            b.memory_mut(route.src_memory).unbind_channel(scenario, channel);
            return Ok(false);
        }
        b.channels
            .entry(scenario)
            .or_default()
            .insert(channel, ChannelBinding::Connection(route));
        Ok(true)
    }

    pub fn remove_channel_binding(&mut self, scenario: ScenarioId, channel: ChannelId) {
        let removed = self
            .binding
            .channels
            .get_mut(&scenario)
            .and_then(|m| m.remove(&channel));
        match removed {
            Some(ChannelBinding::Tile { memory }) => {
                self.binding.memory_mut(memory).unbind_channel(scenario, channel);
            }
            Some(ChannelBinding::Connection(route)) => {
                let b = &mut self.binding;
                b.memory_mut(route.src_memory).unbind_channel(scenario, channel);
                b.memory_mut(route.dst_memory).unbind_channel(scenario, channel);
                b.network_interface_mut(route.src_network_interface)
                    .unbind_channel(scenario, channel);
                b.network_interface_mut(route.dst_network_interface)
                    .unbind_channel(scenario, channel);
                b.connection_mut(route.connection)
                    .unbind_channel(scenario, channel);
            }
            None => {}
        }
    }

    /// Processors running at least one actor of `scenario`.
    pub fn processors_used(&self, scenario: ScenarioId) -> Vec<ProcessorId> {
        self.binding
            .processors()
            .filter(|p| p.is_used_in(scenario))
            .map(|p| p.processor)
            .collect()
    }

    pub fn min_tdma_slice(&self, scenario: ScenarioId, processor: ProcessorId) -> Time {
        self.tdma_bounds
            .get(&(scenario, processor))
            .map_or(0, |(min, _)| *min)
    }

    pub fn max_tdma_slice(&self, scenario: ScenarioId, processor: ProcessorId) -> Time {
        self.tdma_bounds
            .get(&(scenario, processor))
            .map_or(self.binding.processor(processor).available, |(_, max)| *max)
    }

    pub fn set_tdma_bounds(&mut self, scenario: ScenarioId, processor: ProcessorId, min: Time, max: Time) {
        self.tdma_bounds.insert((scenario, processor), (min, max));
    }

    pub fn tdma_bounds(&self) -> impl Iterator<Item = ((ScenarioId, ProcessorId), (Time, Time))> + '_ {
        self.tdma_bounds.iter().map(|(k, v)| (*k, *v))
    }

    /// Slice used to model `processor` in `scenario`: the allocated one,
    /// else the upper bound still under exploration.
    pub fn tdma_slice(&self, scenario: ScenarioId, processor: ProcessorId) -> Time {
        self.binding
            .processor(processor)
            .slice(scenario)
            .unwrap_or_else(|| self.max_tdma_slice(scenario, processor))
    }

    pub fn allocate_tdma_slice(&mut self, scenario: ScenarioId, processor: ProcessorId, slice: Time) -> bool {
        let slice = self.platform.processor(processor).align_slice(slice);
        self.binding
            .processor_mut(processor)
            .allocate_slice(scenario, slice)
    }

    pub fn pareto_quantities(&self) -> &ParetoQuantities {
        &self.pareto
    }

    /// Recomputes the normalised loads of every platform resource.
    /// `repetition` holds the repetition vector of every scenario.
    pub fn compute_pareto_quantities(&mut self, repetition: &[RepetitionVector], basis: ParetoBasis) {
        let mut processing = BTreeMap::new();
        for p in self.binding.processors() {
            let load = match basis {
                ParetoBasis::Tdma => {
                    let used = p.nr_scenarios_used();
                    if used == 0 || p.wheel_size == 0 {
                        0.0
                    } else {
                        let slices: Time = p
                            .actors
                            .keys()
                            .map(|s| self.tdma_slice(*s, p.processor))
                            .sum();
                        slices as f64 / (used as f64 * p.wheel_size as f64)
                    }
                }
                ParetoBasis::ExecutionTime => {
                    let processor_type = &self.platform.processor(p.processor).processor_type;
                    p.actors
                        .iter()
                        .flat_map(|(s, actors)| actors.iter().map(move |a| (*s, *a)))
                        .map(|(s, a)| {
                            let exec = self
                                .scenario_graph(s)
                                .actor(a)
                                .execution_time_on(processor_type)
                                .unwrap_or(0);
                            let q = repetition.get(s.0).map_or(1, |r| r.get(a));
                            (exec * q) as f64
                        })
                        .sum()
                }
            };
            processing.insert(p.processor, load);
        }
        if basis == ParetoBasis::ExecutionTime {
            let total: f64 = processing.values().sum();
            if total > 0.0 {
                processing.values_mut().for_each(|l| *l /= total);
            }
        }
        let memory = self
            .binding
            .memories()
            .map(|m| {
                let load = if m.capacity == 0 {
                    0.0
                } else {
                    m.max_used() as f64 / m.capacity as f64
                };
                (m.memory, load)
            })
            .collect();
        let communication = self
            .binding
            .network_interfaces()
            .map(|n| {
                let capacity = n.in_capacity + n.out_capacity;
                let load = if capacity > 0.0 {
                    n.max_used() / capacity
                } else {
                    0.0
                };
                (n.network_interface, load)
            })
            .collect();
        self.pareto = ParetoQuantities {
            processing,
            memory,
            communication,
        };
    }
}
