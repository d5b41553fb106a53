//! Binding-aware graphs: a scenario graph rewritten so that the timing
//! consequences of a binding become ordinary dataflow behaviour.
//!
//! Actors get their worst-case response time under TDMA arbitration and a
//! self-loop. Tile-local channels get a reverse channel bounding their
//! buffer. Channels crossing a connection are replaced by a small
//! sub-graph whose shape depends on the [CommunicationModel].

mod dma;
mod generic;

use log::trace;
use sdfmap_core::{
    Actor, ActorId, ChannelId, PortDirection, PortRef, ProcessorId, Rate, ScenarioGraph,
    ScenarioId, ThroughputAnalysis, Time,
};

pub use dma::DmaCommunication;
pub use generic::GenericCommunication;

use crate::binding::{ChannelBinding, ChannelConstraints, ConnectionRoute, GraphBinding};
use crate::MappingError;

/// Processor type under which binding-aware actors carry their response time.
pub const WCRT_PROCESSOR_TYPE: &str = "wcrt";

/// Worst-case response time of a firing of `execution_time` on a TDMA
/// processor giving the actor a `slice` of every `wheel_size`, paying
/// `context_switch` at the start of each slice.
///
/// Every slice executes `slice - context_switch` units; the firing may
/// have to wait for the rest of the wheel before each of them.
pub fn worst_case_response_time(
    execution_time: Time,
    slice: Time,
    wheel_size: Time,
    context_switch: Time,
) -> Option<Time> {
    if execution_time == 0 {
        return Some(0);
    }
    if slice >= wheel_size {
        return Some(execution_time);
    }
    if slice <= context_switch {
        return None;
    }
    let usable = slice - context_switch;
    let nr_slices = (execution_time + usable - 1) / usable;
    Some(nr_slices * wheel_size)
}

/// Everything a channel sub-graph needs to know about a channel crossing
/// a connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionChannel {
    pub channel: ChannelId,
    pub route: ConnectionRoute,
    pub constraints: ChannelConstraints,
    /// Bandwidth the channel can rely on, in bytes per time unit.
    pub bandwidth: f64,
    pub latency: Time,
    /// Part of the destination wheel not given to the application.
    pub dst_tdma_wait: Time,
}

impl ConnectionChannel {
    /// Time to push one token through the connection.
    pub fn token_transfer_time(&self, token_size: u64) -> Time {
        if self.bandwidth > 0.0 {
            (token_size as f64 / self.bandwidth).ceil() as Time
        } else {
            0
        }
    }
}

/// How a binding shows up in the binding-aware graph. Platforms differ in
/// the way they move tokens between tiles; actor and tile-local modelling
/// is shared.
pub trait CommunicationModel: Send + Sync {
    fn name(&self) -> &str;

    fn model_actor_binding(&self, builder: &mut BindingAwareBuilder, actor: ActorId) -> Result<(), MappingError> {
        builder.model_actor_wcrt(actor)
    }

    fn model_channel_to_tile(&self, builder: &mut BindingAwareBuilder, channel: ChannelId) -> Result<(), MappingError> {
        builder.model_tile_buffer(channel)
    }

    fn model_channel_to_connection(
        &self,
        builder: &mut BindingAwareBuilder,
        channel: &ConnectionChannel,
    ) -> Result<(), MappingError>;
}

/// Incrementally builds the binding-aware graph of one scenario. Actors of
/// the scenario graph keep their ids; synthetic actors are appended.
pub struct BindingAwareBuilder<'b, 'a> {
    pub binding: &'b GraphBinding<'a>,
    pub scenario: ScenarioId,
    pub source: &'a ScenarioGraph,
    pub graph: ScenarioGraph,
}

impl<'b, 'a> BindingAwareBuilder<'b, 'a> {
    pub fn new(binding: &'b GraphBinding<'a>, scenario: ScenarioId) -> Self {
        let source = binding.scenario_graph(scenario);
        let mut graph = ScenarioGraph::new(&format!("{}_bag", source.name));
        for (id, a) in source.actors() {
            graph.actors.push(Actor {
                original: Some(id),
                ..a.clone()
            });
        }
        BindingAwareBuilder {
            binding,
            scenario,
            source,
            graph,
        }
    }

    pub fn scenario_name(&self) -> &str {
        &self.binding.application.scenario(self.scenario).name
    }

    /// Free space of a buffer of `capacity` tokens holding the initial
    /// tokens of `channel`.
    pub fn free_space(&self, channel: ChannelId, capacity: u64) -> Result<u64, MappingError> {
        let c = self.source.channel(channel);
        capacity
            .checked_sub(c.initial_tokens)
            .ok_or_else(|| MappingError::InsufficientBuffer {
                channel: c.name.clone(),
                tokens: c.initial_tokens,
                capacity,
            })
    }

    pub fn processor_of(&self, actor: ActorId) -> Result<ProcessorId, MappingError> {
        self.binding
            .actor_binding(self.scenario, actor)
            .map(|b| b.processor)
            .ok_or_else(|| MappingError::UnmappedActor {
                actor: self.source.actor(actor).name.clone(),
                scenario: self.scenario_name().to_owned(),
            })
    }

    /// Replaces the execution times of `actor` by its response time on the
    /// bound processor and forbids concurrent firings.
    pub fn model_actor_wcrt(&mut self, actor: ActorId) -> Result<(), MappingError> {
        let processor_id = self.processor_of(actor)?;
        let processor = self.binding.platform.processor(processor_id);
        let exec = self
            .source
            .actor(actor)
            .execution_time_on(&processor.processor_type)
            .unwrap_or(0);
        let slice = processor.align_slice(self.binding.tdma_slice(self.scenario, processor_id));
        let wcrt = worst_case_response_time(exec, slice, processor.wheel_size, processor.context_switch)
            .ok_or_else(|| MappingError::InvalidTdmaSlice {
                processor: processor.name.clone(),
                slice,
                context_switch: processor.context_switch,
            })?;
        trace!(
            "{} on {}: execution time {} becomes {}",
            self.source.actor(actor).name,
            processor.name,
            exec,
            wcrt
        );
        let a = self.graph.actor_mut(actor);
        a.execution_times.clear();
        a.execution_times
            .insert(WCRT_PROCESSOR_TYPE.to_owned(), wcrt);
        a.default_processor_type = Some(WCRT_PROCESSOR_TYPE.to_owned());
        let name = format!("{}_tdma", self.source.actor(actor).name);
        self.graph.connect(&name, actor, 1, actor, 1, 1);
        Ok(())
    }

    /// Copies `channel` unchanged, ports included.
    pub fn copy_channel(&mut self, channel: ChannelId) -> ChannelId {
        let c = self.source.channel(channel).clone();
        self.graph.channels.push(c);
        ChannelId(self.graph.nr_channels() - 1)
    }

    /// Bounds a tile-local channel by a reverse channel holding the free
    /// space of its `mem` buffer.
    pub fn model_tile_buffer(&mut self, channel: ChannelId) -> Result<(), MappingError> {
        let constraints = self.constraints(channel)?;
        let space = self.free_space(channel, constraints.buffer.mem)?;
        self.copy_channel(channel);
        let c = self.source.channel(channel);
        if c.is_self_loop() {
            return Ok(());
        }
        self.graph.connect(
            &format!("{}_space", c.name),
            c.dst.actor,
            self.source.dst_rate(channel),
            c.src.actor,
            self.source.src_rate(channel),
            space,
        );
        Ok(())
    }

    pub fn constraints(&self, channel: ChannelId) -> Result<ChannelConstraints, MappingError> {
        self.binding
            .binding
            .constraints
            .get(self.scenario, channel)
            .copied()
            .ok_or_else(|| MappingError::MissingConstraint {
                channel: self.source.channel(channel).name.clone(),
                scenario: self.scenario_name().to_owned(),
            })
    }

    /// Adds a synthetic actor without a counterpart in the application.
    pub fn add_synthetic_actor(&mut self, name: &str, execution_time: Time, self_loop: bool) -> ActorId {
        let id = self.graph.add_actor(name);
        self.graph
            .set_execution_time(id, WCRT_PROCESSOR_TYPE, execution_time);
        if self_loop {
            self.graph
                .connect(&format!("{}_selfloop", name), id, 1, id, 1, 1);
        }
        id
    }

    /// Channel from the existing output port `src` to a new input port of
    /// `dst`.
    pub fn from_port(&mut self, name: &str, src: PortRef, dst: ActorId, dst_rate: Rate, tokens: u64) -> ChannelId {
        let in_port = self
            .graph
            .add_port(dst, &format!("{}_in", name), PortDirection::In, dst_rate);
        self.graph.add_channel(name, src, in_port, tokens)
    }

    /// Channel from a new output port of `src` to the existing input port
    /// `dst`.
    pub fn to_port(&mut self, name: &str, src: ActorId, src_rate: Rate, dst: PortRef, tokens: u64) -> ChannelId {
        let out_port = self
            .graph
            .add_port(src, &format!("{}_out", name), PortDirection::Out, src_rate);
        self.graph.add_channel(name, out_port, dst, tokens)
    }

    /// Gives the initial tokens now held by `target` the persistent names
    /// they had on the application channel.
    pub fn keep_token_names(&mut self, channel: ChannelId, target: ChannelId) {
        let names = self.source.channel(channel).persistent_tokens.clone();
        let t = self.graph.channel_mut(target);
        if names.len() as u64 == t.initial_tokens {
            t.persistent_tokens = names;
        }
    }

    fn connection_channel(&self, channel: ChannelId, route: ConnectionRoute) -> Result<ConnectionChannel, MappingError> {
        let constraints = self.constraints(channel)?;
        let platform = self.binding.platform;
        let src_ni = platform.network_interface(route.src_network_interface);
        let dst_ni = platform.network_interface(route.dst_network_interface);
        let bandwidth = if constraints.bandwidth > 0.0 {
            constraints.bandwidth
        } else {
            src_ni.out_bandwidth.min(dst_ni.in_bandwidth)
        };
        let dst_actor = self.source.channel(channel).dst.actor;
        let dst_processor = self.processor_of(dst_actor)?;
        let wheel = platform.processor(dst_processor).wheel_size;
        let slice = self.binding.tdma_slice(self.scenario, dst_processor);
        Ok(ConnectionChannel {
            channel,
            route,
            constraints,
            bandwidth,
            latency: platform.connection(route.connection).latency + constraints.delay,
            dst_tdma_wait: wheel.saturating_sub(slice),
        })
    }

    pub fn finish(self) -> ScenarioGraph {
        self.graph
    }
}

/// Builds the binding-aware graph of `scenario`. Every actor and channel
/// must be bound.
pub fn build_binding_aware_graph(
    binding: &GraphBinding,
    scenario: ScenarioId,
    model: &dyn CommunicationModel,
) -> Result<ScenarioGraph, MappingError> {
    let mut builder = BindingAwareBuilder::new(binding, scenario);
    let source = builder.source;
    for (id, _) in source.actors() {
        model.model_actor_binding(&mut builder, id)?;
    }
    for (id, c) in source.channels() {
        match binding.channel_binding(scenario, id) {
            Some(ChannelBinding::Tile { .. }) => model.model_channel_to_tile(&mut builder, id)?,
            Some(ChannelBinding::Connection(route)) => {
                let cc = builder.connection_channel(id, *route)?;
                model.model_channel_to_connection(&mut builder, &cc)?
            }
            None => {
                return Err(MappingError::UnmappedChannel {
                    channel: c.name.clone(),
                    scenario: builder.scenario_name().to_owned(),
                })
            }
        }
    }
    Ok(builder.finish())
}

/// Throughput of a complete binding: the worst over all scenarios.
pub fn binding_throughput(
    binding: &GraphBinding,
    model: &dyn CommunicationModel,
    throughput: &dyn ThroughputAnalysis,
) -> Result<f64, MappingError> {
    let mut worst = f64::INFINITY;
    for (s, _) in binding.application.scenarios() {
        let bag = build_binding_aware_graph(binding, s, model)?;
        worst = worst.min(throughput.analyze(&bag)?);
    }
    Ok(worst)
}
