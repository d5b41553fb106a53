//! Search for bindings of application actors and channels onto tiles.

use std::collections::BTreeMap;

use itertools::{EitherOrBoth, Itertools};
use log::{debug, info};
use sdfmap_core::{
    ActorId, ApplicationGraph, ChannelId, PlatformGraph, RepetitionVector,
    RepetitionVectorComputer, ScenarioId,
};

use crate::binding::{
    reduce_diversity, simple_cull, ActorBinding, ConnectionRoute, GraphBinding, ParetoBasis,
    PlatformBinding,
};
use crate::scheduling::{ScheduleContext, SchedulingStrategy};
use crate::MappingError;

/// Sorted intersection of two sorted lists of processor types.
fn intersect(a: &[String], b: &[String]) -> Vec<String> {
    a.iter()
        .merge_join_by(b.iter(), |x, y| x.cmp(y))
        .filter_map(|e| match e {
            EitherOrBoth::Both(x, _) => Some(x.clone()),
            _ => None,
        })
        .collect()
}

/// Binds an application to a tiled platform, keeping a bounded set of
/// Pareto-optimal candidate bindings.
///
/// Actors sharing a name across scenarios always share their processor
/// and memory. Bindings named [crate::binding::INITIAL_BINDING] are kept
/// untouched by every phase.
pub struct TileBindingAlgo<'a> {
    application: &'a ApplicationGraph,
    platform: &'a PlatformGraph,
    pub bindings: Vec<PlatformBinding>,
    repetition: Vec<RepetitionVector>,
    actor_instances: BTreeMap<String, Vec<(ScenarioId, ActorId)>>,
    /// Processor types every instance of the actor supports.
    actor_processor_types: BTreeMap<String, Vec<String>>,
    channel_instances: BTreeMap<String, Vec<(ScenarioId, ChannelId)>>,
    pareto_basis: ParetoBasis,
}

impl<'a> TileBindingAlgo<'a> {
    pub fn new(
        application: &'a ApplicationGraph,
        platform: &'a PlatformGraph,
        mut bindings: Vec<PlatformBinding>,
        repetition: &dyn RepetitionVectorComputer,
        pareto_basis: ParetoBasis,
    ) -> Result<TileBindingAlgo<'a>, MappingError> {
        if application.nr_scenarios() == 0 {
            return Err(MappingError::NoScenarios(application.name.clone()));
        }
        if !application.has_isolated_scenarios() {
            return Err(MappingError::NonIsolatedScenarios(application.name.clone()));
        }
        application.validate()?;
        platform.validate()?;
        if bindings.is_empty() {
            bindings.push(PlatformBinding::initial(platform));
        }
        let repetition = application
            .scenarios()
            .map(|(s, _)| repetition.compute(application.scenario_graph(s)))
            .collect::<Result<Vec<_>, _>>()?;
        let mut actor_instances: BTreeMap<String, Vec<(ScenarioId, ActorId)>> = BTreeMap::new();
        let mut actor_processor_types: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut channel_instances: BTreeMap<String, Vec<(ScenarioId, ChannelId)>> = BTreeMap::new();
        for (s, _) in application.scenarios() {
            let graph = application.scenario_graph(s);
            for (id, a) in graph.actors() {
                actor_instances.entry(a.name.clone()).or_default().push((s, id));
                let types = a.processor_types();
                actor_processor_types
                    .entry(a.name.clone())
                    .and_modify(|known| *known = intersect(known, &types))
                    .or_insert(types);
            }
            for (id, c) in graph.channels() {
                channel_instances.entry(c.name.clone()).or_default().push((s, id));
            }
        }
        Ok(TileBindingAlgo {
            application,
            platform,
            bindings,
            repetition,
            actor_instances,
            actor_processor_types,
            channel_instances,
            pareto_basis,
        })
    }

    pub fn repetition_vectors(&self) -> &[RepetitionVector] {
        &self.repetition
    }

    /// Drops every non-initial binding and starts over from one empty
    /// working binding.
    pub fn reset_working_bindings(&mut self, name: &str) {
        self.bindings.retain(|b| b.is_initial());
        self.bindings.push(PlatformBinding::new(name, self.platform));
    }

    /// Bandwidth each channel needs to sustain the throughput constraint:
    /// tokens produced per iteration times their size times iterations per
    /// time unit.
    pub fn estimate_bandwidth_constraints(&mut self) {
        let application = self.application;
        for binding in self.bindings.iter_mut().filter(|b| !b.is_initial()) {
            for (s, _) in application.scenarios() {
                let graph = application.scenario_graph(s);
                let rep = &self.repetition[s.0];
                for (id, c) in graph.channels() {
                    binding.constraints.entry(s, id).bandwidth = graph.src_rate(id) as f64
                        * rep.get(c.src.actor) as f64
                        * c.token_size as f64
                        * application.throughput_constraint;
                }
            }
        }
    }

    /// Connection delays are not modelled beyond the connection latency.
    pub fn estimate_connection_delay(&mut self) {
        for binding in self.bindings.iter_mut().filter(|b| !b.is_initial()) {
            binding.constraints.iter_mut().for_each(|c| c.delay = 0);
        }
    }

    /// Actor names, most critical first. Criticality weighs how often the
    /// scenarios of an actor occur, how often it fires and how long it
    /// runs, each relative to the largest value in the application.
    pub fn actor_criticality_order(&self) -> Vec<String> {
        let max_frequency = self
            .application
            .scenarios()
            .map(|(_, s)| s.frequency)
            .fold(0.0, f64::max);
        let max_repetition = self.repetition.iter().map(|r| r.max()).max().unwrap_or(1).max(1);
        let max_execution = self
            .application
            .scenarios()
            .flat_map(|(s, _)| self.application.scenario_graph(s).actors())
            .map(|(_, a)| a.max_execution_time())
            .max()
            .unwrap_or(1)
            .max(1);
        let mut scored: Vec<(String, f64)> = self
            .actor_instances
            .iter()
            .map(|(name, instances)| {
                let score = instances
                    .iter()
                    .map(|(s, a)| {
                        let frequency = if max_frequency > 0.0 {
                            self.application.scenario(*s).frequency / max_frequency
                        } else {
                            1.0
                        };
                        let firings = self.repetition[s.0].get(*a) as f64 / max_repetition as f64;
                        let execution = self
                            .application
                            .scenario_graph(*s)
                            .actor(*a)
                            .max_execution_time() as f64
                            / max_execution as f64;
                        frequency * firings * execution
                    })
                    .sum::<f64>();
                (name.clone(), score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.into_iter().map(|(name, _)| name).collect()
    }

    /// Processor and memory pairs an actor may be bound to in `candidate`.
    fn actor_options(&self, candidate: &GraphBinding, name: &str) -> Vec<ActorBinding> {
        let fixed = self.actor_instances[name]
            .iter()
            .find_map(|(s, a)| candidate.actor_binding(*s, *a).copied());
        if let Some(fixed) = fixed {
            return vec![fixed];
        }
        let types = &self.actor_processor_types[name];
        self.platform
            .processors()
            .filter(|(_, p)| types.binary_search(&p.processor_type).is_ok())
            .flat_map(|(processor, _)| {
                self.platform
                    .memories_of(processor.tile)
                    .map(move |memory| ActorBinding { processor, memory })
            })
            .collect()
    }

    fn bind_actor_instances(
        &self,
        candidate: &mut GraphBinding,
        name: &str,
        target: ActorBinding,
    ) -> Result<bool, MappingError> {
        for (s, a) in &self.actor_instances[name] {
            if candidate.actor_binding(*s, *a).is_some() {
                continue;
            }
            if !candidate.bind_actor_to_tile(*s, *a, target)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Routes a channel between two tiles: every connection between them
    /// combined with every memory on either side.
    fn routes(&self, src: ActorBinding, dst: ActorBinding) -> Vec<ConnectionRoute> {
        let mut routes = Vec::new();
        for (connection, c) in self
            .platform
            .connections_between(src.processor.tile, dst.processor.tile)
        {
            for src_memory in self.platform.memories_of(src.processor.tile) {
                for dst_memory in self.platform.memories_of(dst.processor.tile) {
                    routes.push(ConnectionRoute {
                        src_memory,
                        src_network_interface: c.src,
                        dst_memory,
                        dst_network_interface: c.dst,
                        connection,
                    });
                }
            }
        }
        routes
    }

    fn bind_channel(
        &self,
        candidate: &mut GraphBinding,
        scenario: ScenarioId,
        channel: ChannelId,
    ) -> Result<bool, MappingError> {
        if candidate.channel_binding(scenario, channel).is_some() {
            return Ok(true);
        }
        let c = self.application.scenario_graph(scenario).channel(channel);
        let (Some(src), Some(dst)) = (
            candidate.actor_binding(scenario, c.src.actor).copied(),
            candidate.actor_binding(scenario, c.dst.actor).copied(),
        ) else {
            return Ok(true);
        };
        if src.processor.tile == dst.processor.tile {
            for memory in self.platform.memories_of(src.processor.tile) {
                if candidate.bind_channel_to_tile(scenario, channel, memory)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }
        for route in self.routes(src, dst) {
            if candidate.bind_channel_to_connection(scenario, channel, route)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn bind_channels(&self, candidate: &mut GraphBinding) -> Result<bool, MappingError> {
        for (name, instances) in &self.channel_instances {
            for (s, c) in instances {
                if !self.bind_channel(candidate, *s, *c)? {
                    debug!("no resources left for channel {} in {}", name, candidate.binding.name);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Binds every actor and channel of the application, one actor name at
    /// a time, keeping at most `max_bindings` candidates after each step.
    /// The working bindings are replaced by the survivors. Answers `false`
    /// when none survives.
    ///
    /// No slice is allocated yet, so candidates are ranked by execution
    /// demand whatever the configured basis.
    pub fn bind_graph_to_tiles(&mut self, max_bindings: usize) -> Result<bool, MappingError> {
        let (initial, working): (Vec<_>, Vec<_>) =
            self.bindings.drain(..).partition(|b| b.is_initial());
        let mut candidates: Vec<GraphBinding<'a>> = working
            .iter()
            .map(|b| GraphBinding::new(self.application, self.platform, b))
            .collect();
        for name in self.actor_criticality_order() {
            let mut next = Vec::new();
            for candidate in &candidates {
                for target in self.actor_options(candidate, &name) {
                    let mut c = candidate.clone();
                    if !self.bind_actor_instances(&mut c, &name, target)? {
                        continue;
                    }
                    if !self.bind_channels(&mut c)? {
                        continue;
                    }
                    c.compute_pareto_quantities(&self.repetition, ParetoBasis::ExecutionTime);
                    next.push(c);
                }
            }
            candidates = reduce_diversity(simple_cull(next), max_bindings);
            debug!("bound actor {}: {} candidates", name, candidates.len());
        }
        let survivors = candidates.len();
        info!("{} bindings of {} to tiles", survivors, self.application.name);
        self.bindings = initial;
        self.bindings
            .extend(candidates.into_iter().enumerate().map(|(i, c)| {
                let mut b = c.binding;
                b.name = format!("binding_{}", i);
                b
            }));
        Ok(survivors > 0)
    }

    /// Lets `strategy` allocate TDMA slices to the working bindings.
    /// Answers `false` when no binding keeps meeting the throughput
    /// constraint.
    pub fn construct_tile_schedules(
        &mut self,
        max_bindings: usize,
        strategy: &dyn SchedulingStrategy,
        ctx: &ScheduleContext,
    ) -> Result<bool, MappingError> {
        let (initial, working): (Vec<_>, Vec<_>) =
            self.bindings.drain(..).partition(|b| b.is_initial());
        let candidates: Vec<GraphBinding<'a>> = working
            .iter()
            .map(|b| {
                let mut g = GraphBinding::new(self.application, self.platform, b);
                g.compute_pareto_quantities(&self.repetition, ParetoBasis::Tdma);
                g
            })
            .collect();
        let scheduled = strategy.construct_schedules(candidates, ctx, max_bindings)?;
        let survivors = scheduled.len();
        self.bindings = initial;
        self.bindings.extend(scheduled.into_iter().map(|g| g.binding));
        Ok(survivors > 0)
    }

    /// Working bindings wrapped for analysis, with Pareto quantities.
    pub fn graph_bindings(&self) -> Vec<GraphBinding<'a>> {
        self.bindings
            .iter()
            .filter(|b| !b.is_initial())
            .map(|b| {
                let mut g = GraphBinding::new(self.application, self.platform, b);
                g.compute_pareto_quantities(&self.repetition, self.pareto_basis);
                g
            })
            .collect()
    }
}
