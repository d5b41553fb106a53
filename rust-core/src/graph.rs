use std::collections::{BTreeMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Discrete time, as used for execution times, latencies and TDMA wheels.
pub type Time = u64;

/// Number of tokens produced or consumed by a single firing.
pub type Rate = u64;

/// Stable index of an actor inside the arena of one [ScenarioGraph].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct ActorId(pub usize);

/// Stable index of a channel inside the arena of one [ScenarioGraph].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct ChannelId(pub usize);

/// Index of a scenario inside an [ApplicationGraph].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct ScenarioId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Port {
    pub name: String,
    pub direction: PortDirection,
    pub rate: Rate,
}

/// Reference to a port: the owning actor plus the position of the port in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PortRef {
    pub actor: ActorId,
    pub port: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Actor {
    pub name: String,
    #[serde(default)]
    pub ports: Vec<Port>,
    /// Execution time of one firing per processor type able to run the actor.
    #[serde(default)]
    pub execution_times: BTreeMap<String, Time>,
    #[serde(default)]
    pub default_processor_type: Option<String>,
    /// Bytes of actor state that must be placed in the tile memory.
    #[serde(default)]
    pub state_size: u64,
    /// Back-reference to the application actor this actor was derived from.
    /// Synthetic actors introduced by graph rewriting have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<ActorId>,
}

impl Actor {
    pub fn new(name: &str) -> Actor {
        Actor {
            name: name.to_owned(),
            ports: Vec::new(),
            execution_times: BTreeMap::new(),
            default_processor_type: None,
            state_size: 0,
            original: None,
        }
    }

    pub fn execution_time_on(&self, processor_type: &str) -> Option<Time> {
        self.execution_times.get(processor_type).copied()
    }

    /// Execution time on the default processor type, falling back to the
    /// slowest known processor type when no default is given.
    pub fn execution_time(&self) -> Time {
        self.default_processor_type
            .as_ref()
            .and_then(|t| self.execution_time_on(t))
            .unwrap_or_else(|| self.max_execution_time())
    }

    pub fn max_execution_time(&self) -> Time {
        self.execution_times.values().copied().max().unwrap_or(0)
    }

    /// Processor types able to execute this actor, in sorted order.
    pub fn processor_types(&self) -> Vec<String> {
        self.execution_times.keys().cloned().collect()
    }

    pub fn port_named(&self, name: &str) -> Option<usize> {
        self.ports.iter().position(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Channel {
    pub name: String,
    pub src: PortRef,
    pub dst: PortRef,
    #[serde(default)]
    pub initial_tokens: u64,
    /// Size of a single token in bytes.
    #[serde(default = "default_token_size")]
    pub token_size: u64,
    /// Names identifying each initial token across graph rewrites.
    #[serde(default)]
    pub persistent_tokens: Vec<String>,
}

fn default_token_size() -> u64 {
    1
}

impl Channel {
    pub fn is_self_loop(&self) -> bool {
        self.src.actor == self.dst.actor
    }
}

/// Names `count` tokens of the channel `channel` so each one stays
/// identifiable after the graph is rewritten.
pub fn persistent_token_names(channel: &str, count: u64) -> Vec<String> {
    (0..count).map(|i| format!("{}_{}", channel, i)).collect()
}

/// The dataflow graph of a single scenario: an arena of actors and channels
/// addressed through [ActorId] and [ChannelId].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioGraph {
    pub name: String,
    #[serde(default)]
    pub actors: Vec<Actor>,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl ScenarioGraph {
    pub fn new(name: &str) -> ScenarioGraph {
        ScenarioGraph {
            name: name.to_owned(),
            actors: Vec::new(),
            channels: Vec::new(),
        }
    }

    pub fn nr_actors(&self) -> usize {
        self.actors.len()
    }

    pub fn nr_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn add_actor(&mut self, name: &str) -> ActorId {
        self.actors.push(Actor::new(name));
        ActorId(self.actors.len() - 1)
    }

    pub fn add_port(
        &mut self,
        actor: ActorId,
        name: &str,
        direction: PortDirection,
        rate: Rate,
    ) -> PortRef {
        let a = &mut self.actors[actor.0];
        a.ports.push(Port {
            name: name.to_owned(),
            direction,
            rate,
        });
        PortRef {
            actor,
            port: a.ports.len() - 1,
        }
    }

    pub fn set_execution_time(&mut self, actor: ActorId, processor_type: &str, time: Time) {
        let a = &mut self.actors[actor.0];
        a.execution_times.insert(processor_type.to_owned(), time);
        if a.default_processor_type.is_none() {
            a.default_processor_type = Some(processor_type.to_owned());
        }
    }

    /// Adds a channel between two existing ports. Initial tokens get
    /// generated persistent names.
    pub fn add_channel(&mut self, name: &str, src: PortRef, dst: PortRef, tokens: u64) -> ChannelId {
        self.channels.push(Channel {
            name: name.to_owned(),
            src,
            dst,
            initial_tokens: tokens,
            token_size: 1,
            persistent_tokens: persistent_token_names(name, tokens),
        });
        ChannelId(self.channels.len() - 1)
    }

    /// Creates the ports `<name>_out` and `<name>_in` on the endpoints and
    /// connects them with a new channel.
    pub fn connect(
        &mut self,
        name: &str,
        src: ActorId,
        src_rate: Rate,
        dst: ActorId,
        dst_rate: Rate,
        tokens: u64,
    ) -> ChannelId {
        let out_port = self.add_port(src, &format!("{}_out", name), PortDirection::Out, src_rate);
        let in_port = self.add_port(dst, &format!("{}_in", name), PortDirection::In, dst_rate);
        self.add_channel(name, out_port, in_port, tokens)
    }

    pub fn set_initial_tokens(&mut self, channel: ChannelId, tokens: u64) {
        let c = &mut self.channels[channel.0];
        c.initial_tokens = tokens;
        c.persistent_tokens = persistent_token_names(&c.name, tokens);
    }

    pub fn actor(&self, id: ActorId) -> &Actor {
        &self.actors[id.0]
    }

    pub fn actor_mut(&mut self, id: ActorId) -> &mut Actor {
        &mut self.actors[id.0]
    }

    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.0]
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> &mut Channel {
        &mut self.channels[id.0]
    }

    pub fn actors(&self) -> impl Iterator<Item = (ActorId, &Actor)> {
        self.actors.iter().enumerate().map(|(i, a)| (ActorId(i), a))
    }

    pub fn channels(&self) -> impl Iterator<Item = (ChannelId, &Channel)> {
        self.channels
            .iter()
            .enumerate()
            .map(|(i, c)| (ChannelId(i), c))
    }

    pub fn actor_by_name(&self, name: &str) -> Option<ActorId> {
        self.actors.iter().position(|a| a.name == name).map(ActorId)
    }

    pub fn channel_by_name(&self, name: &str) -> Option<ChannelId> {
        self.channels
            .iter()
            .position(|c| c.name == name)
            .map(ChannelId)
    }

    pub fn port(&self, port: PortRef) -> &Port {
        &self.actors[port.actor.0].ports[port.port]
    }

    pub fn src_rate(&self, channel: ChannelId) -> Rate {
        self.port(self.channels[channel.0].src).rate
    }

    pub fn dst_rate(&self, channel: ChannelId) -> Rate {
        self.port(self.channels[channel.0].dst).rate
    }

    pub fn in_channels(&self, actor: ActorId) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels()
            .filter(move |(_, c)| c.dst.actor == actor)
            .map(|(id, _)| id)
    }

    pub fn out_channels(&self, actor: ActorId) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels()
            .filter(move |(_, c)| c.src.actor == actor)
            .map(|(id, _)| id)
    }

    pub fn has_self_loop(&self, actor: ActorId) -> bool {
        self.channels
            .iter()
            .any(|c| c.src.actor == actor && c.dst.actor == actor && c.initial_tokens > 0)
    }

    /// Copy of this graph where every actor runs with the execution time of
    /// its default processor type only.
    pub fn timed_sdf(&self) -> ScenarioGraph {
        let mut g = self.clone();
        for a in g.actors.iter_mut() {
            let t = a.execution_time();
            a.execution_times.clear();
            a.execution_times.insert(String::from("default"), t);
            a.default_processor_type = Some(String::from("default"));
        }
        g
    }

    /// Adds a self-loop with one token and unit rates to every actor.
    pub fn add_unit_self_loops(&mut self) {
        for i in 0..self.actors.len() {
            let name = format!("{}_selfloop", self.actors[i].name);
            self.connect(&name, ActorId(i), 1, ActorId(i), 1, 1);
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let mut names = HashSet::new();
        for a in &self.actors {
            if !names.insert(a.name.as_str()) {
                return Err(ModelError::DuplicateName(a.name.clone()));
            }
        }
        names.clear();
        for c in &self.channels {
            if !names.insert(c.name.as_str()) {
                return Err(ModelError::DuplicateName(c.name.clone()));
            }
            for (port, direction) in [(c.src, PortDirection::Out), (c.dst, PortDirection::In)] {
                let p = self
                    .actors
                    .get(port.actor.0)
                    .and_then(|a| a.ports.get(port.port))
                    .ok_or_else(|| ModelError::UnknownPort {
                        channel: c.name.clone(),
                    })?;
                if p.direction != direction {
                    return Err(ModelError::PortDirection {
                        channel: c.name.clone(),
                        port: p.name.clone(),
                    });
                }
                if p.rate == 0 {
                    return Err(ModelError::ZeroRate {
                        channel: c.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scenario {
    pub name: String,
    /// Relative occurrence frequency of the scenario.
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    /// Index of the scenario graph in [ApplicationGraph::scenario_graphs].
    pub graph: usize,
}

fn default_frequency() -> f64 {
    1.0
}

/// A scenario-aware dataflow application.
///
/// Scenarios point to scenario graphs by index, so several scenarios can
/// initially share a graph. Binding requires *isolated* scenarios, where
/// each scenario owns a private graph; see [ApplicationGraph::isolate_scenarios].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApplicationGraph {
    pub name: String,
    /// Required throughput, in graph iterations per time unit.
    pub throughput_constraint: f64,
    pub scenario_graphs: Vec<ScenarioGraph>,
    pub scenarios: Vec<Scenario>,
}

impl ApplicationGraph {
    /// An application with a single scenario owning `graph`.
    pub fn single_scenario(name: &str, graph: ScenarioGraph, throughput_constraint: f64) -> Self {
        ApplicationGraph {
            name: name.to_owned(),
            throughput_constraint,
            scenarios: vec![Scenario {
                name: graph.name.clone(),
                frequency: 1.0,
                graph: 0,
            }],
            scenario_graphs: vec![graph],
        }
    }

    pub fn add_scenario(&mut self, name: &str, frequency: f64, graph: ScenarioGraph) -> ScenarioId {
        self.scenario_graphs.push(graph);
        self.scenarios.push(Scenario {
            name: name.to_owned(),
            frequency,
            graph: self.scenario_graphs.len() - 1,
        });
        ScenarioId(self.scenarios.len() - 1)
    }

    pub fn nr_scenarios(&self) -> usize {
        self.scenarios.len()
    }

    pub fn scenarios(&self) -> impl Iterator<Item = (ScenarioId, &Scenario)> {
        self.scenarios
            .iter()
            .enumerate()
            .map(|(i, s)| (ScenarioId(i), s))
    }

    pub fn scenario(&self, id: ScenarioId) -> &Scenario {
        &self.scenarios[id.0]
    }

    pub fn scenario_graph(&self, id: ScenarioId) -> &ScenarioGraph {
        &self.scenario_graphs[self.scenarios[id.0].graph]
    }

    pub fn scenario_graph_mut(&mut self, id: ScenarioId) -> &mut ScenarioGraph {
        let g = self.scenarios[id.0].graph;
        &mut self.scenario_graphs[g]
    }

    /// True when every scenario refers to a scenario graph no other
    /// scenario refers to.
    pub fn has_isolated_scenarios(&self) -> bool {
        let mut seen = HashSet::new();
        self.scenarios
            .iter()
            .all(|s| s.graph < self.scenario_graphs.len() && seen.insert(s.graph))
    }

    /// Gives every scenario a private copy of its scenario graph. Graphs no
    /// scenario refers to are dropped.
    pub fn isolate_scenarios(&mut self) {
        if self.has_isolated_scenarios() {
            return;
        }
        let graphs: Vec<ScenarioGraph> = self
            .scenarios
            .iter()
            .map(|s| self.scenario_graphs[s.graph].clone())
            .collect();
        for (i, s) in self.scenarios.iter_mut().enumerate() {
            s.graph = i;
        }
        self.scenario_graphs = graphs;
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.throughput_constraint < 0.0 || !self.throughput_constraint.is_finite() {
            return Err(ModelError::ThroughputConstraint(self.throughput_constraint));
        }
        for s in &self.scenarios {
            if s.graph >= self.scenario_graphs.len() {
                return Err(ModelError::UnknownScenarioGraph(s.name.clone()));
            }
        }
        for g in &self.scenario_graphs {
            g.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
