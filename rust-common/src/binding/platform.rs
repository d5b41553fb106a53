use std::collections::{BTreeMap, BTreeSet};

use sdfmap_core::{
    ActorId, ChannelId, ConnectionId, MemoryId, NetworkInterfaceId, PlatformGraph, ProcessorId,
    ScenarioId, TileId, Time,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::MappingError;

/// Name of the empty binding every binding list starts from. It is never
/// modified nor deleted by the search.
pub const INITIAL_BINDING: &str = "initial";

/// Firing order of the actors bound to one processor. Entries before
/// `start_periodic` run once, the rest repeats forever.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StaticOrderSchedule {
    pub entries: Vec<ActorId>,
    pub start_periodic: usize,
}

/// TDMA wheel occupation of a processor. Scenarios are mutually exclusive,
/// so every scenario has the whole unreserved wheel to itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorBinding {
    pub processor: ProcessorId,
    pub wheel_size: Time,
    /// Part of the wheel not reserved by other applications.
    pub available: Time,
    pub actors: BTreeMap<ScenarioId, BTreeSet<ActorId>>,
    pub slices: BTreeMap<ScenarioId, Time>,
    pub schedules: BTreeMap<ScenarioId, StaticOrderSchedule>,
}

impl ProcessorBinding {
    pub fn bind_actor(&mut self, scenario: ScenarioId, actor: ActorId) -> bool {
        self.actors.entry(scenario).or_default().insert(actor)
    }

    pub fn unbind_actor(&mut self, scenario: ScenarioId, actor: ActorId) {
        if let Some(actors) = self.actors.get_mut(&scenario) {
            actors.remove(&actor);
            if actors.is_empty() {
                self.actors.remove(&scenario);
                self.slices.remove(&scenario);
                self.schedules.remove(&scenario);
            }
        }
    }

    pub fn has_actor(&self, scenario: ScenarioId, actor: ActorId) -> bool {
        self.actors
            .get(&scenario)
            .map_or(false, |actors| actors.contains(&actor))
    }

    pub fn is_used_in(&self, scenario: ScenarioId) -> bool {
        self.actors.contains_key(&scenario)
    }

    pub fn nr_scenarios_used(&self) -> usize {
        self.actors.len()
    }

    pub fn allocate_slice(&mut self, scenario: ScenarioId, slice: Time) -> bool {
        if slice > self.available {
            return false;
        }
        self.slices.insert(scenario, slice);
        true
    }

    pub fn slice(&self, scenario: ScenarioId) -> Option<Time> {
        self.slices.get(&scenario).copied()
    }
}

/// Bytes claimed in a memory, per scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryBinding {
    pub memory: MemoryId,
    pub capacity: u64,
    pub actors: BTreeMap<ScenarioId, BTreeMap<ActorId, u64>>,
    pub channels: BTreeMap<ScenarioId, BTreeMap<ChannelId, u64>>,
}

impl MemoryBinding {
    pub fn used(&self, scenario: ScenarioId) -> u64 {
        let actors: u64 = self
            .actors
            .get(&scenario)
            .map_or(0, |m| m.values().sum());
        let channels: u64 = self
            .channels
            .get(&scenario)
            .map_or(0, |m| m.values().sum());
        actors + channels
    }

    pub fn max_used(&self) -> u64 {
        self.actors
            .keys()
            .chain(self.channels.keys())
            .map(|s| self.used(*s))
            .max()
            .unwrap_or(0)
    }

    fn fits(&self, scenario: ScenarioId, bytes: u64) -> bool {
        self.used(scenario) + bytes <= self.capacity
    }

    pub fn bind_actor(&mut self, scenario: ScenarioId, actor: ActorId, bytes: u64) -> bool {
        let taken = self
            .actors
            .get(&scenario)
            .map_or(false, |m| m.contains_key(&actor));
        if taken || !self.fits(scenario, bytes) {
            return false;
        }
        self.actors.entry(scenario).or_default().insert(actor, bytes);
        true
    }

    pub fn unbind_actor(&mut self, scenario: ScenarioId, actor: ActorId) {
        if let Some(m) = self.actors.get_mut(&scenario) {
            m.remove(&actor);
            if m.is_empty() {
                self.actors.remove(&scenario);
            }
        }
    }

    pub fn bind_channel(&mut self, scenario: ScenarioId, channel: ChannelId, bytes: u64) -> bool {
        let taken = self
            .channels
            .get(&scenario)
            .map_or(false, |m| m.contains_key(&channel));
        if taken || !self.fits(scenario, bytes) {
            return false;
        }
        self.channels
            .entry(scenario)
            .or_default()
            .insert(channel, bytes);
        true
    }

    pub fn unbind_channel(&mut self, scenario: ScenarioId, channel: ChannelId) {
        if let Some(m) = self.channels.get_mut(&scenario) {
            m.remove(&channel);
            if m.is_empty() {
                self.channels.remove(&scenario);
            }
        }
    }
}

/// Bandwidth and connection slots claimed in a network interface.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInterfaceBinding {
    pub network_interface: NetworkInterfaceId,
    pub max_connections: u32,
    pub in_capacity: f64,
    pub out_capacity: f64,
    pub incoming: BTreeMap<ScenarioId, BTreeMap<ChannelId, f64>>,
    pub outgoing: BTreeMap<ScenarioId, BTreeMap<ChannelId, f64>>,
}

impl NetworkInterfaceBinding {
    pub fn in_used(&self, scenario: ScenarioId) -> f64 {
        self.incoming
            .get(&scenario)
            .map_or(0.0, |m| m.values().sum())
    }

    pub fn out_used(&self, scenario: ScenarioId) -> f64 {
        self.outgoing
            .get(&scenario)
            .map_or(0.0, |m| m.values().sum())
    }

    pub fn nr_connections(&self, scenario: ScenarioId) -> u32 {
        let count = |m: &BTreeMap<ScenarioId, BTreeMap<ChannelId, f64>>| {
            m.get(&scenario).map_or(0, |c| c.len() as u32)
        };
        count(&self.incoming) + count(&self.outgoing)
    }

    /// Highest combined in and out bandwidth use of any scenario.
    pub fn max_used(&self) -> f64 {
        self.incoming
            .keys()
            .chain(self.outgoing.keys())
            .map(|s| self.in_used(*s) + self.out_used(*s))
            .fold(0.0, f64::max)
    }

    pub fn bind_outgoing(&mut self, scenario: ScenarioId, channel: ChannelId, bandwidth: f64) -> bool {
        if self.nr_connections(scenario) >= self.max_connections
            || self.out_used(scenario) + bandwidth > self.out_capacity
        {
            return false;
        }
        self.outgoing
            .entry(scenario)
            .or_default()
            .insert(channel, bandwidth);
        true
    }

    pub fn bind_incoming(&mut self, scenario: ScenarioId, channel: ChannelId, bandwidth: f64) -> bool {
        if self.nr_connections(scenario) >= self.max_connections
            || self.in_used(scenario) + bandwidth > self.in_capacity
        {
            return false;
        }
        self.incoming
            .entry(scenario)
            .or_default()
            .insert(channel, bandwidth);
        true
    }

    pub fn unbind_channel(&mut self, scenario: ScenarioId, channel: ChannelId) {
        for side in [&mut self.incoming, &mut self.outgoing] {
            if let Some(m) = side.get_mut(&scenario) {
                m.remove(&channel);
                if m.is_empty() {
                    side.remove(&scenario);
                }
            }
        }
    }
}

/// A connection carries at most one channel per scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionBinding {
    pub connection: ConnectionId,
    pub channels: BTreeMap<ScenarioId, ChannelId>,
}

impl ConnectionBinding {
    pub fn bind_channel(&mut self, scenario: ScenarioId, channel: ChannelId) -> bool {
        if self.channels.contains_key(&scenario) {
            return false;
        }
        self.channels.insert(scenario, channel);
        true
    }

    pub fn unbind_channel(&mut self, scenario: ScenarioId, channel: ChannelId) {
        if self.channels.get(&scenario) == Some(&channel) {
            self.channels.remove(&scenario);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileBinding {
    pub tile: TileId,
    pub processors: Vec<ProcessorBinding>,
    pub memories: Vec<MemoryBinding>,
    pub network_interfaces: Vec<NetworkInterfaceBinding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorBinding {
    pub processor: ProcessorId,
    pub memory: MemoryId,
}

/// Path of a channel crossing tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRoute {
    pub src_memory: MemoryId,
    pub src_network_interface: NetworkInterfaceId,
    pub dst_memory: MemoryId,
    pub dst_network_interface: NetworkInterfaceId,
    pub connection: ConnectionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelBinding {
    /// Both endpoints share a buffer in one tile memory.
    Tile { memory: MemoryId },
    Connection(ConnectionRoute),
}

impl ChannelBinding {
    /// The shared tile memory, only set for intra-tile channels.
    pub fn memory(&self) -> Option<MemoryId> {
        match self {
            ChannelBinding::Tile { memory } => Some(*memory),
            ChannelBinding::Connection(_) => None,
        }
    }

    pub fn route(&self) -> Option<&ConnectionRoute> {
        match self {
            ChannelBinding::Tile { .. } => None,
            ChannelBinding::Connection(route) => Some(route),
        }
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.route().map(|r| r.connection)
    }
}

/// Buffer sizes, in tokens, of a channel: at the source and destination
/// side of a connection, or in the single memory of a tile-local channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct BufferSize {
    pub src: u64,
    pub dst: u64,
    pub mem: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelConstraints {
    pub buffer: BufferSize,
    /// Bytes per time unit the channel needs to sustain the throughput
    /// constraint.
    pub bandwidth: f64,
    pub delay: Time,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphBindingConstraints {
    pub channels: BTreeMap<ScenarioId, BTreeMap<ChannelId, ChannelConstraints>>,
}

impl GraphBindingConstraints {
    pub fn get(&self, scenario: ScenarioId, channel: ChannelId) -> Option<&ChannelConstraints> {
        self.channels.get(&scenario).and_then(|m| m.get(&channel))
    }

    pub fn entry(&mut self, scenario: ScenarioId, channel: ChannelId) -> &mut ChannelConstraints {
        self.channels
            .entry(scenario)
            .or_default()
            .entry(channel)
            .or_default()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ChannelConstraints> {
        self.channels.values_mut().flat_map(|m| m.values_mut())
    }
}

/// The mutable binding state of an application on one platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformBinding {
    pub name: String,
    pub tiles: Vec<TileBinding>,
    pub connections: Vec<ConnectionBinding>,
    pub constraints: GraphBindingConstraints,
    pub actors: BTreeMap<ScenarioId, BTreeMap<ActorId, ActorBinding>>,
    pub channels: BTreeMap<ScenarioId, BTreeMap<ChannelId, ChannelBinding>>,
}

impl PlatformBinding {
    /// An empty binding with one resource binding per platform resource.
    pub fn new(name: &str, platform: &PlatformGraph) -> PlatformBinding {
        let tiles = platform
            .tiles()
            .map(|(tile, t)| TileBinding {
                tile,
                processors: t
                    .processors
                    .iter()
                    .enumerate()
                    .map(|(index, p)| ProcessorBinding {
                        processor: ProcessorId { tile, index },
                        wheel_size: p.wheel_size,
                        available: p.wheel_size.saturating_sub(p.reserved),
                        actors: BTreeMap::new(),
                        slices: BTreeMap::new(),
                        schedules: BTreeMap::new(),
                    })
                    .collect(),
                memories: t
                    .memories
                    .iter()
                    .enumerate()
                    .map(|(index, m)| MemoryBinding {
                        memory: MemoryId { tile, index },
                        capacity: m.size.saturating_sub(m.reserved),
                        actors: BTreeMap::new(),
                        channels: BTreeMap::new(),
                    })
                    .collect(),
                network_interfaces: t
                    .network_interfaces
                    .iter()
                    .enumerate()
                    .map(|(index, n)| NetworkInterfaceBinding {
                        network_interface: NetworkInterfaceId { tile, index },
                        max_connections: n.max_connections,
                        in_capacity: n.in_bandwidth,
                        out_capacity: n.out_bandwidth,
                        incoming: BTreeMap::new(),
                        outgoing: BTreeMap::new(),
                    })
                    .collect(),
            })
            .collect();
        let connections = platform
            .connections()
            .map(|(connection, _)| ConnectionBinding {
                connection,
                channels: BTreeMap::new(),
            })
            .collect();
        PlatformBinding {
            name: name.to_owned(),
            tiles,
            connections,
            constraints: GraphBindingConstraints::default(),
            actors: BTreeMap::new(),
            channels: BTreeMap::new(),
        }
    }

    pub fn initial(platform: &PlatformGraph) -> PlatformBinding {
        PlatformBinding::new(INITIAL_BINDING, platform)
    }

    pub fn is_initial(&self) -> bool {
        self.name == INITIAL_BINDING
    }

    pub fn processor(&self, id: ProcessorId) -> &ProcessorBinding {
        &self.tiles[id.tile.0].processors[id.index]
    }

    pub fn processor_mut(&mut self, id: ProcessorId) -> &mut ProcessorBinding {
        &mut self.tiles[id.tile.0].processors[id.index]
    }

    pub fn memory(&self, id: MemoryId) -> &MemoryBinding {
        &self.tiles[id.tile.0].memories[id.index]
    }

    pub fn memory_mut(&mut self, id: MemoryId) -> &mut MemoryBinding {
        &mut self.tiles[id.tile.0].memories[id.index]
    }

    pub fn network_interface(&self, id: NetworkInterfaceId) -> &NetworkInterfaceBinding {
        &self.tiles[id.tile.0].network_interfaces[id.index]
    }

    pub fn network_interface_mut(&mut self, id: NetworkInterfaceId) -> &mut NetworkInterfaceBinding {
        &mut self.tiles[id.tile.0].network_interfaces[id.index]
    }

    pub fn connection(&self, id: ConnectionId) -> &ConnectionBinding {
        &self.connections[id.0]
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> &mut ConnectionBinding {
        &mut self.connections[id.0]
    }

    pub fn processors(&self) -> impl Iterator<Item = &ProcessorBinding> {
        self.tiles.iter().flat_map(|t| t.processors.iter())
    }

    pub fn memories(&self) -> impl Iterator<Item = &MemoryBinding> {
        self.tiles.iter().flat_map(|t| t.memories.iter())
    }

    pub fn network_interfaces(&self) -> impl Iterator<Item = &NetworkInterfaceBinding> {
        self.tiles.iter().flat_map(|t| t.network_interfaces.iter())
    }

    pub fn actor_binding(&self, scenario: ScenarioId, actor: ActorId) -> Option<&ActorBinding> {
        self.actors.get(&scenario).and_then(|m| m.get(&actor))
    }

    pub fn channel_binding(&self, scenario: ScenarioId, channel: ChannelId) -> Option<&ChannelBinding> {
        self.channels.get(&scenario).and_then(|m| m.get(&channel))
    }
}

/// Looks up a binding of the list by name.
pub fn find_binding<'b>(
    bindings: &'b [PlatformBinding],
    name: &str,
) -> Result<&'b PlatformBinding, MappingError> {
    bindings
        .iter()
        .find(|b| b.name == name)
        .ok_or_else(|| MappingError::UnknownPlatformBinding(name.to_owned()))
}
