use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ModelError, Time};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct TileId(pub usize);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct ProcessorId {
    pub tile: TileId,
    pub index: usize,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct MemoryId {
    pub tile: TileId,
    pub index: usize,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct NetworkInterfaceId {
    pub tile: TileId,
    pub index: usize,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct ConnectionId(pub usize);

/// A TDMA-arbitrated processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Processor {
    pub name: String,
    pub processor_type: String,
    /// Period of the TDMA wheel.
    pub wheel_size: Time,
    /// Overhead paid at the start of every slice.
    #[serde(default)]
    pub context_switch: Time,
    /// Slot granularity on platforms with slotted TDMA.
    #[serde(default)]
    pub slot_length: Option<Time>,
    /// Part of the wheel already occupied by other applications.
    #[serde(default)]
    pub reserved: Time,
}

impl Processor {
    /// Rounds a slice up to the slot granularity, never beyond the wheel.
    pub fn align_slice(&self, slice: Time) -> Time {
        match self.slot_length {
            Some(slot) if slot > 0 => (((slice + slot - 1) / slot) * slot).min(self.wheel_size),
            _ => slice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Memory {
    pub name: String,
    /// Capacity in bytes.
    pub size: u64,
    #[serde(default)]
    pub reserved: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NetworkInterface {
    pub name: String,
    pub max_connections: u32,
    /// Incoming bandwidth in bytes per time unit.
    pub in_bandwidth: f64,
    /// Outgoing bandwidth in bytes per time unit.
    pub out_bandwidth: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Tile {
    pub name: String,
    #[serde(default)]
    pub processors: Vec<Processor>,
    #[serde(default)]
    pub memories: Vec<Memory>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
}

/// Point-to-point link between network interfaces of two different tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Connection {
    pub name: String,
    pub src: NetworkInterfaceId,
    pub dst: NetworkInterfaceId,
    pub latency: Time,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PlatformGraph {
    pub name: String,
    pub tiles: Vec<Tile>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl PlatformGraph {
    pub fn new(name: &str) -> PlatformGraph {
        PlatformGraph {
            name: name.to_owned(),
            tiles: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn add_tile(&mut self, name: &str) -> TileId {
        self.tiles.push(Tile {
            name: name.to_owned(),
            ..Default::default()
        });
        TileId(self.tiles.len() - 1)
    }

    pub fn add_processor(&mut self, tile: TileId, processor: Processor) -> ProcessorId {
        let t = &mut self.tiles[tile.0];
        t.processors.push(processor);
        ProcessorId {
            tile,
            index: t.processors.len() - 1,
        }
    }

    pub fn add_memory(&mut self, tile: TileId, memory: Memory) -> MemoryId {
        let t = &mut self.tiles[tile.0];
        t.memories.push(memory);
        MemoryId {
            tile,
            index: t.memories.len() - 1,
        }
    }

    pub fn add_network_interface(
        &mut self,
        tile: TileId,
        ni: NetworkInterface,
    ) -> NetworkInterfaceId {
        let t = &mut self.tiles[tile.0];
        t.network_interfaces.push(ni);
        NetworkInterfaceId {
            tile,
            index: t.network_interfaces.len() - 1,
        }
    }

    pub fn add_connection(
        &mut self,
        name: &str,
        src: NetworkInterfaceId,
        dst: NetworkInterfaceId,
        latency: Time,
    ) -> ConnectionId {
        self.connections.push(Connection {
            name: name.to_owned(),
            src,
            dst,
            latency,
        });
        ConnectionId(self.connections.len() - 1)
    }

    pub fn tile(&self, id: TileId) -> &Tile {
        &self.tiles[id.0]
    }

    pub fn processor(&self, id: ProcessorId) -> &Processor {
        &self.tiles[id.tile.0].processors[id.index]
    }

    pub fn memory(&self, id: MemoryId) -> &Memory {
        &self.tiles[id.tile.0].memories[id.index]
    }

    pub fn network_interface(&self, id: NetworkInterfaceId) -> &NetworkInterface {
        &self.tiles[id.tile.0].network_interfaces[id.index]
    }

    pub fn connection(&self, id: ConnectionId) -> &Connection {
        &self.connections[id.0]
    }

    pub fn tiles(&self) -> impl Iterator<Item = (TileId, &Tile)> {
        self.tiles.iter().enumerate().map(|(i, t)| (TileId(i), t))
    }

    pub fn processors(&self) -> impl Iterator<Item = (ProcessorId, &Processor)> {
        self.tiles().flat_map(|(tile, t)| {
            t.processors
                .iter()
                .enumerate()
                .map(move |(index, p)| (ProcessorId { tile, index }, p))
        })
    }

    pub fn memories(&self) -> impl Iterator<Item = (MemoryId, &Memory)> {
        self.tiles().flat_map(|(tile, t)| {
            t.memories
                .iter()
                .enumerate()
                .map(move |(index, m)| (MemoryId { tile, index }, m))
        })
    }

    pub fn network_interfaces(&self) -> impl Iterator<Item = (NetworkInterfaceId, &NetworkInterface)> {
        self.tiles().flat_map(|(tile, t)| {
            t.network_interfaces
                .iter()
                .enumerate()
                .map(move |(index, n)| (NetworkInterfaceId { tile, index }, n))
        })
    }

    pub fn memories_of(&self, tile: TileId) -> impl Iterator<Item = MemoryId> + '_ {
        (0..self.tiles[tile.0].memories.len()).map(move |index| MemoryId { tile, index })
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections
            .iter()
            .enumerate()
            .map(|(i, c)| (ConnectionId(i), c))
    }

    /// Connections leading from a network interface of `src` to one of `dst`.
    pub fn connections_between(
        &self,
        src: TileId,
        dst: TileId,
    ) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections()
            .filter(move |(_, c)| c.src.tile == src && c.dst.tile == dst)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let mut names = HashSet::new();
        for t in &self.tiles {
            if !names.insert(t.name.as_str()) {
                return Err(ModelError::DuplicateName(t.name.clone()));
            }
            for p in &t.processors {
                if p.reserved > p.wheel_size {
                    return Err(ModelError::Platform(format!(
                        "processor {} reserves more than its wheel",
                        p.name
                    )));
                }
            }
        }
        for c in &self.connections {
            let exists = |ni: NetworkInterfaceId| {
                self.tiles
                    .get(ni.tile.0)
                    .map(|t| ni.index < t.network_interfaces.len())
                    .unwrap_or(false)
            };
            if !exists(c.src) || !exists(c.dst) {
                return Err(ModelError::Platform(format!(
                    "connection {} refers to an unknown network interface",
                    c.name
                )));
            }
            if c.src.tile == c.dst.tile {
                return Err(ModelError::Platform(format!(
                    "connection {} does not leave its tile",
                    c.name
                )));
            }
        }
        Ok(())
    }
}
