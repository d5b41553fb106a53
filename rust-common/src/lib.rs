pub mod binding;
pub mod binding_aware;
pub mod error;
pub mod flow;
pub mod memory;
pub mod scheduling;
pub mod tile_binding;

pub use binding::{GraphBinding, ParetoBasis, ParetoQuantities, PlatformBinding};
pub use binding_aware::{CommunicationModel, DmaCommunication, GenericCommunication};
pub use error::MappingError;
pub use flow::{
    CommunicationKind, FlowSettings, FlowSettingsBuilder, MappingFlow, MappingReport,
    StorageSplitKind,
};
pub use memory::{HalfSplit, MemoryDimensioning, SharedBufferSplit, StorageSplit};
pub use scheduling::{SchedulingStrategy, TdmaBisection};
pub use tile_binding::TileBindingAlgo;

#[cfg(test)]
mod fixtures;
