mod edf;
mod encoding;
mod tdma;

use sdfmap_core::{RepetitionVector, RepetitionVectorComputer, ThroughputAnalysis};

pub use edf::{alap_deadlines, edf_schedule};
pub use encoding::encode_static_order;
pub use tdma::TdmaBisection;

use crate::binding::GraphBinding;
use crate::binding_aware::CommunicationModel;
use crate::MappingError;

/// Collaborators needed to judge a candidate binding.
#[derive(Clone, Copy)]
pub struct ScheduleContext<'c> {
    pub throughput: &'c dyn ThroughputAnalysis,
    pub communication: &'c dyn CommunicationModel,
    /// Solves the balance equations of binding-aware graphs.
    pub repetition: &'c dyn RepetitionVectorComputer,
    /// Repetition vector of every scenario of the application.
    pub repetition_vectors: &'c [RepetitionVector],
}

/// Turns bound candidates into candidates with allocated TDMA slices.
/// Candidates that cannot meet the throughput constraint are dropped.
pub trait SchedulingStrategy: Send + Sync {
    fn construct_schedules<'a>(
        &self,
        candidates: Vec<GraphBinding<'a>>,
        ctx: &ScheduleContext,
        max_candidates: usize,
    ) -> Result<Vec<GraphBinding<'a>>, MappingError>;
}

#[cfg(test)]
mod tests;
