use sdfmap_core::ModelError;

use crate::flow::FlowSettingsBuilderError;
use thiserror::Error;

/// Fatal outcomes of the mapping flow.
///
/// Running out of resources for one candidate is not an error: allocation
/// calls answer `false` and the candidate is discarded.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("invalid flow settings: {0}")]
    Settings(#[from] FlowSettingsBuilderError),
    #[error("no {0} model given")]
    MissingModel(&'static str),
    #[error("application {0} has no scenarios")]
    NoScenarios(String),
    #[error("application {0} does not have isolated scenarios")]
    NonIsolatedScenarios(String),
    #[error("actor {actor} is bound to processor {processor} and memory {memory} on different tiles")]
    CrossTileBinding {
        actor: String,
        processor: String,
        memory: String,
    },
    #[error("actor {actor} of scenario {scenario} is not bound to any processor")]
    UnmappedActor { actor: String, scenario: String },
    #[error("channel {channel} of scenario {scenario} is not bound")]
    UnmappedChannel { channel: String, scenario: String },
    #[error("no constraints for channel {channel} of scenario {scenario}")]
    MissingConstraint { channel: String, scenario: String },
    #[error("channel {channel} holds {tokens} tokens but only {capacity} fit in its buffer")]
    InsufficientBuffer {
        channel: String,
        tokens: u64,
        capacity: u64,
    },
    #[error("no platform binding named {0}")]
    UnknownPlatformBinding(String),
    #[error("slice {slice} on processor {processor} does not exceed the context switch {context_switch}")]
    InvalidTdmaSlice {
        processor: String,
        slice: u64,
        context_switch: u64,
    },
}
