use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by malformed or unanalysable models.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("name {0} is used more than once")]
    DuplicateName(String),
    #[error("channel {channel} refers to an unknown port")]
    UnknownPort { channel: String },
    #[error("port {port} of channel {channel} has the wrong direction")]
    PortDirection { channel: String, port: String },
    #[error("channel {channel} has a zero rate")]
    ZeroRate { channel: String },
    #[error("rates of channel {channel} are inconsistent with the rest of the graph")]
    Inconsistent { channel: String },
    #[error("throughput constraint {0} is not a non-negative number")]
    ThroughputConstraint(f64),
    #[error("scenario {0} refers to an unknown scenario graph")]
    UnknownScenarioGraph(String),
    #[error("invalid platform: {0}")]
    Platform(String),
    #[error("graph {0} deadlocks within one iteration")]
    Deadlock(String),
    #[error("repetition vector of graph {0} does not fit in 64 bits")]
    RepetitionOverflow(String),
    #[error("no repetition vector entry for actor {0}")]
    MissingRepetition(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
    #[error("unknown model format for {0}, expected json, msgpack or cbor")]
    UnknownFormat(PathBuf),
}
