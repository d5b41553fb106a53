pub mod buffer;
pub mod error;
pub mod graph;
pub mod hsdf;
pub mod platform;
pub mod repetition;
pub mod throughput;

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

pub use buffer::{GreedyBufferExplorer, TradeoffPoint};
pub use error::ModelError;
pub use graph::*;
pub use hsdf::{to_hsdf, HsdfGraph};
pub use platform::*;
pub use repetition::{BalanceEquations, RepetitionVector};
pub use throughput::MaxCycleRatioThroughput;

/// Oracle returning the throughput, in graph iterations per time unit, of a
/// scenario graph. Binding-aware graphs are evaluated through it.
pub trait ThroughputAnalysis: Send + Sync {
    fn analyze(&self, graph: &ScenarioGraph) -> Result<f64, ModelError>;
}

pub trait RepetitionVectorComputer: Send + Sync {
    fn compute(&self, graph: &ScenarioGraph) -> Result<RepetitionVector, ModelError>;
}

/// Oracle producing the throughput versus buffer size trade-off of a graph
/// as a chain of points ordered by increasing throughput.
pub trait BufferTradeoffExplorer: Send + Sync {
    fn explore(&self, graph: &ScenarioGraph) -> Result<Vec<TradeoffPoint>, ModelError>;
}

/// Reads a model whose encoding is chosen by the file extension: `json`,
/// `msgpack` or `cbor`.
pub fn load_model<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let f = std::fs::File::open(path)?;
    let decode = |reason: String| ModelError::Decode {
        path: path.to_path_buf(),
        reason,
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("cbor") => {
            ciborium::from_reader(f).map_err(|e| decode(e.to_string()))
        }
        Some(ext) if ext.eq_ignore_ascii_case("msgpack") => {
            rmp_serde::from_read(f).map_err(|e| decode(e.to_string()))
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_reader(f).map_err(|e| decode(e.to_string()))
        }
        _ => Err(ModelError::UnknownFormat(path.to_path_buf())),
    }
}

/// Counterpart of [load_model].
pub fn write_model<T: Serialize>(path: &Path, model: &T) -> Result<(), ModelError> {
    let encode = |reason: String| ModelError::Encode {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("cbor") => {
            let mut buf = Vec::new();
            ciborium::into_writer(model, &mut buf).map_err(|e| encode(e.to_string()))?;
            buf
        }
        Some(ext) if ext.eq_ignore_ascii_case("msgpack") => {
            rmp_serde::to_vec_named(model).map_err(|e| encode(e.to_string()))?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::to_vec_pretty(model).map_err(|e| encode(e.to_string()))?
        }
        _ => return Err(ModelError::UnknownFormat(path.to_path_buf())),
    };
    std::fs::write(path, bytes)?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod fixtures;
