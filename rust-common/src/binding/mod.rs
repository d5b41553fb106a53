//! Binding state of an application on a platform.
//!
//! A [PlatformBinding] records which resources every actor and channel
//! claims. The search never mutates a binding it was given: it wraps a
//! private clone in a [GraphBinding], and only the clones of surviving
//! candidates replace the original list at the end of a phase.

mod graph;
mod pareto;
mod platform;

pub use graph::{GraphBinding, ParetoBasis};
pub use pareto::{reduce_diversity, simple_cull, ParetoCandidate, ParetoQuantities};
pub use platform::*;

#[cfg(test)]
mod tests;
