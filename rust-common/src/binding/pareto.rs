use std::collections::BTreeMap;

use log::debug;
use sdfmap_core::{MemoryId, NetworkInterfaceId, ProcessorId};
use serde::{Deserialize, Serialize};

/// Normalised resource loads of a binding, one entry per platform resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParetoQuantities {
    pub processing: BTreeMap<ProcessorId, f64>,
    pub memory: BTreeMap<MemoryId, f64>,
    pub communication: BTreeMap<NetworkInterfaceId, f64>,
}

impl ParetoQuantities {
    fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.processing
            .values()
            .chain(self.memory.values())
            .chain(self.communication.values())
            .copied()
    }

    fn same_resources(&self, other: &ParetoQuantities) -> bool {
        self.processing.keys().eq(other.processing.keys())
            && self.memory.keys().eq(other.memory.keys())
            && self.communication.keys().eq(other.communication.keys())
    }

    /// True when no load of `self` exceeds the matching load of `other`.
    ///
    /// Both sides must describe the same platform resources.
    pub fn dominates(&self, other: &ParetoQuantities) -> bool {
        assert!(
            self.same_resources(other),
            "pareto quantities over different resources"
        );
        self.values().zip(other.values()).all(|(a, b)| a <= b)
    }

    /// Euclidean distance over all loads.
    pub fn distance(&self, other: &ParetoQuantities) -> f64 {
        assert!(
            self.same_resources(other),
            "pareto quantities over different resources"
        );
        self.values()
            .zip(other.values())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    pub fn total(&self) -> f64 {
        self.values().sum()
    }
}

/// Anything ranked by its [ParetoQuantities].
pub trait ParetoCandidate {
    fn pareto(&self) -> &ParetoQuantities;
}

impl ParetoCandidate for ParetoQuantities {
    fn pareto(&self) -> &ParetoQuantities {
        self
    }
}

/// Keeps the candidates no other candidate dominates. Of several
/// candidates with equal loads only the first one survives.
pub fn simple_cull<T: ParetoCandidate>(candidates: Vec<T>) -> Vec<T> {
    let before = candidates.len();
    let mut kept: Vec<T> = Vec::with_capacity(before);
    for c in candidates {
        if kept.iter().any(|k| k.pareto().dominates(c.pareto())) {
            continue;
        }
        kept.retain(|k| !c.pareto().dominates(k.pareto()));
        kept.push(c);
    }
    debug!("pareto cull kept {} of {} candidates", kept.len(), before);
    kept
}

/// Farthest-point reduction to at most `max` candidates.
///
/// The seed is the candidate with the lowest total load. Each next pick is
/// the candidate whose distance to the closest picked one is largest; ties
/// go to the lowest position. The input order is preserved.
pub fn reduce_diversity<T: ParetoCandidate>(candidates: Vec<T>, max: usize) -> Vec<T> {
    if candidates.len() <= max {
        return candidates;
    }
    let mut picked = vec![false; candidates.len()];
    if max > 0 {
        let seed = candidates
            .iter()
            .enumerate()
            .fold(0, |best, (i, c)| {
                if c.pareto().total() < candidates[best].pareto().total() {
                    i
                } else {
                    best
                }
            });
        picked[seed] = true;
        let mut closest: Vec<f64> = candidates
            .iter()
            .map(|c| c.pareto().distance(candidates[seed].pareto()))
            .collect();
        for _ in 1..max {
            let next = (0..candidates.len())
                .filter(|i| !picked[*i])
                .fold(None, |best: Option<usize>, i| match best {
                    Some(b) if closest[b] >= closest[i] => Some(b),
                    _ => Some(i),
                });
            let Some(next) = next else { break };
            picked[next] = true;
            for (i, c) in candidates.iter().enumerate() {
                closest[i] = closest[i].min(c.pareto().distance(candidates[next].pareto()));
            }
        }
    }
    debug!(
        "diversity reduction kept {} of {} candidates",
        max,
        candidates.len()
    );
    candidates
        .into_iter()
        .zip(picked)
        .filter_map(|(c, p)| p.then_some(c))
        .collect()
}
