use std::collections::BTreeMap;

use sdfmap_core::{
    to_hsdf, ActorId, HsdfGraph, RepetitionVectorComputer, ScenarioGraph, ScenarioId,
};

use crate::binding::GraphBinding;
use crate::MappingError;

/// Encodes the static orders of `scenario` into the HSDF graph of its
/// binding-aware graph `bag`.
///
/// The k-th occurrence of an actor in a static order is its k-th firing.
/// Consecutive entries are chained by token-free channels and the last
/// entry feeds the first periodic one through a channel with one token.
pub fn encode_static_order(
    binding: &GraphBinding,
    scenario: ScenarioId,
    bag: &ScenarioGraph,
    repetition: &dyn RepetitionVectorComputer,
) -> Result<HsdfGraph, MappingError> {
    let repetition = repetition.compute(bag)?;
    let mut hsdf = to_hsdf(bag, &repetition)?;
    for p in binding.binding.processors() {
        let Some(schedule) = p.schedules.get(&scenario) else {
            continue;
        };
        if schedule.entries.is_empty() {
            continue;
        }
        let mut seen: BTreeMap<ActorId, u64> = BTreeMap::new();
        let firings: Vec<ActorId> = schedule
            .entries
            .iter()
            .map(|a| {
                // binding-aware graphs keep the ids of application actors
                let k = seen.entry(*a).or_insert(0);
                let firing = hsdf.firing(*a, *k % repetition.get(*a).max(1));
                *k += 1;
                firing
            })
            .collect();
        let name = &binding.platform.processor(p.processor).name;
        let last = firings.len() - 1;
        for i in 0..last {
            hsdf.graph
                .connect(&format!("{}_so_{}", name, i), firings[i], 1, firings[i + 1], 1, 0);
        }
        let start = firings[schedule.start_periodic.min(last)];
        hsdf.graph
            .connect(&format!("{}_so_{}", name, last), firings[last], 1, start, 1, 1);
    }
    Ok(hsdf)
}
