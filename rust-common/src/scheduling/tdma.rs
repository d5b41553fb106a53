use log::{debug, info};
use rayon::prelude::*;
use sdfmap_core::{ProcessorId, ScenarioId, Time};

use super::{ScheduleContext, SchedulingStrategy};
use crate::binding::{reduce_diversity, simple_cull, GraphBinding, ParetoBasis};
use crate::binding_aware::binding_throughput;
use crate::MappingError;

const THROUGHPUT_TOLERANCE: f64 = 1e-9;

type Probe = ((ScenarioId, ProcessorId), Time, Time, Time, bool);

/// Shrinks the TDMA slice of every (scenario, processor) pair by bisection
/// while the binding keeps meeting the throughput constraint of the
/// application.
///
/// Each candidate keeps an interval `[min, max]` per pair where `max` is
/// known to be feasible. Every round probes the middle of the widest open
/// interval of each candidate. A feasible probe branches into a tighter
/// child (`max := mid`) and a looser child that settles for `max`, an
/// infeasible probe raises `min`. Rounds end with Pareto pruning on the
/// TDMA loads and diversity reduction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdmaBisection;

impl TdmaBisection {
    /// Opens `[context switch, available wheel]` for every processor in
    /// use. Answers `false` if some processor cannot host any slice.
    fn initialise(candidate: &mut GraphBinding) -> bool {
        let application = candidate.application;
        let mut ok = true;
        for (s, _) in application.scenarios() {
            for p in candidate.processors_used(s) {
                let context_switch = candidate.platform.processor(p).context_switch;
                let available = candidate.binding.processor(p).available;
                ok &= available > context_switch;
                candidate.set_tdma_bounds(s, p, context_switch, available);
            }
        }
        ok
    }

    fn feasible(candidate: &GraphBinding, ctx: &ScheduleContext) -> Result<bool, MappingError> {
        let constraint = candidate.application.throughput_constraint;
        let th = binding_throughput(candidate, ctx.communication, ctx.throughput)?;
        Ok(th >= constraint * (1.0 - THROUGHPUT_TOLERANCE))
    }

    /// Widest interval still open; ties go to the lowest scenario, then
    /// the lowest processor.
    fn open_interval(candidate: &GraphBinding) -> Option<((ScenarioId, ProcessorId), Time, Time)> {
        candidate
            .tdma_bounds()
            .filter(|(_, (min, max))| max - min > 1)
            .fold(None, |best, (key, (min, max))| match best {
                Some((_, bmin, bmax)) if bmax - bmin >= max - min => best,
                _ => Some((key, min, max)),
            })
    }

    fn probe(candidate: &GraphBinding, ctx: &ScheduleContext) -> Result<Option<Probe>, MappingError> {
        let Some((key, min, max)) = Self::open_interval(candidate) else {
            return Ok(None);
        };
        let mid = min + (max - min) / 2;
        let mut trial = candidate.clone();
        trial.set_tdma_bounds(key.0, key.1, min, mid);
        let ok = Self::feasible(&trial, ctx)?;
        Ok(Some((key, min, max, mid, ok)))
    }
}

impl SchedulingStrategy for TdmaBisection {
    fn construct_schedules<'a>(
        &self,
        candidates: Vec<GraphBinding<'a>>,
        ctx: &ScheduleContext,
        max_candidates: usize,
    ) -> Result<Vec<GraphBinding<'a>>, MappingError> {
        let opened: Vec<GraphBinding<'a>> = candidates
            .into_iter()
            .filter_map(|mut c| {
                if Self::initialise(&mut c) {
                    Some(c)
                } else {
                    debug!("candidate {} has a processor without usable wheel", c.binding.name);
                    None
                }
            })
            .collect();
        let checks = opened
            .par_iter()
            .map(|c| Self::feasible(c, ctx))
            .collect::<Result<Vec<bool>, MappingError>>()?;
        let mut current: Vec<GraphBinding<'a>> = opened
            .into_iter()
            .zip(checks)
            .filter_map(|(c, ok)| ok.then_some(c))
            .collect();
        info!(
            "{} candidates meet the throughput constraint with full slices",
            current.len()
        );
        let mut round = 0;
        while current.iter().any(|c| Self::open_interval(c).is_some()) {
            round += 1;
            let probed = current
                .into_par_iter()
                .map(|c| Self::probe(&c, ctx).map(|p| (c, p)))
                .collect::<Result<Vec<_>, MappingError>>()?;
            let mut next = Vec::with_capacity(probed.len() * 2);
            for (mut c, probe) in probed {
                match probe {
                    None => next.push(c),
                    Some(((s, p), min, max, mid, true)) => {
                        let mut tighter = c.clone();
                        tighter.set_tdma_bounds(s, p, min, mid);
                        next.push(tighter);
                        c.set_tdma_bounds(s, p, max, max);
                        next.push(c);
                    }
                    Some(((s, p), _, max, mid, false)) => {
                        c.set_tdma_bounds(s, p, mid, max);
                        next.push(c);
                    }
                }
            }
            for c in next.iter_mut() {
                c.compute_pareto_quantities(ctx.repetition_vectors, ParetoBasis::Tdma);
            }
            current = reduce_diversity(simple_cull(next), max_candidates);
            debug!("bisection round {}: {} candidates", round, current.len());
        }
        let mut scheduled = Vec::with_capacity(current.len());
        for mut c in current {
            let bounds: Vec<_> = c.tdma_bounds().collect();
            if bounds
                .into_iter()
                .all(|((s, p), (_, max))| c.allocate_tdma_slice(s, p, max))
            {
                c.compute_pareto_quantities(ctx.repetition_vectors, ParetoBasis::Tdma);
                scheduled.push(c);
            } else {
                debug!("candidate {} cannot allocate its slices", c.binding.name);
            }
        }
        info!("{} candidates with allocated TDMA slices", scheduled.len());
        Ok(scheduled)
    }
}
