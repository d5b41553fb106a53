use std::collections::{BTreeMap, BTreeSet};

use log::trace;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use sdfmap_core::{
    to_hsdf, ActorId, ModelError, ScenarioGraph, Time,
};

use super::ScheduleContext;
use crate::binding::{GraphBinding, StaticOrderSchedule};
use crate::binding_aware::build_binding_aware_graph;
use crate::MappingError;

/// Latest completion time of every node of an acyclic precedence graph
/// such that the iteration still completes within its critical path.
/// Node `n` stands for actor `n` of `hsdf`.
pub fn alap_deadlines(hsdf: &ScenarioGraph, precedence: &DiGraph<ActorId, ()>) -> Result<Vec<Time>, ModelError> {
    let order = toposort(precedence, None).map_err(|_| ModelError::Deadlock(hsdf.name.clone()))?;
    let exec = |n: NodeIndex| hsdf.actor(precedence[n]).execution_time();
    let mut tail = vec![0; precedence.node_count()];
    for n in order.iter().rev() {
        tail[n.index()] = precedence
            .neighbors(*n)
            .map(|succ| exec(succ) + tail[succ.index()])
            .max()
            .unwrap_or(0);
    }
    let horizon = precedence
        .node_indices()
        .map(|n| exec(n) + tail[n.index()])
        .max()
        .unwrap_or(0);
    Ok(tail.into_iter().map(|t| horizon - t).collect())
}

/// Earliest-deadline-first static orders for every processor and scenario
/// of `binding`, stored in its processor bindings.
///
/// Firings become ready once their predecessors within the iteration are
/// scheduled; among ready firings the earliest deadline goes first, ties
/// to the lowest firing index. Firings of synthetic actors are left out.
pub fn edf_schedule(binding: &mut GraphBinding, ctx: &ScheduleContext) -> Result<(), MappingError> {
    let application = binding.application;
    for (s, _) in application.scenarios() {
        let bag = build_binding_aware_graph(binding, s, ctx.communication)?;
        let repetition = ctx.repetition.compute(&bag)?;
        let hsdf = to_hsdf(&bag, &repetition)?;
        let precedence = hsdf.precedence_graph();
        let deadlines = alap_deadlines(&hsdf.graph, &precedence)?;
        let mut waiting: Vec<usize> = precedence
            .node_indices()
            .map(|n| precedence.neighbors_directed(n, Direction::Incoming).count())
            .collect();
        let mut ready: BTreeSet<(Time, usize)> = precedence
            .node_indices()
            .filter(|n| waiting[n.index()] == 0)
            .map(|n| (deadlines[n.index()], n.index()))
            .collect();
        let mut schedules: BTreeMap<_, StaticOrderSchedule> = BTreeMap::new();
        while let Some((deadline, n)) = ready.pop_first() {
            if let Some(actor) = hsdf.graph.actor(precedence[NodeIndex::new(n)]).original {
                let target = binding.actor_binding(s, actor).ok_or_else(|| MappingError::UnmappedActor {
                    actor: binding.scenario_graph(s).actor(actor).name.clone(),
                    scenario: application.scenario(s).name.clone(),
                })?;
                trace!("firing {} with deadline {}", hsdf.graph.actor(ActorId(n)).name, deadline);
                schedules
                    .entry(target.processor)
                    .or_default()
                    .entries
                    .push(actor);
            }
            for succ in precedence.neighbors(NodeIndex::new(n)) {
                waiting[succ.index()] -= 1;
                if waiting[succ.index()] == 0 {
                    ready.insert((deadlines[succ.index()], succ.index()));
                }
            }
        }
        for (p, mut schedule) in schedules {
            schedule.start_periodic = 0;
            binding.binding.processor_mut(p).schedules.insert(s, schedule);
        }
    }
    Ok(())
}
