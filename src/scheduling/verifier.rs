//! Structural checks over a finished schedule.
//!
//! Problems are reported through a callback as `(failure, vertex)` pairs so a
//! single pass collects all of them.

use crate::scheduling::{
    Schedule, ScheduleId, ScheduleStorage, ScheduleVertex, TraversalDirection,
};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleIntegrityFailure {
    ScheduleIsMissingStart,
    ScheduleIsMissingEnd,
    ScheduleVertexIsNotReachableFromStart,
    ScheduleEndIsNotReachableFromVertex,
    VertexLinksToOtherVertexInMultipleWays,
    UnknownSubSchedule,
    SubScheduleLinksBackToParentSchedule,
}

impl fmt::Display for ScheduleIntegrityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ScheduleIsMissingStart => "schedule is missing a start",
            Self::ScheduleIsMissingEnd => "schedule is missing an end",
            Self::ScheduleVertexIsNotReachableFromStart => "vertex is not reachable from start",
            Self::ScheduleEndIsNotReachableFromVertex => "end is not reachable from vertex",
            Self::VertexLinksToOtherVertexInMultipleWays => {
                "vertex links to another vertex in multiple ways"
            }
            Self::UnknownSubSchedule => "sub-schedule is unknown",
            Self::SubScheduleLinksBackToParentSchedule => {
                "sub-schedule links back to a parent schedule"
            }
        };
        f.write_str(text)
    }
}

pub struct ScheduleVerifier<'a> {
    store: &'a dyn ScheduleStorage,
}

impl<'a> ScheduleVerifier<'a> {
    pub fn new(store: &'a dyn ScheduleStorage) -> Self {
        Self { store }
    }

    /// Runs every check and reports each failure found. Returns `true` when none were.
    ///
    /// Start and end checks come first, then forward and backward reachability,
    /// then duplicate edges, then sub-schedule references.
    pub fn is_valid<F>(&self, id: &ScheduleId, schedule: &Schedule, mut report: F) -> bool
    where
        F: FnMut(ScheduleIntegrityFailure, &ScheduleVertex),
    {
        let mut failures = 0usize;
        let mut fail = |failure: ScheduleIntegrityFailure, vertex: &ScheduleVertex| {
            failures += 1;
            report(failure, vertex);
        };

        check_start(schedule, &mut fail);
        check_end(schedule, &mut fail);
        check_reachability(schedule, &mut fail);
        check_multiple_links(schedule, &mut fail);
        self.check_sub_schedules(id, schedule, &mut fail);

        tracing::debug!(schedule = %id, failures, "schedule verified");
        failures == 0
    }

    /// Convenience wrapper that collects the failures instead of reporting them.
    pub fn failures(
        &self,
        id: &ScheduleId,
        schedule: &Schedule,
    ) -> Vec<(ScheduleIntegrityFailure, ScheduleVertex)> {
        let mut found = Vec::new();
        self.is_valid(id, schedule, |failure, vertex| {
            found.push((failure, vertex.clone()))
        });
        found
    }

    fn check_sub_schedules<F>(&self, id: &ScheduleId, schedule: &Schedule, fail: &mut F)
    where
        F: FnMut(ScheduleIntegrityFailure, &ScheduleVertex),
    {
        for vertex in schedule.vertices() {
            let Some(sub_id) = vertex.sub_schedule_id() else {
                continue;
            };
            if !self.store.contains(sub_id) {
                fail(ScheduleIntegrityFailure::UnknownSubSchedule, vertex);
                continue;
            }

            let mut ancestors = vec![id.clone()];
            let mut explored = FxHashSet::default();
            if self.links_back(sub_id, &mut ancestors, &mut explored) {
                fail(
                    ScheduleIntegrityFailure::SubScheduleLinksBackToParentSchedule,
                    vertex,
                );
            }
        }
    }

    // Depth-first over sub-schedule references. `ancestors` is the chain of
    // schedules currently being explored; `explored` holds schedules whose
    // references were fully searched without finding a way back.
    fn links_back(
        &self,
        target: &ScheduleId,
        ancestors: &mut Vec<ScheduleId>,
        explored: &mut FxHashSet<ScheduleId>,
    ) -> bool {
        if ancestors.contains(target) {
            return true;
        }
        if explored.contains(target) || !self.store.contains(target) {
            return false;
        }

        let schedule = match self.store.schedule(target) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!(schedule = %target, "could not load sub-schedule: {e}");
                return false;
            }
        };

        ancestors.push(target.clone());
        let found = schedule
            .vertices()
            .iter()
            .filter_map(|v| v.sub_schedule_id())
            .any(|nested| self.links_back(nested, ancestors, explored));
        ancestors.pop();

        if !found {
            explored.insert(target.clone());
        }
        found
    }
}

fn check_start<F>(schedule: &Schedule, fail: &mut F)
where
    F: FnMut(ScheduleIntegrityFailure, &ScheduleVertex),
{
    let start = schedule.start();
    let inbound = schedule.number_of_inbound_connections(start).unwrap_or(0);
    let outbound = schedule.number_of_outbound_connections(start).unwrap_or(0);
    if inbound != 0 || outbound == 0 {
        fail(ScheduleIntegrityFailure::ScheduleIsMissingStart, start);
    }
}

fn check_end<F>(schedule: &Schedule, fail: &mut F)
where
    F: FnMut(ScheduleIntegrityFailure, &ScheduleVertex),
{
    let end = schedule.end();
    let inbound = schedule.number_of_inbound_connections(end).unwrap_or(0);
    let outbound = schedule.number_of_outbound_connections(end).unwrap_or(0);
    if outbound != 0 || inbound == 0 {
        fail(ScheduleIntegrityFailure::ScheduleIsMissingEnd, end);
    }
}

fn reached_from(
    schedule: &Schedule,
    origin: &ScheduleVertex,
    direction: TraversalDirection,
) -> FxHashSet<usize> {
    let mut reached = FxHashSet::default();
    // Origin always belongs to the schedule, so the walk cannot fail.
    let _ = schedule.traverse_all_schedule_vertices(origin, direction, |vertex, _| {
        reached.insert(vertex.index());
        true
    });
    reached
}

fn check_reachability<F>(schedule: &Schedule, fail: &mut F)
where
    F: FnMut(ScheduleIntegrityFailure, &ScheduleVertex),
{
    let from_start = reached_from(schedule, schedule.start(), TraversalDirection::Outbound);
    for vertex in schedule.vertices() {
        if !from_start.contains(&vertex.index()) {
            fail(ScheduleIntegrityFailure::ScheduleVertexIsNotReachableFromStart, vertex);
        }
    }

    let to_end = reached_from(schedule, schedule.end(), TraversalDirection::Inbound);
    for vertex in schedule.vertices() {
        if !to_end.contains(&vertex.index()) {
            fail(ScheduleIntegrityFailure::ScheduleEndIsNotReachableFromVertex, vertex);
        }
    }
}

fn check_multiple_links<F>(schedule: &Schedule, fail: &mut F)
where
    F: FnMut(ScheduleIntegrityFailure, &ScheduleVertex),
{
    for vertex in schedule.vertices() {
        let Ok(edges) = schedule.outbound_edges(vertex) else {
            continue;
        };
        let mut targets = FxHashSet::default();
        if edges.iter().any(|edge| !targets.insert(edge.target)) {
            fail(ScheduleIntegrityFailure::VertexLinksToOtherVertexInMultipleWays, vertex);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::{
        FixedScheduleBuilder, InMemoryScheduleStore, ScheduleEdge, ScheduleElementId,
    };

    fn vertices(extra: usize) -> Vec<ScheduleVertex> {
        let mut list = vec![ScheduleVertex::start(0), ScheduleVertex::end(1)];
        for index in 2..2 + extra {
            list.push(ScheduleVertex::mark_history(index));
        }
        list
    }

    fn edges(pairs: &[(usize, usize)]) -> Vec<ScheduleEdge> {
        pairs
            .iter()
            .map(|(s, t)| ScheduleEdge::new(*s, *t, None))
            .collect()
    }

    fn verify(schedule: &Schedule) -> Vec<(ScheduleIntegrityFailure, usize)> {
        let store = InMemoryScheduleStore::new();
        ScheduleVerifier::new(&store)
            .failures(&ScheduleId::from("root"), schedule)
            .into_iter()
            .map(|(failure, vertex)| (failure, vertex.index()))
            .collect()
    }

    #[test]
    fn test_valid_built_schedule_passes() {
        let mut builder = FixedScheduleBuilder::new();
        let a = builder.add_executing_action(ScheduleElementId::from("a"));
        builder.link_from_start(&a, None).unwrap();
        builder.link_to_end(&a, None).unwrap();
        let schedule = builder.build().unwrap();

        let store = InMemoryScheduleStore::new();
        let mut reported = 0;
        let valid = ScheduleVerifier::new(&store).is_valid(
            &ScheduleId::from("root"),
            &schedule,
            |_, _| reported += 1,
        );
        assert!(valid);
        assert_eq!(reported, 0);
    }

    #[test]
    fn test_start_with_inbound_edge_is_missing_start() {
        let schedule =
            Schedule::new(vertices(1), edges(&[(0, 2), (2, 0), (2, 1)]), 0, 1).unwrap();
        assert_eq!(
            verify(&schedule),
            vec![(ScheduleIntegrityFailure::ScheduleIsMissingStart, 0)]
        );
    }

    #[test]
    fn test_end_with_outbound_edge_is_missing_end() {
        let schedule =
            Schedule::new(vertices(1), edges(&[(0, 2), (2, 1), (1, 2)]), 0, 1).unwrap();
        assert_eq!(
            verify(&schedule),
            vec![(ScheduleIntegrityFailure::ScheduleIsMissingEnd, 1)]
        );
    }

    #[test]
    fn test_vertex_without_edges_fails_both_reachability_checks() {
        let schedule = Schedule::new(vertices(2), edges(&[(0, 2), (2, 1)]), 0, 1).unwrap();
        assert_eq!(
            verify(&schedule),
            vec![
                (ScheduleIntegrityFailure::ScheduleVertexIsNotReachableFromStart, 3),
                (ScheduleIntegrityFailure::ScheduleEndIsNotReachableFromVertex, 3),
            ]
        );
    }

    #[test]
    fn test_cycle_without_exit_cannot_reach_end() {
        let schedule = Schedule::new(
            vertices(3),
            edges(&[(0, 1), (0, 2), (2, 3), (3, 4), (4, 2)]),
            0,
            1,
        )
        .unwrap();
        let expected = [2, 3, 4]
            .into_iter()
            .map(|i| (ScheduleIntegrityFailure::ScheduleEndIsNotReachableFromVertex, i))
            .collect::<Vec<_>>();
        assert_eq!(verify(&schedule), expected);
    }

    #[test]
    fn test_cycle_with_exit_is_valid() {
        let schedule = Schedule::new(
            vertices(3),
            edges(&[(0, 2), (2, 3), (3, 4), (4, 2), (4, 1)]),
            0,
            1,
        )
        .unwrap();
        assert!(verify(&schedule).is_empty());
    }

    #[test]
    fn test_duplicate_edge_is_reported_once_for_source() {
        let schedule =
            Schedule::new(vertices(1), edges(&[(0, 2), (2, 1), (2, 1)]), 0, 1).unwrap();
        assert_eq!(
            verify(&schedule),
            vec![(ScheduleIntegrityFailure::VertexLinksToOtherVertexInMultipleWays, 2)]
        );
    }

    #[test]
    fn test_unknown_sub_schedule_is_reported() {
        let mut builder = FixedScheduleBuilder::new();
        let sub = builder.add_sub_schedule(ScheduleId::from("missing"));
        builder.link_from_start(&sub, None).unwrap();
        builder.link_to_end(&sub, None).unwrap();
        let schedule = builder.build().unwrap();

        assert_eq!(
            verify(&schedule),
            vec![(ScheduleIntegrityFailure::UnknownSubSchedule, sub.index())]
        );
    }

    fn single_sub_schedule(target: &str) -> (Schedule, ScheduleVertex) {
        let mut builder = FixedScheduleBuilder::new();
        let sub = builder.add_sub_schedule(ScheduleId::from(target));
        builder.link_from_start(&sub, None).unwrap();
        builder.link_to_end(&sub, None).unwrap();
        (builder.build().unwrap(), sub)
    }

    #[test]
    fn test_three_level_cycle_terminates_and_reports() {
        let (root, root_sub) = single_sub_schedule("a");
        let (a, _) = single_sub_schedule("b");
        let (b, _) = single_sub_schedule("c");
        let (c, _) = single_sub_schedule("a");

        let mut store = InMemoryScheduleStore::new();
        store.insert(ScheduleId::from("a"), a);
        store.insert(ScheduleId::from("b"), b);
        store.insert(ScheduleId::from("c"), c);

        let failures = ScheduleVerifier::new(&store).failures(&ScheduleId::from("root"), &root);
        assert_eq!(
            failures,
            vec![(
                ScheduleIntegrityFailure::SubScheduleLinksBackToParentSchedule,
                root_sub
            )]
        );
    }

    #[test]
    fn test_shared_sub_schedule_is_not_a_back_link() {
        // root -> a, root -> b, a -> leaf, b -> leaf
        let mut builder = FixedScheduleBuilder::new();
        let to_a = builder.add_sub_schedule(ScheduleId::from("a"));
        let to_b = builder.add_sub_schedule(ScheduleId::from("b"));
        builder.link_from_start(&to_a, None).unwrap();
        builder.link_to(&to_a, &to_b, None).unwrap();
        builder.link_to_end(&to_b, None).unwrap();
        let root = builder.build().unwrap();

        let mut store = InMemoryScheduleStore::new();
        store.insert(ScheduleId::from("a"), single_sub_schedule("leaf").0);
        store.insert(ScheduleId::from("b"), single_sub_schedule("leaf").0);
        store.insert(ScheduleId::from("leaf"), FixedScheduleBuilder::new().build().unwrap());

        let failures = ScheduleVerifier::new(&store).failures(&ScheduleId::from("root"), &root);
        assert!(failures.is_empty(), "{failures:?}");
    }
}
