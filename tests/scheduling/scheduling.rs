use apollo::scheduling::{
    FixedScheduleBuilder, InMemoryScheduleStore, Schedule, ScheduleEdge, ScheduleElementId,
    ScheduleError, ScheduleId, ScheduleIntegrityFailure, ScheduleVariable, ScheduleVerifier,
    ScheduleVertex, SqliteScheduleStore, TraversalDirection, VertexKind,
};
use std::collections::BTreeSet;
use tempfile::tempdir;

fn chain(builder: &mut FixedScheduleBuilder, actions: &[&str]) -> Vec<ScheduleVertex> {
    let vertices: Vec<_> = actions
        .iter()
        .map(|a| builder.add_executing_action(ScheduleElementId::from(*a)))
        .collect();
    builder
        .link_from_start(&vertices[0], None)
        .expect("link from start");
    for pair in vertices.windows(2) {
        builder.link_to(&pair[0], &pair[1], None).expect("link");
    }
    builder
        .link_to_end(vertices.last().expect("non-empty"), None)
        .expect("link to end");
    vertices
}

fn chain_schedule(actions: &[&str]) -> Schedule {
    let mut builder = FixedScheduleBuilder::new();
    chain(&mut builder, actions);
    builder.build().expect("build")
}

fn sub_schedule_calling(target: &str) -> Schedule {
    let mut builder = FixedScheduleBuilder::new();
    let sub = builder.add_sub_schedule(ScheduleId::from(target));
    builder.link_from_start(&sub, None).expect("link");
    builder.link_to_end(&sub, None).expect("link");
    builder.build().expect("build")
}

#[test]
fn valid_schedule_has_no_failures() {
    let schedule = chain_schedule(&["a", "b"]);
    let store = InMemoryScheduleStore::new();
    let verifier = ScheduleVerifier::new(&store);

    let mut reported = Vec::new();
    let valid = verifier.is_valid(&ScheduleId::from("root"), &schedule, |failure, vertex| {
        reported.push((failure, vertex.clone()))
    });
    assert!(valid);
    assert!(reported.is_empty());
}

#[test]
fn chain_traverses_in_order() {
    let schedule = chain_schedule(&["a", "b"]);
    let names: Vec<_> = schedule
        .traversal_order()
        .iter()
        .map(|v| match v.kind() {
            VertexKind::ExecutingAction { action } => action.to_string(),
            other => other.name().to_string(),
        })
        .collect();
    assert_eq!(names, vec!["Start", "a", "b", "End"]);
}

#[test]
fn start_with_inbound_edge_is_reported_once() {
    let vertices = vec![
        ScheduleVertex::start(0),
        ScheduleVertex::end(1),
        ScheduleVertex::mark_history(2),
    ];
    let edges = vec![
        ScheduleEdge::new(0, 2, None),
        ScheduleEdge::new(2, 1, None),
        ScheduleEdge::new(2, 0, None),
    ];
    let schedule = Schedule::new(vertices, edges, 0, 1).expect("schedule");
    let store = InMemoryScheduleStore::new();

    let failures = ScheduleVerifier::new(&store).failures(&ScheduleId::from("root"), &schedule);
    assert_eq!(
        failures,
        vec![(
            ScheduleIntegrityFailure::ScheduleIsMissingStart,
            ScheduleVertex::start(0)
        )]
    );
}

#[test]
fn duplicate_links_are_reported_on_the_source() {
    let mut builder = FixedScheduleBuilder::new();
    let mark = builder.add_history_marking_point();
    builder.link_from_start(&mark, None).expect("link");
    builder
        .link_from_start(&mark, Some(ScheduleElementId::from("again")))
        .expect("link");
    builder.link_to_end(&mark, None).expect("link");
    let schedule = builder.build().expect("build");
    let store = InMemoryScheduleStore::new();

    let failures = ScheduleVerifier::new(&store).failures(&ScheduleId::from("root"), &schedule);
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].0,
        ScheduleIntegrityFailure::VertexLinksToOtherVertexInMultipleWays
    );
    assert!(failures[0].1.is_start());
}

#[test]
fn dangling_vertex_fails_both_reachability_checks_in_order() {
    let vertices = vec![
        ScheduleVertex::start(0),
        ScheduleVertex::end(1),
        ScheduleVertex::mark_history(2),
        ScheduleVertex::mark_history(3),
    ];
    let edges = vec![ScheduleEdge::new(0, 2, None), ScheduleEdge::new(2, 1, None)];
    let schedule = Schedule::new(vertices, edges, 0, 1).expect("schedule");
    let store = InMemoryScheduleStore::new();

    let kinds: Vec<_> = ScheduleVerifier::new(&store)
        .failures(&ScheduleId::from("root"), &schedule)
        .into_iter()
        .map(|(failure, vertex)| (failure, vertex.index()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ScheduleIntegrityFailure::ScheduleVertexIsNotReachableFromStart, 3),
            (ScheduleIntegrityFailure::ScheduleEndIsNotReachableFromVertex, 3),
        ]
    );
}

#[test]
fn insert_with_single_use_budget_is_consumed() {
    let first = ScheduleElementId::from("cond1");
    let second = ScheduleElementId::from("cond2");

    let mut builder = FixedScheduleBuilder::new();
    let insert = builder.add_insert_point_with_count(1).expect("insert point");
    builder
        .link_from_start(&insert, Some(first.clone()))
        .expect("link");
    builder
        .link_to_end(&insert, Some(second.clone()))
        .expect("link");

    let mark = ScheduleVertex::mark_history(builder.next_index());
    let insertion = builder
        .insert_in(&insert, mark.clone())
        .expect("insert")
        .expect("budget left");
    assert!(insertion.before.is_none());
    assert!(insertion.after.is_none());

    let schedule = builder.build().expect("build");
    let order: Vec<_> = schedule.traversal_order().into_iter().cloned().collect();
    assert_eq!(order, vec![schedule.start().clone(), mark.clone(), schedule.end().clone()]);
    assert!(schedule.insert_points().is_empty());

    let conditions: Vec<_> = schedule
        .edges()
        .iter()
        .map(|edge| edge.condition.clone())
        .collect();
    assert_eq!(conditions, vec![Some(first), Some(second)]);
}

#[test]
fn unlimited_insert_point_survives_on_both_sides() {
    let mut builder = FixedScheduleBuilder::new();
    let insert = builder.add_insert_point();
    builder.link_from_start(&insert, None).expect("link");
    builder.link_to_end(&insert, None).expect("link");

    let insertion = builder
        .insert_schedule_in(&insert, ScheduleId::from("child"))
        .expect("insert")
        .expect("unlimited");
    let before = insertion.before.expect("before");
    let after = insertion.after.expect("after");

    let schedule = builder.build().expect("build");
    assert_eq!(schedule.insert_points(), vec![&before, &after]);
    assert_eq!(schedule.traversal_order().len(), 5);
    assert!(!schedule.contains(&insert));
}

#[test]
fn builder_errors_follow_the_taxonomy() {
    let mut builder = FixedScheduleBuilder::new();
    let mark = builder.add_history_marking_point();
    let stranger = ScheduleVertex::mark_history(99);

    assert_eq!(
        builder.add_insert_point_with_count(0),
        Err(ScheduleError::InsertCountOutOfRange(0))
    );
    assert_eq!(
        builder.add_synchronization_start(Vec::<ScheduleVariable>::new()),
        Err(ScheduleError::CannotCreateASynchronizationBlockWithoutVariables)
    );
    assert!(matches!(
        builder.link_to(&mark, &mark, None),
        Err(ScheduleError::CannotLinkAVertexToItself(_))
    ));
    assert!(matches!(
        builder.link_to(&mark, &stranger, None),
        Err(ScheduleError::UnknownScheduleVertex(_))
    ));
    assert!(matches!(
        builder.add_synchronization_end(&stranger),
        Err(ScheduleError::UnknownScheduleVertex(_))
    ));

    let insert = builder.add_insert_point();
    assert!(matches!(
        builder.insert_in(&insert, mark.clone()),
        Err(ScheduleError::CannotInsertExistingVertex(_))
    ));
}

#[test]
fn synchronization_block_wraps_actions() {
    let mut builder = FixedScheduleBuilder::new();
    let sync_start = builder
        .add_synchronization_start([ScheduleVariable::new("lock")])
        .expect("sync start");
    let action = builder.add_executing_action(ScheduleElementId::from("work"));
    let sync_end = builder
        .add_synchronization_end(&sync_start)
        .expect("sync end");
    builder.link_from_start(&sync_start, None).expect("link");
    builder.link_to(&sync_start, &action, None).expect("link");
    builder.link_to(&action, &sync_end, None).expect("link");
    builder.link_to_end(&sync_end, None).expect("link");

    let schedule = builder.build().expect("build");
    let store = InMemoryScheduleStore::new();
    assert!(ScheduleVerifier::new(&store).failures(&ScheduleId::from("s"), &schedule).is_empty());
    assert_eq!(
        sync_end.kind(),
        &VertexKind::SynchronizationEnd {
            start: sync_start.index()
        }
    );
}

#[test]
fn cyclic_graph_visits_each_vertex_once() {
    let vertices = vec![
        ScheduleVertex::start(0),
        ScheduleVertex::end(1),
        ScheduleVertex::mark_history(2),
        ScheduleVertex::mark_history(3),
    ];
    let edges = vec![
        ScheduleEdge::new(0, 2, None),
        ScheduleEdge::new(2, 3, None),
        ScheduleEdge::new(3, 2, None),
        ScheduleEdge::new(3, 1, None),
    ];
    let schedule = Schedule::new(vertices, edges, 0, 1).expect("schedule");

    let mut seen = Vec::new();
    schedule
        .traverse_all_schedule_vertices(schedule.start(), TraversalDirection::Outbound, |v, _| {
            seen.push(v.index());
            true
        })
        .expect("traverse");
    assert_eq!(seen.len(), 4);
    assert_eq!(seen.iter().collect::<BTreeSet<_>>().len(), 4);
}

#[test]
fn serialized_schedule_keeps_traversal_order() {
    let schedule = chain_schedule(&["a", "b", "c"]);
    let json = serde_json::to_string(&schedule).expect("serialize");
    let back: Schedule = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.traversal_order(), schedule.traversal_order());
}

#[test]
fn direct_back_reference_is_reported() {
    let mut store = InMemoryScheduleStore::new();
    store.insert(ScheduleId::from("child"), sub_schedule_calling("root"));

    let root = sub_schedule_calling("child");
    let failures = ScheduleVerifier::new(&store).failures(&ScheduleId::from("root"), &root);
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].0,
        ScheduleIntegrityFailure::SubScheduleLinksBackToParentSchedule
    );
    assert_eq!(failures[0].1.sub_schedule_id(), Some(&ScheduleId::from("child")));
}

#[test]
fn nested_back_reference_is_reported_on_the_referencing_vertex() {
    let mut store = InMemoryScheduleStore::new();
    store.insert(ScheduleId::from("child"), sub_schedule_calling("grandchild"));
    store.insert(ScheduleId::from("grandchild"), sub_schedule_calling("root"));

    let root = sub_schedule_calling("child");
    let failures = ScheduleVerifier::new(&store).failures(&ScheduleId::from("root"), &root);
    assert_eq!(
        failures
            .iter()
            .map(|(failure, _)| *failure)
            .collect::<Vec<_>>(),
        vec![ScheduleIntegrityFailure::SubScheduleLinksBackToParentSchedule]
    );
}

#[test]
fn unknown_sub_schedule_is_reported() {
    let store = InMemoryScheduleStore::new();
    let root = sub_schedule_calling("missing");
    let failures = ScheduleVerifier::new(&store).failures(&ScheduleId::from("root"), &root);
    assert_eq!(failures[0].0, ScheduleIntegrityFailure::UnknownSubSchedule);
}

#[test]
fn sqlite_store_feeds_the_verifier() {
    let tmp = tempdir().expect("tempdir");
    let store = SqliteScheduleStore::open(&tmp.path().join("schedules.db")).expect("open");
    let child = store
        .add(&sub_schedule_calling("root"), "child", "", "")
        .expect("add");

    let root = sub_schedule_calling(child.id.as_str());
    let failures = ScheduleVerifier::new(&store).failures(&ScheduleId::from("root"), &root);
    assert_eq!(
        failures[0].0,
        ScheduleIntegrityFailure::SubScheduleLinksBackToParentSchedule
    );
}

#[test]
fn template_insert_points_become_extension_points() {
    let mut template_builder = FixedScheduleBuilder::new();
    let insert = template_builder.add_insert_point_with_count(2).expect("insert");
    template_builder.link_from_start(&insert, None).expect("link");
    template_builder.link_to_end(&insert, None).expect("link");
    let template = template_builder.build().expect("build");

    let mut builder = FixedScheduleBuilder::from_template(&template);
    let point = template.insert_points()[0].clone();
    let action = ScheduleVertex::executing_action(builder.next_index(), ScheduleElementId::from("x"));
    let insertion = builder
        .insert_in(&point, action)
        .expect("insert")
        .expect("budget left");
    assert_eq!(
        insertion.before.as_ref().and_then(|v| v.remaining_inserts()),
        Some(Some(1))
    );

    let schedule = builder.build().expect("build");
    let store = InMemoryScheduleStore::new();
    assert!(ScheduleVerifier::new(&store).failures(&ScheduleId::from("t"), &schedule).is_empty());
}
