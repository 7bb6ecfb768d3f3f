//! Incremental construction of schedules.

use crate::scheduling::{
    Schedule, ScheduleEdge, ScheduleElementId, ScheduleError, ScheduleId, ScheduleVariable,
    ScheduleVertex, VertexKind,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Result of splicing a vertex into an insert point.
///
/// `before` and `after` are the fresh insert points placed on either side of the
/// inserted vertex. Both are `None` once the original insert point ran out of inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub before: Option<ScheduleVertex>,
    pub inserted: ScheduleVertex,
    pub after: Option<ScheduleVertex>,
}

/// A single-writer construction session for a [`Schedule`].
///
/// Every vertex gets the next free index. Indices are never reused within a
/// session, even after an insert point is consumed.
#[derive(Debug, Clone)]
pub struct FixedScheduleBuilder {
    vertices: Vec<ScheduleVertex>,
    edges: Vec<ScheduleEdge>,
    start: ScheduleVertex,
    end: ScheduleVertex,
    next_index: usize,
}

impl Default for FixedScheduleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedScheduleBuilder {
    pub fn new() -> Self {
        let start = ScheduleVertex::start(0);
        let end = ScheduleVertex::end(1);
        Self {
            vertices: vec![start.clone(), end.clone()],
            edges: Vec::new(),
            start,
            end,
            next_index: 2,
        }
    }

    /// Starts from a copy of `template`; its insert points become the places to extend it.
    pub fn from_template(template: &Schedule) -> Self {
        let vertices = template.vertices().to_vec();
        let next_index = vertices
            .iter()
            .map(|v| v.index().saturating_add(1))
            .max()
            .unwrap_or(0);
        Self {
            vertices,
            edges: template.edges().to_vec(),
            start: template.start().clone(),
            end: template.end().clone(),
            next_index,
        }
    }

    pub fn start(&self) -> &ScheduleVertex {
        &self.start
    }

    pub fn end(&self) -> &ScheduleVertex {
        &self.end
    }

    /// Index the next added vertex receives. Use it for vertices handed to [`Self::insert_in`].
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn contains(&self, vertex: &ScheduleVertex) -> bool {
        self.vertices.iter().any(|v| v == vertex)
    }

    fn contains_index(&self, index: usize) -> bool {
        self.vertices.iter().any(|v| v.index() == index)
    }

    fn push(&mut self, kind: VertexKind) -> ScheduleVertex {
        let vertex = ScheduleVertex::new(self.next_index, kind);
        self.next_index = self.next_index.saturating_add(1);
        self.vertices.push(vertex.clone());
        vertex
    }

    fn ensure_known(&self, vertex: &ScheduleVertex) -> Result<(), ScheduleError> {
        if self.contains(vertex) {
            Ok(())
        } else {
            Err(ScheduleError::UnknownScheduleVertex(vertex.to_string()))
        }
    }

    pub fn add_executing_action(&mut self, action: ScheduleElementId) -> ScheduleVertex {
        self.push(VertexKind::ExecutingAction { action })
    }

    pub fn add_sub_schedule(&mut self, schedule: ScheduleId) -> ScheduleVertex {
        self.push(VertexKind::SubSchedule { schedule })
    }

    pub fn add_history_marking_point(&mut self) -> ScheduleVertex {
        self.push(VertexKind::MarkHistory)
    }

    /// Adds an insert point that accepts any number of inserts.
    pub fn add_insert_point(&mut self) -> ScheduleVertex {
        self.push(VertexKind::Insert { remaining: None })
    }

    /// Adds an insert point that accepts at most `count` inserts. `count` must be at least 1.
    pub fn add_insert_point_with_count(&mut self, count: u32) -> Result<ScheduleVertex, ScheduleError> {
        if count == 0 {
            return Err(ScheduleError::InsertCountOutOfRange(count));
        }
        Ok(self.push(VertexKind::Insert {
            remaining: Some(count),
        }))
    }

    pub fn add_synchronization_start<I>(&mut self, variables: I) -> Result<ScheduleVertex, ScheduleError>
    where
        I: IntoIterator<Item = ScheduleVariable>,
    {
        let variables: Vec<_> = variables.into_iter().collect();
        if variables.is_empty() {
            return Err(ScheduleError::CannotCreateASynchronizationBlockWithoutVariables);
        }
        Ok(self.push(VertexKind::SynchronizationStart { variables }))
    }

    pub fn add_synchronization_end(
        &mut self,
        start: &ScheduleVertex,
    ) -> Result<ScheduleVertex, ScheduleError> {
        self.ensure_known(start)?;
        Ok(self.push(VertexKind::SynchronizationEnd {
            start: start.index(),
        }))
    }

    pub fn link_to(
        &mut self,
        from: &ScheduleVertex,
        to: &ScheduleVertex,
        condition: Option<ScheduleElementId>,
    ) -> Result<(), ScheduleError> {
        for vertex in [from, to] {
            self.ensure_known(vertex)?;
            if vertex == &self.start {
                return Err(ScheduleError::CannotExplicitlyLinkStartVertex);
            }
            if vertex == &self.end {
                return Err(ScheduleError::CannotExplicitlyLinkEndVertex);
            }
        }
        if from == to {
            return Err(ScheduleError::CannotLinkAVertexToItself(from.to_string()));
        }

        self.edges
            .push(ScheduleEdge::new(from.index(), to.index(), condition));
        Ok(())
    }

    pub fn link_from_start(
        &mut self,
        to: &ScheduleVertex,
        condition: Option<ScheduleElementId>,
    ) -> Result<(), ScheduleError> {
        self.ensure_known(to)?;
        if to == &self.end {
            return Err(ScheduleError::CannotExplicitlyLinkEndVertex);
        }
        if to == &self.start {
            return Err(ScheduleError::CannotLinkAVertexToItself(to.to_string()));
        }

        self.edges
            .push(ScheduleEdge::new(self.start.index(), to.index(), condition));
        Ok(())
    }

    pub fn link_to_end(
        &mut self,
        from: &ScheduleVertex,
        condition: Option<ScheduleElementId>,
    ) -> Result<(), ScheduleError> {
        self.ensure_known(from)?;
        if from == &self.start {
            return Err(ScheduleError::CannotExplicitlyLinkStartVertex);
        }
        if from == &self.end {
            return Err(ScheduleError::CannotLinkAVertexToItself(from.to_string()));
        }

        self.edges
            .push(ScheduleEdge::new(from.index(), self.end.index(), condition));
        Ok(())
    }

    /// Replaces `insert` with `vertex`, keeping every edge (and its condition)
    /// that touched the insert point.
    ///
    /// With inserts to spare, new insert points carrying the decremented budget are
    /// placed directly before and after `vertex`. An insert point with no inserts
    /// left is left untouched and `Ok(None)` is returned.
    pub fn insert_in(
        &mut self,
        insert: &ScheduleVertex,
        vertex: ScheduleVertex,
    ) -> Result<Option<Insertion>, ScheduleError> {
        self.ensure_known(insert)?;
        let remaining = insert
            .remaining_inserts()
            .ok_or_else(|| ScheduleError::NotAnInsertVertex(insert.to_string()))?;
        if self.contains_index(vertex.index()) {
            return Err(ScheduleError::CannotInsertExistingVertex(vertex.to_string()));
        }
        let Some(after_vertex) = vertex.index().checked_add(1) else {
            return Err(ScheduleError::VertexIndexOutOfRange(vertex.index()));
        };
        if remaining == Some(0) {
            return Ok(None);
        }

        self.vertices.push(vertex.clone());
        self.next_index = self.next_index.max(after_vertex);

        let left = remaining.map(|count| count - 1);
        let (before, after) = if left != Some(0) {
            let before = self.push(VertexKind::Insert { remaining: left });
            self.edges
                .push(ScheduleEdge::new(before.index(), vertex.index(), None));
            let after = self.push(VertexKind::Insert { remaining: left });
            self.edges
                .push(ScheduleEdge::new(vertex.index(), after.index(), None));
            (Some(before), Some(after))
        } else {
            (None, None)
        };

        let inbound_target = before.as_ref().unwrap_or(&vertex).index();
        let outbound_source = after.as_ref().unwrap_or(&vertex).index();
        for edge in &mut self.edges {
            if edge.target == insert.index() {
                edge.target = inbound_target;
            }
            if edge.source == insert.index() {
                edge.source = outbound_source;
            }
        }
        self.vertices.retain(|v| v != insert);

        Ok(Some(Insertion {
            before,
            inserted: vertex,
            after,
        }))
    }

    /// Splices a reference to `schedule` into `insert`. See [`Self::insert_in`].
    pub fn insert_schedule_in(
        &mut self,
        insert: &ScheduleVertex,
        schedule: ScheduleId,
    ) -> Result<Option<Insertion>, ScheduleError> {
        let vertex = ScheduleVertex::sub_schedule(self.next_index, schedule);
        self.insert_in(insert, vertex)
    }

    /// Freezes the session into a [`Schedule`].
    ///
    /// Vertices come out in breadth-first order from Start. Vertices that cannot be
    /// reached from Start are dropped, except End which is always kept.
    pub fn build(&self) -> Result<Schedule, ScheduleError> {
        let mut outbound: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for edge in &self.edges {
            outbound.entry(edge.source).or_default().push(edge.target);
        }

        let mut order = vec![self.start.index()];
        let mut kept = FxHashSet::from_iter([self.start.index()]);
        let mut queue = VecDeque::from([self.start.index()]);
        while let Some(index) = queue.pop_front() {
            for &target in outbound.get(&index).into_iter().flatten() {
                if kept.insert(target) {
                    order.push(target);
                    queue.push_back(target);
                }
            }
        }
        if kept.insert(self.end.index()) {
            order.push(self.end.index());
        }

        let by_index: FxHashMap<usize, &ScheduleVertex> =
            self.vertices.iter().map(|v| (v.index(), v)).collect();
        let vertices = order
            .iter()
            .filter_map(|index| by_index.get(index).map(|v| (*v).clone()))
            .collect();
        let edges = self
            .edges
            .iter()
            .filter(|e| kept.contains(&e.source) && kept.contains(&e.target))
            .cloned()
            .collect();

        Schedule::new(vertices, edges, self.start.index(), self.end.index())
    }
}
