//! The frozen schedule graph.
//!
//! Vertices live in an arena (`Vec`) and are addressed internally by slot.
//! Edges refer to vertex *indices*, which are stable across builds and
//! serialization, while slots are private to one `Schedule` value.

use crate::scheduling::{ScheduleElementId, ScheduleError, ScheduleVertex, VertexKind};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A directed edge between two vertex indices, optionally gated by a condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleEdge {
    pub source: usize,
    pub target: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ScheduleElementId>,
}

impl ScheduleEdge {
    pub fn new(source: usize, target: usize, condition: Option<ScheduleElementId>) -> Self {
        Self {
            source,
            target,
            condition,
        }
    }
}

/// Which edges a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalDirection {
    #[default]
    Outbound,
    Inbound,
}

/// A step that can be taken from a vertex: the edge condition and the vertex on the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<'a> {
    pub condition: Option<&'a ScheduleElementId>,
    pub vertex: &'a ScheduleVertex,
}

/// Serialized form: vertex list, edges by vertex index, start and end indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScheduleParts {
    vertices: Vec<ScheduleVertex>,
    edges: Vec<ScheduleEdge>,
    start: usize,
    end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScheduleParts", into = "ScheduleParts")]
pub struct Schedule {
    vertices: Vec<ScheduleVertex>,
    edges: Vec<ScheduleEdge>,
    slots: FxHashMap<usize, usize>,
    // Edge positions per slot, in edge order.
    outbound: Vec<Vec<usize>>,
    inbound: Vec<Vec<usize>>,
    start: usize,
    end: usize,
}

impl Schedule {
    /// Assembles a schedule from raw parts.
    ///
    /// Only referential integrity is checked here: every index must be unique and
    /// every edge, `start` and `end` must name a vertex in `vertices`. A graph that
    /// is structurally broken (cycles, orphans, extra edges) is still accepted so
    /// that [`crate::scheduling::ScheduleVerifier`] can report on it.
    pub fn new(
        vertices: Vec<ScheduleVertex>,
        edges: Vec<ScheduleEdge>,
        start: usize,
        end: usize,
    ) -> Result<Self, ScheduleError> {
        let mut slots = FxHashMap::default();
        for (slot, vertex) in vertices.iter().enumerate() {
            if slots.insert(vertex.index(), slot).is_some() {
                return Err(ScheduleError::InvalidScheduleGraph(format!(
                    "vertex index {} is used more than once",
                    vertex.index()
                )));
            }
        }

        let start_slot = *slots.get(&start).ok_or_else(|| {
            ScheduleError::InvalidScheduleGraph(format!("start vertex {start} is not in the graph"))
        })?;
        let end_slot = *slots.get(&end).ok_or_else(|| {
            ScheduleError::InvalidScheduleGraph(format!("end vertex {end} is not in the graph"))
        })?;
        if !matches!(vertices[start_slot].kind(), VertexKind::Start) {
            return Err(ScheduleError::InvalidScheduleGraph(format!(
                "vertex {} cannot act as the start vertex",
                vertices[start_slot]
            )));
        }
        if !matches!(vertices[end_slot].kind(), VertexKind::End) {
            return Err(ScheduleError::InvalidScheduleGraph(format!(
                "vertex {} cannot act as the end vertex",
                vertices[end_slot]
            )));
        }

        let mut outbound = vec![Vec::new(); vertices.len()];
        let mut inbound = vec![Vec::new(); vertices.len()];
        for (position, edge) in edges.iter().enumerate() {
            let source = *slots.get(&edge.source).ok_or_else(|| {
                ScheduleError::InvalidScheduleGraph(format!(
                    "edge source {} is not in the graph",
                    edge.source
                ))
            })?;
            let target = *slots.get(&edge.target).ok_or_else(|| {
                ScheduleError::InvalidScheduleGraph(format!(
                    "edge target {} is not in the graph",
                    edge.target
                ))
            })?;
            outbound[source].push(position);
            inbound[target].push(position);
        }

        Ok(Self {
            vertices,
            edges,
            slots,
            outbound,
            inbound,
            start: start_slot,
            end: end_slot,
        })
    }

    pub fn start(&self) -> &ScheduleVertex {
        &self.vertices[self.start]
    }

    pub fn end(&self) -> &ScheduleVertex {
        &self.vertices[self.end]
    }

    /// All vertices in the order they were handed to the schedule.
    pub fn vertices(&self) -> &[ScheduleVertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[ScheduleEdge] {
        &self.edges
    }

    pub fn vertex(&self, index: usize) -> Option<&ScheduleVertex> {
        self.slots.get(&index).map(|slot| &self.vertices[*slot])
    }

    pub fn contains(&self, vertex: &ScheduleVertex) -> bool {
        self.vertex(vertex.index()) == Some(vertex)
    }

    fn slot_of(&self, vertex: &ScheduleVertex) -> Result<usize, ScheduleError> {
        match self.slots.get(&vertex.index()) {
            Some(slot) if &self.vertices[*slot] == vertex => Ok(*slot),
            _ => Err(ScheduleError::UnknownScheduleVertex(vertex.to_string())),
        }
    }

    pub fn number_of_inbound_connections(
        &self,
        vertex: &ScheduleVertex,
    ) -> Result<usize, ScheduleError> {
        Ok(self.inbound[self.slot_of(vertex)?].len())
    }

    pub fn number_of_outbound_connections(
        &self,
        vertex: &ScheduleVertex,
    ) -> Result<usize, ScheduleError> {
        Ok(self.outbound[self.slot_of(vertex)?].len())
    }

    pub fn outbound_edges(&self, vertex: &ScheduleVertex) -> Result<Vec<&ScheduleEdge>, ScheduleError> {
        let slot = self.slot_of(vertex)?;
        Ok(self.outbound[slot].iter().map(|e| &self.edges[*e]).collect())
    }

    pub fn inbound_edges(&self, vertex: &ScheduleVertex) -> Result<Vec<&ScheduleEdge>, ScheduleError> {
        let slot = self.slot_of(vertex)?;
        Ok(self.inbound[slot].iter().map(|e| &self.edges[*e]).collect())
    }

    /// Insert points of the schedule, in vertex order.
    pub fn insert_points(&self) -> Vec<&ScheduleVertex> {
        self.vertices
            .iter()
            .filter(|v| matches!(v.kind(), VertexKind::Insert { .. }))
            .collect()
    }

    // (condition, slot on the far side) for every edge leaving `slot` in `direction`.
    fn neighbours(
        &self,
        slot: usize,
        direction: TraversalDirection,
    ) -> Vec<(Option<&ScheduleElementId>, usize)> {
        let positions = match direction {
            TraversalDirection::Outbound => &self.outbound[slot],
            TraversalDirection::Inbound => &self.inbound[slot],
        };
        positions
            .iter()
            .map(|position| {
                let edge = &self.edges[*position];
                let far_end = match direction {
                    TraversalDirection::Outbound => edge.target,
                    TraversalDirection::Inbound => edge.source,
                };
                (edge.condition.as_ref(), self.slots[&far_end])
            })
            .collect()
    }

    fn transitions<'a>(&'a self, neighbours: &[(Option<&'a ScheduleElementId>, usize)]) -> Vec<Transition<'a>> {
        neighbours
            .iter()
            .map(|(condition, slot)| Transition {
                condition: *condition,
                vertex: &self.vertices[*slot],
            })
            .collect()
    }

    /// Depth-first walk from `start`, calling `visitor` once for every vertex reached.
    ///
    /// The visitor receives the vertex and the transitions leaving it in `direction`.
    /// Returning `false` stops the walk from descending past that vertex; other
    /// branches still run. Each vertex is visited at most once, so cycles terminate.
    pub fn traverse_all_schedule_vertices<F>(
        &self,
        start: &ScheduleVertex,
        direction: TraversalDirection,
        mut visitor: F,
    ) -> Result<(), ScheduleError>
    where
        F: FnMut(&ScheduleVertex, &[Transition<'_>]) -> bool,
    {
        let first = self.slot_of(start)?;
        let mut visited = vec![false; self.vertices.len()];
        let mut stack = vec![first];
        while let Some(slot) = stack.pop() {
            if visited[slot] {
                continue;
            }
            visited[slot] = true;

            let neighbours = self.neighbours(slot, direction);
            let transitions = self.transitions(&neighbours);
            if !visitor(&self.vertices[slot], &transitions) {
                continue;
            }

            // Reversed so the first edge is explored first.
            for (_, next) in neighbours.iter().rev() {
                if !visited[*next] {
                    stack.push(*next);
                }
            }
        }
        Ok(())
    }

    /// Walks one path through the schedule.
    ///
    /// `vertex_action` runs on every vertex reached and ends the walk by returning
    /// `false`. `direction_action` picks the index of the next vertex from the
    /// available transitions, or `None` to stop. Picking a vertex that is not in
    /// the schedule fails with [`ScheduleError::UnknownScheduleVertex`].
    pub fn traverse_schedule<V, D>(
        &self,
        start: &ScheduleVertex,
        direction: TraversalDirection,
        mut vertex_action: V,
        mut direction_action: D,
    ) -> Result<(), ScheduleError>
    where
        V: FnMut(&ScheduleVertex) -> bool,
        D: FnMut(&[Transition<'_>]) -> Option<usize>,
    {
        let mut current = Some(self.slot_of(start)?);
        while let Some(slot) = current {
            if !vertex_action(&self.vertices[slot]) {
                return Ok(());
            }

            let neighbours = self.neighbours(slot, direction);
            let transitions = self.transitions(&neighbours);
            current = match direction_action(&transitions) {
                Some(index) => Some(
                    *self
                        .slots
                        .get(&index)
                        .ok_or_else(|| ScheduleError::UnknownScheduleVertex(index.to_string()))?,
                ),
                None => None,
            };
        }
        Ok(())
    }

    /// Vertices in depth-first order from Start, following every edge.
    pub fn traversal_order(&self) -> Vec<&ScheduleVertex> {
        let mut order = Vec::with_capacity(self.vertices.len());
        let mut stack = vec![self.start];
        let mut visited = vec![false; self.vertices.len()];
        while let Some(slot) = stack.pop() {
            if visited[slot] {
                continue;
            }
            visited[slot] = true;
            order.push(&self.vertices[slot]);
            for (_, next) in self.neighbours(slot, TraversalDirection::Outbound).iter().rev() {
                if !visited[*next] {
                    stack.push(*next);
                }
            }
        }
        order
    }
}

impl TryFrom<ScheduleParts> for Schedule {
    type Error = ScheduleError;

    fn try_from(parts: ScheduleParts) -> Result<Self, Self::Error> {
        Schedule::new(parts.vertices, parts.edges, parts.start, parts.end)
    }
}

impl From<Schedule> for ScheduleParts {
    fn from(schedule: Schedule) -> Self {
        let start = schedule.vertices[schedule.start].index();
        let end = schedule.vertices[schedule.end].index();
        ScheduleParts {
            vertices: schedule.vertices,
            edges: schedule.edges,
            start,
            end,
        }
    }
}
