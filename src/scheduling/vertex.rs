use crate::scheduling::{ScheduleElementId, ScheduleId, ScheduleVariable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a schedule vertex does when execution reaches it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VertexKind {
    Start,
    End,
    /// Placeholder for later splicing. `None` means unlimited inserts.
    Insert {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remaining: Option<u32>,
    },
    ExecutingAction {
        action: ScheduleElementId,
    },
    SubSchedule {
        schedule: ScheduleId,
    },
    SynchronizationStart {
        variables: Vec<ScheduleVariable>,
    },
    /// Closes the block opened by the vertex with index `start`.
    SynchronizationEnd {
        start: usize,
    },
    MarkHistory,
}

impl VertexKind {
    pub fn name(&self) -> &'static str {
        match self {
            VertexKind::Start => "Start",
            VertexKind::End => "End",
            VertexKind::Insert { .. } => "Insert",
            VertexKind::ExecutingAction { .. } => "ExecutingAction",
            VertexKind::SubSchedule { .. } => "SubSchedule",
            VertexKind::SynchronizationStart { .. } => "SynchronizationStart",
            VertexKind::SynchronizationEnd { .. } => "SynchronizationEnd",
            VertexKind::MarkHistory => "MarkHistory",
        }
    }
}

/// A vertex of a schedule graph. Two vertices are equal when both index and kind match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleVertex {
    index: usize,
    #[serde(flatten)]
    kind: VertexKind,
}

impl ScheduleVertex {
    pub fn new(index: usize, kind: VertexKind) -> Self {
        Self { index, kind }
    }

    pub fn start(index: usize) -> Self {
        Self::new(index, VertexKind::Start)
    }

    pub fn end(index: usize) -> Self {
        Self::new(index, VertexKind::End)
    }

    pub fn insert(index: usize, remaining: Option<u32>) -> Self {
        Self::new(index, VertexKind::Insert { remaining })
    }

    pub fn executing_action(index: usize, action: ScheduleElementId) -> Self {
        Self::new(index, VertexKind::ExecutingAction { action })
    }

    pub fn sub_schedule(index: usize, schedule: ScheduleId) -> Self {
        Self::new(index, VertexKind::SubSchedule { schedule })
    }

    pub fn mark_history(index: usize) -> Self {
        Self::new(index, VertexKind::MarkHistory)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> &VertexKind {
        &self.kind
    }

    pub fn is_start(&self) -> bool {
        matches!(self.kind, VertexKind::Start)
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, VertexKind::End)
    }

    /// Remaining inserts of an insert point; `None` for every other kind.
    pub fn remaining_inserts(&self) -> Option<Option<u32>> {
        match self.kind {
            VertexKind::Insert { remaining } => Some(remaining),
            _ => None,
        }
    }

    pub fn sub_schedule_id(&self) -> Option<&ScheduleId> {
        match &self.kind {
            VertexKind::SubSchedule { schedule } => Some(schedule),
            _ => None,
        }
    }
}

impl fmt::Display for ScheduleVertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.index)
    }
}
