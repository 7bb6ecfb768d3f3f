use crate::scheduling::ScheduleId;
use thiserror::Error;

/// Construction-time failures of schedules and builders.
///
/// These signal wiring mistakes by the caller. Structural problems of a
/// finished graph are reported by the verifier instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("unknown schedule vertex: {0}")]
    UnknownScheduleVertex(String),
    #[error("vertex {0} is already part of the schedule")]
    CannotInsertExistingVertex(String),
    #[error("vertex {0} is not an insert point")]
    NotAnInsertVertex(String),
    #[error("cannot link vertex {0} to itself")]
    CannotLinkAVertexToItself(String),
    #[error("the start vertex can only be linked through link_from_start")]
    CannotExplicitlyLinkStartVertex,
    #[error("the end vertex can only be linked through link_to_end")]
    CannotExplicitlyLinkEndVertex,
    #[error("a synchronization block needs at least one variable")]
    CannotCreateASynchronizationBlockWithoutVariables,
    #[error("an insert point needs room for at least one insert, got {0}")]
    InsertCountOutOfRange(u32),
    #[error("vertex index {0} leaves no room for further vertices")]
    VertexIndexOutOfRange(usize),
    #[error("invalid schedule graph: {0}")]
    InvalidScheduleGraph(String),
    #[error("unknown schedule: {0}")]
    UnknownSchedule(ScheduleId),
}
