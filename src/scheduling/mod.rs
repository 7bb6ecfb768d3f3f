//! Schedule graphs: construction, traversal, verification and storage.
//!
//! A schedule is a directed graph with a single Start and a single End. Edges
//! may carry a condition that gates whether they can be followed. Schedules are
//! assembled with [`FixedScheduleBuilder`], frozen into a [`Schedule`], and
//! checked by [`ScheduleVerifier`].

pub mod builder;
pub mod document;
pub mod error;
pub mod ids;
pub mod schedule;
pub mod store;
pub mod verifier;
pub mod vertex;

pub use builder::{FixedScheduleBuilder, Insertion};
pub use document::ScheduleDocument;
pub use error::ScheduleError;
pub use ids::{ScheduleElementId, ScheduleId, ScheduleVariable};
pub use schedule::{Schedule, ScheduleEdge, TraversalDirection, Transition};
pub use store::{
    InMemoryScheduleStore, ScheduleInformation, ScheduleStorage, SqliteScheduleStore,
    schedule_digest,
};
pub use verifier::{ScheduleIntegrityFailure, ScheduleVerifier};
pub use vertex::{ScheduleVertex, VertexKind};
