//! Identifiers used by schedules.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identity of a stored schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(String);

impl ScheduleId {
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScheduleId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ScheduleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ScheduleId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an action or condition referenced from a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleElementId(String);

impl ScheduleElementId {
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScheduleElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ScheduleElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ScheduleElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ScheduleElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named variable shared between schedules and guarded by synchronization blocks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleVariable(String);

impl ScheduleVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScheduleVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(ScheduleId::new(), ScheduleId::new());
        assert_ne!(ScheduleElementId::new(), ScheduleElementId::new());
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = ScheduleId::from("nightly");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"nightly\"");
        let back: ScheduleId = serde_json::from_str("\"nightly\"").unwrap();
        assert_eq!(back, id);
    }
}
