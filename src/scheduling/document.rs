//! On-disk JSON form of a schedule together with its descriptive information.

use crate::core::error::ApolloError;
use crate::scheduling::{Schedule, ScheduleInformation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// `{ "id": .., "name": .., "summary": .., "description": .., "schedule": {..} }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDocument {
    #[serde(flatten)]
    pub information: ScheduleInformation,
    pub schedule: Schedule,
}

impl ScheduleDocument {
    pub fn load(path: &Path) -> Result<Self, ApolloError> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            ApolloError::ValidationError(format!(
                "{} is not a schedule document: {e}",
                path.display()
            ))
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ApolloError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
