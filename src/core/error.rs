use crate::communication::CommunicationError;
use crate::scheduling::ScheduleError;
use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApolloError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Schedule error: {0}")]
    ScheduleError(#[from] ScheduleError),
    #[error("Communication error: {0}")]
    CommunicationError(#[from] CommunicationError),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}
