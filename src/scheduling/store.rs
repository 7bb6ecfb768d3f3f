//! Schedule stores.
//!
//! The verifier only needs [`ScheduleStorage`]. The concrete stores add the
//! bookkeeping used by the CLI: names, descriptions and persistence.

use crate::core::error::ApolloError;
use crate::core::time;
use crate::scheduling::{Schedule, ScheduleError, ScheduleId};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Lookup of schedules by id.
pub trait ScheduleStorage: Send + Sync {
    fn contains(&self, id: &ScheduleId) -> bool;

    fn schedule(&self, id: &ScheduleId) -> Result<Schedule, ApolloError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInformation {
    pub id: ScheduleId,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Hex SHA-256 of the canonical JSON form of `schedule`.
pub fn schedule_digest(schedule: &Schedule) -> Result<String, ApolloError> {
    let bytes = serde_json::to_vec(schedule)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryScheduleStore {
    schedules: BTreeMap<ScheduleId, (ScheduleInformation, Schedule)>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `schedule` under a fresh id.
    pub fn add(
        &mut self,
        schedule: Schedule,
        name: &str,
        summary: &str,
        description: &str,
    ) -> ScheduleInformation {
        let info = ScheduleInformation {
            id: ScheduleId::new(),
            name: name.to_string(),
            summary: summary.to_string(),
            description: description.to_string(),
        };
        self.schedules
            .insert(info.id.clone(), (info.clone(), schedule));
        info
    }

    /// Stores `schedule` under `id`, replacing whatever was there.
    pub fn insert(&mut self, id: ScheduleId, schedule: Schedule) {
        let info = ScheduleInformation {
            id: id.clone(),
            name: id.to_string(),
            summary: String::new(),
            description: String::new(),
        };
        self.schedules.insert(id, (info, schedule));
    }

    pub fn insert_with_information(&mut self, info: ScheduleInformation, schedule: Schedule) {
        self.schedules.insert(info.id.clone(), (info, schedule));
    }

    /// Replaces the graph stored under `id`, keeping its information.
    pub fn update(&mut self, id: &ScheduleId, schedule: Schedule) -> Result<(), ScheduleError> {
        let entry = self
            .schedules
            .get_mut(id)
            .ok_or_else(|| ScheduleError::UnknownSchedule(id.clone()))?;
        entry.1 = schedule;
        Ok(())
    }

    pub fn remove(&mut self, id: &ScheduleId) {
        self.schedules.remove(id);
    }

    pub fn information(&self, id: &ScheduleId) -> Result<&ScheduleInformation, ScheduleError> {
        self.schedules
            .get(id)
            .map(|(info, _)| info)
            .ok_or_else(|| ScheduleError::UnknownSchedule(id.clone()))
    }

    pub fn get(&self, id: &ScheduleId) -> Option<&Schedule> {
        self.schedules.get(id).map(|(_, schedule)| schedule)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ScheduleId> {
        self.schedules.keys()
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}

impl ScheduleStorage for InMemoryScheduleStore {
    fn contains(&self, id: &ScheduleId) -> bool {
        self.schedules.contains_key(id)
    }

    fn schedule(&self, id: &ScheduleId) -> Result<Schedule, ApolloError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| ScheduleError::UnknownSchedule(id.clone()).into())
    }
}

pub const SCHEDULE_DB_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS schedules (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    summary TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    graph TEXT NOT NULL,
    graph_sha256 TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_schedules_name ON schedules(name);
";

fn connect(path: &Path) -> Result<Connection, ApolloError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    conn.execute_batch(SCHEDULE_DB_SCHEMA)?;
    Ok(conn)
}

/// A schedule store persisted in a SQLite database.
pub struct SqliteScheduleStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteScheduleStore {
    pub fn open(path: &Path) -> Result<Self, ApolloError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = connect(path)?;
        tracing::debug!(path = %path.display(), "opened schedule store");
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R, ApolloError>
    where
        F: FnOnce(&Connection) -> Result<R, ApolloError>,
    {
        let conn = self.conn.lock().map_err(|_| {
            ApolloError::ValidationError("schedule store lock poisoned".to_string())
        })?;
        f(&conn)
    }

    /// Stores `schedule` under a fresh id.
    pub fn add(
        &self,
        schedule: &Schedule,
        name: &str,
        summary: &str,
        description: &str,
    ) -> Result<ScheduleInformation, ApolloError> {
        let info = ScheduleInformation {
            id: ScheduleId::new(),
            name: name.to_string(),
            summary: summary.to_string(),
            description: description.to_string(),
        };
        self.put(&info, schedule)?;
        Ok(info)
    }

    /// Inserts or replaces the schedule stored under `info.id`.
    pub fn put(&self, info: &ScheduleInformation, schedule: &Schedule) -> Result<(), ApolloError> {
        let graph = serde_json::to_string(schedule)?;
        let digest = schedule_digest(schedule)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO schedules(id, name, summary, description, graph, graph_sha256, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    summary = excluded.summary,
                    description = excluded.description,
                    graph = excluded.graph,
                    graph_sha256 = excluded.graph_sha256,
                    updated_at = excluded.updated_at",
                params![
                    info.id.as_str(),
                    info.name,
                    info.summary,
                    info.description,
                    graph,
                    digest,
                    time::now_epoch_z()
                ],
            )?;
            Ok(())
        })
    }

    /// Replaces the graph stored under `id`, keeping its information.
    pub fn update(&self, id: &ScheduleId, schedule: &Schedule) -> Result<(), ApolloError> {
        let graph = serde_json::to_string(schedule)?;
        let digest = schedule_digest(schedule)?;
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE schedules SET graph = ?2, graph_sha256 = ?3, updated_at = ?4 WHERE id = ?1",
                params![id.as_str(), graph, digest, time::now_epoch_z()],
            )?)
        })?;
        if changed == 0 {
            return Err(ScheduleError::UnknownSchedule(id.clone()).into());
        }
        Ok(())
    }

    pub fn remove(&self, id: &ScheduleId) -> Result<(), ApolloError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM schedules WHERE id = ?1", params![id.as_str()])?;
            Ok(())
        })
    }

    pub fn information(&self, id: &ScheduleId) -> Result<ScheduleInformation, ApolloError> {
        let found = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, summary, description FROM schedules WHERE id = ?1",
                    params![id.as_str()],
                    |row| {
                        Ok(ScheduleInformation {
                            id: ScheduleId::from(row.get::<_, String>(0)?),
                            name: row.get(1)?,
                            summary: row.get(2)?,
                            description: row.get(3)?,
                        })
                    },
                )
                .optional()?)
        })?;
        found.ok_or_else(|| ScheduleError::UnknownSchedule(id.clone()).into())
    }

    pub fn ids(&self) -> Result<Vec<ScheduleId>, ApolloError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM schedules ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(ScheduleId::from(row?));
            }
            Ok(ids)
        })
    }

    /// Every stored schedule with its information, ordered by id.
    pub fn load_all(&self) -> Result<Vec<(ScheduleInformation, Schedule)>, ApolloError> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, summary, description, graph FROM schedules ORDER BY id",
            )?;
            let mapped = stmt.query_map([], |row| {
                Ok((
                    ScheduleInformation {
                        id: ScheduleId::from(row.get::<_, String>(0)?),
                        name: row.get(1)?,
                        summary: row.get(2)?,
                        description: row.get(3)?,
                    },
                    row.get::<_, String>(4)?,
                ))
            })?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            Ok(rows)
        })?;

        let mut loaded = Vec::with_capacity(rows.len());
        for (info, graph) in rows {
            let schedule: Schedule = serde_json::from_str(&graph)?;
            loaded.push((info, schedule));
        }
        Ok(loaded)
    }
}

impl ScheduleStorage for SqliteScheduleStore {
    fn contains(&self, id: &ScheduleId) -> bool {
        let found = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT 1 FROM schedules WHERE id = ?1",
                    params![id.as_str()],
                    |_| Ok(()),
                )
                .optional()?)
        });
        match found {
            Ok(row) => row.is_some(),
            Err(e) => {
                tracing::warn!(schedule = %id, "schedule lookup failed: {e}");
                false
            }
        }
    }

    fn schedule(&self, id: &ScheduleId) -> Result<Schedule, ApolloError> {
        let graph = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT graph FROM schedules WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?)
        })?;
        let graph = graph.ok_or_else(|| ScheduleError::UnknownSchedule(id.clone()))?;
        Ok(serde_json::from_str(&graph)?)
    }
}
