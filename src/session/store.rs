//! Persistence of the selected proficiency level between runs.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use super::level::ProficiencyLevel;
use crate::error::Result;

/// Well-known file name of the saved session record
pub const SESSION_STATE_FILE: &str = "practice-session.json";

/// The single persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedLevel {
    pub current_level: ProficiencyLevel,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl PersistedLevel {
    pub fn new(level: ProficiencyLevel, saved_at: DateTime<Utc>) -> Self {
        Self {
            current_level: level,
            timestamp: saved_at.timestamp_millis(),
        }
    }

    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

/// The level a saved record restores to, or `None` if it is older than `window`.
/// Records from the future are treated as stale.
pub fn restore_level(
    record: &PersistedLevel,
    now: DateTime<Utc>,
    window: Duration,
) -> Option<ProficiencyLevel> {
    let age = now.signed_duration_since(record.saved_at()?);
    if age >= Duration::zero() && age <= window {
        Some(record.current_level)
    } else {
        None
    }
}

pub trait LevelStore: Send + Sync {
    fn load(&self) -> Result<Option<PersistedLevel>>;

    fn save(&self, record: &PersistedLevel) -> Result<()>;
}

/// JSON file under the configured data directory
pub struct FileLevelStore {
    path: PathBuf,
}

impl FileLevelStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SESSION_STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LevelStore for FileLevelStore {
    fn load(&self) -> Result<Option<PersistedLevel>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Ignoring unreadable session record {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    fn save(&self, record: &PersistedLevel) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(record)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Saved level {} to {}", record.current_level, self.path.display());
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryLevelStore {
    record: Mutex<Option<PersistedLevel>>,
    writes: Mutex<usize>,
}

impl MemoryLevelStore {
    pub fn with_record(record: PersistedLevel) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            writes: Mutex::new(0),
        }
    }

    /// Number of `save` calls so far
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn current(&self) -> Option<PersistedLevel> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LevelStore for MemoryLevelStore {
    fn load(&self) -> Result<Option<PersistedLevel>> {
        Ok(self.current())
    }

    fn save(&self, record: &PersistedLevel) -> Result<()> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = Some(*record);
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
