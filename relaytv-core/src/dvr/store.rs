use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, warn};

use super::error::{StoreError, StoreResult};
use super::models::{DvrCounts, NewTimer, Recording, Timer};
use super::DvrStore;
use crate::sqlite::open_connection;

const DVR_SCHEMA: &str = include_str!("../../../sql/dvr.sql");

#[derive(Debug, Clone)]
pub struct SqliteDvrStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for SqliteDvrStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl SqliteDvrStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> StoreResult<SqliteDvrStore> {
        let path = self.path.ok_or(StoreError::MissingStore)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        Ok(SqliteDvrStore { path, flags })
    }
}

/// Timers and recordings in a single SQLite file. Each call opens its own connection.
#[derive(Debug, Clone)]
pub struct SqliteDvrStore {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteDvrStore {
    pub fn builder() -> SqliteDvrStoreBuilder {
        SqliteDvrStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        SqliteDvrStoreBuilder::new().path(path).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> StoreResult<Connection> {
        open_connection(&self.path, self.flags).map_err(|source| StoreError::OpenDatabase {
            path: self.path.clone(),
            source,
        })
    }

    pub fn initialize(&self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = self.open()?;
        conn.execute_batch(DVR_SCHEMA)?;
        Ok(())
    }

    pub fn add_timer(&self, timer: &NewTimer) -> StoreResult<i64> {
        if timer.title.trim().is_empty() {
            return Err(StoreError::InvalidTimer("title is empty".to_string()));
        }
        if timer.channel.trim().is_empty() {
            return Err(StoreError::InvalidTimer("channel is empty".to_string()));
        }
        if timer.end_ms <= timer.start_ms {
            return Err(StoreError::InvalidTimer(format!(
                "end {} is not after start {}",
                timer.end_ms, timer.start_ms
            )));
        }
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO timers (type, title, channel_num, start_time, end_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                timer.kind.as_str(),
                &timer.title,
                &timer.channel,
                timer.start_ms,
                timer.end_ms,
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_timers(&self) -> StoreResult<Vec<Timer>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT * FROM timers ORDER BY created_at DESC, id DESC")?;
        let timers = stmt
            .query_map([], Timer::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(timers)
    }

    pub fn list_recordings(&self) -> StoreResult<Vec<Recording>> {
        let conn = self.open()?;
        let mut stmt =
            conn.prepare("SELECT * FROM recordings ORDER BY start_time DESC, id DESC")?;
        let recordings = stmt
            .query_map([], Recording::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(recordings)
    }

    pub fn find_recording(&self, id: i64) -> StoreResult<Option<Recording>> {
        let conn = self.open()?;
        let recording = conn
            .query_row(
                "SELECT * FROM recordings WHERE id = ?1",
                [id],
                Recording::from_row,
            )
            .optional()?;
        Ok(recording)
    }

    /// Removes the row and its backing file. A file that is already gone is not an error.
    pub fn delete_recording(&self, id: i64) -> StoreResult<bool> {
        let Some(recording) = self.find_recording(id)? else {
            return Ok(false);
        };
        match fs::remove_file(&recording.file_path) {
            Ok(()) => debug!(
                recording_id = id,
                path = %recording.file_path,
                "recording file removed"
            ),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(
                    recording_id = id,
                    path = %recording.file_path,
                    "recording file already missing"
                );
            }
            Err(err) => return Err(err.into()),
        }
        let conn = self.open()?;
        let changed = conn.execute("DELETE FROM recordings WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    pub fn counts(&self) -> StoreResult<DvrCounts> {
        let conn = self.open()?;
        let timers = conn.query_row("SELECT COUNT(*) FROM timers", [], |row| row.get(0))?;
        let recordings = conn.query_row("SELECT COUNT(*) FROM recordings", [], |row| row.get(0))?;
        let in_progress = conn.query_row(
            "SELECT COUNT(*) FROM recordings WHERE end_time = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(DvrCounts {
            timers,
            recordings,
            in_progress,
        })
    }
}

impl DvrStore for SqliteDvrStore {
    fn due_timers(&self, now_ms: i64) -> StoreResult<Vec<Timer>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM timers WHERE start_time <= ?1 AND end_time > ?1 ORDER BY start_time, id",
        )?;
        let timers = stmt
            .query_map([now_ms], Timer::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(timers)
    }

    fn create_recording(
        &self,
        title: &str,
        channel: &str,
        start_ms: i64,
        end_ms: i64,
        path: &Path,
    ) -> StoreResult<i64> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO recordings (title, channel_name, start_time, end_time, file_path)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![title, channel, start_ms, end_ms, path.to_string_lossy()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_recording_end(&self, id: i64, end_ms: i64) -> StoreResult<bool> {
        let conn = self.open()?;
        let changed = conn.execute(
            "UPDATE recordings SET end_time = ?2 WHERE id = ?1",
            params![id, end_ms],
        )?;
        Ok(changed > 0)
    }

    fn delete_timer(&self, id: i64) -> StoreResult<bool> {
        let conn = self.open()?;
        let changed = conn.execute("DELETE FROM timers WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    fn recording_path(&self, id: i64) -> StoreResult<Option<PathBuf>> {
        let conn = self.open()?;
        let path: Option<String> = conn
            .query_row(
                "SELECT file_path FROM recordings WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path.map(PathBuf::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dvr::TimerKind;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SqliteDvrStore {
        let store = SqliteDvrStore::new(dir.path().join("dvr.sqlite")).unwrap();
        store.initialize().unwrap();
        store
    }

    #[test]
    fn add_timer_rejects_inverted_window() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let err = store
            .add_timer(&NewTimer {
                kind: TimerKind::Once,
                title: "News".into(),
                channel: "2.1".into(),
                start_ms: 10_000,
                end_ms: 10_000,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTimer(_)));
    }

    #[test]
    fn builder_requires_path() {
        let err = SqliteDvrStore::builder().build().unwrap_err();
        assert!(matches!(err, StoreError::MissingStore));
    }
}
