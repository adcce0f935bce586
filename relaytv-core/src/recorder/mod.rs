pub mod slots;

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dvr::{DvrStore, StoreError, Timer};
use crate::relay::{ChildGuard, OutputMode, ProcessSpawner, SystemProcessSpawner};
use crate::transcode::recording_args;

pub use slots::{ActiveSlot, SlotTable};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_SLOT_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to prepare recording directory {path}: {source}")]
    Directory { path: PathBuf, source: io::Error },
    #[error("failed to spawn {program}: {source}")]
    Spawn { program: PathBuf, source: io::Error },
}

pub type RecorderResult<T> = std::result::Result<T, RecorderError>;

#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub poll_interval: Duration,
    pub capacity: usize,
    pub recordings_dir: PathBuf,
    /// Base URL of this process' own HTTP server, e.g. `http://127.0.0.1:3000`.
    pub loopback_base: String,
}

impl RecorderSettings {
    pub fn new(recordings_dir: impl Into<PathBuf>, loopback_base: impl Into<String>) -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            capacity: DEFAULT_SLOT_CAPACITY,
            recordings_dir: recordings_dir.into(),
            loopback_base: loopback_base.into(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    fn stream_url(&self, channel: &str) -> String {
        format!(
            "{}/stream/{}",
            self.loopback_base.trim_end_matches('/'),
            channel
        )
    }
}

/// Longest title, in bytes, that goes into a recording file name. Keeps the
/// name with its timestamp suffix under `NAME_MAX`.
pub const MAX_TITLE_BYTES: usize = 127;

/// Replaces path separators and spaces so a title can be used as a file name,
/// cut to [`MAX_TITLE_BYTES`] without splitting a character.
pub fn sanitize_title(title: &str) -> String {
    let mut safe = String::with_capacity(title.len().min(MAX_TITLE_BYTES));
    for c in title.chars() {
        let c = match c {
            '/' | '\\' | ' ' => '_',
            other => other,
        };
        if safe.len() + c.len_utf8() > MAX_TITLE_BYTES {
            break;
        }
        safe.push(c);
    }
    safe
}

pub fn recording_file_path(dir: &Path, title: &str, now_ms: i64) -> PathBuf {
    dir.join(format!("{}-{}.mp4", sanitize_title(title), now_ms))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub started: usize,
    pub deferred: usize,
    pub failed: usize,
    pub expired: usize,
    pub crashed: usize,
}

/// Turns due timers into encoder processes and reaps them again.
pub struct RecordingScheduler {
    store: Arc<dyn DvrStore>,
    spawner: Arc<dyn ProcessSpawner>,
    slots: Arc<Mutex<SlotTable>>,
    settings: RecorderSettings,
}

impl fmt::Debug for RecordingScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingScheduler")
            .field("settings", &self.settings)
            .field("program", &self.spawner.program())
            .finish()
    }
}

impl RecordingScheduler {
    pub fn new(
        store: Arc<dyn DvrStore>,
        settings: RecorderSettings,
        spawner: Option<Arc<dyn ProcessSpawner>>,
    ) -> Self {
        let spawner = spawner.unwrap_or_else(|| Arc::new(SystemProcessSpawner::default()));
        let slots = Arc::new(Mutex::new(SlotTable::new(settings.capacity)));
        Self {
            store,
            spawner,
            slots,
            settings,
        }
    }

    pub fn handle(&self) -> RecorderHandle {
        RecorderHandle {
            store: Arc::clone(&self.store),
            slots: Arc::clone(&self.slots),
        }
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    /// Polls until `shutdown` fires. Running recordings are left alone on exit.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            capacity = self.settings.capacity,
            "recording scheduler started"
        );
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let report = self.run_cycle(Utc::now().timestamp_millis()).await;
            if report != CycleReport::default() {
                debug!(?report, "scheduler cycle");
            }
        }
        info!("recording scheduler stopped");
    }

    /// Due, expiry and liveness scans, in that order.
    pub async fn run_cycle(&self, now_ms: i64) -> CycleReport {
        let mut report = self.scan_due(now_ms).await;
        report.expired = self.scan_expired(now_ms).await;
        report.crashed = self.scan_liveness(now_ms).await;
        report
    }

    pub async fn scan_due(&self, now_ms: i64) -> CycleReport {
        let mut report = CycleReport::default();
        let timers = match self.store.due_timers(now_ms) {
            Ok(timers) => timers,
            Err(err) => {
                error!(error = %err, "failed to load due timers");
                return report;
            }
        };

        // The slot lock is never held across store writes or spawns.
        let candidates: Vec<&Timer> = {
            let mut slots = self.slots.lock().await;
            let due: HashSet<i64> = timers.iter().map(|timer| timer.id).collect();
            slots.retain_suppressed(&due);
            let free = slots.capacity() - slots.occupied();
            let mut pending: Vec<&Timer> = timers
                .iter()
                .filter(|timer| !slots.is_active(timer.id) && !slots.is_suppressed(timer.id))
                .collect();
            if pending.len() > free {
                for timer in &pending[free..] {
                    debug!(
                        timer_id = timer.id,
                        capacity = slots.capacity(),
                        "recording slots exhausted, retrying next poll"
                    );
                }
                report.deferred = pending.len() - free;
                pending.truncate(free);
            }
            pending
        };

        for timer in candidates {
            let slot = match self.start_recording(timer, now_ms) {
                Ok(slot) => slot,
                Err(err) => {
                    error!(
                        timer_id = timer.id,
                        title = %timer.title,
                        error = %err,
                        "failed to start recording"
                    );
                    report.failed += 1;
                    continue;
                }
            };
            let (recording_id, pid, path) = (slot.recording_id, slot.pid(), slot.path.clone());
            let occupied = self.slots.lock().await.occupy(slot);
            match occupied {
                Ok(_) => {
                    info!(
                        timer_id = timer.id,
                        recording_id,
                        pid,
                        path = %path.display(),
                        "recording started"
                    );
                    report.started += 1;
                }
                Err(slot) => {
                    warn!(timer_id = timer.id, recording_id, "slot table rejected recording");
                    if let Err(err) = slot.stop().await {
                        warn!(recording_id, error = %err, "failed to reap rejected encoder");
                    }
                    self.close_recording(recording_id, now_ms);
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn start_recording(&self, timer: &Timer, now_ms: i64) -> RecorderResult<ActiveSlot> {
        let dir = &self.settings.recordings_dir;
        std::fs::create_dir_all(dir).map_err(|source| RecorderError::Directory {
            path: dir.clone(),
            source,
        })?;
        let path = recording_file_path(dir, &timer.title, now_ms);
        let recording_id =
            self.store
                .create_recording(&timer.title, &timer.channel, now_ms, 0, &path)?;

        let args = recording_args(&self.settings.stream_url(&timer.channel), &path);
        let child = match self.spawner.spawn(&args, OutputMode::Discard) {
            Ok(child) => child,
            Err(source) => {
                if let Err(err) = self.store.update_recording_end(recording_id, now_ms) {
                    warn!(
                        recording_id,
                        error = %err,
                        "failed to close recording after spawn failure"
                    );
                }
                return Err(RecorderError::Spawn {
                    program: self.spawner.program().to_path_buf(),
                    source,
                });
            }
        };
        Ok(ActiveSlot::new(
            timer.id,
            recording_id,
            timer.end_ms,
            path,
            ChildGuard::new(child),
        ))
    }

    pub async fn scan_expired(&self, now_ms: i64) -> usize {
        let expired = self.slots.lock().await.take_expired(now_ms);
        let count = expired.len();
        for slot in expired {
            let timer_id = slot.timer_id;
            let recording_id = slot.recording_id;
            match slot.stop().await {
                Ok(exit) => info!(timer_id, recording_id, %exit, "recording finished"),
                Err(err) => warn!(timer_id, recording_id, error = %err, "failed to reap encoder"),
            }
            self.close_recording(recording_id, now_ms);
            match self.store.delete_timer(timer_id) {
                Ok(true) => {}
                Ok(false) => debug!(timer_id, "timer already deleted"),
                Err(err) => error!(timer_id, error = %err, "failed to delete timer"),
            }
        }
        count
    }

    pub async fn scan_liveness(&self, now_ms: i64) -> usize {
        let exited = self.slots.lock().await.take_exited();
        let count = exited.len();
        for (slot, status) in exited {
            match status {
                Ok(exit) => warn!(
                    timer_id = slot.timer_id,
                    recording_id = slot.recording_id,
                    %exit,
                    "recording encoder exited before scheduled end"
                ),
                Err(err) => warn!(
                    timer_id = slot.timer_id,
                    recording_id = slot.recording_id,
                    error = %err,
                    "recording encoder state unknown, releasing slot"
                ),
            }
            self.close_recording(slot.recording_id, now_ms);
        }
        count
    }

    fn close_recording(&self, recording_id: i64, end_ms: i64) {
        match self.store.update_recording_end(recording_id, end_ms) {
            Ok(true) => {}
            Ok(false) => warn!(recording_id, "recording row missing when closing"),
            Err(err) => error!(recording_id, error = %err, "failed to write recording end"),
        }
    }
}

/// Read and stop access to the scheduler's slot table.
#[derive(Clone)]
pub struct RecorderHandle {
    store: Arc<dyn DvrStore>,
    slots: Arc<Mutex<SlotTable>>,
}

impl fmt::Debug for RecorderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderHandle").finish_non_exhaustive()
    }
}

impl RecorderHandle {
    /// Stops the recording if it is running. Returns false, touching no
    /// process, when no slot holds `recording_id`.
    pub async fn stop_recording(&self, recording_id: i64) -> bool {
        let slot = {
            let mut slots = self.slots.lock().await;
            let Some(slot) = slots.take_by_recording(recording_id) else {
                return false;
            };
            slots.suppress(slot.timer_id);
            slot
        };
        let timer_id = slot.timer_id;
        match slot.stop().await {
            Ok(exit) => info!(timer_id, recording_id, %exit, "recording stopped"),
            Err(err) => warn!(
                timer_id,
                recording_id,
                error = %err,
                "failed to reap stopped encoder"
            ),
        }
        let now_ms = Utc::now().timestamp_millis();
        if let Err(err) = self.store.update_recording_end(recording_id, now_ms) {
            error!(recording_id, error = %err, "failed to write recording end");
        }
        true
    }

    pub async fn active_recording_count(&self) -> usize {
        self.slots.lock().await.occupied()
    }

    pub async fn active_recording_ids(&self) -> Vec<i64> {
        self.slots.lock().await.recording_ids()
    }

    pub async fn is_recording(&self, recording_id: i64) -> bool {
        self.slots
            .lock()
            .await
            .iter()
            .any(|slot| slot.recording_id == recording_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_separators_and_spaces() {
        assert_eq!(sanitize_title("News at 6/Late\\Edition"), "News_at_6_Late_Edition");
    }

    #[test]
    fn long_titles_are_cut_on_a_char_boundary() {
        let ascii = sanitize_title(&"A".repeat(300));
        assert_eq!(ascii.len(), MAX_TITLE_BYTES);

        // Three-byte characters: 42 fit in 127 bytes, the 43rd would not.
        let wide = sanitize_title(&"\u{30c6}".repeat(100));
        assert_eq!(wide.chars().count(), 42);
        assert_eq!(wide.len(), 126);

        let path = recording_file_path(Path::new("rec"), &"A".repeat(300), 1_700_000_000_000);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.len() <= 255);
        assert!(name.ends_with("-1700000000000.mp4"));
    }

    #[test]
    fn file_path_carries_timestamp() {
        let path = recording_file_path(Path::new("recordings"), "The Show", 1_700_000_000_000);
        assert_eq!(path, Path::new("recordings/The_Show-1700000000000.mp4"));
    }

    #[test]
    fn stream_url_trims_trailing_slash() {
        let settings = RecorderSettings::new("rec", "http://127.0.0.1:3000/");
        assert_eq!(settings.stream_url("5.1"), "http://127.0.0.1:3000/stream/5.1");
    }
}
