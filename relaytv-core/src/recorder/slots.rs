use std::collections::HashSet;
use std::io;
use std::path::PathBuf;

use crate::relay::{ChildGuard, ProcessExit};

/// An encoder capturing one timer's window to disk.
#[derive(Debug)]
pub struct ActiveSlot {
    pub timer_id: i64,
    pub recording_id: i64,
    pub end_ms: i64,
    pub path: PathBuf,
    child: ChildGuard,
}

impl ActiveSlot {
    pub fn new(
        timer_id: i64,
        recording_id: i64,
        end_ms: i64,
        path: PathBuf,
        child: ChildGuard,
    ) -> Self {
        Self {
            timer_id,
            recording_id,
            end_ms,
            path,
            child,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        match self.child.child_mut() {
            Some(child) => child.try_wait(),
            None => Ok(Some(ProcessExit { code: None })),
        }
    }

    /// Sends graceful termination and waits for the process to exit.
    pub async fn stop(self) -> io::Result<ProcessExit> {
        self.child.finish().await
    }
}

/// Fixed-capacity table of running recordings, at most one per timer.
#[derive(Debug)]
pub struct SlotTable {
    slots: Vec<Option<ActiveSlot>>,
    stopped_timers: HashSet<i64>,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            stopped_timers: HashSet::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    pub fn is_active(&self, timer_id: i64) -> bool {
        self.iter().any(|slot| slot.timer_id == timer_id)
    }

    pub fn recording_ids(&self) -> Vec<i64> {
        self.iter().map(|slot| slot.recording_id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveSlot> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Places `slot` in the first empty position. Hands it back when the
    /// table is full or the timer already holds a slot.
    pub fn occupy(&mut self, slot: ActiveSlot) -> Result<usize, ActiveSlot> {
        if self.is_active(slot.timer_id) {
            return Err(slot);
        }
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(slot);
                Ok(index)
            }
            None => Err(slot),
        }
    }

    pub fn take_by_recording(&mut self, recording_id: i64) -> Option<ActiveSlot> {
        self.slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(active) if active.recording_id == recording_id))
            .and_then(Option::take)
    }

    /// Empties every slot whose scheduled end is at or before `now_ms`.
    pub fn take_expired(&mut self, now_ms: i64) -> Vec<ActiveSlot> {
        self.slots
            .iter_mut()
            .filter(|slot| matches!(slot, Some(active) if active.end_ms <= now_ms))
            .filter_map(Option::take)
            .collect()
    }

    /// Empties every slot whose process has already exited.
    pub fn take_exited(&mut self) -> Vec<(ActiveSlot, io::Result<ProcessExit>)> {
        let mut exited = Vec::new();
        for entry in self.slots.iter_mut() {
            let status = match entry.as_mut() {
                Some(slot) => slot.try_wait(),
                None => continue,
            };
            match status {
                Ok(None) => {}
                Ok(Some(exit)) => {
                    if let Some(slot) = entry.take() {
                        exited.push((slot, Ok(exit)));
                    }
                }
                Err(err) => {
                    if let Some(slot) = entry.take() {
                        exited.push((slot, Err(err)));
                    }
                }
            }
        }
        exited
    }

    /// Keeps a manually stopped timer from being re-armed while its window is open.
    pub fn suppress(&mut self, timer_id: i64) {
        self.stopped_timers.insert(timer_id);
    }

    pub fn is_suppressed(&self, timer_id: i64) -> bool {
        self.stopped_timers.contains(&timer_id)
    }

    /// Forgets suppressions for timers that are no longer due.
    pub fn retain_suppressed(&mut self, due: &HashSet<i64>) {
        self.stopped_timers.retain(|timer_id| due.contains(timer_id));
    }
}
