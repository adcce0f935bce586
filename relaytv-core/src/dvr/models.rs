use std::fmt;
use std::str::FromStr;

use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    #[default]
    Once,
    Daily,
    Weekly,
}

impl TimerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::Once => "once",
            TimerKind::Daily => "daily",
            TimerKind::Weekly => "weekly",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(TimerKind::Once),
            "daily" => Ok(TimerKind::Daily),
            "weekly" => Ok(TimerKind::Weekly),
            other => Err(format!("unknown timer type: {other}")),
        }
    }
}

/// A persisted request to record `channel` between `start_ms` and `end_ms`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timer {
    pub id: i64,
    pub kind: TimerKind,
    pub title: String,
    pub channel: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub created_at_ms: i64,
}

impl Timer {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: Option<String> = row.get("type")?;
        Ok(Self {
            id: row.get("id")?,
            kind: kind
                .as_deref()
                .and_then(|value| value.parse().ok())
                .unwrap_or_default(),
            title: row.get("title")?,
            channel: row.get("channel_num")?,
            start_ms: row.get("start_time")?,
            end_ms: row.get("end_time")?,
            created_at_ms: row.get("created_at")?,
        })
    }

    /// True while `now_ms` falls inside `[start_ms, end_ms)`.
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.start_ms <= now_ms && self.end_ms > now_ms
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTimer {
    #[serde(default, rename = "type")]
    pub kind: TimerKind,
    pub title: String,
    #[serde(alias = "channel_num")]
    pub channel: String,
    #[serde(alias = "start_time")]
    pub start_ms: i64,
    #[serde(alias = "end_time")]
    pub end_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recording {
    pub id: i64,
    pub title: String,
    pub channel: String,
    pub start_ms: i64,
    /// Zero while the capture is still running.
    pub end_ms: i64,
    pub file_path: String,
}

impl Recording {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            channel: row.get("channel_name")?,
            start_ms: row.get("start_time")?,
            end_ms: row.get("end_time")?,
            file_path: row.get("file_path")?,
        })
    }

    pub fn in_progress(&self) -> bool {
        self.end_ms == 0
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DvrCounts {
    pub timers: i64,
    pub recordings: i64,
    pub in_progress: i64,
}
