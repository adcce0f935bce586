use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use clap::{Args, Subcommand};
use relaytv_core::TimerKind;

use crate::{AppError, Result};

#[derive(Subcommand, Debug)]
pub enum TimerCommands {
    /// List scheduled timers, newest first
    List,
    /// Schedule a recording
    Add(TimerAddArgs),
    /// Remove a timer
    Delete(TimerDeleteArgs),
}

#[derive(Args, Debug)]
pub struct TimerAddArgs {
    /// Program title, also used for the recording file name
    #[arg(long)]
    pub title: String,
    /// Virtual channel number, e.g. 5.1
    #[arg(long)]
    pub channel: String,
    /// Start time: epoch milliseconds, RFC 3339, or `YYYY-MM-DD HH:MM` (UTC)
    #[arg(long)]
    pub start: String,
    /// End time, same formats as --start
    #[arg(long, conflicts_with = "minutes")]
    pub end: Option<String>,
    /// Duration in minutes, as an alternative to --end
    #[arg(long)]
    pub minutes: Option<i64>,
    /// Recurrence
    #[arg(long, default_value = "once")]
    pub kind: TimerKind,
}

impl TimerAddArgs {
    /// Start and end as epoch milliseconds.
    pub fn window_ms(&self) -> Result<(i64, i64)> {
        let start = parse_time_ms(&self.start)?;
        let end = match (&self.end, self.minutes) {
            (Some(end), _) => parse_time_ms(end)?,
            (None, Some(minutes)) if minutes > 0 => start + minutes * 60_000,
            (None, Some(_)) => {
                return Err(AppError::InvalidArgument(
                    "--minutes must be positive".to_string(),
                ))
            }
            (None, None) => {
                return Err(AppError::InvalidArgument(
                    "either --end or --minutes is required".to_string(),
                ))
            }
        };
        Ok((start, end))
    }
}

#[derive(Args, Debug)]
pub struct TimerDeleteArgs {
    pub id: i64,
}

pub fn parse_time_ms(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(ms) = value.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp_millis())
        .map_err(|_| AppError::InvalidArgument(format!("unrecognised time: {value}")))
}
