//! Append-only JSONL provenance log, one per stack and environment.

use crate::core::state;
use crate::core::types::{ProvenanceEvent, TimestampedEvent};
use crate::error::{Result, StackError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// ISO 8601 UTC timestamp, second precision.
pub fn now_iso8601() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    iso8601_from_unix(secs)
}

fn iso8601_from_unix(secs: u64) -> String {
    let days = secs / 86400;
    let time_secs = secs % 86400;
    let (hours, minutes, seconds) = (time_secs / 3600, (time_secs % 3600) / 60, time_secs % 60);

    let mut year = 1970u64;
    let mut remaining = days;
    loop {
        let year_days = if is_leap(year) { 366 } else { 365 };
        if remaining < year_days {
            break;
        }
        remaining -= year_days;
        year += 1;
    }

    let feb = if is_leap(year) { 29 } else { 28 };
    let month_days = [31, feb, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut month = 12;
    for (i, &md) in month_days.iter().enumerate() {
        if remaining < md {
            month = i + 1;
            break;
        }
        remaining -= md;
    }

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        remaining + 1,
        hours,
        minutes,
        seconds
    )
}

fn is_leap(y: u64) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

/// Run id shared by every event of one synthesis.
pub fn generate_run_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("r-{:012x}", nanos & 0xFFFF_FFFF_FFFF)
}

/// Derive the event log path for a stack, next to its lock file.
pub fn event_log_path(state_dir: &Path, environment: &str, stack: &str) -> PathBuf {
    state::env_state_dir(state_dir, environment)
        .join(stack)
        .join("events.jsonl")
}

/// Append an event to the stack's event log.
pub fn append_event(
    state_dir: &Path,
    environment: &str,
    stack: &str,
    event: ProvenanceEvent,
) -> Result<()> {
    let path = event_log_path(state_dir, environment, stack);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| StackError::State(format!("cannot create {}: {}", parent.display(), e)))?;
    }

    let line = serde_json::to_string(&TimestampedEvent {
        ts: now_iso8601(),
        event,
    })?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| StackError::State(format!("cannot open event log {}: {}", path.display(), e)))?;
    writeln!(file, "{}", line)?;
    Ok(())
}
