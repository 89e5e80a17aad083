//! Sleep records and the nap/wake forecasting engine.
//! Records come from an external event store (`SleepLog`); everything the
//! core derives from them (wake windows, forecasts, stats) is recomputed on
//! demand and never stored.

pub mod format;
pub mod prediction;
pub mod stats;
pub mod wake_window;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ErrorKind;

/// Sleep starting at or after this hour (or before `NIGHT_END_HOUR`) is night sleep.
const NIGHT_START_HOUR: u32 = 19;
const NIGHT_END_HOUR: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepKind {
    Nap,
    Night,
}

impl SleepKind {
    /// Classify a sleep by the hour it started.
    pub fn classify(start: NaiveDateTime) -> Self {
        let hour = start.hour();
        if hour >= NIGHT_START_HOUR || hour < NIGHT_END_HOUR {
            SleepKind::Night
        } else {
            SleepKind::Nap
        }
    }
}

/// One recorded sleep. `end` is `None` only for records still in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepEntry {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub duration_ms: i64,
    pub kind: SleepKind,
}

impl SleepEntry {
    /// A finished sleep, classified by its start hour.
    pub fn completed(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self::with_kind(start, end, SleepKind::classify(start))
    }

    pub fn with_kind(start: NaiveDateTime, end: NaiveDateTime, kind: SleepKind) -> Self {
        Self {
            start,
            end: Some(end),
            duration_ms: (end - start).num_milliseconds(),
            kind,
        }
    }

    /// End time, falling back to `start + duration` when `end` is missing.
    pub fn effective_end(&self) -> NaiveDateTime {
        self.end
            .unwrap_or_else(|| self.start + chrono::Duration::milliseconds(self.duration_ms))
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration_ms / 60_000
    }

    /// Whether the sleep starts or ends on `date`.
    pub fn touches(&self, date: NaiveDate) -> bool {
        self.start.date() == date || self.end.map(|e| e.date() == date).unwrap_or(false)
    }
}

/// Read side of the event store consumed by the forecaster.
pub trait SleepLog {
    /// Entries that start or end on `date`, in start order.
    fn entries_on(&self, date: NaiveDate) -> Vec<SleepEntry>;

    /// Start time of the sleep currently in progress, if any.
    fn in_progress(&self) -> Option<NaiveDateTime>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SleepLogError {
    AlreadySleeping { since: NaiveDateTime },
    NotSleeping,
    InvalidRange { start: NaiveDateTime, end: NaiveDateTime },
}

impl SleepLogError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InputValidation
    }
}

impl std::fmt::Display for SleepLogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SleepLogError::AlreadySleeping { since } => {
                write!(f, "a sleep is already in progress since {since}")
            }
            SleepLogError::NotSleeping => write!(f, "no sleep in progress"),
            SleepLogError::InvalidRange { start, end } => {
                write!(f, "sleep end {end} must be after start {start}")
            }
        }
    }
}

impl std::error::Error for SleepLogError {}

/// Minimal in-memory event store.
#[derive(Debug, Default, Clone)]
pub struct InMemorySleepLog {
    entries: Vec<SleepEntry>,
    current: Option<NaiveDateTime>,
}

impl InMemorySleepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_sleep(&mut self, now: NaiveDateTime) -> Result<(), SleepLogError> {
        if let Some(since) = self.current {
            return Err(SleepLogError::AlreadySleeping { since });
        }
        self.current = Some(now);
        info!(start = %now, "sleep_started");
        Ok(())
    }

    /// Close the running sleep and record it, classified by start hour.
    pub fn stop_sleep(&mut self, now: NaiveDateTime) -> Result<SleepEntry, SleepLogError> {
        let start = self.current.take().ok_or(SleepLogError::NotSleeping)?;
        let entry = SleepEntry::completed(start, now.max(start));
        info!(
            start = %entry.start,
            minutes = entry.duration_minutes(),
            kind = ?entry.kind,
            "sleep_stopped"
        );
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Record a past sleep. `end` must be strictly after `start`.
    pub fn add_manual(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        kind: SleepKind,
    ) -> Result<SleepEntry, SleepLogError> {
        if end <= start {
            return Err(SleepLogError::InvalidRange { start, end });
        }
        let entry = SleepEntry::with_kind(start, end, kind);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    pub fn all(&self) -> &[SleepEntry] {
        &self.entries
    }
}

impl SleepLog for InMemorySleepLog {
    fn entries_on(&self, date: NaiveDate) -> Vec<SleepEntry> {
        let mut out: Vec<SleepEntry> =
            self.entries.iter().filter(|e| e.touches(date)).cloned().collect();
        out.sort_by_key(|e| e.start);
        out
    }

    fn in_progress(&self) -> Option<NaiveDateTime> {
        self.current
    }
}
