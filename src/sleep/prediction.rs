//! Forecast of the next nap and bedtime from today's records.
//! Every call builds a fresh `PredictionSnapshot`; nothing is cached between calls.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use super::format::{format_duration, format_timer};
use super::wake_window::{compute_wake_windows, NapConfig, ScheduleError, WakeWindowSchedule};
use super::{SleepEntry, SleepKind, SleepLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextNapStatus {
    Upcoming { in_minutes: i64 },
    Overdue { by_minutes: i64 },
    /// All of today's naps are done; none is predicted.
    NapsCompleted,
    Sleeping,
}

impl NextNapStatus {
    pub fn label(&self) -> String {
        match self {
            NextNapStatus::Upcoming { in_minutes } => format!("in {}", format_duration(*in_minutes)),
            NextNapStatus::Overdue { by_minutes } => {
                format!("overdue by {}", format_duration(*by_minutes))
            }
            NextNapStatus::NapsCompleted => "naps completed".to_string(),
            NextNapStatus::Sleeping => "sleeping".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BedtimeStatus {
    /// The configured bedtime, untouched by today's naps.
    Target,
    /// Projected from today's naps.
    Estimated,
    /// Projection already passed.
    Due,
}

impl BedtimeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BedtimeStatus::Target => "target",
            BedtimeStatus::Estimated => "estimated",
            BedtimeStatus::Due => "due now",
        }
    }
}

/// Immutable forecast returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSnapshot {
    pub next_nap_time: Option<NaiveDateTime>,
    pub next_nap_status: NextNapStatus,
    pub bedtime_time: NaiveDateTime,
    pub bedtime_status: BedtimeStatus,
    /// Naps taken today, capped at `naps_per_day`.
    pub naps_done: u32,
    /// Naps taken today, uncapped.
    pub naps_recorded: u32,
    pub naps_per_day: u32,
    pub wake_window_schedule: WakeWindowSchedule,
    pub is_currently_asleep: bool,
    pub current_wake_window_minutes: u32,
    pub minutes_awake: i64,
    /// Start of the current awake stretch; `None` while asleep.
    pub last_wake_time: Option<NaiveDateTime>,
}

impl PredictionSnapshot {
    pub fn next_nap_label(&self) -> String {
        self.next_nap_status.label()
    }

    pub fn bedtime_label(&self) -> &'static str {
        self.bedtime_status.label()
    }

    /// Awake stretch as a `"HH:MM:SS"` stopwatch.
    pub fn awake_timer(&self) -> String {
        format_timer(self.minutes_awake * 60)
    }
}

fn minutes(m: u32) -> Duration {
    Duration::minutes(i64::from(m))
}

/// Configured bedtime on `date`, rolled to the next day when it falls at
/// or before the wake time.
pub fn target_bedtime_on(config: &NapConfig, date: NaiveDate) -> NaiveDateTime {
    let bedtime = date.and_time(config.target_bedtime);
    if config.target_bedtime <= config.wake_time {
        bedtime + Duration::days(1)
    } else {
        bedtime
    }
}

/// Forecast the rest of the day.
///
/// `today` holds the day's sleep records (any order); `in_progress` is the
/// start of a sleep still running. The only failure is an invalid
/// `config`; sparse or surplus records always yield a snapshot.
pub fn predict(
    config: &NapConfig,
    today: &[SleepEntry],
    in_progress: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Result<PredictionSnapshot, ScheduleError> {
    let schedule = compute_wake_windows(config)?;
    let target_bedtime = target_bedtime_on(config, now.date());

    let mut naps: Vec<&SleepEntry> = today.iter().filter(|e| e.kind == SleepKind::Nap).collect();
    naps.sort_by_key(|e| e.start);
    let naps_recorded = naps.len() as u32;
    let naps_done = naps_recorded.min(config.naps_per_day);
    let current_window = schedule.window(naps_recorded as usize);

    if in_progress.is_some() {
        debug!(naps_recorded, "forecast_computed: asleep");
        return Ok(PredictionSnapshot {
            next_nap_time: None,
            next_nap_status: NextNapStatus::Sleeping,
            bedtime_time: target_bedtime,
            bedtime_status: BedtimeStatus::Target,
            naps_done,
            naps_recorded,
            naps_per_day: config.naps_per_day,
            wake_window_schedule: schedule,
            is_currently_asleep: true,
            current_wake_window_minutes: current_window,
            minutes_awake: 0,
            last_wake_time: None,
        });
    }

    // Never predict from a wake time that has not happened yet.
    let recorded_wake = today
        .iter()
        .filter_map(|e| e.end)
        .filter(|&end| end <= now)
        .max();
    let last_wake =
        recorded_wake.unwrap_or_else(|| now.date().and_time(config.wake_time).min(now));
    let minutes_awake = (now - last_wake).num_minutes().max(0);

    let (next_nap_time, next_nap_status) = if naps_recorded >= config.naps_per_day {
        (None, NextNapStatus::NapsCompleted)
    } else {
        let at = last_wake + minutes(current_window);
        let status = if at > now {
            NextNapStatus::Upcoming {
                in_minutes: (at - now).num_minutes(),
            }
        } else {
            NextNapStatus::Overdue {
                by_minutes: (now - at).num_minutes(),
            }
        };
        (Some(at), status)
    };

    let (bedtime_time, bedtime_status) = match naps.last() {
        // A nap-free day runs one window from the real wake-up to bed.
        None => match recorded_wake {
            Some(woke) if config.naps_per_day == 0 => {
                projected_bedtime(woke + minutes(schedule.final_window()), now)
            }
            _ => (target_bedtime, BedtimeStatus::Target),
        },
        Some(last_nap) if naps_recorded >= config.naps_per_day => {
            projected_bedtime(last_nap.effective_end() + minutes(schedule.final_window()), now)
        }
        Some(last_nap) => {
            let mut at = last_nap.effective_end();
            for i in naps_recorded..config.naps_per_day {
                at += minutes(schedule.window(i as usize)) + minutes(config.avg_nap_duration_minutes);
            }
            at += minutes(schedule.final_window());
            (at, BedtimeStatus::Estimated)
        }
    };

    let snapshot = PredictionSnapshot {
        next_nap_time,
        next_nap_status,
        bedtime_time,
        bedtime_status,
        naps_done,
        naps_recorded,
        naps_per_day: config.naps_per_day,
        wake_window_schedule: schedule,
        is_currently_asleep: false,
        current_wake_window_minutes: current_window,
        minutes_awake,
        last_wake_time: Some(last_wake),
    };
    debug!(
        naps_recorded,
        minutes_awake,
        next_nap = %snapshot.next_nap_label(),
        bedtime = %snapshot.bedtime_time,
        "forecast_computed"
    );
    Ok(snapshot)
}

fn projected_bedtime(at: NaiveDateTime, now: NaiveDateTime) -> (NaiveDateTime, BedtimeStatus) {
    let status = if at > now {
        BedtimeStatus::Estimated
    } else {
        BedtimeStatus::Due
    };
    (at, status)
}

/// `predict` fed straight from an event store.
pub fn forecast_from_log(
    config: &NapConfig,
    log: &dyn SleepLog,
    now: NaiveDateTime,
) -> Result<PredictionSnapshot, ScheduleError> {
    let today = log.entries_on(now.date());
    predict(config, &today, log.in_progress(), now)
}
