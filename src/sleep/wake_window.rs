//! Wake-window model: splits the awake part of the day into `naps + 1`
//! windows that lengthen linearly from 0.8× to 1.2× the mean.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

const MINUTES_PER_DAY: i64 = 1440;
const RAMP_START: f64 = 0.8;
const RAMP_SPAN: f64 = 0.4;

/// Per-profile nap configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NapConfig {
    pub naps_per_day: u32,
    #[serde(with = "crate::config::hhmm")]
    pub wake_time: NaiveTime,
    #[serde(with = "crate::config::hhmm")]
    pub target_bedtime: NaiveTime,
    pub avg_nap_duration_minutes: u32,
}

impl Default for NapConfig {
    fn default() -> Self {
        Self {
            naps_per_day: 2,
            wake_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
            target_bedtime: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN),
            avg_nap_duration_minutes: 90,
        }
    }
}

impl NapConfig {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.avg_nap_duration_minutes == 0 {
            return Err(ScheduleError::InvalidNapDuration);
        }
        Ok(())
    }

    /// Minutes from wake time to bedtime; a bedtime at or before the wake
    /// time is taken to fall on the next day.
    pub fn day_window_minutes(&self) -> i64 {
        let wake = i64::from(self.wake_time.num_seconds_from_midnight() / 60);
        let bed = i64::from(self.target_bedtime.num_seconds_from_midnight() / 60);
        let window = bed - wake;
        if window <= 0 {
            window + MINUTES_PER_DAY
        } else {
            window
        }
    }

    pub fn total_nap_minutes(&self) -> i64 {
        i64::from(self.naps_per_day) * i64::from(self.avg_nap_duration_minutes)
    }
}

/// Ordered wake-window lengths in minutes, one per awake interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WakeWindowSchedule {
    windows: Vec<u32>,
}

impl WakeWindowSchedule {
    pub fn windows(&self) -> &[u32] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Window `index`, clamped to the final window.
    pub fn window(&self, index: usize) -> u32 {
        let last = self.windows.len().saturating_sub(1);
        self.windows.get(index.min(last)).copied().unwrap_or(0)
    }

    /// The window between the last nap and bedtime.
    pub fn final_window(&self) -> u32 {
        self.windows.last().copied().unwrap_or(0)
    }

    pub fn total_minutes(&self) -> u32 {
        self.windows.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Average nap length must be positive.
    InvalidNapDuration,
    /// Naps fill the whole day, leaving no awake time.
    NonPositiveAwakeTime {
        day_window_minutes: i64,
        total_nap_minutes: i64,
    },
}

impl ScheduleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScheduleError::InvalidNapDuration => ErrorKind::InputValidation,
            ScheduleError::NonPositiveAwakeTime { .. } => ErrorKind::InvalidConfig,
        }
    }
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::InvalidNapDuration => {
                write!(f, "average nap duration must be greater than zero")
            }
            ScheduleError::NonPositiveAwakeTime {
                day_window_minutes,
                total_nap_minutes,
            } => write!(
                f,
                "naps ({total_nap_minutes}m) leave no awake time in a {day_window_minutes}m day"
            ),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Derive the day's wake windows from `config`.
pub fn compute_wake_windows(config: &NapConfig) -> Result<WakeWindowSchedule, ScheduleError> {
    config.validate()?;
    let day_window_minutes = config.day_window_minutes();
    let total_nap_minutes = config.total_nap_minutes();
    let total_awake = day_window_minutes - total_nap_minutes;
    if total_awake <= 0 {
        return Err(ScheduleError::NonPositiveAwakeTime {
            day_window_minutes,
            total_nap_minutes,
        });
    }

    let num_windows = config.naps_per_day as usize + 1;
    let base = total_awake as f64 / num_windows as f64;
    let windows = (0..num_windows)
        .map(|i| {
            let scale = if num_windows == 1 {
                1.0
            } else {
                RAMP_START + RAMP_SPAN * i as f64 / (num_windows - 1) as f64
            };
            (base * scale).round() as u32
        })
        .collect();
    Ok(WakeWindowSchedule { windows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(naps: u32, wake: (u32, u32), bed: (u32, u32), avg: u32) -> NapConfig {
        NapConfig {
            naps_per_day: naps,
            wake_time: NaiveTime::from_hms_opt(wake.0, wake.1, 0).unwrap(),
            target_bedtime: NaiveTime::from_hms_opt(bed.0, bed.1, 0).unwrap(),
            avg_nap_duration_minutes: avg,
        }
    }

    #[test]
    fn two_naps_fill_the_day() {
        let schedule = compute_wake_windows(&config(2, (7, 0), (20, 0), 90)).unwrap();
        assert_eq!(schedule.windows(), &[160, 200, 240]);
        assert!(schedule.windows().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(schedule.total_minutes() + 2 * 90, 13 * 60);
    }

    #[test]
    fn no_naps_gives_single_full_day_window() {
        let schedule = compute_wake_windows(&config(0, (7, 0), (19, 30), 60)).unwrap();
        assert_eq!(schedule.windows(), &[750]);
        assert_eq!(schedule.final_window(), 750);
    }

    #[test]
    fn bedtime_past_midnight_wraps() {
        let cfg = config(1, (10, 0), (0, 30), 60);
        assert_eq!(cfg.day_window_minutes(), 870);
        let schedule = compute_wake_windows(&cfg).unwrap();
        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule.total_minutes(), 810);
    }

    #[test]
    fn equal_wake_and_bed_is_a_full_day() {
        assert_eq!(config(0, (7, 0), (7, 0), 60).day_window_minutes(), 1440);
    }

    #[test]
    fn oversized_naps_are_rejected() {
        let err = compute_wake_windows(&config(3, (7, 0), (19, 0), 240)).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::NonPositiveAwakeTime {
                day_window_minutes: 720,
                total_nap_minutes: 720
            }
        );
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn zero_nap_length_is_input_error() {
        let err = compute_wake_windows(&config(2, (7, 0), (19, 0), 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputValidation);
    }

    #[test]
    fn many_naps_stay_non_decreasing_and_sized() {
        for naps in 0..8 {
            let cfg = config(naps, (6, 30), (19, 45), 30);
            let schedule = compute_wake_windows(&cfg).unwrap();
            assert_eq!(schedule.len(), naps as usize + 1);
            assert!(schedule.windows().windows(2).all(|w| w[0] <= w[1]));
            let awake = cfg.day_window_minutes() - cfg.total_nap_minutes();
            let drift = (i64::from(schedule.total_minutes()) - awake).abs();
            assert!(drift <= naps as i64 + 1, "rounding drift {drift}");
        }
    }

    #[test]
    fn window_index_is_clamped() {
        let schedule = compute_wake_windows(&config(1, (7, 0), (19, 0), 60)).unwrap();
        assert_eq!(schedule.window(99), schedule.final_window());
    }
}
