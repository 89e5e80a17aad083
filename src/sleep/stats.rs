//! Period summaries over recorded sleep. Entries are attributed to the day they start.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::{SleepEntry, SleepKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SleepStats {
    pub days: u32,
    pub avg_sleep_minutes_per_day: f64,
    pub avg_naps_per_day: f64,
    pub avg_night_sleeps_per_day: f64,
    pub longest_sleep_minutes: Option<i64>,
    pub sleeps_counted: usize,
}

impl SleepStats {
    /// Summarise entries starting on or after midnight `days` days before `today`.
    pub fn over_period(entries: &[SleepEntry], today: NaiveDate, days: u32) -> Self {
        let since = today - Duration::days(i64::from(days));
        let period: Vec<&SleepEntry> = entries.iter().filter(|e| e.start.date() >= since).collect();
        let per_day = |n: f64| if days > 0 { n / f64::from(days) } else { 0.0 };

        let total_minutes: i64 = period.iter().map(|e| e.duration_minutes()).sum();
        let naps = period.iter().filter(|e| e.kind == SleepKind::Nap).count();
        let nights = period.iter().filter(|e| e.kind == SleepKind::Night).count();

        Self {
            days,
            avg_sleep_minutes_per_day: per_day(total_minutes as f64),
            avg_naps_per_day: per_day(naps as f64),
            avg_night_sleeps_per_day: per_day(nights as f64),
            longest_sleep_minutes: period.iter().map(|e| e.duration_minutes()).max(),
            sleeps_counted: period.len(),
        }
    }
}

/// Total minutes slept in entries starting on `date`.
pub fn total_sleep_on(entries: &[SleepEntry], date: NaiveDate) -> i64 {
    entries
        .iter()
        .filter(|e| e.start.date() == date)
        .map(|e| e.duration_minutes())
        .sum()
}

/// Per-day totals for the `days` days ending with `today`, oldest first.
pub fn daily_sleep_totals(entries: &[SleepEntry], today: NaiveDate, days: u32) -> Vec<(NaiveDate, i64)> {
    (0..i64::from(days))
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            (date, total_sleep_on(entries, date))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleep::test_support::{at, day};

    fn entries() -> Vec<SleepEntry> {
        let yesterday = |h, m| at(h, m) - Duration::days(1);
        vec![
            SleepEntry::completed(yesterday(20, 0), at(6, 0)),
            SleepEntry::completed(at(9, 30), at(10, 30)),
            SleepEntry::completed(at(13, 0), at(14, 30)),
            SleepEntry::completed(at(9, 0) - Duration::days(30), at(10, 0) - Duration::days(30)),
        ]
    }

    #[test]
    fn weekly_summary() {
        let stats = SleepStats::over_period(&entries(), day(), 7);
        assert_eq!(stats.sleeps_counted, 3);
        assert_eq!(stats.longest_sleep_minutes, Some(600));
        assert!((stats.avg_sleep_minutes_per_day - 750.0 / 7.0).abs() < 1e-9);
        assert!((stats.avg_naps_per_day - 2.0 / 7.0).abs() < 1e-9);
        assert!((stats.avg_night_sleeps_per_day - 1.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn empty_period() {
        let stats = SleepStats::over_period(&[], day(), 0);
        assert_eq!(stats.avg_sleep_minutes_per_day, 0.0);
        assert_eq!(stats.longest_sleep_minutes, None);
    }

    #[test]
    fn daily_totals_oldest_first() {
        let totals = daily_sleep_totals(&entries(), day(), 3);
        assert_eq!(totals.len(), 3);
        assert_eq!(totals[2], (day(), 150));
        assert_eq!(totals[1].1, 600);
        assert_eq!(totals[0].1, 0);
    }
}
