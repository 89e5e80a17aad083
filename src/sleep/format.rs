//! Human-readable durations for forecast labels.

/// `"2h 5m"` for an hour or more, otherwise `"45m"`. Negative input is shown as zero.
pub fn format_duration(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours > 0 {
        format!("{hours}h {rest}m")
    } else {
        format!("{rest}m")
    }
}

/// `"HH:MM:SS"` stopwatch display.
pub fn format_timer(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
