//! Timing helpers for run summaries

use std::time::Duration;

/// Format a duration in human-readable form
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use corpuscount::util::time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_micros(0)), "0us");
/// assert_eq!(format_duration(Duration::from_micros(750)), "750us");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.500ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1.50m");
/// ```
pub fn format_duration(d: Duration) -> String {
    let micros = d.as_micros() as u64;

    if micros < 1000 {
        format!("{}us", micros)
    } else if micros < 1_000_000 {
        format!("{:.3}ms", micros as f64 / 1000.0)
    } else if micros < 60_000_000 {
        format!("{:.3}s", micros as f64 / 1_000_000.0)
    } else if micros < 3_600_000_000 {
        format!("{:.2}m", micros as f64 / 60_000_000.0)
    } else {
        format!("{:.2}h", micros as f64 / 3_600_000_000.0)
    }
}

/// Units per second, or 0 for an instantaneous run
pub fn calculate_rate(units: u64, duration: Duration) -> f64 {
    let seconds = duration.as_secs_f64();
    if seconds > 0.0 {
        units as f64 / seconds
    } else {
        0.0
    }
}

/// Format a rate with a K/M/G suffix
///
/// ```
/// use corpuscount::util::time::format_rate;
///
/// assert_eq!(format_rate(500.0), "500");
/// assert_eq!(format_rate(1500.0), "1.50K");
/// assert_eq!(format_rate(2_500_000.0), "2.50M");
/// ```
pub fn format_rate(rate: f64) -> String {
    if rate < 1_000.0 {
        format!("{:.0}", rate)
    } else if rate < 1_000_000.0 {
        format!("{:.2}K", rate / 1_000.0)
    } else if rate < 1_000_000_000.0 {
        format!("{:.2}M", rate / 1_000_000.0)
    } else {
        format!("{:.2}G", rate / 1_000_000_000.0)
    }
}
