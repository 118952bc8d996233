//! Common Utilities
//!
//! Time helpers shared by the window aggregator and the exporters.

/// Time utilities for window bucketing and axis alignment
pub mod time {
    use chrono::{NaiveDateTime, Timelike};

    /// Truncate a timestamp to the start of its second.
    ///
    /// This is the window key used by the 1-second aggregator: every grant
    /// whose timestamp truncates to the same second belongs to the same
    /// window.
    pub fn truncate_to_second(ts: NaiveDateTime) -> NaiveDateTime {
        ts.with_nanosecond(0).unwrap_or(ts)
    }

    /// Seconds elapsed between `origin` and `ts`, with sub-second precision.
    ///
    /// Negative when `ts` precedes `origin`.
    pub fn elapsed_seconds(ts: NaiveDateTime, origin: NaiveDateTime) -> f64 {
        let delta = ts - origin;
        match delta.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            // Only reachable for spans of hundreds of thousands of years;
            // millisecond precision is plenty there.
            None => delta.num_milliseconds() as f64 / 1_000.0,
        }
    }

    /// Format a timestamp as `MM:SS.ss` for compact table columns
    pub fn format_min_sec(ts: NaiveDateTime) -> String {
        let seconds = ts.second() as f64 + ts.nanosecond() as f64 / 1e9;
        format!("{:02}:{:05.2}", ts.minute(), seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::time::*;
    use chrono::NaiveDateTime;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").unwrap()
    }

    #[test]
    fn test_truncate_to_second() {
        let t = ts("2025-01-01T00:00:00.999999");
        assert_eq!(truncate_to_second(t), ts("2025-01-01T00:00:00"));
        let t = ts("2025-01-01T12:34:56.000001");
        assert_eq!(truncate_to_second(t), ts("2025-01-01T12:34:56"));
    }

    #[test]
    fn test_elapsed_seconds() {
        let origin = ts("2025-01-01T00:00:00");
        assert_eq!(elapsed_seconds(ts("2025-01-01T00:00:01.500000"), origin), 1.5);
        assert_eq!(elapsed_seconds(origin, ts("2025-01-01T00:00:02")), -2.0);
    }

    #[test]
    fn test_format_min_sec() {
        assert_eq!(format_min_sec(ts("2025-01-01T07:03:09.250000")), "03:09.25");
        assert_eq!(format_min_sec(ts("2025-01-01T00:59:59")), "59:59.00");
    }
}
