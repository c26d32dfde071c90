use chrono::{DateTime, SubsecRound, Utc};

/// Parses an RFC 3339 API timestamp, dropping any fractional seconds.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc).trunc_subsecs(0))
}

/// Whole seconds elapsed between two API timestamps.
///
/// Returns `None` if either timestamp is malformed or the job finished
/// before it started.
#[allow(clippy::cast_precision_loss)]
pub fn elapsed_seconds(started_at: &str, finished_at: &str) -> Option<f64> {
    let start = parse_timestamp(started_at).ok()?;
    let finish = parse_timestamp(finished_at).ok()?;
    let seconds = (finish - start).num_seconds();
    (seconds >= 0).then_some(seconds as f64)
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let ts = parse_timestamp("2024-03-01T10:15:30Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:15:30+00:00");
    }

    #[test]
    fn truncates_fractional_seconds() {
        let ts = parse_timestamp("2024-03-01T10:15:30.987Z").unwrap();
        assert_eq!(ts, parse_timestamp("2024-03-01T10:15:30Z").unwrap());
    }

    #[test]
    fn elapsed_ignores_subsecond_components() {
        // 10:00:00.900 -> 10:01:00.100 is 59.2s real time, 60s after truncation
        let elapsed = elapsed_seconds("2024-03-01T10:00:00.900Z", "2024-03-01T10:01:00.100Z");
        assert_eq!(elapsed, Some(60.0));
    }

    #[test]
    fn elapsed_handles_offsets() {
        let elapsed = elapsed_seconds("2024-03-01T10:00:00+02:00", "2024-03-01T08:05:00Z");
        assert_eq!(elapsed, Some(300.0));
    }

    #[test]
    fn malformed_timestamp_yields_none() {
        assert_eq!(elapsed_seconds("yesterday", "2024-03-01T10:00:00Z"), None);
    }

    #[test]
    fn negative_duration_yields_none() {
        assert_eq!(
            elapsed_seconds("2024-03-01T10:00:10Z", "2024-03-01T10:00:00Z"),
            None
        );
    }
}
