// Copyright 2021-2024 Fastly, Inc.

use log::*;

use crate::snapshot::{MetricKind, Snapshot, METRICS};
use crate::util::{round_to_places, InvalidState};

/// Number of decimal places rates are rounded to.
pub const RATE_PRECISION: i32 = 3;

/// Shortest window between two statistics dumps that a rate is computed over.
pub const MIN_TIME_WINDOW_SECS: f64 = 1.0;

/// How monotonic counters are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Per-second rate since the previous statistics dump
    Rate,

    /// Raw increase since the previous statistics dump
    Delta,

    /// Current counter values, without consulting the previous statistics dump
    Absolute,
}

/// A reported value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Point-in-time value, reported as is.
    Gauge(u64),

    /// Per-second rate, already rounded.
    Rate(f64),

    /// Increase of a counter between two dumps.
    Delta(u64),

    /// Counter value as found in the current dump.
    Absolute(u64),
}

/// Compare one monotonic counter between two dumps.
///
/// With `elapsed_seconds` the increase is converted to a per-second rate rounded to
/// [`RATE_PRECISION`] decimal places, otherwise the raw increase is returned. A counter that went
/// backwards means the server restarted (or the counter wrapped) and no meaningful value exists.
pub fn compare(
    current: u64,
    previous: u64,
    elapsed_seconds: Option<f64>,
) -> Result<f64, InvalidState> {
    if let Some(elapsed) = elapsed_seconds {
        if elapsed < MIN_TIME_WINDOW_SECS {
            return Err(InvalidState::TimeWindowTooShort(elapsed));
        }
    }

    if current < previous {
        return Err(InvalidState::CounterRegressed { previous, current });
    }

    let delta = (current - previous) as f64;

    Ok(match elapsed_seconds {
        Some(elapsed) => round_to_places(delta / elapsed, RATE_PRECISION),
        None => delta,
    })
}

/// Whole seconds between the timestamps of two dumps. A previous dump stamped later than the
/// current one is reported separately from a window that is merely too short.
pub fn elapsed_seconds(previous: &Snapshot, current: &Snapshot) -> Result<f64, InvalidState> {
    let then = previous
        .timestamp()
        .ok_or(InvalidState::MissingTimestamp("previous"))?;
    let now = current
        .timestamp()
        .ok_or(InvalidState::MissingTimestamp("current"))?;

    let seconds = (now - then).whole_seconds() as f64;
    if seconds < 0.0 {
        return Err(InvalidState::TimestampWentBackwards(-seconds));
    }
    if seconds < MIN_TIME_WINDOW_SECS {
        return Err(InvalidState::TimeWindowTooShort(seconds));
    }

    debug!("{} seconds between statistics dumps", seconds);
    Ok(seconds)
}

/// Readings for every metric taken from the current dump alone.
pub fn absolute(current: &Snapshot) -> Vec<(&'static str, Reading)> {
    METRICS
        .iter()
        .map(|metric| {
            let value = current.metric(metric);
            let reading = match metric.kind {
                MetricKind::Gauge => Reading::Gauge(value),
                MetricKind::Counter => Reading::Absolute(value),
            };
            (metric.key, reading)
        })
        .collect()
}

/// Readings for every metric, comparing counters between `previous` and `current`.
///
/// This is all-or-nothing: a single regressed counter fails the whole batch and no partial
/// readings are returned.
pub fn compare_all(
    previous: &Snapshot,
    current: &Snapshot,
    mode: Mode,
) -> Result<Vec<(&'static str, Reading)>, InvalidState> {
    let elapsed = match mode {
        Mode::Rate => Some(elapsed_seconds(previous, current)?),
        Mode::Delta => None,
        Mode::Absolute => return Ok(absolute(current)),
    };

    METRICS
        .iter()
        .map(|metric| {
            let reading = match metric.kind {
                MetricKind::Gauge => Reading::Gauge(current.metric(metric)),
                MetricKind::Counter => {
                    let (now, then) = (current.metric(metric), previous.metric(metric));
                    let rate = compare(now, then, elapsed).map_err(|source| {
                        warn!("Cannot compare {}: {}", metric.key, source);
                        InvalidState::Metric {
                            metric: metric.key,
                            source: Box::new(source),
                        }
                    })?;
                    match elapsed {
                        Some(_) => Reading::Rate(rate),
                        None => Reading::Delta(now - then),
                    }
                }
            };
            Ok((metric.key, reading))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(time: &str, query: u64, udp4: u64) -> Snapshot {
        Snapshot::parse(format!(
            "time: {}\nserver:\n  zone-count: 7\nmod-stats:\n  server-operation:\n    query: {}\n  request-protocol:\n    udp4: {}\n",
            time, query, udp4
        ))
        .unwrap()
    }

    #[test]
    fn test_compare_rate() {
        assert_eq!(compare(1600, 1000, Some(60.0)), Ok(10.0));
        assert_eq!(compare(1001, 1000, Some(3.0)), Ok(0.333));
        assert_eq!(compare(1002, 1000, Some(3.0)), Ok(0.667));
    }

    #[test]
    fn test_compare_delta() {
        assert_eq!(compare(1600, 1000, None), Ok(600.0));
        assert_eq!(compare(1000, 1000, None), Ok(0.0));
    }

    #[test]
    fn test_compare_never_negative() {
        for (current, previous) in [(0, 0), (5, 5), (6, 5), (u64::MAX, 0)] {
            for elapsed in [None, Some(1.0), Some(60.0), Some(86400.0)] {
                assert!(compare(current, previous, elapsed).unwrap() >= 0.0);
            }
        }
    }

    #[test]
    fn test_compare_regressed() {
        for elapsed in [None, Some(1.0), Some(60.0)] {
            assert_eq!(
                compare(12, 1600, elapsed),
                Err(InvalidState::CounterRegressed {
                    previous: 1600,
                    current: 12
                })
            );
        }
    }

    #[test]
    fn test_compare_short_window() {
        for (current, previous) in [(1600, 1000), (1000, 1000), (0, 0), (12, 1600)] {
            assert_eq!(
                compare(current, previous, Some(0.0)),
                Err(InvalidState::TimeWindowTooShort(0.0))
            );
            assert_eq!(
                compare(current, previous, Some(0.5)),
                Err(InvalidState::TimeWindowTooShort(0.5))
            );
        }
    }

    #[test]
    fn test_elapsed_seconds() {
        let previous = dump("2023-05-01T10:00:00+0200", 0, 0);
        let current = dump("2023-05-01T10:01:00+0200", 0, 0);
        assert_eq!(elapsed_seconds(&previous, &current), Ok(60.0));
    }

    #[test]
    fn test_elapsed_seconds_across_offsets() {
        let previous = dump("2023-05-01T10:00:00+0200", 0, 0);
        let current = dump("2023-05-01T08:00:30+0000", 0, 0);
        assert_eq!(elapsed_seconds(&previous, &current), Ok(30.0));
    }

    #[test]
    fn test_elapsed_seconds_too_short() {
        let previous = dump("2023-05-01T10:00:00+0200", 0, 0);
        assert_eq!(
            elapsed_seconds(&previous, &previous),
            Err(InvalidState::TimeWindowTooShort(0.0))
        );

    }

    #[test]
    fn test_elapsed_seconds_backwards() {
        let earlier = dump("2023-05-01T10:00:00+0200", 0, 0);
        let later = dump("2023-05-01T10:05:00+0200", 0, 0);
        assert_eq!(
            elapsed_seconds(&later, &earlier),
            Err(InvalidState::TimestampWentBackwards(300.0))
        );
    }

    #[test]
    fn test_elapsed_seconds_missing_timestamp() {
        let stamped = dump("2023-05-01T10:00:00+0200", 0, 0);
        let bare = Snapshot::parse("server:\n  zone-count: 1\n".to_string()).unwrap();
        assert_eq!(
            elapsed_seconds(&bare, &stamped),
            Err(InvalidState::MissingTimestamp("previous"))
        );
        assert_eq!(
            elapsed_seconds(&stamped, &bare),
            Err(InvalidState::MissingTimestamp("current"))
        );
    }

    #[test]
    fn test_compare_all_rate() {
        let previous = dump("2023-05-01T10:00:00+0200", 1000, 900);
        let current = dump("2023-05-01T10:01:00+0200", 1600, 1380);
        let readings = compare_all(&previous, &current, Mode::Rate).unwrap();
        assert_eq!(
            readings,
            [
                ("zone_count", Reading::Gauge(7)),
                ("query_count", Reading::Rate(10.0)),
                ("query_count_tcp4", Reading::Rate(0.0)),
                ("query_count_tcp6", Reading::Rate(0.0)),
                ("query_count_udp4", Reading::Rate(8.0)),
                ("query_count_udp6", Reading::Rate(0.0)),
            ]
        );
    }

    #[test]
    fn test_compare_all_delta_ignores_time() {
        let previous = dump("2023-05-01T10:00:00+0200", 1000, 900);
        let current = dump("2023-05-01T10:00:00+0200", 1600, 1380);
        let readings = compare_all(&previous, &current, Mode::Delta).unwrap();
        assert_eq!(readings[1], ("query_count", Reading::Delta(600)));
        assert_eq!(readings[4], ("query_count_udp4", Reading::Delta(480)));
    }

    #[test]
    fn test_compare_all_single_regression_fails_batch() {
        let previous = dump("2023-05-01T10:00:00+0200", 1000, 900);
        let current = dump("2023-05-01T10:01:00+0200", 1600, 10);
        let err = compare_all(&previous, &current, Mode::Rate).unwrap_err();
        assert_eq!(
            err,
            InvalidState::Metric {
                metric: "query_count_udp4",
                source: Box::new(InvalidState::CounterRegressed {
                    previous: 900,
                    current: 10
                }),
            }
        );
    }

    #[test]
    fn test_compare_all_delta_exact_for_large_counters() {
        let previous = dump("2023-05-01T10:00:00+0200", 1, 0);
        let current = dump("2023-05-01T10:01:00+0200", u64::MAX, 0);
        let readings = compare_all(&previous, &current, Mode::Delta).unwrap();
        assert_eq!(readings[1], ("query_count", Reading::Delta(u64::MAX - 1)));
    }

    #[test]
    fn test_compare_all_gauge_may_shrink() {
        let previous = Snapshot::parse("server:\n  zone-count: 9\n".to_string()).unwrap();
        let current = Snapshot::parse("server:\n  zone-count: 2\n".to_string()).unwrap();
        let readings = compare_all(&previous, &current, Mode::Delta).unwrap();
        assert_eq!(readings[0], ("zone_count", Reading::Gauge(2)));
    }

    #[test]
    fn test_absolute() {
        let current = dump("2023-05-01T10:00:00+0200", 1600, 1380);
        let readings = absolute(&current);
        assert_eq!(readings[0], ("zone_count", Reading::Gauge(7)));
        assert_eq!(readings[1], ("query_count", Reading::Absolute(1600)));
        assert_eq!(readings[5], ("query_count_udp6", Reading::Absolute(0)));
    }
}
