// Copyright 2021-2024 Fastly, Inc.

use std::path::PathBuf;
use thiserror::Error;

/// Business-rule violations of the comparison workflow. These are problems with the statistics
/// data itself (or its absence) rather than failures of the check, and are reported as UNKNOWN.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidState {
    #[error("No previous statistics to compare against, seeded state file {0}")]
    NoPreviousState(PathBuf),

    #[error("Counter regressed from {previous} to {current}, likely service restart")]
    CounterRegressed { previous: u64, current: u64 },

    #[error("{metric}: {source}")]
    Metric {
        metric: &'static str,
        source: Box<InvalidState>,
    },

    #[error("Time window of {0} seconds between statistics dumps is too short")]
    TimeWindowTooShort(f64),

    #[error("Statistics timestamp went backwards by {0} seconds")]
    TimestampWentBackwards(f64),

    #[error("The {0} statistics dump carries no usable timestamp")]
    MissingTimestamp(&'static str),
}

/// Every way a single check invocation can fail. The top-level dispatcher maps each kind to one
/// of the monitoring exit states.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Invalid arguments: {0}")]
    Argument(String),

    #[error("Could not parse statistics file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    InvalidState(#[from] InvalidState),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Round `value` to `places` decimal places.
pub fn round_to_places(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
