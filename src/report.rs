// Copyright 2021-2024 Fastly, Inc.

use std::fmt;

use crate::compare::Reading;
use crate::util::CheckError;

/// Monitoring plugin exit states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Severity {
    /// Process exit code the monitoring system interprets as this state.
    pub fn exit_code(self) -> i32 {
        match self {
            Severity::Ok => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
            Severity::Unknown => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Unknown => "UNKNOWN",
        })
    }
}

/// Key of the reading that thresholds are applied to.
pub const THRESHOLD_METRIC: &str = "query_count";

/// Thresholds for escalating an otherwise healthy report. Unset thresholds never escalate, so
/// with the default configuration a successful check is always OK.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReporterConfig {
    pub warning_threshold: Option<f64>,
    pub critical_threshold: Option<f64>,
}

impl ReporterConfig {
    /// Severity of `value` against the configured thresholds.
    pub fn classify(&self, value: f64) -> Severity {
        if self.critical_threshold.map_or(false, |t| value >= t) {
            Severity::Critical
        } else if self.warning_threshold.map_or(false, |t| value >= t) {
            Severity::Warning
        } else {
            Severity::Ok
        }
    }
}

impl Reading {
    /// Numeric value of the reading, as compared against thresholds.
    pub fn value(&self) -> f64 {
        match *self {
            Reading::Gauge(v) | Reading::Absolute(v) | Reading::Delta(v) => v as f64,
            Reading::Rate(v) => v,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Reading::Gauge(v) | Reading::Absolute(v) => write!(f, "{}", v),
            // Cumulative counter unit.
            Reading::Delta(v) => write!(f, "{}c", v),
            // Whole rates keep one decimal place so they stay recognizable as rates.
            Reading::Rate(v) if v.fract() == 0.0 => write!(f, "{:.1}", v),
            Reading::Rate(v) => write!(f, "{}", v),
        }
    }
}

/// The single status line handed to the monitoring system, with its exit state.
///
/// Rendered as `<SEVERITY>: <summary>`, followed by ` | key=value ...` performance data when the
/// check produced readings.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    severity: Severity,
    summary: String,
    perfdata: Vec<(&'static str, Reading)>,
}

impl Report {
    /// Report for a completed check. Every reading is included in the performance data, in
    /// order, even when zero.
    pub fn from_readings(readings: Vec<(&'static str, Reading)>, config: &ReporterConfig) -> Self {
        let zones = readings
            .iter()
            .find_map(|(key, reading)| match reading {
                Reading::Gauge(v) if *key == "zone_count" => Some(*v),
                _ => None,
            })
            .unwrap_or(0);

        let watched = readings
            .iter()
            .find(|(key, _)| *key == THRESHOLD_METRIC)
            .map(|(_, reading)| reading.value())
            .unwrap_or(0.0);

        let severity = config.classify(watched);
        let summary = match severity {
            Severity::Ok => format!("Knot doing well, serving {} zones", zones),
            _ => format!(
                "Knot {} at {} exceeds threshold, serving {} zones",
                THRESHOLD_METRIC, watched, zones
            ),
        };

        Report {
            severity,
            summary,
            perfdata: readings,
        }
    }

    /// Report for a check that could not produce readings.
    pub fn problem(severity: Severity, summary: impl Into<String>) -> Self {
        Report {
            severity,
            summary: summary.into(),
            perfdata: Vec::new(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn exit_code(&self) -> i32 {
        self.severity.exit_code()
    }

    pub fn perfdata(&self) -> &[(&'static str, Reading)] {
        &self.perfdata
    }
}

impl From<&CheckError> for Report {
    fn from(err: &CheckError) -> Self {
        match err {
            CheckError::Argument(_) | CheckError::InvalidState(_) => {
                Report::problem(Severity::Unknown, err.to_string())
            }
            CheckError::Parse { .. } => Report::problem(
                Severity::Warning,
                format!(
                    "While executing the check the following error occurred: \"{}\"",
                    err
                ),
            ),
            CheckError::Unexpected(inner) => Report::problem(
                Severity::Warning,
                format!(
                    "While executing the check the following error occurred: \"{:#}\"",
                    inner
                ),
            ),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.summary)?;
        if !self.perfdata.is_empty() {
            f.write_str(" |")?;
            for (key, reading) in &self.perfdata {
                write!(f, " {}={}", key, reading)?;
            }
        }
        Ok(())
    }
}
