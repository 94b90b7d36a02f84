// Copyright 2021-2024 Fastly, Inc.

use anyhow::Result;
use log::*;
use serde::Deserialize;
use serde_yaml::Value;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::util::CheckError;

/// Whether a metric is a point-in-time value or a monotonic counter compared across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// A metric of interest: the key it is reported under and where it lives in the statistics
/// document.
#[derive(Debug, Clone, Copy)]
pub struct Metric {
    pub key: &'static str,
    pub path: &'static [&'static str],
    pub kind: MetricKind,
}

/// The metrics reported by the check, in performance data order. Monitoring system parsers rely
/// on both the key names and this ordering.
pub const METRICS: [Metric; 6] = [
    Metric {
        key: "zone_count",
        path: &["server", "zone-count"],
        kind: MetricKind::Gauge,
    },
    Metric {
        key: "query_count",
        path: &["mod-stats", "server-operation", "query"],
        kind: MetricKind::Counter,
    },
    Metric {
        key: "query_count_tcp4",
        path: &["mod-stats", "request-protocol", "tcp4"],
        kind: MetricKind::Counter,
    },
    Metric {
        key: "query_count_tcp6",
        path: &["mod-stats", "request-protocol", "tcp6"],
        kind: MetricKind::Counter,
    },
    Metric {
        key: "query_count_udp4",
        path: &["mod-stats", "request-protocol", "udp4"],
        kind: MetricKind::Counter,
    },
    Metric {
        key: "query_count_udp6",
        path: &["mod-stats", "request-protocol", "udp6"],
        kind: MetricKind::Counter,
    },
];

/// One point-in-time dump of Knot DNS server statistics.
///
/// The raw document text is kept alongside the parsed mapping so that it can be persisted
/// byte-for-byte as the comparison baseline for the next run.
#[derive(Debug, Clone)]
pub struct Snapshot {
    raw: String,
    document: Value,
}

impl Snapshot {
    /// Read and parse the statistics dump at `path`. An unreadable file and a syntactically
    /// invalid document are both reported as [`CheckError::Parse`].
    pub fn load(path: &Path) -> std::result::Result<Self, CheckError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CheckError::Parse {
            path: path.to_path_buf(),
            source: e.into(),
        })?;

        let snapshot = Self::parse(raw).map_err(|source| CheckError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded statistics dump {}", path.display());
        Ok(snapshot)
    }

    /// Parse a statistics document. Knot appends a new YAML document to the dump file on every
    /// interval when `stats-append` is enabled, in which case the last document is the current
    /// one. An empty input yields an empty snapshot where every metric reads as zero.
    pub fn parse(raw: String) -> Result<Self> {
        let mut document = Value::Null;
        for de in serde_yaml::Deserializer::from_str(&raw) {
            document = Value::deserialize(de)?;
        }
        Ok(Snapshot { raw, document })
    }

    /// The document text exactly as it was read.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Value of `metric` in this snapshot, zero if absent.
    pub fn metric(&self, metric: &Metric) -> u64 {
        lookup_metric(&self.document, metric.path)
    }

    /// The `time` field of the dump, if present and parseable.
    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        let text = self.document.get("time")?.as_str()?;
        let timestamp = parse_timestamp(text);
        if timestamp.is_none() {
            warn!("Ignoring unparseable statistics timestamp {:?}", text);
        }
        timestamp
    }
}

/// Walk `path` through the nested mappings of `document` and return the integer found there.
///
/// A missing segment, an intermediate node that is not a mapping, or a leaf that is not a
/// non-negative integer all yield zero.
pub fn lookup_metric(document: &Value, path: &[&str]) -> u64 {
    let mut node = document;
    for segment in path {
        match node.get(*segment) {
            Some(child) => node = child,
            None => return 0,
        }
    }

    match node.as_u64() {
        Some(value) => value,
        None => {
            if !node.is_null() {
                warn!(
                    "Statistics value at {} is not a counter: {:?}",
                    path.join("."),
                    node
                );
            }
            0
        }
    }
}

/// Parse a Knot statistics timestamp such as `2023-05-01T10:00:00+0200`. RFC 3339 timestamps
/// with a colon in the offset are accepted as well.
pub fn parse_timestamp(text: &str) -> Option<OffsetDateTime> {
    let knot = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
    );
    let text = text.trim();

    OffsetDateTime::parse(text, &knot)
        .or_else(|_| OffsetDateTime::parse(text, &Rfc3339))
        .ok()
}
