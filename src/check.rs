// Copyright 2021-2024 Fastly, Inc.

use log::*;
use std::path::PathBuf;

use crate::compare::{absolute, compare_all, Mode};
use crate::report::{Report, ReporterConfig};
use crate::snapshot::Snapshot;
use crate::state::StateStore;
use crate::util::{CheckError, InvalidState};

/// Everything a single check invocation needs.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Knot statistics dump to read.
    pub statistics_file: PathBuf,

    /// Where to keep the previous dump. Defaults to the statistics dump path plus `_last`.
    pub state_file: Option<PathBuf>,

    pub mode: Mode,

    pub reporter: ReporterConfig,
}

impl CheckConfig {
    pub fn new(statistics_file: PathBuf) -> Self {
        CheckConfig {
            statistics_file,
            state_file: None,
            mode: Mode::Rate,
            reporter: ReporterConfig::default(),
        }
    }

    pub fn state_store(&self) -> StateStore {
        match &self.state_file {
            Some(path) => StateStore::at(path.clone()),
            None => StateStore::for_input(&self.statistics_file),
        }
    }
}

/// Run one check: load the current dump, compare it against the previous one and persist it as
/// the next baseline.
///
/// The state file is only ever written once the current dump has been read successfully. It is
/// left alone when the two dumps are too close together, so the older baseline is compared
/// against next time. Every other outcome, including a counter reset, a previous dump stamped in
/// the future and an unreadable state file, replaces the baseline with the current dump.
pub fn run(config: &CheckConfig) -> Result<Report, CheckError> {
    let current = Snapshot::load(&config.statistics_file)?;

    if config.mode == Mode::Absolute {
        return Ok(Report::from_readings(absolute(&current), &config.reporter));
    }

    let store = config.state_store();
    let previous = match store.load_previous() {
        Ok(Some(previous)) => previous,
        Ok(None) => {
            store.persist(&current)?;
            return Err(InvalidState::NoPreviousState(store.path().to_path_buf()).into());
        }
        Err(err) => {
            warn!("Replacing unusable state file {}", store.path().display());
            store.persist(&current)?;
            return Err(err);
        }
    };

    match compare_all(&previous, &current, config.mode) {
        Ok(readings) => {
            store.persist(&current)?;
            Ok(Report::from_readings(readings, &config.reporter))
        }
        Err(err @ InvalidState::TimeWindowTooShort(_)) => {
            info!("Keeping previous state in {}", store.path().display());
            Err(err.into())
        }
        Err(err) => {
            store.persist(&current)?;
            Err(err.into())
        }
    }
}

/// Run one check and turn any failure into the report it maps to.
pub fn check(config: &CheckConfig) -> Report {
    match run(config) {
        Ok(report) => report,
        Err(err) => {
            info!("Check did not complete: {}", err);
            Report::from(&err)
        }
    }
}
