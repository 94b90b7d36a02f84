// Copyright 2021-2024 Fastly, Inc.

use anyhow::{Context, Result};
use log::*;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::snapshot::Snapshot;
use crate::util::CheckError;

/// Suffix appended to the statistics dump path to derive the state file path.
pub const STATE_FILE_SUFFIX: &str = "_last";

/// Keeps the raw statistics dump from the previous run so that the next run can diff against it.
///
/// Only a single prior snapshot is retained. The state file is not locked: concurrent checks
/// sharing a state path race and the last writer wins.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// State store at `<input>_last`, next to the statistics dump.
    pub fn for_input(input: &Path) -> Self {
        let mut path = OsString::from(input.as_os_str());
        path.push(STATE_FILE_SUFFIX);
        StateStore {
            path: PathBuf::from(path),
        }
    }

    /// State store at an explicitly configured path.
    pub fn at(path: PathBuf) -> Self {
        StateStore { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot persisted by the previous run. Returns `Ok(None)` on the first run,
    /// when no state file exists yet.
    pub fn load_previous(&self) -> std::result::Result<Option<Snapshot>, CheckError> {
        let exists = self
            .path
            .try_exists()
            .with_context(|| format!("Checking for state file {}", self.path.display()))?;
        if !exists {
            info!("No previous state at {}", self.path.display());
            return Ok(None);
        }

        Snapshot::load(&self.path).map(Some)
    }

    /// Overwrite the state file with the raw document of `snapshot`.
    pub fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        std::fs::write(&self.path, snapshot.raw())
            .with_context(|| format!("Writing state file {}", self.path.display()))?;
        debug!("Persisted state to {}", self.path.display());
        Ok(())
    }
}
