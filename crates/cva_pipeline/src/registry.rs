//! Run registry: at most one live run per calculation date.
//!
//! The duplicate check and registration are a single compare-and-set under
//! one mutex, so concurrent submissions for the same date race safely: one
//! wins, the other gets the winner's identity back in the error.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{NaiveDate, SecondsFormat, Utc};
use thiserror::Error;

/// Lifecycle state of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// Pipeline executing.
    Running,
    /// Pipeline finished, artifacts published.
    Completed,
    /// Pipeline aborted, no artifacts.
    Failed,
}

impl RunStatus {
    /// Terminal states permit resubmission for the same date.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Identity of a registered run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunHandle {
    /// Calculation date the run covers.
    pub calc_date: NaiveDate,
    /// Job name, `cva_run_<calcDate>`.
    pub name: String,
    /// Unique id, `<calcDate>@<runTimestamp>#<seq>`; also the artifact key.
    /// The registry-wide sequence number keeps ids distinct even when a
    /// terminal run is resubmitted within the timestamp's resolution.
    pub run_id: String,
}

/// A run for the date is already in flight.
#[derive(Clone, Debug, Error)]
#[error("run {name} ({run_id}) already {status} for this calculation date")]
pub struct DuplicateRunError {
    /// Existing run's job name.
    pub name: String,
    /// Existing run's id.
    pub run_id: String,
    /// Existing run's state at rejection time.
    pub status: RunStatus,
}

#[derive(Clone, Debug)]
struct RunEntry {
    handle: RunHandle,
    status: RunStatus,
}

/// Directory of runs keyed by calculation date.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<NaiveDate, RunEntry>>,
    seq: AtomicU64,
}

impl RunRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a run for the date unless a non-terminal one exists.
    ///
    /// Returns the new run's handle, already in `Running` state. A date
    /// whose previous run completed or failed may be resubmitted; the new
    /// entry replaces it.
    pub fn register_if_absent(&self, calc_date: NaiveDate) -> Result<RunHandle, DuplicateRunError> {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = runs.get(&calc_date) {
            if !existing.status.is_terminal() {
                return Err(DuplicateRunError {
                    name: existing.handle.name.clone(),
                    run_id: existing.handle.run_id.clone(),
                    status: existing.status,
                });
            }
        }

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let handle = RunHandle {
            calc_date,
            name: format!("cva_run_{calc_date}"),
            run_id: format!("{calc_date}@{timestamp}#{seq}"),
        };
        runs.insert(
            calc_date,
            RunEntry {
                handle: handle.clone(),
                status: RunStatus::Running,
            },
        );
        Ok(handle)
    }

    /// Marks the run completed.
    pub fn complete(&self, handle: &RunHandle) {
        self.transition(handle, RunStatus::Completed);
    }

    /// Marks the run failed.
    pub fn fail(&self, handle: &RunHandle) {
        self.transition(handle, RunStatus::Failed);
    }

    /// Looks up the current status of the date's run, if any.
    pub fn status(&self, calc_date: NaiveDate) -> Option<RunStatus> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs.get(&calc_date).map(|entry| entry.status)
    }

    fn transition(&self, handle: &RunHandle, status: RunStatus) {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = runs.get_mut(&handle.calc_date) {
            // A stale handle from a superseded run must not clobber the
            // current entry.
            if entry.handle.run_id == handle.run_id {
                entry.status = status;
            }
        }
    }
}
