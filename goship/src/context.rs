//! The run-wide context builds execute under

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::artifact::Artifacts;
use crate::SortedMap;

/// Cooperative cancellation for in-flight builds
///
/// Cheap to clone; all clones observe the same flag. Once set it stays
/// set for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Ask every in-flight build to stop; running compiler processes are
    /// terminated at the next poll
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything a release run knows before any build starts
///
/// A read-only snapshot: version-control facts, the build timestamp, and
/// the process environment captured once at construction. Builds for
/// distinct targets share this (plus the artifact registry) and nothing
/// else.
#[derive(Debug, Default)]
pub struct RunContext {
    /// The version being released (no leading v)
    pub version: String,
    /// The tag being released
    pub tag: String,
    /// Commit hash the release is built from
    pub commit: String,
    /// When that commit was made
    pub commit_date: DateTime<Utc>,
    /// When this run started
    pub date: DateTime<Utc>,
    /// Environment snapshot; templates read this, and each compiler
    /// invocation starts from it (never from the live process environment)
    pub env: SortedMap<String, String>,
    /// The shared append-only artifact registry
    pub artifacts: Artifacts,
    /// Cancellation flag shared with the caller
    pub cancel: CancelFlag,
}

impl RunContext {
    /// Build a context from the current process: environment captured
    /// now, build date set to now. Version-control facts start empty and
    /// are filled in by the caller.
    pub fn from_env() -> Self {
        Self {
            date: Utc::now(),
            env: std::env::vars().collect(),
            ..Default::default()
        }
    }
}
