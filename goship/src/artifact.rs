//! Produced build outputs and the shared registry they land in

use std::sync::Mutex;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::SortedMap;

/// Extras key: the file extension of the produced binary ("" when none)
pub const EXTRA_EXT: &str = "Ext";
/// Extras key: the resolved binary file name, extension trimmed
pub const EXTRA_BINARY: &str = "Binary";
/// Extras key: the id of the build that produced the artifact
pub const EXTRA_ID: &str = "ID";

/// What kind of output an artifact is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ArtifactKind {
    /// A compiled executable
    Binary,
}

/// A descriptor of one successfully produced build output
///
/// Appended to the registry exactly once, never mutated after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Logical name (the rendered binary name, extension included)
    pub name: String,
    /// Where the binary landed on disk
    pub path: Utf8PathBuf,
    /// Target operating system
    pub goos: String,
    /// Target architecture
    pub goarch: String,
    /// ARM revision, empty unless goarch is arm
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub goarm: String,
    /// MIPS float mode, empty unless goarch is in the mips family
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gomips: String,
    /// What kind of output this is
    pub kind: ArtifactKind,
    /// Free-form extras for downstream packaging stages; always carries
    /// [`EXTRA_EXT`][], [`EXTRA_BINARY`][], and [`EXTRA_ID`][]
    pub extra: SortedMap<String, String>,
}

/// The append-only artifact registry shared across a whole release run
///
/// The build engine only ever appends; packaging stages (and tests) read.
/// Appends are mutually exclusive, and no ordering is guaranteed among
/// artifacts appended concurrently.
#[derive(Debug, Default)]
pub struct Artifacts {
    items: Mutex<Vec<Artifact>>,
}

impl Artifacts {
    /// Append one artifact
    pub fn add(&self, artifact: Artifact) {
        self.items
            .lock()
            .expect("artifact registry lock poisoned")
            .push(artifact);
    }

    /// Snapshot the registry contents
    pub fn list(&self) -> Vec<Artifact> {
        self.items
            .lock()
            .expect("artifact registry lock poisoned")
            .clone()
    }

    /// How many artifacts have been registered
    pub fn len(&self) -> usize {
        self.items
            .lock()
            .expect("artifact registry lock poisoned")
            .len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
