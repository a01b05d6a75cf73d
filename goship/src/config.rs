//! Build spec types (one entry of the release config's `builds` list)

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::errors::{BuildError, BuildResult};
use crate::target::expand_targets;
use crate::SortedMap;

/// The toolchain binary used when the spec doesn't name one
pub const DEFAULT_GO_BINARY: &str = "go";

/// One build: a binary compiled for a matrix of targets
///
/// Immutable once built; [`BuildSpec::with_defaults`][] returns the
/// resolved copy the engine actually runs.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct BuildSpec {
    /// Identifier of this build, used to tie artifacts back to it
    pub id: String,

    /// Binary name template (may reference version/env/target metadata)
    pub binary: String,

    /// Directory the source lives in, relative to the working directory;
    /// empty means the working directory itself
    pub dir: Utf8PathBuf,

    /// Main-entry selector: empty or "." to scan `dir` for a file with a
    /// main function, otherwise the exact file to compile
    pub main: String,

    /// Explicit target list in canonical form; when empty, the matrix is
    /// expanded from the dimension lists below
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,

    /// Operating systems to build for (GOOS)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub goos: Vec<String>,

    /// Architectures to build for (GOARCH)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub goarch: Vec<String>,

    /// ARM revisions to build for (GOARM)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub goarm: Vec<String>,

    /// MIPS float modes to build for (GOMIPS)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gomips: Vec<String>,

    /// Generic `go build` flag templates, passed through as-is
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,

    /// Assembler flag templates, each emitted under `-asmflags=`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub asmflags: Vec<String>,

    /// Compiler flag templates, each emitted under `-gcflags=`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gcflags: Vec<String>,

    /// Linker flag templates, joined under a single `-ldflags=`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ldflags: Vec<String>,

    /// `KEY=value` environment overlay applied to each compiler invocation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,

    /// Toolchain executable to invoke; defaults to `go`
    pub go_binary: String,

    /// Unix timestamp (seconds) to stamp produced binaries with for
    /// reproducible builds; empty leaves mtimes as the compiler made them
    pub mod_timestamp: String,
}

impl BuildSpec {
    /// Resolve defaults: toolchain binary, binary name, and the expanded
    /// target list (validated and deduplicated, in canonical form)
    pub fn with_defaults(mut self) -> BuildResult<Self> {
        if self.go_binary.is_empty() {
            self.go_binary = DEFAULT_GO_BINARY.to_owned();
        }
        if self.binary.is_empty() {
            self.binary = self.id.clone();
        }
        self.targets = expand_targets(&self)?
            .iter()
            .map(ToString::to_string)
            .collect();
        Ok(self)
    }
}

/// Parse `KEY=value` overlay entries into a map
///
/// If a key appears more than once the final occurrence wins.
pub fn parse_env(env: &[String]) -> BuildResult<SortedMap<String, String>> {
    let mut parsed = SortedMap::new();
    for line in env {
        let Some((key, value)) = line.split_once('=') else {
            return Err(BuildError::EnvParse {
                line: line.to_owned(),
            });
        };
        parsed.insert(key.to_owned(), value.to_owned());
    }
    Ok(parsed)
}
