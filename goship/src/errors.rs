//! Errors!

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// A Result returned by goship
pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// An Error/Diagnostic returned by goship
///
/// Several of these message formats are load-bearing: packaging and
/// reporting layers match on substrings, so the literal text must stay
/// stable (`invalid goos: ...`, `... is not a valid build target`,
/// `build for ... does not contain a main function`, `couldn't find main
/// file: stat ...`).
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum BuildError {
    /// Axoasset returned an error (I/O error)
    #[error(transparent)]
    #[diagnostic(transparent)]
    Asset(#[from] axoasset::AxoassetError),

    /// A flag or binary-name template failed to parse or render;
    /// the engine's own message is the contract, so it passes through
    /// untouched
    #[error(transparent)]
    Template(#[from] minijinja::Error),

    /// One of the goos/goarch/goarm/gomips lists contained a token
    /// outside the toolchain's known set
    #[error("invalid {dimension}: {token}")]
    InvalidTargetToken {
        /// which dimension the token was found in
        dimension: &'static str,
        /// the offending token, verbatim
        token: String,
    },

    /// An explicit target string couldn't be resolved into a supported
    /// os/arch combination
    #[error("{target} is not a valid build target")]
    #[diagnostic(help("targets are underscore-joined, like linux_amd64 or linux_arm_6"))]
    InvalidTarget {
        /// the full target string, verbatim
        target: String,
    },

    /// No file in the build's source directory declares a main function
    #[error("build for {binary} does not contain a main function")]
    NoMainFunction {
        /// the binary the build was for
        binary: String,
    },

    /// The configured main file doesn't exist (or couldn't be stat'd)
    #[error("couldn't find main file: stat {path}: {details}")]
    MainFileNotFound {
        /// the main selector, as configured (relative to the build dir)
        path: Utf8PathBuf,
        /// the OS-level stat error
        details: std::io::Error,
    },

    /// A `KEY=value` environment overlay entry didn't parse
    #[error("couldn't parse env entry: {line}")]
    #[diagnostic(help("environment overlays are KEY=value strings"))]
    EnvParse {
        /// the overlay entry, verbatim
        line: String,
    },

    /// The external toolchain failed to launch or exited non-zero;
    /// embeds the tool's own diagnostic output
    #[error("failed to build for {target}: {diagnostic}")]
    CompilerFailed {
        /// the target being compiled
        target: String,
        /// whatever the compiler wrote to stderr (or the launch error)
        diagnostic: String,
    },

    /// The build was cancelled (or timed out) before the compiler
    /// finished; the child process has been terminated
    #[error("build for {target} was cancelled before the compiler finished")]
    Cancelled {
        /// the target being compiled
        target: String,
    },

    /// The configured modification timestamp isn't a Unix timestamp
    #[error("couldn't parse modification timestamp {value}")]
    InvalidTimestamp {
        /// the configured value, verbatim
        value: String,
        /// the underlying parse failure
        #[source]
        details: std::num::ParseIntError,
    },

    /// Overriding the produced binary's modification time failed
    #[error("couldn't set modification time of {path}")]
    TimestampError {
        /// the produced binary
        path: Utf8PathBuf,
        /// the underlying filesystem error
        #[source]
        details: std::io::Error,
    },
}
