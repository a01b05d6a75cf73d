//! The cross-compilation target matrix

use std::fmt;

use itertools::Itertools;

use crate::config::BuildSpec;
use crate::errors::{BuildError, BuildResult};

/// Operating systems the toolchain can target (GOOS values)
const KNOWN_GOOS: &[&str] = &[
    "aix",
    "android",
    "darwin",
    "dragonfly",
    "freebsd",
    "illumos",
    "ios",
    "js",
    "linux",
    "netbsd",
    "openbsd",
    "plan9",
    "solaris",
    "windows",
];

/// Architectures the toolchain can target (GOARCH values)
const KNOWN_GOARCH: &[&str] = &[
    "386",
    "amd64",
    "arm",
    "arm64",
    "mips",
    "mips64",
    "mips64le",
    "mipsle",
    "ppc64",
    "ppc64le",
    "riscv64",
    "s390x",
    "wasm",
];

/// ARM revisions the toolchain accepts (GOARM values)
const KNOWN_GOARM: &[&str] = &["5", "6", "7"];

/// MIPS float modes the toolchain accepts (GOMIPS values)
const KNOWN_GOMIPS: &[&str] = &["hardfloat", "softfloat"];

/// os/arch pairs the toolchain actually supports, as reported by
/// `go tool dist list`. Not every member of the goos × goarch product is
/// buildable (no darwin_386, no windows_mips), so the matrix expansion
/// filters through this table.
const VALID_TARGETS: &[&str] = &[
    "aix_ppc64",
    "android_386",
    "android_amd64",
    "android_arm",
    "android_arm64",
    "darwin_amd64",
    "darwin_arm64",
    "dragonfly_amd64",
    "freebsd_386",
    "freebsd_amd64",
    "freebsd_arm",
    "freebsd_arm64",
    "illumos_amd64",
    "ios_amd64",
    "ios_arm64",
    "js_wasm",
    "linux_386",
    "linux_amd64",
    "linux_arm",
    "linux_arm64",
    "linux_mips",
    "linux_mips64",
    "linux_mips64le",
    "linux_mipsle",
    "linux_ppc64",
    "linux_ppc64le",
    "linux_riscv64",
    "linux_s390x",
    "netbsd_386",
    "netbsd_amd64",
    "netbsd_arm",
    "netbsd_arm64",
    "openbsd_386",
    "openbsd_amd64",
    "openbsd_arm",
    "openbsd_arm64",
    "openbsd_mips64",
    "plan9_386",
    "plan9_amd64",
    "plan9_arm",
    "solaris_amd64",
    "windows_386",
    "windows_amd64",
    "windows_arm",
];

/// Default GOOS list when the spec leaves it empty
const DEFAULT_GOOS: &[&str] = &["linux", "darwin"];

/// Default GOARCH list when the spec leaves it empty
const DEFAULT_GOARCH: &[&str] = &["amd64", "386", "arm64"];

/// Default ARM revision when goarch contains arm but goarm is empty
const DEFAULT_GOARM: &[&str] = &["6"];

/// Default MIPS float mode when a mips-family goarch is present but
/// gomips is empty
const DEFAULT_GOMIPS: &[&str] = &["softfloat"];

/// One validated cross-compilation target
///
/// Identity is the canonical underscore-joined string (`os_arch`,
/// `os_arch_variant`) that [`Target::to_string`][] produces and
/// [`Target::parse`][] reverses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    /// target operating system (GOOS)
    pub goos: String,
    /// target architecture (GOARCH)
    pub goarch: String,
    /// ARM revision, only set when goarch is arm (GOARM)
    pub goarm: Option<String>,
    /// MIPS float mode, only set for the mips family (GOMIPS)
    pub gomips: Option<String>,
}

impl Target {
    /// Resolve a canonical target string back into its dimensions
    ///
    /// Fails with [`BuildError::InvalidTarget`][] when the string doesn't
    /// have the right shape or names an os/arch pair the toolchain can't
    /// build, and with [`BuildError::InvalidTargetToken`][] when a variant
    /// segment is outside the known set.
    pub fn parse(target: &str) -> BuildResult<Self> {
        let invalid = || BuildError::InvalidTarget {
            target: target.to_owned(),
        };

        let parts = target.split('_').collect::<Vec<_>>();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid());
        }
        let goos = parts[0];
        let goarch = parts[1];
        if !valid_pair(goos, goarch) {
            return Err(invalid());
        }

        let mut goarm = None;
        let mut gomips = None;
        if let Some(&variant) = parts.get(2) {
            if goarch == "arm" {
                check_token("goarm", KNOWN_GOARM, variant)?;
                goarm = Some(variant.to_owned());
            } else if is_mips(goarch) {
                check_token("gomips", KNOWN_GOMIPS, variant)?;
                gomips = Some(variant.to_owned());
            } else {
                // a variant segment on an architecture that takes none
                return Err(invalid());
            }
        }

        Ok(Target {
            goos: goos.to_owned(),
            goarch: goarch.to_owned(),
            goarm,
            gomips,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.goos, self.goarch)?;
        if let Some(goarm) = &self.goarm {
            write!(f, "_{goarm}")?;
        }
        if let Some(gomips) = &self.gomips {
            write!(f, "_{gomips}")?;
        }
        Ok(())
    }
}

/// Whether this architecture takes a GOMIPS float-mode variant
fn is_mips(goarch: &str) -> bool {
    matches!(goarch, "mips" | "mips64" | "mips64le" | "mipsle")
}

/// Whether the toolchain can build this os/arch pair
fn valid_pair(goos: &str, goarch: &str) -> bool {
    VALID_TARGETS.contains(&format!("{goos}_{goarch}").as_str())
}

/// Check every token of one dimension against its known set, in list order
fn check_dimension(
    dimension: &'static str,
    known: &[&str],
    tokens: &[String],
) -> BuildResult<()> {
    for token in tokens {
        check_token(dimension, known, token)?;
    }
    Ok(())
}

fn check_token(dimension: &'static str, known: &[&str], token: &str) -> BuildResult<()> {
    if known.contains(&token) {
        Ok(())
    } else {
        Err(BuildError::InvalidTargetToken {
            dimension,
            token: token.to_owned(),
        })
    }
}

fn defaulted(tokens: &[String], default: &[&str]) -> Vec<String> {
    if tokens.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        tokens.to_vec()
    }
}

/// Expand a build spec into its validated, deduplicated target list
///
/// An explicit `targets` list is validated and passed through. Otherwise
/// the goos/goarch/goarm/gomips lists (defaulted when empty) are validated
/// dimension by dimension -- goos first, then goarch, goarm, gomips, each
/// in list order, stopping at the first violation -- and cross-multiplied,
/// skipping os/arch pairs the toolchain can't build. ARM revisions only
/// multiply with arm; MIPS float modes only with the mips family.
pub fn expand_targets(spec: &BuildSpec) -> BuildResult<Vec<Target>> {
    if !spec.targets.is_empty() {
        let targets = spec
            .targets
            .iter()
            .map(|t| Target::parse(t))
            .collect::<BuildResult<Vec<_>>>()?;
        return Ok(targets.into_iter().unique().collect());
    }

    let goos = defaulted(&spec.goos, DEFAULT_GOOS);
    let goarch = defaulted(&spec.goarch, DEFAULT_GOARCH);
    let goarm = defaulted(&spec.goarm, DEFAULT_GOARM);
    let gomips = defaulted(&spec.gomips, DEFAULT_GOMIPS);

    check_dimension("goos", KNOWN_GOOS, &goos)?;
    check_dimension("goarch", KNOWN_GOARCH, &goarch)?;
    check_dimension("goarm", KNOWN_GOARM, &goarm)?;
    check_dimension("gomips", KNOWN_GOMIPS, &gomips)?;

    let mut targets = vec![];
    for os in &goos {
        for arch in &goarch {
            if !valid_pair(os, arch) {
                continue;
            }
            if arch == "arm" {
                for revision in &goarm {
                    targets.push(Target {
                        goos: os.clone(),
                        goarch: arch.clone(),
                        goarm: Some(revision.clone()),
                        gomips: None,
                    });
                }
            } else if is_mips(arch) {
                for float_mode in &gomips {
                    targets.push(Target {
                        goos: os.clone(),
                        goarch: arch.clone(),
                        goarm: None,
                        gomips: Some(float_mode.clone()),
                    });
                }
            } else {
                targets.push(Target {
                    goos: os.clone(),
                    goarch: arch.clone(),
                    goarm: None,
                    gomips: None,
                });
            }
        }
    }

    Ok(targets.into_iter().unique().collect())
}
