#![deny(missing_docs)]

//! # goship
//!
//! The build engine at the core of the 'goship' release tool: it expands
//! a build spec into a validated cross-compilation target matrix, renders
//! per-target compiler flags from metadata templates, invokes the Go
//! toolchain once per target, optionally normalizes output timestamps for
//! reproducible builds, and registers every produced binary in the shared
//! artifact registry for the packaging stages downstream.
//!
//! Targets are independent: [`build_all`][] fans them out across bounded
//! workers, and one target failing doesn't stop the others -- partial
//! success is a normal outcome, reported per target.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

pub mod artifact;
pub mod build;
pub mod config;
pub mod context;
pub mod errors;
pub mod target;
pub mod tmpl;

pub use artifact::{Artifact, ArtifactKind, Artifacts};
pub use build::{build_target, BuildOptions};
pub use config::{parse_env, BuildSpec};
pub use context::{CancelFlag, RunContext};
pub use errors::{BuildError, BuildResult};
pub use target::{expand_targets, Target};
pub use tmpl::Template;

/// Alias for a map with a stable ordering
pub type SortedMap<K, V> = std::collections::BTreeMap<K, V>;

/// Driver knobs for one spec's builds
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory produced binaries land under, one subdirectory per target
    pub dist_dir: Utf8PathBuf,
    /// How many targets may compile at once (at least one)
    pub concurrency: usize,
    /// Give up on a target's compiler after this long
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dist_dir: "dist".into(),
            concurrency: 4,
            timeout: None,
        }
    }
}

/// One target's result from a [`build_all`][] run
#[derive(Debug)]
pub struct TargetOutcome {
    /// The target in canonical form
    pub target: String,
    /// The registered artifact, or why this target failed
    pub result: BuildResult<Artifact>,
}

/// Build every target of a spec, bounded-concurrently
///
/// Expands the target matrix once, resolves each target's binary name and
/// output path, then compiles targets on blocking workers gated by a
/// semaphore of `opts.concurrency` permits. Returns one outcome per
/// target, in matrix order; failed targets don't abort the rest.
///
/// Spec-level problems (an invalid matrix, a binary-name template that
/// doesn't render) fail the whole run before any compile starts.
pub async fn build_all(
    ctx: Arc<RunContext>,
    spec: BuildSpec,
    opts: RunOptions,
) -> BuildResult<Vec<TargetOutcome>> {
    let spec = Arc::new(spec.with_defaults()?);
    let overlay = parse_env(&spec.env)?;
    info!(
        build = %spec.id,
        targets = spec.targets.len(),
        "expanded build targets"
    );

    let semaphore = Arc::new(Semaphore::new(opts.concurrency.max(1)));
    let mut workers = JoinSet::new();
    for (index, target_name) in spec.targets.iter().enumerate() {
        let target = Target::parse(target_name)?;
        let binary = Template::new(&ctx)
            .with_env(&overlay)
            .with_target(&target)
            .apply(&spec.binary)?;
        let ext = extension_for(&target);
        let name = format!("{binary}{ext}");
        let options = BuildOptions {
            target: target_name.clone(),
            path: opts.dist_dir.join(target_name).join(&name),
            name,
            ext: ext.to_owned(),
            timeout: opts.timeout,
        };

        let ctx = ctx.clone();
        let spec = spec.clone();
        let semaphore = semaphore.clone();
        workers.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("build semaphore closed");
            let target = options.target.clone();
            let result =
                tokio::task::spawn_blocking(move || build_target(&ctx, &spec, &options))
                    .await
                    .expect("build task panicked");
            (index, TargetOutcome { target, result })
        });
    }

    let mut outcomes = Vec::with_capacity(spec.targets.len());
    while let Some(joined) = workers.join_next().await {
        outcomes.push(joined.expect("build task panicked"));
    }
    outcomes.sort_by_key(|(index, _)| *index);
    Ok(outcomes
        .into_iter()
        .map(|(_, outcome)| outcome)
        .collect())
}

/// The file extension binaries get on this target
pub fn extension_for(target: &Target) -> &'static str {
    if target.goos == "windows" {
        ".exe"
    } else if target.goos == "js" && target.goarch == "wasm" {
        ".wasm"
    } else {
        ""
    }
}
