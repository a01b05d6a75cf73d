//! Invoking the Go toolchain once per target

use std::io::Read;
use std::process::Stdio;
use std::time::{Duration, Instant, SystemTime};

use axoasset::LocalAsset;
use axoprocess::Cmd;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::artifact::{Artifact, ArtifactKind, EXTRA_BINARY, EXTRA_EXT, EXTRA_ID};
use crate::config::{parse_env, BuildSpec};
use crate::context::RunContext;
use crate::errors::{BuildError, BuildResult};
use crate::target::Target;
use crate::tmpl::{join_ldflags, process_flags, Template};
use crate::SortedMap;

/// Per-target inputs the caller resolved ahead of time: which target to
/// compile and where the output goes
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// The target in canonical form (e.g. `linux_arm_6`)
    pub target: String,
    /// Logical name of the output (rendered binary name plus extension)
    pub name: String,
    /// Where the binary should land
    pub path: Utf8PathBuf,
    /// Platform extension (`.exe`, `.wasm`, or empty)
    pub ext: String,
    /// Give up and kill the compiler after this long
    pub timeout: Option<Duration>,
}

/// Compile one target and register the produced binary
///
/// Runs the full per-target pipeline: resolve the target string, verify
/// the source tree has a main entry, render the four flag categories,
/// invoke the toolchain with an isolated environment snapshot, optionally
/// normalize the output's modification time, and append the artifact to
/// the registry. Any failure aborts this target only; nothing is
/// registered for a failed target.
pub fn build_target(
    ctx: &RunContext,
    spec: &BuildSpec,
    options: &BuildOptions,
) -> BuildResult<Artifact> {
    let target = Target::parse(&options.target)?;
    check_main(spec)?;

    let mut extra = SortedMap::new();
    extra.insert(EXTRA_EXT.to_owned(), options.ext.clone());
    extra.insert(EXTRA_BINARY.to_owned(), resolved_binary_name(options));
    extra.insert(EXTRA_ID.to_owned(), spec.id.clone());
    let artifact = Artifact {
        name: options.name.clone(),
        path: options.path.clone(),
        goos: target.goos.clone(),
        goarch: target.goarch.clone(),
        goarm: target.goarm.clone().unwrap_or_default(),
        gomips: target.gomips.clone().unwrap_or_default(),
        kind: ArtifactKind::Binary,
        extra,
    };

    let overlay = parse_env(&spec.env)?;
    let tmpl = Template::new(ctx).with_env(&overlay).with_artifact(&artifact);

    let mut args: Vec<String> = vec!["build".to_owned()];
    args.extend(process_flags(&tmpl, &spec.flags, "")?);
    args.extend(process_flags(&tmpl, &spec.asmflags, "-asmflags=")?);
    args.extend(process_flags(&tmpl, &spec.gcflags, "-gcflags=")?);
    if !spec.ldflags.is_empty() {
        let ldflags = process_flags(&tmpl, &spec.ldflags, "")?;
        args.push(join_ldflags(&ldflags));
    }
    args.push("-o".to_owned());
    args.push(options.path.to_string());
    args.push(if spec.main.is_empty() {
        ".".to_owned()
    } else {
        spec.main.clone()
    });

    invoke_compiler(ctx, spec, &target, &args, &overlay, options)?;

    if !spec.mod_timestamp.is_empty() {
        normalize_timestamp(&options.path, &spec.mod_timestamp)?;
    }

    info!("built {} for {}", artifact.name, target);
    ctx.artifacts.add(artifact.clone());
    Ok(artifact)
}

/// The binary file name with the platform extension trimmed back off
fn resolved_binary_name(options: &BuildOptions) -> String {
    let file_name = options.path.file_name().unwrap_or(&options.name);
    file_name
        .strip_suffix(&options.ext)
        .unwrap_or(file_name)
        .to_owned()
}

/// Verify the build has a main entry point
///
/// An empty or `.` selector scans the source directory (non-recursively,
/// files only) for a `.go` file in package main declaring `func main()`.
/// An exact-file selector is stat'd first, then checked the same way.
fn check_main(spec: &BuildSpec) -> BuildResult<()> {
    let main = if spec.main.is_empty() {
        "."
    } else {
        spec.main.as_str()
    };
    let entry = if spec.dir.as_str().is_empty() {
        Utf8PathBuf::from(main)
    } else {
        spec.dir.join(main)
    };

    let meta = std::fs::metadata(&entry).map_err(|details| BuildError::MainFileNotFound {
        path: entry.clone(),
        details,
    })?;

    let found = if meta.is_dir() {
        dir_declares_main(&entry)?
    } else {
        file_declares_main(&entry)?
    };
    if found {
        Ok(())
    } else {
        Err(BuildError::NoMainFunction {
            binary: spec.binary.clone(),
        })
    }
}

fn dir_declares_main(dir: &Utf8Path) -> BuildResult<bool> {
    let not_found = |details| BuildError::MainFileNotFound {
        path: dir.to_owned(),
        details,
    };
    for entry in dir.read_dir_utf8().map_err(not_found)? {
        let entry = entry.map_err(not_found)?;
        // a directory named e.g. ".go" is not a source file
        if !entry.file_type().map_err(not_found)?.is_file() {
            continue;
        }
        if !entry.file_name().ends_with(".go") {
            continue;
        }
        if file_declares_main(entry.path())? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn file_declares_main(path: &Utf8Path) -> BuildResult<bool> {
    let source = LocalAsset::load_string(path)?;
    Ok(source_declares_main(&source))
}

/// Whether this source text is a package main declaring `func main()`
fn source_declares_main(source: &str) -> bool {
    let mut package_main = false;
    for line in source.lines() {
        let line = line.trim();
        if let Some(package) = line.strip_prefix("package ") {
            package_main = package.trim() == "main";
        } else if package_main && line.starts_with("func main()") {
            return true;
        }
    }
    false
}

/// Launch the toolchain and wait for it, honoring cancellation
///
/// The child gets an isolated environment snapshot: the run context's
/// captured environment, the spec's overlay, then the target selection
/// variables. The live process environment is never consulted or
/// mutated, so concurrent invocations for different targets can't race.
fn invoke_compiler(
    ctx: &RunContext,
    spec: &BuildSpec,
    target: &Target,
    args: &[String],
    overlay: &SortedMap<String, String>,
    options: &BuildOptions,
) -> BuildResult<()> {
    if let Some(parent) = options.path.parent() {
        if !parent.as_str().is_empty() {
            LocalAsset::create_dir_all(parent)?;
        }
    }

    let target_name = target.to_string();
    let mut cmd = Cmd::new(&spec.go_binary, "compile one build target");
    for arg in args {
        cmd.arg(arg);
    }
    if !spec.dir.as_str().is_empty() {
        cmd.current_dir(&spec.dir);
    }

    cmd.env_clear();
    cmd.envs(ctx.env.iter());
    cmd.envs(overlay.iter());
    cmd.env("GOOS", &target.goos);
    cmd.env("GOARCH", &target.goarch);
    if let Some(goarm) = &target.goarm {
        cmd.env("GOARM", goarm);
    }
    if let Some(gomips) = &target.gomips {
        cmd.env("GOMIPS", gomips);
    }

    cmd.check(false);
    cmd.stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|details| BuildError::CompilerFailed {
        target: target_name.clone(),
        diagnostic: details.to_string(),
    })?;

    // drain stderr as it arrives so a chatty compiler can't fill the pipe
    // and deadlock against our wait loop
    let drain = child.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    });

    let deadline = options.timeout.map(|timeout| Instant::now() + timeout);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(details) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(BuildError::CompilerFailed {
                    target: target_name,
                    diagnostic: details.to_string(),
                });
            }
        }
        let timed_out = deadline.is_some_and(|deadline| Instant::now() >= deadline);
        if ctx.cancel.is_cancelled() || timed_out {
            debug!("terminating compiler for {target_name}");
            let _ = child.kill();
            let _ = child.wait();
            return Err(BuildError::Cancelled {
                target: target_name,
            });
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    let diagnostic = drain
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    if !status.success() {
        return Err(BuildError::CompilerFailed {
            target: target_name,
            diagnostic: diagnostic.trim_end().to_owned(),
        });
    }
    Ok(())
}

/// Stamp the produced binary with the configured instant
fn normalize_timestamp(path: &Utf8Path, mod_timestamp: &str) -> BuildResult<()> {
    let seconds: u64 = mod_timestamp
        .parse()
        .map_err(|details| BuildError::InvalidTimestamp {
            value: mod_timestamp.to_owned(),
            details,
        })?;
    let instant = SystemTime::UNIX_EPOCH + Duration::from_secs(seconds);
    let times = std::fs::FileTimes::new()
        .set_accessed(instant)
        .set_modified(instant);
    let timestamp_error = |details| BuildError::TimestampError {
        path: path.to_owned(),
        details,
    };
    std::fs::File::options()
        .write(true)
        .open(path)
        .map_err(timestamp_error)?
        .set_times(times)
        .map_err(timestamp_error)?;
    Ok(())
}
