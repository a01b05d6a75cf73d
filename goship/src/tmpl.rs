//! Logic for rendering flag and binary-name templates
//!
//! Templates are minijinja markup over a typed context: run metadata
//! (`version`, `tag`, `commit`, `commit_date`, `date`), the environment
//! map (`env.KEY`), and -- when rendering for a concrete output --
//! target/artifact fields (`os`, `arch`, `arm`, `mips`, `binary`,
//! `artifact_name`). Lookups are strict: referencing a key the context
//! doesn't carry is an error, and engine error text propagates verbatim
//! because reporting layers match on it.

use minijinja::value::Value;
use minijinja::{Environment, UndefinedBehavior};

use crate::artifact::{Artifact, EXTRA_BINARY};
use crate::context::RunContext;
use crate::errors::BuildResult;
use crate::target::Target;
use crate::SortedMap;

/// The name templates are registered under; engine errors cite it
const TEMPLATE_NAME: &str = "tmpl";

#[derive(Debug, Default)]
struct ArtifactScope {
    os: String,
    arch: String,
    arm: String,
    mips: String,
    binary: Option<String>,
    artifact_name: Option<String>,
}

/// A template renderer over one run's metadata
///
/// Construct per build, scope with [`Template::with_target`][] or
/// [`Template::with_artifact`][], then [`Template::apply`][] each
/// template. Rendering is pure: the same template and context always
/// produce the same output (or the same error).
#[derive(Debug)]
pub struct Template<'a> {
    ctx: &'a RunContext,
    env: SortedMap<String, String>,
    scope: Option<ArtifactScope>,
}

impl<'a> Template<'a> {
    /// A renderer over the run context alone
    pub fn new(ctx: &'a RunContext) -> Self {
        Self {
            ctx,
            env: ctx.env.clone(),
            scope: None,
        }
    }

    /// Layer a build's environment overlay over the run environment
    pub fn with_env(mut self, overlay: &SortedMap<String, String>) -> Self {
        self.env
            .extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Scope to a target (for rendering the binary name, before any
    /// artifact exists)
    pub fn with_target(mut self, target: &Target) -> Self {
        self.scope = Some(ArtifactScope {
            os: target.goos.clone(),
            arch: target.goarch.clone(),
            arm: target.goarm.clone().unwrap_or_default(),
            mips: target.gomips.clone().unwrap_or_default(),
            binary: None,
            artifact_name: None,
        });
        self
    }

    /// Scope to the artifact a build is about to produce
    pub fn with_artifact(mut self, artifact: &Artifact) -> Self {
        self.scope = Some(ArtifactScope {
            os: artifact.goos.clone(),
            arch: artifact.goarch.clone(),
            arm: artifact.goarm.clone(),
            mips: artifact.gomips.clone(),
            binary: artifact.extra.get(EXTRA_BINARY).cloned(),
            artifact_name: Some(artifact.name.clone()),
        });
        self
    }

    /// Render one template
    pub fn apply(&self, template: &str) -> BuildResult<String> {
        let mut env = Environment::new();
        env.set_debug(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_template(TEMPLATE_NAME, template)?;

        let mut vals = SortedMap::<&str, Value>::new();
        vals.insert("version", Value::from(self.ctx.version.clone()));
        vals.insert("tag", Value::from(self.ctx.tag.clone()));
        vals.insert("commit", Value::from(self.ctx.commit.clone()));
        vals.insert(
            "commit_date",
            Value::from(self.ctx.commit_date.to_rfc3339()),
        );
        vals.insert("date", Value::from(self.ctx.date.to_rfc3339()));
        vals.insert("env", Value::from_serialize(&self.env));
        if let Some(scope) = &self.scope {
            vals.insert("os", Value::from(scope.os.clone()));
            vals.insert("arch", Value::from(scope.arch.clone()));
            vals.insert("arm", Value::from(scope.arm.clone()));
            vals.insert("mips", Value::from(scope.mips.clone()));
            if let Some(binary) = &scope.binary {
                vals.insert("binary", Value::from(binary.clone()));
            }
            if let Some(artifact_name) = &scope.artifact_name {
                vals.insert("artifact_name", Value::from(artifact_name.clone()));
            }
        }

        let rendered = env.get_template(TEMPLATE_NAME)?.render(&vals)?;
        Ok(rendered)
    }
}

/// Render a list of flag templates in order, prefixing each result with
/// the given flag marker (e.g. `-gcflags=`)
pub fn process_flags(
    tmpl: &Template<'_>,
    flags: &[String],
    marker: &str,
) -> BuildResult<Vec<String>> {
    let mut out = Vec::with_capacity(flags.len());
    for flag in flags {
        out.push(format!("{marker}{}", tmpl.apply(flag)?));
    }
    Ok(out)
}

/// Join rendered linker flags under a single `-ldflags=` argument
pub fn join_ldflags(flags: &[String]) -> String {
    format!("-ldflags={}", flags.join(" "))
}
