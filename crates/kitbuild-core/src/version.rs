//! Version resolution from version-control state.
//!
//! The resolved [`Version`] is computed once at startup and passed by value
//! into every component that needs it; there is no ambient global. Running
//! the resolver twice against the same repository state yields an identical
//! result.

use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;
use serde::Serialize;

use crate::types::BuildError;

/// Narrow view of the version control system the orchestrator consumes.
///
/// Only two capabilities are needed: a tag-describe of the current commit
/// and the current branch name. Everything else about the VCS is out of
/// scope, which keeps the resolver testable with a fake implementation.
pub trait Vcs {
    /// Describe the current commit relative to the latest tag matching
    /// `pattern` (e.g. `v*`).
    fn describe(&self, pattern: &str) -> Result<String, BuildError>;

    /// The current branch short name, or the literal `HEAD` for a detached
    /// checkout.
    fn current_branch(&self) -> Result<String, BuildError>;
}

/// [`Vcs`] implementation shelling out to the `git` CLI.
pub struct GitCli {
    repo_dir: PathBuf,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }
}

impl Vcs for GitCli {
    fn describe(&self, pattern: &str) -> Result<String, BuildError> {
        run_git(&self.repo_dir, &["describe", "--tags", "--match", pattern])
    }

    fn current_branch(&self) -> Result<String, BuildError> {
        run_git(&self.repo_dir, &["rev-parse", "--abbrev-ref", "HEAD"])
    }
}

fn run_git(repo_dir: &Path, args: &[&str]) -> Result<String, BuildError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BuildError::MissingExternalTool("git".to_string()),
            _ => BuildError::Io(e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BuildError::Vcs(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Semantic version derived from VCS describe/branch state.
///
/// Immutable once resolved. `tag` always matches
/// `v<major>.<minor>.<patch><suffix>`; the integer components and the
/// literal suffix are the parsed pieces of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Version {
    pub tag: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub suffix: String,
    pub branch: String,
    pub build_number: String,
}

impl Version {
    /// Resolves the run's version from the VCS and the CI build number.
    ///
    /// Fails with [`BuildError::InvalidVersionFormat`] when no reachable tag
    /// matches the expected pattern. This is fatal and happens before any
    /// build step.
    pub fn resolve(vcs: &dyn Vcs, build_number: &str) -> Result<Self, BuildError> {
        let tag = vcs.describe("v*")?;
        let branch = vcs.current_branch()?;
        Self::from_parts(&tag, &branch, build_number)
    }

    /// Parses a describe string into its version components.
    pub fn from_parts(tag: &str, branch: &str, build_number: &str) -> Result<Self, BuildError> {
        let pattern =
            Regex::new(r"^v(\d+)\.(\d+)\.(\d+)(.*)$").expect("version pattern is valid");
        let captures = pattern
            .captures(tag)
            .ok_or_else(|| BuildError::InvalidVersionFormat(tag.to_string()))?;

        let component = |index: usize| -> Result<u32, BuildError> {
            captures[index]
                .parse()
                .map_err(|_| BuildError::InvalidVersionFormat(tag.to_string()))
        };

        Ok(Self {
            tag: tag.to_string(),
            major: component(1)?,
            minor: component(2)?,
            patch: component(3)?,
            suffix: captures[4].to_string(),
            branch: branch.to_string(),
            build_number: build_number.to_string(),
        })
    }

    /// Whether the checkout is a detached tag build rather than a branch.
    ///
    /// `git rev-parse --abbrev-ref HEAD` reports the sentinel `HEAD` in that
    /// case, which routes published artifacts into the archive prefix.
    pub fn is_detached_tag(&self) -> bool {
        self.branch == "HEAD"
    }
}
