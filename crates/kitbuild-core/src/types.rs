//! Core types for kitbuild-core.
//!
//! This module defines the fundamental types used throughout the library:
//!
//! - [`BuildError`] - Error taxonomy for the whole orchestration run
//! - [`Platform`] - The closed set of target platforms
//! - [`BuildType`] - Debug vs. release-with-debug-info configuration
//! - [`FeatureFlag`] - Per-variant instrumentation/feature toggles
//! - [`BuildVariant`] - One concrete combination to build and test

use std::fmt;

/// Error types for kitbuild operations.
///
/// Every error here is fatal for the run: the orchestrator never retries a
/// step and never continues past a failed variant. Failure surfaces as a
/// nonzero process exit alongside the external tool's own diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The VCS describe output did not match `v<major>.<minor>.<patch><suffix>`.
    ///
    /// Raised before any build step runs; a release run without a reachable
    /// `v*` tag cannot produce meaningful version metadata.
    #[error("invalid version '{0}': expected a tag matching v<major>.<minor>.<patch><suffix>")]
    InvalidVersionFormat(String),

    /// An architecture string outside the supported set was requested.
    #[error("unsupported architecture '{0}'")]
    UnsupportedArchitecture(String),

    /// The external build system returned a nonzero exit for one variant.
    ///
    /// Later variants are never attempted after this; they may share
    /// toolchain or dependency state with the broken one.
    #[error("{step} step failed for variant '{variant}'")]
    BuildFailed { variant: String, step: BuildStep },

    /// The variant's test binary exited nonzero. Tests are a release gate,
    /// so this aborts the whole run.
    #[error("tests failed for variant '{variant}'")]
    TestFailed { variant: String },

    /// A required upload credential was not provided via flag or environment.
    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),

    /// An external tool could not be spawned at all.
    #[error("external tool '{0}' not found; ensure it is installed and on PATH")]
    MissingExternalTool(String),

    /// The version control layer reported an error.
    #[error("version control error: {0}")]
    Vcs(String),

    /// Documentation generation failed.
    #[error("documentation generation failed: {0}")]
    Docs(String),

    /// Uploading an artifact to object storage failed.
    #[error("upload failed: {0}")]
    Upload(String),

    /// An I/O error occurred. Common causes are missing allow-list entries
    /// in the source tree and unwritable build roots.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed while writing generated metadata.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing or reading a zip archive failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Formatting a generation timestamp failed.
    #[error("timestamp error: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// The two external-build-system steps the executor drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Configure,
    Build,
}

impl BuildStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStep::Configure => "configure",
            BuildStep::Build => "build",
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target platform for a build variant.
///
/// This is a deliberately closed enumeration: adding a platform is a
/// compile-time-checked change at every consumption site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
    Android,
}

impl Platform {
    /// Detects the platform of the machine the orchestrator runs on.
    ///
    /// Android is never a host platform; its variants are cross-compiled
    /// from a macOS host.
    pub fn host() -> Result<Self, BuildError> {
        match std::env::consts::OS {
            "macos" => Ok(Platform::MacOs),
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            other => Err(BuildError::UnsupportedArchitecture(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::Android => "android",
        }
    }
}

/// Build configuration handed to the external build system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildType {
    /// Unoptimized build with full debug info.
    Debug,
    /// Optimized build that keeps debug info, the default for CI runs.
    ReleaseWithDebugInfo,
}

impl BuildType {
    /// The CMake configuration name for this build type.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Debug => "Debug",
            BuildType::ReleaseWithDebugInfo => "RelWithDebInfo",
        }
    }
}

/// Per-variant feature and instrumentation toggles.
///
/// `AddressSanitizer` and `ThreadSanitizer` are mutually exclusive within
/// one variant; the matrix generator never combines them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureFlag {
    /// Enable the structured logging backend in the built SDK.
    LoggingBackend,
    AddressSanitizer,
    ThreadSanitizer,
}

/// One concrete combination of platform, architecture, build type and flags.
///
/// Variants are created by the matrix generator and read-only afterwards.
/// `subfolder` is the variant's namespace under the build root and must be
/// unique within one run.
#[derive(Debug, Clone)]
pub struct BuildVariant {
    pub platform: Platform,
    pub architecture: String,
    pub build_type: BuildType,
    pub flags: Vec<FeatureFlag>,
    pub subfolder: String,
}

impl BuildVariant {
    pub fn has_flag(&self, flag: FeatureFlag) -> bool {
        self.flags.contains(&flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_type_maps_to_cmake_config_names() {
        assert_eq!(BuildType::Debug.as_str(), "Debug");
        assert_eq!(BuildType::ReleaseWithDebugInfo.as_str(), "RelWithDebInfo");
    }

    #[test]
    fn build_failed_error_names_variant_and_step() {
        let err = BuildError::BuildFailed {
            variant: "linux_x64".to_string(),
            step: BuildStep::Configure,
        };
        let message = err.to_string();
        assert!(message.contains("configure"));
        assert!(message.contains("linux_x64"));
    }

    #[test]
    fn variant_flag_lookup() {
        let variant = BuildVariant {
            platform: Platform::Linux,
            architecture: "x64".to_string(),
            build_type: BuildType::ReleaseWithDebugInfo,
            flags: vec![FeatureFlag::LoggingBackend],
            subfolder: "linux_x64_logging".to_string(),
        };
        assert!(variant.has_flag(FeatureFlag::LoggingBackend));
        assert!(!variant.has_flag(FeatureFlag::AddressSanitizer));
    }
}
