//! Build orchestration for the aurakit SDK.
//!
//! This crate drives the external toolchain end to end: it derives the run
//! version from git, enumerates the variant matrix for a platform, executes
//! CMake configure/build per variant with Catch2 tests as a release gate,
//! assembles the distribution bundle and publishes it to object storage.
//!
//! External tools (git, cmake, the test binaries, doxygen, the storage
//! endpoint) sit behind narrow traits ([`version::Vcs`],
//! [`executor::BuildSystem`], [`testrun::TestInvoker`],
//! [`dist::DocsGenerator`], [`publish::ObjectStore`]) so the orchestration
//! logic is testable without any of them installed.

pub mod dist;
pub mod executor;
pub mod invocation;
pub mod matrix;
pub mod pipeline;
pub mod publish;
pub mod spaces;
pub mod testrun;
pub mod types;
pub mod version;

pub use invocation::GlobalSettings;
pub use matrix::MatrixOptions;
pub use types::{BuildError, BuildType, BuildVariant, FeatureFlag, Platform};
pub use version::Version;

/// Crate version, for CLI `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
