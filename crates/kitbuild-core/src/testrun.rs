//! Running the per-variant test binary.
//!
//! Every built variant runs its Catch2 test binary with a JUnit report
//! written under the source tree plus a console reporter on stdout. On an
//! Apple silicon host the suite runs twice, natively and again under Rosetta
//! via `arch --x86_64`, so both halves of a universal binary are exercised.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::invocation::BuildInvocation;
use crate::types::{BuildError, BuildVariant};

/// Name of the test executable the build produces.
pub const TESTS_TARGET: &str = "aurakit_tests";

/// Directory under the source tree collecting JUnit reports.
pub const REPORTS_DIR: &str = "test-reports";

/// Outcome of one variant's test execution.
#[derive(Debug)]
pub struct TestRun {
    pub variant: String,
    pub report_path: PathBuf,
    pub exit_code: i32,
    /// The Rosetta re-run on a dual-architecture host.
    pub secondary: Option<Box<TestRun>>,
}

/// Spawns one test binary execution; behind a trait so sequencing is
/// testable without built binaries.
pub trait TestInvoker {
    fn run(
        &self,
        binary: &Path,
        args: &[String],
        emulate_x86_64: bool,
    ) -> Result<i32, BuildError>;
}

/// [`TestInvoker`] spawning real processes, with stdio inherited.
pub struct ProcessInvoker;

impl TestInvoker for ProcessInvoker {
    fn run(
        &self,
        binary: &Path,
        args: &[String],
        emulate_x86_64: bool,
    ) -> Result<i32, BuildError> {
        let mut command = if emulate_x86_64 {
            let mut c = Command::new("arch");
            c.arg("--x86_64").arg(binary);
            c
        } else {
            Command::new(binary)
        };
        command.args(args);

        let status = command.status().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                BuildError::MissingExternalTool(binary.display().to_string())
            }
            _ => BuildError::Io(e),
        })?;

        Ok(status.code().unwrap_or(-1))
    }
}

/// Whether this host runs universal binaries under two architectures.
pub fn host_runs_dual_arch() -> bool {
    cfg!(target_os = "macos") && std::env::consts::ARCH == "aarch64"
}

/// Path of the variant's test binary inside its build directory.
///
/// Multi-config generators nest binaries one level deeper, under the
/// configuration name.
pub fn test_binary_path(invocation: &BuildInvocation) -> PathBuf {
    if invocation.is_multi_config() {
        invocation
            .build_dir
            .join(invocation.build_type.as_str())
            .join(format!("{TESTS_TARGET}.exe"))
    } else {
        invocation.build_dir.join(TESTS_TARGET)
    }
}

fn reporter_args(report_path: &Path) -> Vec<String> {
    vec![
        "--reporter".to_string(),
        format!("JUnit::out={}", report_path.display()),
        "--reporter".to_string(),
        "console::out=-::colour-mode=ansi".to_string(),
    ]
}

/// Runs the variant's tests, once per host architecture.
///
/// The JUnit report lands at `<reports_dir>/<subfolder>.xml`; the dual-arch
/// re-run overwrites the same report, matching what the CI collector
/// expects. A nonzero exit from either run fails the variant.
pub fn run_tests(
    variant: &BuildVariant,
    invocation: &BuildInvocation,
    reports_dir: &Path,
    dual_arch: bool,
    invoker: &dyn TestInvoker,
) -> Result<TestRun, BuildError> {
    let binary = test_binary_path(invocation);
    let report_path = reports_dir.join(format!("{}.xml", variant.subfolder));
    let args = reporter_args(&report_path);

    println!("[{}] running tests", variant.subfolder);
    let exit_code = invoker.run(&binary, &args, false)?;
    if exit_code != 0 {
        return Err(BuildError::TestFailed {
            variant: variant.subfolder.clone(),
        });
    }

    let secondary = if dual_arch {
        println!("[{}] re-running tests under x86_64 emulation", variant.subfolder);
        let code = invoker.run(&binary, &args, true)?;
        if code != 0 {
            return Err(BuildError::TestFailed {
                variant: variant.subfolder.clone(),
            });
        }
        Some(Box::new(TestRun {
            variant: variant.subfolder.clone(),
            report_path: report_path.clone(),
            exit_code: code,
            secondary: None,
        }))
    } else {
        None
    };

    Ok(TestRun {
        variant: variant.subfolder.clone(),
        report_path,
        exit_code,
        secondary,
    })
}
