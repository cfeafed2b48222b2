//! Fail-fast orchestration across the variant matrix.

use std::fs;

use crate::executor::{self, BuildSystem};
use crate::invocation::{self, GlobalSettings};
use crate::testrun::{self, TestInvoker, TestRun, REPORTS_DIR};
use crate::types::{BuildError, BuildVariant, Platform};

/// Builds and tests every variant in order, stopping at the first failure.
///
/// The JUnit reports directory is created up front so a run that fails on
/// the first configure still leaves the collector a directory to scan.
/// Android variants are cross-compiled and only built; their binaries
/// cannot run on the host.
pub fn run_matrix(
    variants: &[BuildVariant],
    settings: &GlobalSettings,
    build_system: &dyn BuildSystem,
    invoker: &dyn TestInvoker,
) -> Result<Vec<TestRun>, BuildError> {
    let reports_dir = settings.source_dir.join(REPORTS_DIR);
    fs::create_dir_all(&reports_dir)?;

    let dual_arch = testrun::host_runs_dual_arch();
    let mut runs = Vec::new();

    for variant in variants {
        println!("=== variant {} ===", variant.subfolder);
        let invocation = invocation::build_invocation(variant, settings)?;
        executor::execute(&invocation, settings.skip_build, build_system)?;

        if variant.platform == Platform::Android {
            println!("[{}] cross-compiled, skipping tests", variant.subfolder);
            continue;
        }

        let run = testrun::run_tests(variant, &invocation, &reports_dir, dual_arch, invoker)?;
        runs.push(run);
    }

    Ok(runs)
}
