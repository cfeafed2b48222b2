//! Driving the external build system.
//!
//! The executor turns a [`BuildInvocation`] into a configure step followed
//! by a build step. The actual tool lives behind the [`BuildSystem`] trait
//! so the sequencing logic is testable without CMake installed.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use crate::invocation::BuildInvocation;
use crate::types::{BuildError, BuildStep};

/// The configure and build capabilities the executor needs.
pub trait BuildSystem {
    fn configure(&self, invocation: &BuildInvocation) -> Result<(), BuildError>;
    fn build(&self, invocation: &BuildInvocation) -> Result<(), BuildError>;
}

/// [`BuildSystem`] implementation shelling out to the `cmake` CLI.
///
/// Tool output is inherited so compiler diagnostics stream straight to the
/// terminal; the orchestrator only inspects the exit status.
pub struct CMakeCli;

impl CMakeCli {
    fn run(&self, mut command: Command, invocation: &BuildInvocation, step: BuildStep) -> Result<(), BuildError> {
        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        let status = command.status().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BuildError::MissingExternalTool("cmake".to_string()),
            _ => BuildError::Io(e),
        })?;

        if !status.success() {
            return Err(BuildError::BuildFailed {
                variant: invocation.variant_name.clone(),
                step,
            });
        }
        Ok(())
    }
}

impl BuildSystem for CMakeCli {
    fn configure(&self, invocation: &BuildInvocation) -> Result<(), BuildError> {
        let mut command = Command::new("cmake");
        command
            .arg("-S")
            .arg(&invocation.source_dir)
            .arg("-B")
            .arg(&invocation.build_dir);

        if let Some(generator) = &invocation.generator {
            command.arg("-G").arg(generator);
        }
        if let Some(architecture) = &invocation.architecture {
            command.arg("-A").arg(architecture);
        }

        command.arg(format!("-DCMAKE_BUILD_TYPE={}", invocation.build_type.as_str()));
        for (key, value) in &invocation.options {
            command.arg(format!("-D{key}={value}"));
        }

        self.run(command, invocation, BuildStep::Configure)
    }

    fn build(&self, invocation: &BuildInvocation) -> Result<(), BuildError> {
        let mut command = Command::new("cmake");
        command
            .arg("--build")
            .arg(&invocation.build_dir)
            .arg("--parallel")
            .arg(invocation.parallelism.to_string());

        // Multi-config generators pick the configuration at build time.
        if invocation.is_multi_config() {
            command
                .arg("--config")
                .arg(invocation.build_type.as_str());
        }

        self.run(command, invocation, BuildStep::Build)
    }
}

/// Runs configure then build for one invocation and returns the build
/// directory.
///
/// With `skip_build` set, both steps are skipped and the existing build
/// directory is returned untouched, so a prior run's binaries can be
/// re-tested.
pub fn execute(
    invocation: &BuildInvocation,
    skip_build: bool,
    build_system: &dyn BuildSystem,
) -> Result<PathBuf, BuildError> {
    if skip_build {
        println!("[{}] skipping build, reusing existing output", invocation.variant_name);
        return Ok(invocation.build_dir.clone());
    }

    fs::create_dir_all(&invocation.build_dir)?;

    println!("[{}] configuring", invocation.variant_name);
    build_system.configure(invocation)?;

    println!("[{}] building", invocation.variant_name);
    build_system.build(invocation)?;

    Ok(invocation.build_dir.clone())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::types::BuildType;

    struct RecordingBuildSystem {
        steps: RefCell<Vec<&'static str>>,
        fail_on: Option<BuildStep>,
    }

    impl RecordingBuildSystem {
        fn new(fail_on: Option<BuildStep>) -> Self {
            Self {
                steps: RefCell::new(Vec::new()),
                fail_on,
            }
        }
    }

    impl BuildSystem for RecordingBuildSystem {
        fn configure(&self, invocation: &BuildInvocation) -> Result<(), BuildError> {
            self.steps.borrow_mut().push("configure");
            if self.fail_on == Some(BuildStep::Configure) {
                return Err(BuildError::BuildFailed {
                    variant: invocation.variant_name.clone(),
                    step: BuildStep::Configure,
                });
            }
            Ok(())
        }

        fn build(&self, invocation: &BuildInvocation) -> Result<(), BuildError> {
            self.steps.borrow_mut().push("build");
            if self.fail_on == Some(BuildStep::Build) {
                return Err(BuildError::BuildFailed {
                    variant: invocation.variant_name.clone(),
                    step: BuildStep::Build,
                });
            }
            Ok(())
        }
    }

    fn invocation(build_dir: PathBuf) -> BuildInvocation {
        BuildInvocation {
            variant_name: "linux_x64".to_string(),
            source_dir: PathBuf::from("/src"),
            build_dir,
            generator: Some("Ninja".to_string()),
            build_type: BuildType::ReleaseWithDebugInfo,
            architecture: None,
            parallelism: 4,
            options: vec![("BUILD_NUMBER".to_string(), "0".to_string())],
            env: Vec::new(),
        }
    }

    #[test]
    fn configure_runs_before_build() {
        let dir = tempfile::tempdir().unwrap();
        let build_dir = dir.path().join("linux_x64");
        let build_system = RecordingBuildSystem::new(None);

        let out = execute(&invocation(build_dir.clone()), false, &build_system).unwrap();
        assert_eq!(out, build_dir);
        assert_eq!(*build_system.steps.borrow(), ["configure", "build"]);
        assert!(build_dir.is_dir());
    }

    #[test]
    fn configure_failure_stops_before_build() {
        let dir = tempfile::tempdir().unwrap();
        let build_system = RecordingBuildSystem::new(Some(BuildStep::Configure));

        let err = execute(&invocation(dir.path().join("v")), false, &build_system).unwrap_err();
        assert!(matches!(
            err,
            BuildError::BuildFailed {
                step: BuildStep::Configure,
                ..
            }
        ));
        assert_eq!(*build_system.steps.borrow(), ["configure"]);
    }

    #[test]
    fn skip_build_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let build_dir = dir.path().join("linux_x64");
        let build_system = RecordingBuildSystem::new(None);

        let out = execute(&invocation(build_dir.clone()), true, &build_system).unwrap();
        assert_eq!(out, build_dir);
        assert!(build_system.steps.borrow().is_empty());
        // skip-build reuses an earlier run's directory, it never creates one
        assert!(!build_dir.exists());
    }
}
