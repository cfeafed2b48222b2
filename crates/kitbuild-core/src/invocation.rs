//! Build invocation construction.
//!
//! [`build_invocation`] is a pure mapping from one [`BuildVariant`] plus the
//! run's [`GlobalSettings`] to the concrete configuration handed to the
//! external build system. It never touches the filesystem or spawns a
//! process, so expected option maps can be asserted directly in tests.

use std::path::PathBuf;

use crate::matrix::android_triplet;
use crate::types::{BuildError, BuildType, BuildVariant, FeatureFlag, Platform};

/// Relative path of the vcpkg toolchain file inside the source tree.
pub const VCPKG_TOOLCHAIN_FILE: &str = "submodules/vcpkg/scripts/buildsystems/vcpkg.cmake";

/// Minimum Android platform API level the SDK supports.
pub const ANDROID_PLATFORM: &str = "android-21";

/// Global settings fixed at process start.
///
/// `source_dir` is resolved once from the program's own location, never from
/// the caller's working directory.
#[derive(Debug, Clone)]
pub struct GlobalSettings {
    pub source_dir: PathBuf,
    pub build_root: PathBuf,
    pub build_number: String,
    pub skip_build: bool,
    pub macos_deployment_target: String,
    pub macos_development_team: String,
    pub windows_version: String,
    pub android_ndk_home: PathBuf,
}

/// The default NDK install location on a macOS build host.
pub fn default_ndk_home() -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join("Library/Android/sdk/ndk/23.1.7779620")
}

/// Host logical core count, delegated to the external build tool as its
/// `--parallel` level.
pub fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Fully-resolved configuration for one configure-then-build of a variant.
///
/// Built fresh per variant, never mutated afterwards, consumed exactly once
/// by the executor. `options` is an ordered mapping: the order options were
/// added is the order they reach the command line.
#[derive(Debug, Clone)]
pub struct BuildInvocation {
    pub variant_name: String,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub generator: Option<String>,
    pub build_type: BuildType,
    /// Target architecture for multi-config generators (`cmake -A`).
    pub architecture: Option<String>,
    pub parallelism: usize,
    pub options: Vec<(String, String)>,
    pub env: Vec<(String, String)>,
}

impl BuildInvocation {
    fn push_option(&mut self, key: &str, value: impl Into<String>) {
        self.options.push((key.to_string(), value.into()));
    }

    /// Looks up an option by key; later additions win, mirroring how the
    /// external tool treats repeated definitions.
    pub fn option_value(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the invocation targets a multi-config generator, which takes
    /// the configuration at build time instead of configure time.
    pub fn is_multi_config(&self) -> bool {
        self.architecture.is_some()
    }
}

/// Maps a variant and the global settings to a [`BuildInvocation`].
pub fn build_invocation(
    variant: &BuildVariant,
    settings: &GlobalSettings,
) -> Result<BuildInvocation, BuildError> {
    let mut invocation = BuildInvocation {
        variant_name: variant.subfolder.clone(),
        source_dir: settings.source_dir.clone(),
        build_dir: settings.build_root.join(&variant.subfolder),
        generator: None,
        build_type: variant.build_type,
        architecture: None,
        parallelism: host_parallelism(),
        options: Vec::new(),
        env: Vec::new(),
    };

    invocation.push_option("CMAKE_TOOLCHAIN_FILE", VCPKG_TOOLCHAIN_FILE);

    match variant.platform {
        Platform::MacOs => {
            invocation.generator = Some("Ninja".to_string());
            invocation.push_option("VCPKG_OVERLAY_TRIPLETS", "triplets");
            invocation.push_option("VCPKG_TARGET_TRIPLET", "macos-universal");
            invocation.push_option("CMAKE_OSX_ARCHITECTURES", "x86_64;arm64");
            invocation.push_option(
                "CMAKE_OSX_DEPLOYMENT_TARGET",
                settings.macos_deployment_target.clone(),
            );
            invocation.push_option(
                "CMAKE_XCODE_ATTRIBUTE_CODE_SIGN_IDENTITY",
                "Apple Development",
            );
            invocation.push_option(
                "CMAKE_XCODE_ATTRIBUTE_DEVELOPMENT_TEAM",
                settings.macos_development_team.clone(),
            );
            // Assertions abort during CI test runs instead of logging.
            invocation.push_option("AK_ABORT_ON_ASSERT", "ON");
        }
        Platform::Windows => {
            invocation.architecture = Some(variant.architecture.clone());
            invocation.push_option("VCPKG_OVERLAY_TRIPLETS", "triplets");
            invocation.push_option(
                "VCPKG_TARGET_TRIPLET",
                format!("windows-{}", variant.architecture),
            );
            invocation.push_option("AK_WINDOWS_VERSION", settings.windows_version.clone());
        }
        Platform::Linux => {
            invocation.generator = Some("Ninja".to_string());
            invocation.push_option(
                "VCPKG_TARGET_TRIPLET",
                format!("{}-linux", variant.architecture),
            );
        }
        Platform::Android => {
            let triplet = android_triplet(&variant.architecture)?;
            let ndk_home = settings.android_ndk_home.display().to_string();
            invocation
                .env
                .push(("ANDROID_NDK_HOME".to_string(), ndk_home.clone()));
            invocation.push_option(
                "VCPKG_CHAINLOAD_TOOLCHAIN_FILE",
                format!("{ndk_home}/build/cmake/android.toolchain.cmake"),
            );
            invocation.push_option("VCPKG_TARGET_TRIPLET", triplet);
            invocation.push_option("ANDROID_ABI", variant.architecture.clone());
            invocation.push_option("ANDROID_PLATFORM", ANDROID_PLATFORM);
        }
    }

    invocation.push_option("BUILD_NUMBER", settings.build_number.clone());

    if variant.has_flag(FeatureFlag::LoggingBackend) {
        invocation.push_option("AK_ENABLE_LOGGING", "ON");
    }
    if variant.has_flag(FeatureFlag::AddressSanitizer) {
        invocation.push_option("AK_WITH_ADDRESS_SANITIZER", "ON");
    }
    if variant.has_flag(FeatureFlag::ThreadSanitizer) {
        invocation.push_option("AK_WITH_THREAD_SANITIZER", "ON");
    }

    Ok(invocation)
}
