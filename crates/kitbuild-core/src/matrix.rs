//! Variant matrix generation.
//!
//! For a chosen platform this enumerates the ordered list of
//! [`BuildVariant`]s to produce. Order matters: the orchestrator is
//! fail-fast, so a later variant is never attempted after an earlier one
//! fails.

use crate::types::{BuildError, BuildType, BuildVariant, FeatureFlag, Platform};

/// Run options that shape the matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixOptions {
    /// Build Debug instead of RelWithDebInfo.
    pub debug: bool,
    /// Append a logging + AddressSanitizer variant (macOS only).
    pub with_asan: bool,
    /// Append a logging + ThreadSanitizer variant (macOS only).
    pub with_tsan: bool,
}

/// The Android ABIs the fan-out covers, in build order.
pub const ANDROID_ABIS: [&str; 4] = ["arm64-v8a", "x86_64", "armeabi-v7a", "x86"];

/// Maps an Android ABI to its vcpkg target triplet.
///
/// Total over [`ANDROID_ABIS`]; anything else fails with
/// [`BuildError::UnsupportedArchitecture`].
pub fn android_triplet(abi: &str) -> Result<&'static str, BuildError> {
    match abi {
        "arm64-v8a" => Ok("arm64-android"),
        "x86_64" => Ok("x64-android"),
        "armeabi-v7a" => Ok("arm-android"),
        "x86" => Ok("x86-android"),
        other => Err(BuildError::UnsupportedArchitecture(other.to_string())),
    }
}

fn android_subfolder(abi: &str) -> Result<&'static str, BuildError> {
    match abi {
        "arm64-v8a" => Ok("android_arm64"),
        "x86_64" => Ok("android_x64"),
        "armeabi-v7a" => Ok("android_arm"),
        "x86" => Ok("android_x86"),
        other => Err(BuildError::UnsupportedArchitecture(other.to_string())),
    }
}

/// Enumerates the ordered variant list for `platform`.
///
/// Deterministic: identical inputs produce identical sequences, each with a
/// unique `subfolder`. AddressSanitizer and ThreadSanitizer are emitted as
/// separate variants, never combined.
pub fn variant_matrix(
    platform: Platform,
    opts: &MatrixOptions,
) -> Result<Vec<BuildVariant>, BuildError> {
    let build_type = if opts.debug {
        BuildType::Debug
    } else {
        BuildType::ReleaseWithDebugInfo
    };

    let variant = |architecture: &str, flags: Vec<FeatureFlag>, subfolder: &str| BuildVariant {
        platform,
        architecture: architecture.to_string(),
        build_type,
        flags,
        subfolder: subfolder.to_string(),
    };

    let mut variants = Vec::new();
    match platform {
        Platform::MacOs => {
            variants.push(variant("universal", Vec::new(), "macos_universal"));
            if opts.with_asan {
                variants.push(variant(
                    "universal",
                    vec![FeatureFlag::LoggingBackend, FeatureFlag::AddressSanitizer],
                    "macos_universal_logging_asan",
                ));
            }
            if opts.with_tsan {
                variants.push(variant(
                    "universal",
                    vec![FeatureFlag::LoggingBackend, FeatureFlag::ThreadSanitizer],
                    "macos_universal_logging_tsan",
                ));
            }
        }
        Platform::Android => {
            // Fixed fan-out, independent of the sanitizer/debug options.
            for abi in ANDROID_ABIS {
                let subfolder = android_subfolder(abi)?;
                variants.push(variant(abi, Vec::new(), subfolder));
                variants.push(variant(
                    abi,
                    vec![FeatureFlag::LoggingBackend],
                    &format!("{subfolder}_logging"),
                ));
            }
        }
        Platform::Windows | Platform::Linux => {
            let base = format!("{}_x64", platform.as_str());
            variants.push(variant("x64", Vec::new(), &base));
            variants.push(variant(
                "x64",
                vec![FeatureFlag::LoggingBackend],
                &format!("{base}_logging"),
            ));
        }
    }

    Ok(variants)
}
