use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::path::{Path, PathBuf};

use kitbuild_core::dist::{self, Doxygen};
use kitbuild_core::executor::CMakeCli;
use kitbuild_core::invocation::{default_ndk_home, GlobalSettings};
use kitbuild_core::matrix::{variant_matrix, MatrixOptions};
use kitbuild_core::pipeline;
use kitbuild_core::publish;
use kitbuild_core::spaces::SpacesClient;
use kitbuild_core::testrun::ProcessInvoker;
use kitbuild_core::types::Platform;
use kitbuild_core::version::{GitCli, Version};

/// CI build orchestrator for the aurakit SDK.
#[derive(Parser, Debug)]
#[command(name = "kitbuild", author, version, about = "aurakit build orchestrator", long_about = None)]
struct Cli {
    /// Build Debug instead of RelWithDebInfo.
    #[arg(long)]
    debug: bool,

    /// Directory the per-variant build trees live under, relative to the
    /// source tree.
    #[arg(long, default_value = "build")]
    build_root: PathBuf,

    /// CI build counter stamped into version metadata.
    #[arg(long, default_value = "0")]
    build_number: String,

    /// Assemble the distribution bundle instead of running the build matrix.
    #[arg(long)]
    dist: bool,

    /// Reuse existing build output; only run tests.
    #[arg(long)]
    skip_build: bool,

    /// Upload the dist archive to object storage (requires --dist).
    #[arg(long, requires = "dist")]
    upload: bool,

    /// Spaces access key; falls back to SPACES_KEY.
    #[arg(long)]
    spaces_key: Option<String>,

    /// Spaces secret key; falls back to SPACES_SECRET.
    #[arg(long)]
    spaces_secret: Option<String>,

    /// Cross-compile the Android variant fan-out instead of building for the
    /// host platform.
    #[arg(long)]
    android: bool,

    /// Also build and test a logging + AddressSanitizer variant (macOS).
    #[arg(long)]
    asan: bool,

    /// Also build and test a logging + ThreadSanitizer variant (macOS).
    #[arg(long)]
    tsan: bool,

    /// Notarize macOS artifacts after signing.
    #[arg(long)]
    notarize: bool,

    #[arg(long, default_value = "10.15")]
    macos_deployment_target: String,

    #[arg(long, default_value = "9A7QX2WKLM")]
    macos_development_team: String,

    #[arg(long, default_value = "Developer ID Application: Aurora Audio (9A7QX2WKLM)")]
    macos_developer_id_application: String,

    #[arg(long, default_value = "Developer ID Installer: Aurora Audio (9A7QX2WKLM)")]
    macos_developer_id_installer: String,

    #[arg(long, default_value = "com.auroraaudio.aurakit")]
    macos_notarization_bundle_id: String,

    /// Apple ID used for notarization; falls back to NOTARIZATION_USERNAME.
    #[arg(long)]
    macos_notarization_username: Option<String>,

    /// App-specific password for notarization; falls back to
    /// NOTARIZATION_PASSWORD.
    #[arg(long)]
    macos_notarization_password: Option<String>,

    /// Minimum Windows version the SDK targets (_WIN32_WINNT).
    #[arg(long, default_value = "0x0A00")]
    windows_version: String,

    /// Android NDK install to cross-compile with.
    #[arg(long)]
    android_ndk_home: Option<PathBuf>,
}

fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let source_dir = source_root()?;
    let build_root = source_dir.join(&cli.build_root);

    let vcs = GitCli::new(&source_dir);
    let version = Version::resolve(&vcs, &cli.build_number)
        .context("resolving version from git; a reachable v* tag is required")?;
    println!(
        "version {} (branch {}, build {})",
        version.tag, version.branch, version.build_number
    );

    if cli.dist {
        run_dist(&cli, &source_dir, &build_root, &version)
    } else {
        run_build_matrix(&cli, source_dir, build_root)
    }
}

fn run_build_matrix(cli: &Cli, source_dir: PathBuf, build_root: PathBuf) -> Result<()> {
    let platform = if cli.android {
        Platform::Android
    } else {
        Platform::host()?
    };

    if cli.notarize {
        // Signing identities are applied at configure time; notarization of
        // packaged installers happens in the packaging job downstream, which
        // reads the same flags.
        let username = resolve_credential(
            cli.macos_notarization_username.as_deref(),
            "NOTARIZATION_USERNAME",
        );
        let password = resolve_credential(
            cli.macos_notarization_password.as_deref(),
            "NOTARIZATION_PASSWORD",
        );
        if username.is_none() || password.is_none() {
            anyhow::bail!("notarization requires an Apple ID username and password");
        }
        println!(
            "notarization requested for {} (app: {}, installer: {})",
            cli.macos_notarization_bundle_id,
            cli.macos_developer_id_application,
            cli.macos_developer_id_installer
        );
    }

    let opts = MatrixOptions {
        debug: cli.debug,
        with_asan: cli.asan,
        with_tsan: cli.tsan,
    };
    let variants = variant_matrix(platform, &opts)?;
    println!("building {} variant(s) for {}", variants.len(), platform.as_str());

    let settings = GlobalSettings {
        source_dir,
        build_root,
        build_number: cli.build_number.clone(),
        skip_build: cli.skip_build,
        macos_deployment_target: cli.macos_deployment_target.clone(),
        macos_development_team: cli.macos_development_team.clone(),
        windows_version: cli.windows_version.clone(),
        android_ndk_home: cli
            .android_ndk_home
            .clone()
            .unwrap_or_else(default_ndk_home),
    };

    let runs = pipeline::run_matrix(&variants, &settings, &CMakeCli, &ProcessInvoker)?;
    for run in &runs {
        println!("tests passed for {} ({})", run.variant, run.report_path.display());
    }
    println!("all variants succeeded");
    Ok(())
}

fn run_dist(cli: &Cli, source_dir: &Path, build_root: &Path, version: &Version) -> Result<()> {
    let archive = dist::assemble(source_dir, build_root, version, &Doxygen)?;
    println!("distribution bundle ready: {}", archive.display());

    if cli.upload {
        let store = SpacesClient::new(
            resolve_credential(cli.spaces_key.as_deref(), "SPACES_KEY"),
            resolve_credential(cli.spaces_secret.as_deref(), "SPACES_SECRET"),
        )?;
        let key = publish::publish(version, &archive, &store)?;
        println!("uploaded as {key}");
    }
    Ok(())
}

/// Resolves a credential from its flag, falling back to the environment.
fn resolve_credential(flag: Option<&str>, env_var: &str) -> Option<String> {
    if let Some(value) = flag
        && !value.is_empty()
    {
        return Some(value.to_string());
    }
    env::var(env_var).ok().filter(|v| !v.is_empty())
}

fn load_dotenv() {
    if let Ok(root) = source_root() {
        let path = root.join(".env.local");
        let _ = dotenvy::from_path(path);
    }
}

fn source_root() -> Result<PathBuf> {
    // Prefer the build-time repo root but fall back to the current directory for installed binaries.
    let compiled = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..");
    if let Ok(path) = compiled.canonicalize() {
        return Ok(path);
    }
    env::current_dir().context("resolving source root from current directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_credential_wins_over_environment() {
        unsafe { env::set_var("KITBUILD_TEST_CRED", "from-env") };
        assert_eq!(
            resolve_credential(Some("from-flag"), "KITBUILD_TEST_CRED"),
            Some("from-flag".to_string())
        );
        unsafe { env::remove_var("KITBUILD_TEST_CRED") };
    }

    #[test]
    fn empty_flag_falls_back_to_environment() {
        unsafe { env::set_var("KITBUILD_TEST_CRED_2", "from-env") };
        assert_eq!(
            resolve_credential(Some(""), "KITBUILD_TEST_CRED_2"),
            Some("from-env".to_string())
        );
        unsafe { env::remove_var("KITBUILD_TEST_CRED_2") };
    }

    #[test]
    fn missing_credential_resolves_to_none() {
        assert_eq!(resolve_credential(None, "KITBUILD_TEST_CRED_UNSET"), None);
    }

    #[test]
    fn cli_rejects_upload_without_dist() {
        assert!(Cli::try_parse_from(["kitbuild", "--upload"]).is_err());
        assert!(Cli::try_parse_from(["kitbuild", "--dist", "--upload"]).is_ok());
    }
}
