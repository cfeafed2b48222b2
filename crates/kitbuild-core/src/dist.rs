//! Distribution bundle assembly.
//!
//! A dist run stages an allow-listed subset of the source tree under the
//! build root, generates API docs and version metadata into it, then packs
//! the staging area into versioned zip archives. The staging directory is
//! rebuilt from scratch on every run.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::types::BuildError;
use crate::version::Version;

/// Product name prefixing every published artifact.
pub const PRODUCT_NAME: &str = "aurakit";

/// Directories copied from the source tree into the staging area.
pub const DIST_DIRS: [&str; 8] = [
    "cmake",
    "docs",
    "examples",
    "include",
    "src",
    "test",
    "triplets",
    "submodules/vcpkg",
];

/// Top-level files copied into the staging area.
pub const DIST_FILES: [&str; 6] = [
    ".clang-format",
    ".gitignore",
    "CMakeLists.txt",
    "LICENSE.md",
    "README.md",
    "vcpkg.json",
];

/// API documentation generation, behind a trait so bundle assembly is
/// testable without the doc toolchain installed.
pub trait DocsGenerator {
    /// Generates HTML docs in place under `staging_dir/docs`.
    fn generate(&self, staging_dir: &Path, version: &Version) -> Result<(), BuildError>;
}

/// [`DocsGenerator`] shelling out to the `doxygen` CLI.
///
/// The page footer template carries a `@VERSION@` placeholder that is
/// substituted with the resolved tag before the tool runs, so generated
/// pages are stamped with the version they document.
pub struct Doxygen;

impl DocsGenerator for Doxygen {
    fn generate(&self, staging_dir: &Path, version: &Version) -> Result<(), BuildError> {
        let docs_dir = staging_dir.join("docs");
        let template = docs_dir.join("footer.html.in");
        let footer = fs::read_to_string(&template)?.replace("@VERSION@", &version.tag);
        fs::write(docs_dir.join("footer.html"), footer)?;

        let status = std::process::Command::new("doxygen")
            .arg("Doxyfile")
            .current_dir(&docs_dir)
            .status()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    BuildError::MissingExternalTool("doxygen".to_string())
                }
                _ => BuildError::Io(e),
            })?;

        if !status.success() {
            return Err(BuildError::Docs(format!(
                "doxygen exited with {}",
                status.code().unwrap_or(-1)
            )));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct VersionManifest<'a> {
    version: &'a str,
    build_number: &'a str,
    date: String,
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

/// Collects every file under `root`, as paths relative to it, sorted.
///
/// Sorting keeps archive entry order independent of directory iteration
/// order, so two runs over the same tree produce identical archives.
fn collect_files(root: &Path) -> Result<Vec<PathBuf>, BuildError> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), BuildError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                walk(root, &path, out)?;
            } else if let Ok(relative) = path.strip_prefix(root) {
                out.push(relative.to_path_buf());
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    walk(root, root, &mut files)?;
    files.sort();
    Ok(files)
}

fn write_archive(root: &Path, archive_path: &Path) -> Result<(), BuildError> {
    // replace any archive left over from a previous run
    if archive_path.exists() {
        fs::remove_file(archive_path)?;
    }

    let mut writer = ZipWriter::new(File::create(archive_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for relative in collect_files(root)? {
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.start_file(name, options)?;
        io::copy(&mut File::open(root.join(&relative))?, &mut writer)?;
    }
    writer.finish()?;
    Ok(())
}

fn write_version_metadata(staging_dir: &Path, version: &Version) -> Result<(), BuildError> {
    let manifest = VersionManifest {
        version: &version.tag,
        build_number: &version.build_number,
        date: OffsetDateTime::now_utc().format(&Rfc3339)?,
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    fs::write(staging_dir.join("version.json"), json)?;

    let cmake_dir = staging_dir.join("cmake");
    fs::create_dir_all(&cmake_dir)?;
    let script = format!(
        "set(GIT_DESCRIBE_VERSION \"{}\")\n\
         set(GIT_VERSION_MAJOR {})\n\
         set(GIT_VERSION_MINOR {})\n\
         set(GIT_VERSION_PATCH {})\n\
         set(BUILD_NUMBER {})\n",
        version.tag, version.major, version.minor, version.patch, version.build_number
    );
    fs::write(cmake_dir.join("version.cmake"), script)?;
    Ok(())
}

fn archive_name(version: &Version, kind: &str) -> String {
    format!(
        "{PRODUCT_NAME}-{}-{}-{kind}.zip",
        version.tag, version.build_number
    )
}

/// Assembles the distribution bundle and returns the dist archive path.
///
/// The docs archive lands next to it under the build root. Missing
/// allow-list entries are an error; the source tree is expected to carry
/// every listed directory and file.
pub fn assemble(
    source_dir: &Path,
    build_root: &Path,
    version: &Version,
    docs: &dyn DocsGenerator,
) -> Result<PathBuf, BuildError> {
    let staging_dir = build_root.join("dist");
    if staging_dir.exists() {
        fs::remove_dir_all(&staging_dir)?;
    }
    fs::create_dir_all(&staging_dir)?;

    println!("staging distribution tree");
    for dir in DIST_DIRS {
        copy_tree(&source_dir.join(dir), &staging_dir.join(dir))?;
    }
    for file in DIST_FILES {
        fs::copy(source_dir.join(file), staging_dir.join(file))?;
    }

    println!("writing version metadata for {}", version.tag);
    write_version_metadata(&staging_dir, version)?;

    println!("generating documentation");
    docs.generate(&staging_dir, version)?;

    let docs_archive = build_root.join(archive_name(version, "docs"));
    println!("packing {}", docs_archive.display());
    write_archive(&staging_dir.join("docs/html"), &docs_archive)?;

    let dist_archive = build_root.join(archive_name(version, "dist"));
    println!("packing {}", dist_archive.display());
    write_archive(&staging_dir, &dist_archive)?;

    Ok(dist_archive)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDocs;

    impl DocsGenerator for FakeDocs {
        fn generate(&self, staging_dir: &Path, version: &Version) -> Result<(), BuildError> {
            let html = staging_dir.join("docs/html");
            fs::create_dir_all(&html)?;
            fs::write(html.join("index.html"), format!("docs for {}", version.tag))?;
            Ok(())
        }
    }

    fn version() -> Version {
        Version::from_parts("v1.2.3", "main", "9").unwrap()
    }

    fn seed_source_tree(source_dir: &Path) {
        for dir in DIST_DIRS {
            let path = source_dir.join(dir);
            fs::create_dir_all(&path).unwrap();
            fs::write(path.join("keep.txt"), dir).unwrap();
        }
        for file in DIST_FILES {
            fs::write(source_dir.join(file), file).unwrap();
        }
        // files outside the allow-list must never reach the bundle
        fs::write(source_dir.join("notes.txt"), "scratch").unwrap();
        fs::create_dir_all(source_dir.join("ci")).unwrap();
        fs::write(source_dir.join("ci/pipeline.yml"), "ci").unwrap();
    }

    fn archive_entries(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn bundle_contains_only_allow_listed_content() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("src");
        let build_root = dir.path().join("build");
        seed_source_tree(&source_dir);

        let archive = assemble(&source_dir, &build_root, &version(), &FakeDocs).unwrap();
        assert_eq!(
            archive.file_name().unwrap().to_str().unwrap(),
            "aurakit-v1.2.3-9-dist.zip"
        );

        let entries = archive_entries(&archive);
        assert!(entries.contains(&"include/keep.txt".to_string()));
        assert!(entries.contains(&"submodules/vcpkg/keep.txt".to_string()));
        assert!(entries.contains(&"CMakeLists.txt".to_string()));
        assert!(entries.contains(&"version.json".to_string()));
        assert!(entries.contains(&"cmake/version.cmake".to_string()));
        assert!(!entries.iter().any(|e| e.contains("notes.txt")));
        assert!(!entries.iter().any(|e| e.starts_with("ci/")));
    }

    #[test]
    fn docs_archive_packs_generated_html() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("src");
        let build_root = dir.path().join("build");
        seed_source_tree(&source_dir);

        assemble(&source_dir, &build_root, &version(), &FakeDocs).unwrap();
        let entries = archive_entries(&build_root.join("aurakit-v1.2.3-9-docs.zip"));
        assert_eq!(entries, ["index.html"]);
    }

    #[test]
    fn version_metadata_is_written_into_staging() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("src");
        let build_root = dir.path().join("build");
        seed_source_tree(&source_dir);

        assemble(&source_dir, &build_root, &version(), &FakeDocs).unwrap();

        let staging = build_root.join("dist");
        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(staging.join("version.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["version"], "v1.2.3");
        assert_eq!(manifest["build_number"], "9");
        assert!(manifest["date"].as_str().unwrap().contains('T'));

        let script = fs::read_to_string(staging.join("cmake/version.cmake")).unwrap();
        assert!(script.contains("set(GIT_DESCRIBE_VERSION \"v1.2.3\")"));
        assert!(script.contains("set(GIT_VERSION_MINOR 2)"));
        assert!(script.contains("set(BUILD_NUMBER 9)"));
    }

    #[test]
    fn reassembly_overwrites_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("src");
        let build_root = dir.path().join("build");
        seed_source_tree(&source_dir);

        let first = assemble(&source_dir, &build_root, &version(), &FakeDocs).unwrap();
        // a second run must not accumulate stale staging content
        fs::write(source_dir.join("include/new.txt"), "added").unwrap();
        let second = assemble(&source_dir, &build_root, &version(), &FakeDocs).unwrap();

        assert_eq!(first, second);
        let entries = archive_entries(&second);
        assert!(entries.contains(&"include/new.txt".to_string()));
    }

    #[test]
    fn archive_entry_order_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("src");
        let build_root = dir.path().join("build");
        seed_source_tree(&source_dir);

        let archive = assemble(&source_dir, &build_root, &version(), &FakeDocs).unwrap();
        let entries = archive_entries(&archive);
        let mut sorted = entries.clone();
        sorted.sort();
        assert_eq!(entries, sorted);
    }

    #[test]
    fn missing_allow_list_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("src");
        let build_root = dir.path().join("build");
        seed_source_tree(&source_dir);
        fs::remove_file(source_dir.join("vcpkg.json")).unwrap();

        let err = assemble(&source_dir, &build_root, &version(), &FakeDocs).unwrap_err();
        assert!(matches!(err, BuildError::Io(_)));
    }

    #[test]
    fn doxygen_footer_template_is_substituted() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("dist");
        let docs = staging.join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("footer.html.in"), "<span>@VERSION@</span>").unwrap();

        // doxygen itself is absent in the test environment; exercise only the
        // template step by calling the substitution through a failing run
        let result = Doxygen.generate(&staging, &version());
        let footer = fs::read_to_string(docs.join("footer.html")).unwrap();
        assert_eq!(footer, "<span>v1.2.3</span>");
        assert!(result.is_err());
    }
}
