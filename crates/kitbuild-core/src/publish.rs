//! Publishing archives to object storage.
//!
//! The key layout routes branch builds and tag builds to different
//! prefixes: branch builds overwrite each other under `branches/<branch>/`
//! while detached tag builds accumulate under `archive/<tag>/`.

use std::path::Path;

use crate::types::BuildError;
use crate::version::Version;

/// Bucket every artifact is published to.
pub const BUCKET: &str = "aurakit";

/// Narrow object-storage capability the publisher consumes.
pub trait ObjectStore {
    fn put(&self, bucket: &str, key: &str, file: &Path) -> Result<(), BuildError>;
}

/// The storage key an artifact file publishes under.
pub fn object_key(version: &Version, file_name: &str) -> String {
    if version.is_detached_tag() {
        format!("archive/{}/{}", version.tag, file_name)
    } else {
        format!("branches/{}/{}", version.branch, file_name)
    }
}

/// Uploads one archive and returns the key it was stored under.
pub fn publish(
    version: &Version,
    archive: &Path,
    store: &dyn ObjectStore,
) -> Result<String, BuildError> {
    let file_name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| BuildError::Upload(format!("invalid archive path {}", archive.display())))?;
    let key = object_key(version, file_name);

    println!("uploading {} to {}/{}", archive.display(), BUCKET, key);
    store.put(BUCKET, &key, archive)?;
    Ok(key)
}
