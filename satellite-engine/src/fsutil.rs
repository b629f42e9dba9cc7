//! Filesystem helpers shared by the scan and upload engines (both
//! `ArchiveScan` and `ArchiveUpload` are keyed by `md5(absolute path)`).

use satellite_core::error::Result;
use std::path::{Path, PathBuf};

pub(crate) fn md5_hex(data: &[u8]) -> String {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub(crate) fn mtime_of(path: &Path) -> Result<f64> {
    let meta = std::fs::metadata(path)?;
    let modified = meta.modified()?;
    Ok(modified
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64())
}

/// `(md5(absolute path), absolute path as string)`. Falls back to the given
/// path unchanged if canonicalisation fails (e.g. a dangling symlink).
pub(crate) fn canonical_path_key(path: &Path) -> (String, PathBuf) {
    let abs = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let key = md5_hex(abs.to_string_lossy().as_bytes());
    (key, abs)
}
