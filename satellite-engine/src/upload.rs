//! Bulk upload engine (C5): walks an upload directory (or
//! zips leaf folders), checksums and signature-gates candidates, then PUTs
//! them to LRR with bounded concurrency and exponential backoff.

use crate::fsutil::{canonical_path_key, mtime_of};
use satellite_core::error::{Error, Result};
use satellite_core::retry::{backoff_delay, MAX_ATTEMPTS};
use satellite_core::signature::{is_valid_signature_hex, signature_hex};
use satellite_core::types::ArchiveUpload;
use satellite_jobstore::JobStore;
use satellite_remote::LrrClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How candidates are discovered in the upload directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// Every regular file under the directory is a candidate archive.
    ArchiveFile,
    /// Every leaf folder (no subdirectories) is zipped into a temp file
    /// before upload.
    LeafFolder,
}

/// Outcome tally returned by [`UploadEngine::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum UploadOutcome {
    Uploaded,
    Skipped,
}

/// Bulk upload engine. Cheap to clone (wraps a [`JobStore`] and an
/// `Arc<LrrClient>`).
#[derive(Clone)]
pub struct UploadEngine {
    jobstore: JobStore,
    lrr: Arc<LrrClient>,
}

impl UploadEngine {
    #[must_use]
    pub fn new(jobstore: JobStore, lrr: Arc<LrrClient>) -> Self {
        Self { jobstore, lrr }
    }

    /// Upload every candidate under `upload_dir`, bounded to `concurrency`
    /// simultaneous uploads (default 8).
    pub async fn run(
        &self,
        upload_dir: &Path,
        mode: UploadMode,
        concurrency: usize,
    ) -> Result<UploadSummary> {
        let candidates = list_candidates(upload_dir.to_path_buf(), mode).await?;
        let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));

        let mut handles = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let sem = Arc::clone(&semaphore);
            let engine = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await;
                engine.upload_one(&candidate).await
            }));
        }

        let mut summary = UploadSummary::default();
        for handle in futures::future::join_all(handles).await {
            match handle {
                Ok(Ok(UploadOutcome::Uploaded)) => summary.uploaded += 1,
                Ok(Ok(UploadOutcome::Skipped)) => summary.skipped += 1,
                Ok(Err(e)) => {
                    tracing::warn!("upload candidate failed: {e}");
                    summary.failed += 1;
                }
                Err(e) => {
                    tracing::warn!("upload task panicked: {e}");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn upload_one(&self, path: &Path) -> Result<UploadOutcome> {
        let (key, abs) = canonical_path_key(path);
        let mtime = mtime_of(&abs)?;
        let uploads = self.jobstore.archive_upload();

        if let Some(existing) = uploads.get(&key).await? {
            if (existing.mtime - mtime).abs() < f64::EPSILON {
                return Ok(UploadOutcome::Skipped);
            }
        }

        let bytes = tokio::fs::read(&abs).await?;

        let sig_hex = signature_hex(&bytes);
        if !is_valid_signature_hex(&sig_hex) {
            return Ok(UploadOutcome::Skipped);
        }

        let checksum = sha1_hex(&bytes);
        let filename = abs
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("archive.zip")
            .to_string();

        let mut integrity_retries = 0u32;
        let mut transient_attempts = 0u32;
        loop {
            match self
                .lrr
                .upload_archive(&filename, bytes.clone(), Some(&checksum))
                .await
            {
                Ok((status, _resp)) => match status.as_u16() {
                    200 => {
                        uploads
                            .upsert(&ArchiveUpload {
                                md5: key,
                                path: abs.to_string_lossy().to_string(),
                                mtime,
                            })
                            .await?;
                        return Ok(UploadOutcome::Uploaded);
                    }
                    409 => {
                        uploads
                            .upsert(&ArchiveUpload {
                                md5: key,
                                path: abs.to_string_lossy().to_string(),
                                mtime,
                            })
                            .await?;
                        return Ok(UploadOutcome::Skipped);
                    }
                    417 => {
                        integrity_retries += 1;
                        if integrity_retries >= 3 {
                            return Ok(UploadOutcome::Skipped);
                        }
                    }
                    other => {
                        tracing::warn!("upload of {filename} rejected with status {other}");
                        return Ok(UploadOutcome::Skipped);
                    }
                },
                Err(Error::Transient(msg)) => {
                    transient_attempts += 1;
                    if transient_attempts > MAX_ATTEMPTS {
                        return Err(Error::Transient(msg));
                    }
                    tokio::time::sleep(backoff_delay(transient_attempts)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn sha1_hex(bytes: &[u8]) -> String {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    for chunk in bytes.chunks(8192) {
        hasher.update(chunk);
    }
    hex::encode(hasher.finalize())
}

async fn list_candidates(upload_dir: PathBuf, mode: UploadMode) -> Result<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
        match mode {
            UploadMode::ArchiveFile => {
                let mut out = Vec::new();
                let mut stack = vec![upload_dir];
                while let Some(dir) = stack.pop() {
                    for entry in std::fs::read_dir(&dir)? {
                        let entry = entry?;
                        let path = entry.path();
                        if path.is_dir() {
                            stack.push(path);
                        } else {
                            out.push(path);
                        }
                    }
                }
                Ok(out)
            }
            UploadMode::LeafFolder => {
                let mut leaves = Vec::new();
                collect_leaf_folders(&upload_dir, &mut leaves)?;
                leaves.iter().map(|leaf| zip_leaf_folder(leaf)).collect()
            }
        }
    })
    .await
    .map_err(|e| Error::Fatal(format!("upload discovery join error: {e}")))?
}

/// Recurses into `dir`, pushing it onto `out` iff it has no subdirectories
/// (a "leaf folder").
fn collect_leaf_folders(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut has_subdir = false;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            has_subdir = true;
            collect_leaf_folders(&path, out)?;
        }
    }
    if !has_subdir {
        out.push(dir.to_path_buf());
    }
    Ok(())
}

fn zip_leaf_folder(dir: &Path) -> Result<PathBuf> {
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("archive");
    let mut out_path = std::env::temp_dir();
    out_path.push(format!(
        "satellite-upload-{name}-{}-{}.zip",
        std::process::id(),
        md5_short(dir)
    ));

    let file = std::fs::File::create(&out_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(member_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        writer
            .start_file(member_name, options)
            .map_err(|e| Error::Fatal(format!("zip start_file failed: {e}")))?;
        let bytes = std::fs::read(&path)?;
        std::io::Write::write_all(&mut writer, &bytes)?;
    }
    writer
        .finish()
        .map_err(|e| Error::Fatal(format!("zip finish failed: {e}")))?;

    Ok(out_path)
}

fn md5_short(dir: &Path) -> String {
    crate::fsutil::canonical_path_key(dir).0[..8].to_string()
}
