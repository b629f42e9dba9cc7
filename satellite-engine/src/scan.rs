//! Archive discovery + integrity analysis engine (C5).

use crate::fsutil::{canonical_path_key, mtime_of};
use satellite_core::error::{Error, Result};
use satellite_core::signature::{image_completeness, ImageCompleteness, ALLOWED_EXTENSIONS};
use satellite_core::types::{ArchiveScan, ScanStatus};
use satellite_jobstore::JobStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn has_allowed_extension(path: &Path) -> bool {
    let name = path.to_string_lossy().to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .iter()
        .any(|ext| name.ends_with(&format!(".{ext}")))
}

/// Walks a contents directory, classifies on-disk archives and writes
/// results into the C1 `archive_scan` table. Cheap to clone (wraps a
/// [`JobStore`]).
#[derive(Clone)]
pub struct ScanEngine {
    jobstore: JobStore,
}

/// Tally returned by [`ScanEngine::discover`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoverySummary {
    pub new_or_changed: usize,
    pub unchanged: usize,
}

/// Tally returned by [`ScanEngine::analyze`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisSummary {
    pub ok: usize,
    pub corrupted: usize,
    pub error: usize,
    pub missing: usize,
}

impl ScanEngine {
    #[must_use]
    pub fn new(jobstore: JobStore) -> Self {
        Self { jobstore }
    }

    /// Discovery phase: upsert a PENDING row for every
    /// candidate file whose `(md5, mtime)` doesn't already match.
    pub async fn discover(&self, contents_dir: &Path) -> Result<DiscoverySummary> {
        let candidates = list_candidates(contents_dir.to_path_buf()).await?;
        let scans = self.jobstore.archive_scan();
        let mut summary = DiscoverySummary::default();

        for path in candidates {
            let (key, abs) = canonical_path_key(&path);
            let mtime = mtime_of(&abs)?;
            let abs_str = abs.to_string_lossy().to_string();

            if let Some(existing) = scans.get(&key).await? {
                if (existing.mtime - mtime).abs() < f64::EPSILON && existing.path == abs_str {
                    summary.unchanged += 1;
                    continue;
                }
            }

            scans
                .upsert(&ArchiveScan {
                    md5: key,
                    path: abs_str,
                    status: ScanStatus::Pending,
                    mtime,
                })
                .await?;
            summary.new_or_changed += 1;
        }

        Ok(summary)
    }

    /// Analysis phase, processed in batches of `batch_size` so progress
    /// survives interruption. `num_workers` follows the classic worker-count
    /// convention: `0` spreads the CPU-bound classification across every
    /// available core, `1` runs it in-process one file at a time, and any
    /// other `k` bounds concurrency to a pool of `k`.
    pub async fn analyze(&self, batch_size: usize, num_workers: usize) -> Result<AnalysisSummary> {
        let scans = self.jobstore.archive_scan();
        let pending = scans.by_status(ScanStatus::Pending, 0).await?;
        let mut summary = AnalysisSummary::default();
        let workers = resolve_worker_count(num_workers);

        for batch in pending.chunks(batch_size.max(1)) {
            if workers <= 1 {
                for row in batch {
                    let path = PathBuf::from(&row.path);
                    if !path.exists() {
                        scans.delete(&row.md5).await?;
                        summary.missing += 1;
                        continue;
                    }

                    let status = classify_archive(path).await;
                    match status {
                        ScanStatus::Ok => summary.ok += 1,
                        ScanStatus::Corrupted => summary.corrupted += 1,
                        _ => summary.error += 1,
                    }

                    scans
                        .upsert(&ArchiveScan {
                            md5: row.md5.clone(),
                            path: row.path.clone(),
                            status,
                            mtime: row.mtime,
                        })
                        .await?;
                }
                continue;
            }

            let semaphore = Arc::new(tokio::sync::Semaphore::new(workers));
            let mut handles = Vec::with_capacity(batch.len());
            for row in batch {
                let row = row.clone();
                let sem = Arc::clone(&semaphore);
                handles.push(tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await;
                    let path = PathBuf::from(&row.path);
                    if !path.exists() {
                        return (row, None);
                    }
                    let status = classify_archive(path).await;
                    (row, Some(status))
                }));
            }

            for handle in futures::future::join_all(handles).await {
                match handle {
                    Ok((row, None)) => {
                        scans.delete(&row.md5).await?;
                        summary.missing += 1;
                    }
                    Ok((row, Some(status))) => {
                        match status {
                            ScanStatus::Ok => summary.ok += 1,
                            ScanStatus::Corrupted => summary.corrupted += 1,
                            _ => summary.error += 1,
                        }
                        scans
                            .upsert(&ArchiveScan {
                                md5: row.md5.clone(),
                                path: row.path.clone(),
                                status,
                                mtime: row.mtime,
                            })
                            .await?;
                    }
                    Err(e) => {
                        tracing::warn!("scan analysis task panicked: {e}");
                        summary.error += 1;
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Delete-corrupted: unlink the file (tolerating
    /// file-missing) and delete the row, for every CORRUPTED row.
    pub async fn delete_corrupted(&self) -> Result<usize> {
        let scans = self.jobstore.archive_scan();
        let corrupted = scans.by_status(ScanStatus::Corrupted, 0).await?;
        let mut count = 0;
        for row in &corrupted {
            let path = PathBuf::from(&row.path);
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(Error::Io(e));
                }
            }
            scans.delete(&row.md5).await?;
            count += 1;
        }
        Ok(count)
    }
}

/// `0` means "every available core", `1` means "no pool at all", anything
/// else is taken as given.
fn resolve_worker_count(num_workers: usize) -> usize {
    if num_workers == 0 {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    } else {
        num_workers
    }
}

async fn list_candidates(contents_dir: PathBuf) -> Result<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        let mut stack = vec![contents_dir];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if has_allowed_extension(&path) {
                    out.push(path);
                }
            }
        }
        Ok(out)
    })
    .await
    .map_err(|e| Error::Fatal(format!("discovery join error: {e}")))?
}

/// Classification rules: non-zip archives are CORRUPTED;
/// within a zip/cbz, every PNG/JPEG member must pass the byte-level
/// completeness check; anything unexpected is ERROR.
async fn classify_archive(path: PathBuf) -> ScanStatus {
    tokio::task::spawn_blocking(move || classify_archive_sync(&path))
        .await
        .unwrap_or(ScanStatus::Error)
}

fn classify_archive_sync(path: &Path) -> ScanStatus {
    let Ok(file) = std::fs::File::open(path) else {
        return ScanStatus::Error;
    };
    let mut archive = match zip::ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(_) => return ScanStatus::Corrupted,
    };

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(_) => return ScanStatus::Error,
        };
        let name = entry.name().to_string();
        let lower = name.to_ascii_lowercase();
        if !(lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg")) {
            continue;
        }

        let mut bytes = Vec::new();
        if std::io::Read::read_to_end(&mut entry, &mut bytes).is_err() {
            return ScanStatus::Error;
        }

        match image_completeness(&name, &bytes) {
            ImageCompleteness::Complete => {}
            ImageCompleteness::Incomplete | ImageCompleteness::UnsupportedFormat => {
                return ScanStatus::Corrupted;
            }
        }
    }

    ScanStatus::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discovery_skips_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("a.zip");
        std::fs::write(&file_path, b"PK\x03\x04fake").unwrap();

        let jobstore = JobStore::open_in_memory().await.unwrap();
        let engine = ScanEngine::new(jobstore);

        let first = engine.discover(dir.path()).await.unwrap();
        assert_eq!(first.new_or_changed, 1);

        let second = engine.discover(dir.path()).await.unwrap();
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.new_or_changed, 0);
    }

    #[tokio::test]
    async fn analysis_marks_non_zip_as_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("bad.zip");
        std::fs::write(&file_path, b"not actually a zip").unwrap();

        let jobstore = JobStore::open_in_memory().await.unwrap();
        let engine = ScanEngine::new(jobstore);
        engine.discover(dir.path()).await.unwrap();
        let summary = engine.analyze(100, 1).await.unwrap();
        assert_eq!(summary.corrupted, 1);
    }
}
