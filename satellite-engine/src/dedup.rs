//! Duplicate-removal engine (C7): resolves each SubarchiveMap
//! duplicate to a downloader id, appends it to a do-not-download blacklist,
//! then sweeps the contents directory deleting matching files.

use satellite_core::error::{Error, Result};
use satellite_remote::LrrClient;
use satellite_vectorstore::VectorStore;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Namespace-specific convention for turning an archive's LRR tags into a
/// downloader id and recognising that id in an on-disk filename.
/// Generalises `remove_duplicate_archives_nhentai_archivist` beyond the one
/// downloader it was originally written for.
pub trait DownloaderConvention: Send + Sync {
    /// Extract this downloader's numeric id from an archive's tag string,
    /// or `None` if the tags don't name this downloader as source.
    fn extract_id(&self, tags: &str) -> Option<String>;

    /// True if `filename`'s leading whitespace-delimited token equals `id`.
    fn filename_matches(&self, filename: &str, id: &str) -> bool {
        filename
            .trim()
            .split_whitespace()
            .next()
            .is_some_and(|token| token == id)
    }
}

/// `source:nhentai.net/g/<id>/` tag convention, ported from
/// `nhdd.py::remove_duplicate_archives_nhentai_archivist`.
pub struct NhentaiArchivist;

impl DownloaderConvention for NhentaiArchivist {
    fn extract_id(&self, tags: &str) -> Option<String> {
        tags.split(',')
            .map(str::trim)
            .find_map(|tag| tag.strip_prefix("source:nhentai.net"))
            .and_then(|rest| rest.rsplit('/').find(|s| !s.is_empty()))
            .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
    }
}

/// Summary returned by [`DedupEngine::remove_duplicates`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupSummary {
    pub deleted_count: usize,
    pub deleted_bytes: u64,
    pub failed_count: usize,
    pub total_bytes: u64,
}

/// Cheap to clone (wraps a [`VectorStore`] and an `Arc<LrrClient>`).
#[derive(Clone)]
pub struct DedupEngine {
    vectors: VectorStore,
    lrr: Arc<LrrClient>,
}

impl DedupEngine {
    #[must_use]
    pub fn new(vectors: VectorStore, lrr: Arc<LrrClient>) -> Self {
        Self { vectors, lrr }
    }

    /// Resolve every `SubarchiveMap` duplicate to a
    /// downloader id via `convention`, merge those ids into `dndm_path`
    /// (one id per line, de-duplicated, order preserved), then delete
    /// matching archives under `contents_dir` unless `dry_run`.
    pub async fn remove_duplicates(
        &self,
        convention: &dyn DownloaderConvention,
        dndm_path: &Path,
        contents_dir: &Path,
        dry_run: bool,
    ) -> Result<DedupSummary> {
        if !dndm_path.exists() {
            return Err(Error::NotFound(format!(
                "do-not-download file not found: {}",
                dndm_path.display()
            )));
        }

        let duplicate_arcids = self.vectors.subarchive_map().duplicates().await?;

        let mut new_ids = Vec::new();
        for arcid in &duplicate_arcids {
            let metadata = match self.lrr.get_archive_metadata(arcid).await {
                Ok(m) => m,
                Err(Error::NotFoundRemote(_)) => continue,
                Err(e) => return Err(e),
            };
            let Some(tags) = metadata.tags else { continue };
            let Some(id) = convention.extract_id(&tags) else {
                continue;
            };
            new_ids.push(id);
        }

        let existing_raw = tokio::fs::read_to_string(dndm_path).await?;
        let mut ordered_ids: Vec<String> = existing_raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        let mut seen: BTreeSet<String> = ordered_ids.iter().cloned().collect();

        for id in new_ids {
            if seen.insert(id.clone()) {
                ordered_ids.push(id);
            }
        }

        if !dry_run {
            let mut contents = String::new();
            for id in &ordered_ids {
                contents.push_str(id);
                contents.push('\n');
            }
            tokio::fs::write(dndm_path, contents).await?;
        }

        let delete_set: BTreeSet<String> = ordered_ids.into_iter().collect();
        let candidates = discover_archives(contents_dir.to_path_buf()).await?;

        let mut summary = DedupSummary::default();
        for path in candidates {
            let Ok(meta) = tokio::fs::metadata(&path).await else {
                continue;
            };
            let size = meta.len();
            summary.total_bytes += size;

            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let matches = delete_set
                .iter()
                .any(|id| convention.filename_matches(filename, id));
            if !matches {
                continue;
            }

            if dry_run {
                summary.deleted_count += 1;
                summary.deleted_bytes += size;
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    summary.deleted_count += 1;
                    summary.deleted_bytes += size;
                }
                Err(e) => {
                    tracing::warn!("failed to delete duplicate archive {}: {e}", path.display());
                    summary.failed_count += 1;
                }
            }
        }

        Ok(summary)
    }
}

async fn discover_archives(dir: PathBuf) -> Result<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        let mut stack = vec![dir];
        while let Some(d) = stack.pop() {
            for entry in std::fs::read_dir(&d)? {
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
    })
    .await
    .map_err(|e| Error::Fatal(format!("discover_archives join error: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nhentai_extract_id_requires_digits() {
        let convention = NhentaiArchivist;
        assert_eq!(
            convention.extract_id("artist:foo, source:nhentai.net/g/123456/"),
            Some("123456".to_string())
        );
        assert_eq!(convention.extract_id("artist:foo"), None);
    }

    #[test]
    fn filename_matches_leading_whitespace_token() {
        let convention = NhentaiArchivist;
        assert!(convention.filename_matches("123456 [Artist] Title.zip", "123456"));
        assert!(!convention.filename_matches("000001 [Artist] Title.zip", "123456"));
    }
}
