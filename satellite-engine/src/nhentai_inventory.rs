//! Nhentai-archive inventory sync (C7 support, backing
//! `/api/nhdd/nhentai-archives`): populates the C2 `NhentaiArchive` catalogue
//! the retention rubric's favourite-count reason reads from.
//!
//! Ported from `examples/original_source/src/satellite/service/nhdd.py`'s
//! `update_nhentai_archives_table`/`update_nhentai_favorites`.

use satellite_core::error::{Error, Result};
use satellite_core::types::Language;
use satellite_remote::LrrClient;
use satellite_vectorstore::{MetadataJobStatus, VectorStore};
use std::sync::Arc;

fn source_id_from_tags(tags: &str) -> Option<String> {
    tags.split(',')
        .map(str::trim)
        .find_map(|tag| tag.strip_prefix("source:nhentai.net"))
        .and_then(|rest| rest.rsplit('/').find(|s| !s.is_empty()))
        .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

fn language_from_tags(tags: &str) -> Language {
    let lower: Vec<String> = tags.split(',').map(|t| t.trim().to_ascii_lowercase()).collect();
    let has = |needle: &str| lower.iter().any(|t| t == needle);
    if has("language:english") {
        Language::En
    } else if has("language:chinese") {
        Language::Cn
    } else if has("language:japanese") {
        Language::Jp
    } else if has("language:translated") {
        Language::Other
    } else {
        Language::Untranslated
    }
}

/// Tally returned by [`NhentaiInventoryEngine::discover_archives`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NhentaiDiscoverySummary {
    pub inserted: usize,
    pub skipped_untagged: usize,
}

/// Tally returned by [`NhentaiInventoryEngine::fetch_favorites`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FavoritesSummary {
    pub updated: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct NhentaiInventoryEngine {
    vectors: VectorStore,
    lrr: Arc<LrrClient>,
}

impl NhentaiInventoryEngine {
    #[must_use]
    pub fn new(vectors: VectorStore, lrr: Arc<LrrClient>) -> Self {
        Self { vectors, lrr }
    }

    /// Inventories every LRR archive, inserting a `favorites = -1` row
    /// keyed by its nhentai source id and parsed language.
    pub async fn discover_archives(&self) -> Result<NhentaiDiscoverySummary> {
        let archives = self.lrr.get_all_archives().await?;
        let store = self.vectors.nhentai_archives();
        let mut summary = NhentaiDiscoverySummary::default();

        for archive in archives {
            let Some(tags) = archive.tags.filter(|t| !t.is_empty()) else {
                summary.skipped_untagged += 1;
                continue;
            };
            let nhentai_id = source_id_from_tags(&tags);
            let language = language_from_tags(&tags);
            store
                .insert(&archive.arcid, nhentai_id.as_deref(), -1, language)
                .await?;
            summary.inserted += 1;
        }
        Ok(summary)
    }

    /// For every archive whose favourite count hasn't been fetched yet (or,
    /// if `redo_failed`, whose last fetch errored), invoke the `nhplugin`
    /// plugin and parse back a favourite count.
    pub async fn fetch_favorites(&self, redo_failed: bool) -> Result<FavoritesSummary> {
        const BATCH_LIMIT: i64 = 10_000;

        let nhentai_store = self.vectors.nhentai_archives();
        let jobs = self.vectors.metadata_jobs();
        let mut summary = FavoritesSummary::default();

        let pending = nhentai_store
            .by_favorites_without_metadata_task(-1, BATCH_LIMIT)
            .await?;
        for arcid in pending {
            jobs.upsert(&arcid, MetadataJobStatus::Pending, None).await?;
        }

        let mut statuses = vec![MetadataJobStatus::Pending];
        if redo_failed {
            statuses.push(MetadataJobStatus::Failed);
        }

        for status in statuses {
            let tasks = jobs.by_status(status).await?;
            for arcid in tasks {
                match self.fetch_one_favorite(&arcid).await {
                    Ok(favorites) => {
                        nhentai_store.update_favorites(&arcid, favorites).await?;
                        jobs.upsert(&arcid, MetadataJobStatus::Success, None).await?;
                        summary.updated += 1;
                    }
                    Err(e) => {
                        tracing::warn!("favorites fetch failed for {arcid}: {e}");
                        jobs.upsert(&arcid, MetadataJobStatus::Failed, Some(&e.to_string()))
                            .await?;
                        summary.failed += 1;
                    }
                }
            }
        }
        Ok(summary)
    }

    async fn fetch_one_favorite(&self, arcid: &str) -> Result<i64> {
        let resp = self.lrr.use_plugin("nhplugin", Some(arcid), None).await?;
        if let Some(err) = resp.error {
            return Err(Error::NotFoundRemote(err));
        }
        resp.data
            .as_ref()
            .and_then(|d| d.get("favorites"))
            .and_then(|v| v.as_i64())
            .ok_or_else(|| {
                Error::CorruptInput(format!("no favorites field in plugin response for {arcid}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_id_extracts_trailing_digits() {
        assert_eq!(
            source_id_from_tags("a, source:nhentai.net/g/123456/"),
            Some("123456".to_string())
        );
        assert_eq!(source_id_from_tags("a, b"), None);
    }

    #[test]
    fn language_prefers_english_over_others() {
        assert_eq!(language_from_tags("language:english, language:japanese"), Language::En);
        assert_eq!(language_from_tags("language:japanese"), Language::Jp);
        assert_eq!(language_from_tags("rating:safe"), Language::Untranslated);
    }
}
