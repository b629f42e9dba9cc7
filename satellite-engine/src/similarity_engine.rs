//! Subarchive computation engine (C7): for every archive not
//! yet in the `subarchive_map`, finds its duplicate-ancestor (if any) among
//! archives sharing a similar first page, repointing subtrees as it goes.

use satellite_core::error::Result;
use satellite_core::similarity::{is_subarchive_of, DEFAULT_TAU};
use satellite_core::types::Language;
use satellite_remote::LrrClient;
use satellite_vectorstore::VectorStore;
use std::collections::HashSet;
use std::sync::Arc;

/// Every [`Language`] variant, in the fixed iteration order
/// `compute_subarchives` processes them in. Sequential per-language
/// execution keeps SubarchiveMap writes single-writer.
const ALL_LANGUAGES: [Language; 5] = [
    Language::En,
    Language::Jp,
    Language::Cn,
    Language::Other,
    Language::Untranslated,
];

fn language_query_tag(language: Language) -> &'static str {
    match language {
        Language::En => "EN",
        Language::Jp => "JP",
        Language::Cn => "CN",
        Language::Other => "OTHER",
        Language::Untranslated => "UNTRANSLATED",
    }
}

/// One reason an archive outscores its equal-content peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    IsInStaticCategory,
    HasHigherFavoriteCount,
    HasDecensoredTag,
    HasHigherTagCount,
    HasNoRoughTranslation,
    HasNoPoorGrammar,
    IsMoreRecent,
    HasReadingProgress,
}

impl KeepReason {
    #[must_use]
    pub fn score(self) -> u32 {
        match self {
            Self::IsInStaticCategory => 16,
            Self::HasHigherFavoriteCount => 8,
            Self::HasDecensoredTag | Self::HasHigherTagCount | Self::HasNoRoughTranslation | Self::HasNoPoorGrammar => 4,
            Self::IsMoreRecent => 2,
            Self::HasReadingProgress => 1,
        }
    }
}

fn sum_score(reasons: &[KeepReason]) -> u32 {
    reasons.iter().map(|r| r.score()).sum()
}

/// `source:nhentai.net/g/<id>/` tag's trailing numeric id, or `-1` if absent
/// (ported from `_get_source`).
fn source_id_from_tags(tags: &[&str]) -> i64 {
    for tag in tags {
        if let Some(rest) = tag.strip_prefix("source:nhentai.net") {
            if let Some(id) = rest.rsplit('/').find(|s| !s.is_empty()) {
                if let Ok(parsed) = id.parse::<i64>() {
                    return parsed;
                }
            }
        }
    }
    -1
}

/// Set of archive ids belonging to a non-search ("static") LRR category.
pub struct StaticCategories {
    arcids: HashSet<String>,
}

impl StaticCategories {
    pub async fn load(lrr: &LrrClient) -> Result<Self> {
        let categories = lrr.get_all_categories().await?;
        let mut arcids = HashSet::new();
        for category in categories {
            let is_search = category.search.as_deref().is_some_and(|s| !s.is_empty());
            if !is_search {
                arcids.extend(category.archives);
            }
        }
        Ok(Self { arcids })
    }

    #[must_use]
    pub fn contains(&self, arcid: &str) -> bool {
        self.arcids.contains(arcid)
    }
}

/// Cheap to clone (wraps a [`VectorStore`] and an `Arc<LrrClient>`).
#[derive(Clone)]
pub struct SimilarityEngine {
    vectors: VectorStore,
    lrr: Arc<LrrClient>,
}

/// Tally returned by [`SimilarityEngine::compute_subarchives`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SubarchiveRunSummary {
    pub roots: usize,
    pub duplicates: usize,
}

impl SimilarityEngine {
    #[must_use]
    pub fn new(vectors: VectorStore, lrr: Arc<LrrClient>) -> Self {
        Self { vectors, lrr }
    }

    /// Symmetric retention comparison; the source's bug that zeroes the
    /// second archive's favourite count
    /// before comparing is not reproduced here — both sides use their own
    /// `favorites` value.
    pub async fn get_keep_reasons(
        &self,
        static_categories: &StaticCategories,
        arcid_1: &str,
        arcid_2: &str,
    ) -> Result<(Vec<KeepReason>, Vec<KeepReason>)> {
        let archive_1 = self.lrr.get_archive_metadata(arcid_1).await?;
        let archive_2 = self.lrr.get_archive_metadata(arcid_2).await?;

        let tags_1_owned = archive_1.tags.unwrap_or_default();
        let tags_2_owned = archive_2.tags.unwrap_or_default();
        let tags_1: Vec<&str> = tags_1_owned.split(',').map(str::trim).collect();
        let tags_2: Vec<&str> = tags_2_owned.split(',').map(str::trim).collect();

        let progress_1 = archive_1.progress.unwrap_or(0);
        let progress_2 = archive_2.progress.unwrap_or(0);

        let nhentai_archives = self.vectors.nhentai_archives();
        let favorites_1 = nhentai_archives.favorites(arcid_1).await?;
        let favorites_2 = nhentai_archives.favorites(arcid_2).await?;

        let source_id_1 = source_id_from_tags(&tags_1);
        let source_id_2 = source_id_from_tags(&tags_2);

        let mut reasons_1 = Vec::new();
        let mut reasons_2 = Vec::new();

        if static_categories.contains(arcid_1) {
            reasons_1.push(KeepReason::IsInStaticCategory);
        }
        if static_categories.contains(arcid_2) {
            reasons_2.push(KeepReason::IsInStaticCategory);
        }

        match favorites_1.cmp(&favorites_2) {
            std::cmp::Ordering::Greater => reasons_1.push(KeepReason::HasHigherFavoriteCount),
            std::cmp::Ordering::Less => reasons_2.push(KeepReason::HasHigherFavoriteCount),
            std::cmp::Ordering::Equal => {}
        }

        if tags_1.contains(&"uncensored") {
            reasons_1.push(KeepReason::HasDecensoredTag);
        }
        if tags_2.contains(&"uncensored") {
            reasons_2.push(KeepReason::HasDecensoredTag);
        }

        match tags_1.len().cmp(&tags_2.len()) {
            std::cmp::Ordering::Greater => reasons_1.push(KeepReason::HasHigherTagCount),
            std::cmp::Ordering::Less => reasons_2.push(KeepReason::HasHigherTagCount),
            std::cmp::Ordering::Equal => {}
        }

        match source_id_1.cmp(&source_id_2) {
            std::cmp::Ordering::Greater => reasons_1.push(KeepReason::IsMoreRecent),
            std::cmp::Ordering::Less => reasons_2.push(KeepReason::IsMoreRecent),
            std::cmp::Ordering::Equal => {}
        }

        if progress_1 > 0 {
            reasons_1.push(KeepReason::HasReadingProgress);
        }
        if progress_2 > 0 {
            reasons_2.push(KeepReason::HasReadingProgress);
        }

        if !tags_1.contains(&"rough translation") {
            reasons_1.push(KeepReason::HasNoRoughTranslation);
        }
        if !tags_2.contains(&"rough translation") {
            reasons_2.push(KeepReason::HasNoRoughTranslation);
        }

        if !tags_1.contains(&"poor grammar") || !tags_1.contains(&"rough grammar") {
            reasons_1.push(KeepReason::HasNoPoorGrammar);
        }
        if !tags_2.contains(&"poor grammar") || !tags_2.contains(&"rough grammar") {
            reasons_2.push(KeepReason::HasNoPoorGrammar);
        }

        Ok((reasons_1, reasons_2))
    }

    /// Process every language in sequence (or all archives together when
    /// `per_language` is `false`).
    pub async fn compute_subarchives(&self, per_language: bool) -> Result<SubarchiveRunSummary> {
        let static_categories = StaticCategories::load(&self.lrr).await?;
        let mut summary = SubarchiveRunSummary::default();

        if per_language {
            for language in ALL_LANGUAGES {
                self.compute_subarchives_for(Some(language), &static_categories, &mut summary)
                    .await?;
            }
        } else {
            self.compute_subarchives_for(None, &static_categories, &mut summary)
                .await?;
        }
        Ok(summary)
    }

    async fn compute_subarchives_for(
        &self,
        language: Option<Language>,
        static_categories: &StaticCategories,
        summary: &mut SubarchiveRunSummary,
    ) -> Result<()> {
        let map = self.vectors.subarchive_map();
        let pages = self.vectors.pages();
        let language_tag = language.map(language_query_tag);

        loop {
            let candidates = map.archives_not_mapped(language_tag, None).await?;
            if candidates.is_empty() {
                break;
            }

            for archive_id in candidates {
                if map.get(&archive_id).await?.is_some() {
                    continue;
                }

                let peers = pages
                    .arcids_by_page_similar_to_first_page(&archive_id, f64::from(DEFAULT_TAU), language.is_some())
                    .await?;

                let mut curr_max = archive_id.clone();
                for mut peer in peers {
                    if let Some(existing) = map.get(&peer).await? {
                        peer = existing.leq;
                    }

                    let (curr_embeddings, peer_embeddings) = (
                        pages.embeddings_by_archive_id(&curr_max).await?,
                        pages.embeddings_by_archive_id(&peer).await?,
                    );
                    let a_sub_b = is_subarchive_of(&curr_embeddings, &peer_embeddings, DEFAULT_TAU);
                    let b_sub_a = is_subarchive_of(&peer_embeddings, &curr_embeddings, DEFAULT_TAU);

                    let keep_current = if a_sub_b.is_proper_sub {
                        false
                    } else if b_sub_a.is_proper_sub {
                        true
                    } else if a_sub_b.is_sub && b_sub_a.is_sub {
                        let (reasons_max, reasons_peer) =
                            self.get_keep_reasons(static_categories, &curr_max, &peer).await?;
                        let max_score = sum_score(&reasons_max);
                        let peer_score = sum_score(&reasons_peer);
                        match max_score.cmp(&peer_score) {
                            std::cmp::Ordering::Greater => true,
                            std::cmp::Ordering::Less => false,
                            std::cmp::Ordering::Equal => {
                                let mut pair = [curr_max.clone(), peer.clone()];
                                pair.sort();
                                curr_max == pair[0]
                            }
                        }
                    } else {
                        continue;
                    };

                    if keep_current {
                        map.insert(&peer, &curr_max).await?;
                        for child in map.children(&peer).await? {
                            map.insert(&child, &curr_max).await?;
                        }
                        summary.duplicates += 1;
                    } else {
                        map.insert(&curr_max, &peer).await?;
                        if curr_max != archive_id {
                            summary.duplicates += 1;
                        }
                        curr_max = peer;
                    }
                }

                if curr_max == archive_id {
                    map.insert(&archive_id, &archive_id).await?;
                    summary.roots += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_categories_ignore_search_categories() {
        let mut arcids = HashSet::new();
        arcids.insert("a".to_string());
        let categories = StaticCategories { arcids };
        assert!(categories.contains("a"));
        assert!(!categories.contains("b"));
    }

    #[test]
    fn source_id_parses_trailing_numeric_segment() {
        let tags = vec!["artist:foo", "source:nhentai.net/g/123456/"];
        assert_eq!(source_id_from_tags(&tags), 123_456);
    }

    #[test]
    fn source_id_defaults_to_negative_one() {
        let tags = vec!["artist:foo"];
        assert_eq!(source_id_from_tags(&tags), -1);
    }

    #[test]
    fn keep_reason_scores_match_spec() {
        assert_eq!(KeepReason::IsInStaticCategory.score(), 16);
        assert_eq!(KeepReason::HasHigherFavoriteCount.score(), 8);
        assert_eq!(KeepReason::HasDecensoredTag.score(), 4);
        assert_eq!(KeepReason::HasHigherTagCount.score(), 4);
        assert_eq!(KeepReason::HasNoRoughTranslation.score(), 4);
        assert_eq!(KeepReason::HasNoPoorGrammar.score(), 4);
        assert_eq!(KeepReason::IsMoreRecent.score(), 2);
        assert_eq!(KeepReason::HasReadingProgress.score(), 1);
    }
}
