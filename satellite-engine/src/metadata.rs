//! Metadata-plugin enrichment engine (C5): for every LRR
//! archive, resolve a namespace source id, invoke LRR's plugin-use
//! endpoint, merge tags, write back.

use regex::Regex;
use satellite_core::error::{Error, Result};
use satellite_core::retry::jitter;
use satellite_core::types::{MetadataNamespace, MetadataPluginTask, MetadataPluginTaskStatus};
use satellite_jobstore::JobStore;
use satellite_remote::LrrClient;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

fn pixiv_illust_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\{(\d+)\}").expect("valid regex"))
}

fn nhentai_gallery_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)").expect("valid regex"))
}

/// Extract a namespace-specific source id from a filename.
#[must_use]
pub fn extract_source_id(namespace: MetadataNamespace, filename: &str) -> Option<String> {
    match namespace {
        MetadataNamespace::Pixiv => {
            let stripped = filename.strip_prefix("pixiv_").unwrap_or(filename);
            pixiv_illust_id_re()
                .captures(stripped)
                .map(|c| c[1].to_string())
        }
        MetadataNamespace::Nhentai => nhentai_gallery_id_re()
            .captures(filename)
            .map(|c| c[1].to_string()),
    }
}

/// Pull a `source:…` tag's value out of a comma-separated tag string.
#[must_use]
pub fn extract_source_tag(tags: &str) -> Option<String> {
    tags.split(',')
        .map(str::trim)
        .find_map(|t| t.strip_prefix("source:").map(str::to_string))
}

/// Merge `new` tags into `existing`: for Pixiv, `artist:`,
/// `date_uploaded:` and `date_created:` keys are overwritten by `new`;
/// every other key (and every non-Pixiv namespace) is unioned.
#[must_use]
pub fn merge_tags(namespace: MetadataNamespace, existing: &str, new: &str) -> String {
    const OVERWRITE_KEYS: &[&str] = &["artist:", "date_uploaded:", "date_created:"];

    let is_overwrite_key =
        |tag: &str| namespace == MetadataNamespace::Pixiv && OVERWRITE_KEYS.iter().any(|k| tag.starts_with(k));

    let mut merged = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for tag in new.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if seen.insert(tag.to_string()) {
            merged.push(tag.to_string());
        }
    }
    for tag in existing.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if is_overwrite_key(tag) {
            continue;
        }
        if seen.insert(tag.to_string()) {
            merged.push(tag.to_string());
        }
    }

    merged.join(", ")
}

fn now_epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

enum ProcessOutcome {
    Ok,
    NotFound,
    Failed,
}

/// Tally returned by [`MetadataEngine::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataRunSummary {
    pub ok: usize,
    pub not_found: usize,
    pub failed: usize,
}

/// Cheap to clone (wraps a [`JobStore`] and an `Arc<LrrClient>`).
#[derive(Clone)]
pub struct MetadataEngine {
    jobstore: JobStore,
    lrr: Arc<LrrClient>,
}

impl MetadataEngine {
    #[must_use]
    pub fn new(jobstore: JobStore, lrr: Arc<LrrClient>) -> Self {
        Self { jobstore, lrr }
    }

    /// One pass over `namespace`'s fetch queue: OK (if `retry_ok`), then
    /// PENDING, then expired NOT_FOUND.
    pub async fn run(
        &self,
        namespace: MetadataNamespace,
        retry_ok: bool,
        sleep_time: f64,
    ) -> Result<MetadataRunSummary> {
        let tasks_store = self.jobstore.metadata_plugin_task();
        let mut queue: Vec<MetadataPluginTask> = Vec::new();

        if retry_ok {
            queue.extend(
                tasks_store
                    .by_status_and_namespace(MetadataPluginTaskStatus::Ok, namespace, 0)
                    .await?,
            );
        }
        queue.extend(
            tasks_store
                .by_status_and_namespace(MetadataPluginTaskStatus::Pending, namespace, 0)
                .await?,
        );
        queue.extend(
            tasks_store
                .expired_not_found(now_epoch_secs())
                .await?
                .into_iter()
                .filter(|t| t.namespace == namespace),
        );

        let mut summary = MetadataRunSummary::default();
        for task in queue {
            tokio::time::sleep(jitter(sleep_time)).await;
            match self.process_one(&task).await {
                Ok(ProcessOutcome::Ok) => summary.ok += 1,
                Ok(ProcessOutcome::NotFound) => summary.not_found += 1,
                Ok(ProcessOutcome::Failed) => summary.failed += 1,
                Err(e) => {
                    tracing::warn!("metadata task {} failed hard: {e}", task.arcid);
                    return Err(e);
                }
            }
        }
        Ok(summary)
    }

    async fn process_one(&self, task: &MetadataPluginTask) -> Result<ProcessOutcome> {
        let plugin = task.namespace.as_str();
        let metadata = self.lrr.get_archive_metadata(&task.arcid).await?;

        let source_id = task.source.clone().or_else(|| {
            metadata
                .filename
                .as_deref()
                .and_then(|f| extract_source_id(task.namespace, f))
        });
        let Some(source_id) = source_id else {
            self.mark(task, MetadataPluginTaskStatus::NotFound).await?;
            return Ok(ProcessOutcome::NotFound);
        };

        match self
            .lrr
            .use_plugin(plugin, Some(&task.arcid), Some(&source_id))
            .await
        {
            Ok(resp) if resp.error.is_some() => {
                #[allow(clippy::unwrap_used)]
                self.dispatch_error(task, resp.error.as_deref().unwrap())
                    .await
            }
            Ok(resp) => {
                let new_tags = resp
                    .data
                    .as_ref()
                    .and_then(|d| d.get("tags"))
                    .and_then(|t| t.as_str())
                    .unwrap_or_default();
                let existing_tags = metadata.tags.as_deref().unwrap_or_default();
                let merged = merge_tags(task.namespace, existing_tags, new_tags);
                self.lrr
                    .update_archive_metadata(&task.arcid, None, Some(&merged), None)
                    .await?;
                self.mark(task, MetadataPluginTaskStatus::Ok).await?;
                Ok(ProcessOutcome::Ok)
            }
            Err(Error::NotFoundRemote(_)) => {
                self.mark(task, MetadataPluginTaskStatus::NotFound).await?;
                Ok(ProcessOutcome::NotFound)
            }
            Err(e @ Error::Fatal(_)) => Err(e),
            Err(e) => self.dispatch_error(task, &e.to_string()).await,
        }
    }

    /// "Try again"/"Inactivity timeout" ⇒ backoff retry (re-queued
    /// PENDING); "404"/"No matching … Found" ⇒ NOT_FOUND; anything else ⇒
    /// FAILED (ERROR status).
    async fn dispatch_error(
        &self,
        task: &MetadataPluginTask,
        message: &str,
    ) -> Result<ProcessOutcome> {
        if message.contains("Try again") || message.contains("Inactivity timeout") {
            self.mark(task, MetadataPluginTaskStatus::Pending).await?;
            Ok(ProcessOutcome::Failed)
        } else if message.contains("404") || (message.contains("No matching") && message.contains("Found"))
        {
            self.mark(task, MetadataPluginTaskStatus::NotFound).await?;
            Ok(ProcessOutcome::NotFound)
        } else {
            self.mark(task, MetadataPluginTaskStatus::Error).await?;
            Ok(ProcessOutcome::Failed)
        }
    }

    async fn mark(&self, task: &MetadataPluginTask, status: MetadataPluginTaskStatus) -> Result<()> {
        let num_failures = if matches!(status, MetadataPluginTaskStatus::Ok) {
            0
        } else {
            task.num_failures.saturating_add(1)
        };
        self.jobstore
            .metadata_plugin_task()
            .upsert(&MetadataPluginTask {
                arcid: task.arcid.clone(),
                source: task.source.clone(),
                namespace: task.namespace,
                status,
                last_updated: now_epoch_secs(),
                num_failures,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixiv_source_id_strips_prefix_and_braces() {
        assert_eq!(
            extract_source_id(MetadataNamespace::Pixiv, "pixiv_{12345}_p0.jpg"),
            Some("12345".to_string())
        );
        assert_eq!(
            extract_source_id(MetadataNamespace::Pixiv, "{999}_p0.jpg"),
            Some("999".to_string())
        );
    }

    #[test]
    fn nhentai_source_id_is_leading_digits() {
        assert_eq!(
            extract_source_id(MetadataNamespace::Nhentai, "123456 [Artist] Title.zip"),
            Some("123456".to_string())
        );
    }

    #[test]
    fn pixiv_merge_overwrites_artist_and_dates_but_unions_rest() {
        let existing = "artist:old, date_uploaded:2020, rating:safe";
        let new = "artist:new, date_uploaded:2024, character:foo";
        let merged = merge_tags(MetadataNamespace::Pixiv, existing, new);
        assert!(merged.contains("artist:new"));
        assert!(!merged.contains("artist:old"));
        assert!(merged.contains("rating:safe"));
        assert!(merged.contains("character:foo"));
    }

    #[test]
    fn nhentai_merge_is_plain_union() {
        let merged = merge_tags(MetadataNamespace::Nhentai, "a, b", "b, c");
        assert!(merged.contains('a'));
        assert!(merged.contains('b'));
        assert!(merged.contains('c'));
    }
}
