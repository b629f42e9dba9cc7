//! Downloader-database metadata sync (C5):
//! for every untagged LRR archive, resolve a downloader id from its title
//! and pull title/tags/summary straight out of the downloader's own local
//! SQLite database, rather than round-tripping through an LRR plugin.
//!
//! Ported from `examples/original_source/src/satellite_server/service/metadata.py`
//! (the per-downloader id/metadata extraction) and
//! `examples/original_source/satellite/app/services/metadata.py::update_metadata`
//! (the untagged-archive sweep). Reads the downloader databases through
//! `libsql` in local-file mode, the same engine `satellite-jobstore` uses for
//! its own store.

use async_trait::async_trait;
use satellite_core::error::{Error, Result};
use satellite_core::retry::{backoff_delay, MAX_ATTEMPTS};
use satellite_remote::LrrClient;
use std::path::Path;
use std::sync::Arc;

/// Metadata pulled out of a downloader's database for one title.
#[derive(Debug, Clone, Default)]
pub struct ExternalMetadata {
    pub title: Option<String>,
    pub tags: Option<String>,
    pub summary: Option<String>,
}

/// A downloader whose local database can be read for metadata.
/// Generalises `MetadataService`.
#[async_trait]
pub trait DownloaderMetadataService: Send + Sync {
    /// Extract this downloader's id from an archive title, or `None` if the
    /// title doesn't match this downloader's naming convention.
    fn id_from_title(&self, title: &str) -> Option<String>;

    /// Look up full metadata for `id` in the downloader's database.
    async fn metadata_for_id(&self, id: &str) -> Result<ExternalMetadata>;
}

async fn open_readonly(path: &Path) -> Result<libsql::Database> {
    if !path.exists() {
        return Err(Error::Configuration(format!(
            "downloader database not found: {}",
            path.display()
        )));
    }
    libsql::Builder::new_local(path)
        .build()
        .await
        .map_err(|e| Error::Storage(format!("failed to open downloader db: {e}")))
}

async fn query_strings(conn: &libsql::Connection, sql: &str, id: &str) -> Result<Vec<String>> {
    let mut rows = conn
        .query(sql, libsql::params![id.to_string()])
        .await
        .map_err(|e| Error::Storage(format!("downloader db query failed: {e}")))?;
    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::Storage(format!("downloader db row fetch failed: {e}")))?
    {
        if let Ok(value) = row.get::<String>(0) {
            out.push(value);
        }
    }
    Ok(out)
}

/// [Nhentai Archivist](https://github.com/9-FS/nhentai_archivist) convention:
/// ids are the leading whitespace-delimited token of the title, tags come
/// from its `tag`/`hentai_tag` join tables.
pub struct NhentaiArchivistDb {
    db: libsql::Database,
}

impl NhentaiArchivistDb {
    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self { db: open_readonly(path).await? })
    }
}

#[async_trait]
impl DownloaderMetadataService for NhentaiArchivistDb {
    fn id_from_title(&self, title: &str) -> Option<String> {
        title.split_whitespace().next().map(str::to_string)
    }

    async fn metadata_for_id(&self, id: &str) -> Result<ExternalMetadata> {
        let conn = self
            .db
            .connect()
            .map_err(|e| Error::Storage(format!("downloader db connect failed: {e}")))?;

        let title = query_strings(&conn, "SELECT title_pretty FROM Hentai WHERE id = ?1", id)
            .await?
            .into_iter()
            .next();

        const TAG_TYPES: &[(&str, &str)] = &[
            ("tag", ""),
            ("character", "character:"),
            ("parody", "parody:"),
            ("language", "language:"),
            ("category", "category:"),
            ("artist", "artist:"),
            ("group", "group:"),
        ];

        let mut tag_list = Vec::new();
        for (tag_type, prefix) in TAG_TYPES {
            let sql = "WITH grp AS (SELECT * FROM tag WHERE type = ?2)
                       SELECT grp.name FROM hentai_tag JOIN grp ON hentai_tag.tag_id = grp.id
                       WHERE hentai_tag.hentai_id = ?1";
            let mut rows = conn
                .query(sql, libsql::params![id.to_string(), (*tag_type).to_string()])
                .await
                .map_err(|e| Error::Storage(format!("downloader db query failed: {e}")))?;
            while let Some(row) = rows
                .next()
                .await
                .map_err(|e| Error::Storage(format!("downloader db row fetch failed: {e}")))?
            {
                if let Ok(name) = row.get::<String>(0) {
                    tag_list.push(format!("{prefix}{name}"));
                }
            }
        }
        tag_list.push(format!("source:nhentai.net/g/{id}"));
        tag_list.retain(|t| !t.contains(','));

        Ok(ExternalMetadata {
            title,
            tags: Some(tag_list.join(",")),
            summary: None,
        })
    }
}

/// [PixivUtil2](https://github.com/Nandaka/PixivUtil2) convention: ids are a
/// `{digits}` token (optionally behind a `pixiv_` prefix) in the title.
pub struct PixivUtil2Db {
    db: libsql::Database,
    allowed_translation_types: Vec<String>,
}

impl PixivUtil2Db {
    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            db: open_readonly(path).await?,
            allowed_translation_types: vec!["en".to_string()],
        })
    }
}

#[async_trait]
impl DownloaderMetadataService for PixivUtil2Db {
    fn id_from_title(&self, title: &str) -> Option<String> {
        let stripped = title.strip_prefix("pixiv_").unwrap_or(title);
        crate::metadata::extract_source_id(satellite_core::types::MetadataNamespace::Pixiv, stripped)
    }

    async fn metadata_for_id(&self, id: &str) -> Result<ExternalMetadata> {
        let conn = self
            .db
            .connect()
            .map_err(|e| Error::Storage(format!("downloader db connect failed: {e}")))?;

        let title = query_strings(
            &conn,
            "SELECT title FROM pixiv_master_image WHERE image_id = ?1",
            id,
        )
        .await?
        .into_iter()
        .next();

        let mut rows = conn
            .query(
                "SELECT member_id, name FROM pixiv_master_member
                 JOIN pixiv_master_image ON pixiv_master_member.member_id = pixiv_master_image.member_id
                 WHERE pixiv_master_image.image_id = ?1",
                libsql::params![id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("downloader db query failed: {e}")))?;
        let mut artists = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(format!("downloader db row fetch failed: {e}")))?
        {
            let member_id: i64 = row
                .get(0)
                .map_err(|e| Error::Storage(format!("pixiv_master_member.member_id column: {e}")))?;
            let name: String = row
                .get(1)
                .map_err(|e| Error::Storage(format!("pixiv_master_member.name column: {e}")))?;
            artists.push((member_id, name));
        }

        let mut rows = conn
            .query(
                "SELECT tag_id FROM pixiv_image_to_tag WHERE image_id = ?1",
                libsql::params![id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("downloader db query failed: {e}")))?;
        let mut tag_ids: Vec<String> = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(format!("downloader db row fetch failed: {e}")))?
        {
            let tag_id: i64 = row
                .get(0)
                .map_err(|e| Error::Storage(format!("pixiv_image_to_tag.tag_id column: {e}")))?;
            tag_ids.push(tag_id.to_string());
        }

        let mut tag_list = Vec::new();
        for tag_id in &tag_ids {
            tag_list.push(tag_id.clone());
            let mut rows = conn
                .query(
                    "SELECT translation_type, translation FROM pixiv_tag_translation WHERE tag_id = ?1",
                    libsql::params![tag_id.clone()],
                )
                .await
                .map_err(|e| Error::Storage(format!("downloader db query failed: {e}")))?;
            while let Some(row) = rows
                .next()
                .await
                .map_err(|e| Error::Storage(format!("downloader db row fetch failed: {e}")))?
            {
                let translation_type: String = row
                    .get(0)
                    .map_err(|e| Error::Storage(format!("pixiv_tag_translation.translation_type column: {e}")))?;
                let translation: String = row
                    .get(1)
                    .map_err(|e| Error::Storage(format!("pixiv_tag_translation.translation column: {e}")))?;
                if self.allowed_translation_types.iter().any(|t| t == &translation_type) {
                    tag_list.push(translation.replace(',', ""));
                }
            }
        }

        let summary = query_strings(
            &conn,
            "SELECT caption FROM pixiv_master_image WHERE image_id = ?1",
            id,
        )
        .await?
        .into_iter()
        .next();

        for (member_id, name) in &artists {
            tag_list.push(format!("artist:{name}"));
            tag_list.push(format!("pixiv_user_id:{member_id}"));
        }
        tag_list.push(format!("source:https://pixiv.net/artworks/{id}"));
        tag_list.retain(|t| !t.contains(','));

        Ok(ExternalMetadata {
            title,
            tags: Some(tag_list.join(",")),
            summary,
        })
    }
}

/// Tally returned by [`DownloaderMetadataEngine::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloaderMetadataSummary {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Sweeps LRR's untagged-archive list once, resolving each one through a
/// downloader's local database, ported from `update_metadata`. Bounded to
/// 8 concurrent archives, matching the original's `Semaphore(value=8)`.
#[derive(Clone)]
pub struct DownloaderMetadataEngine {
    lrr: Arc<LrrClient>,
}

const CONCURRENCY: usize = 8;

impl DownloaderMetadataEngine {
    #[must_use]
    pub fn new(lrr: Arc<LrrClient>) -> Self {
        Self { lrr }
    }

    pub async fn run(
        &self,
        service: Arc<dyn DownloaderMetadataService>,
    ) -> Result<DownloaderMetadataSummary> {
        let untagged = self.lrr.get_untagged_archives().await?;
        let semaphore = Arc::new(tokio::sync::Semaphore::new(CONCURRENCY));

        let mut handles = Vec::with_capacity(untagged.len());
        for archive_id in untagged {
            let sem = Arc::clone(&semaphore);
            let engine = self.clone();
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await;
                engine.handle_one(&archive_id, service.as_ref()).await
            }));
        }

        let mut summary = DownloaderMetadataSummary::default();
        for handle in futures::future::join_all(handles).await {
            match handle {
                Ok(Ok(true)) => summary.updated += 1,
                Ok(Ok(false)) => summary.skipped += 1,
                Ok(Err(e)) => {
                    tracing::warn!("downloader metadata sync failed: {e}");
                    summary.failed += 1;
                }
                Err(e) => {
                    tracing::warn!("downloader metadata task panicked: {e}");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn handle_one(
        &self,
        archive_id: &str,
        service: &dyn DownloaderMetadataService,
    ) -> Result<bool> {
        let archive_metadata = self.lrr.get_archive_metadata(archive_id).await?;
        let Some(title) = archive_metadata.title.as_deref() else {
            return Ok(false);
        };
        let Some(id) = service.id_from_title(title) else {
            return Ok(false);
        };
        let external = service.metadata_for_id(&id).await?;

        let mut attempt = 0u32;
        loop {
            match self
                .lrr
                .update_archive_metadata(
                    archive_id,
                    external.title.as_deref(),
                    external.tags.as_deref(),
                    external.summary.as_deref(),
                )
                .await
            {
                Ok(_) => return Ok(true),
                Err(Error::Transient(msg)) => {
                    attempt += 1;
                    if attempt > MAX_ATTEMPTS {
                        return Err(Error::Transient(msg));
                    }
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeService;

    #[async_trait]
    impl DownloaderMetadataService for FakeService {
        fn id_from_title(&self, title: &str) -> Option<String> {
            title.split_whitespace().next().map(str::to_string)
        }

        async fn metadata_for_id(&self, id: &str) -> Result<ExternalMetadata> {
            Ok(ExternalMetadata {
                title: Some(format!("title-{id}")),
                tags: Some(format!("source:test/{id}")),
                summary: None,
            })
        }
    }

    #[tokio::test]
    async fn fake_service_resolves_id_and_metadata() {
        let service = FakeService;
        let id = service.id_from_title("123456 [Artist] Title.zip").unwrap();
        assert_eq!(id, "123456");
        let meta = service.metadata_for_id(&id).await.unwrap();
        assert_eq!(meta.title.as_deref(), Some("title-123456"));
    }
}
