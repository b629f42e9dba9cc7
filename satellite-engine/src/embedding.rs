//! Page-embedding ingestion engine (C6): downloads an
//! archive from LRR, extracts its pages, embeds them in batches via
//! img2vec, and persists the result.

use satellite_core::error::{Error, Result};
use satellite_core::types::EmbeddingJobStatus;
use satellite_remote::{Img2VecClient, LrrClient};
use satellite_vectorstore::VectorStore;
use std::sync::Arc;

const BATCH_SIZE: usize = 4;

/// Tally returned by [`EmbeddingEngine::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingRunSummary {
    pub ingested: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Tally returned by [`EmbeddingEngine::create_jobs`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JobCreationSummary {
    pub created: usize,
    pub already_present: usize,
}

/// Cheap to clone (wraps a [`VectorStore`], `Arc<LrrClient>` and
/// `Arc<Img2VecClient>`).
#[derive(Clone)]
pub struct EmbeddingEngine {
    vectors: VectorStore,
    lrr: Arc<LrrClient>,
    img2vec: Arc<Img2VecClient>,
    workers: usize,
}

impl EmbeddingEngine {
    #[must_use]
    pub fn new(
        vectors: VectorStore,
        lrr: Arc<LrrClient>,
        img2vec: Arc<Img2VecClient>,
        workers: usize,
    ) -> Self {
        Self {
            vectors,
            lrr,
            img2vec,
            workers: workers.max(1),
        }
    }

    /// Inventories LRR's archive list and upserts a PENDING job (server
    /// `pagecount`) for any archive that doesn't already have one, in
    /// batches of 1000.
    pub async fn create_jobs(&self) -> Result<JobCreationSummary> {
        let archives = self.lrr.get_all_archives().await?;
        let jobs = self.vectors.embedding_jobs();
        let mut summary = JobCreationSummary::default();

        for batch in archives.chunks(1000) {
            for archive in batch {
                if jobs.get(&archive.arcid).await?.is_some() {
                    summary.already_present += 1;
                    continue;
                }
                jobs.insert(
                    &archive.arcid,
                    archive.pagecount.unwrap_or(0),
                    EmbeddingJobStatus::Pending,
                    None,
                )
                .await?;
                summary.created += 1;
            }
        }
        Ok(summary)
    }

    /// Ingest every PENDING job, bounded to `self.workers` concurrent
    /// archives.
    pub async fn run(&self) -> Result<EmbeddingRunSummary> {
        let jobs = self.vectors.embedding_jobs();
        let pending = jobs.by_status(EmbeddingJobStatus::Pending, None).await?;
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.workers));

        let mut handles = Vec::with_capacity(pending.len());
        for job in pending {
            let sem = Arc::clone(&semaphore);
            let engine = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await;
                engine.ingest_one(&job.arcid, job.pages).await
            }));
        }

        let mut summary = EmbeddingRunSummary::default();
        for handle in futures::future::join_all(handles).await {
            match handle {
                Ok(Ok(true)) => summary.ingested += 1,
                Ok(Ok(false)) => summary.skipped += 1,
                Ok(Err(e)) => {
                    tracing::warn!("embedding ingest failed: {e}");
                    summary.failed += 1;
                }
                Err(e) => {
                    tracing::warn!("embedding ingest task panicked: {e}");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Resumable single-archive ingest: SKIPPED if the page
    /// count on file matches the server's reported page count exactly;
    /// otherwise any existing pages are dropped and re-ingested from
    /// scratch. Returns `true` if pages were (re-)ingested, `false` if
    /// skipped.
    async fn ingest_one(&self, arcid: &str, known_pages: i32) -> Result<bool> {
        let jobs = self.vectors.embedding_jobs();
        let pages_store = self.vectors.pages();

        let existing_count = pages_store.count_by_archive_id(arcid).await?;
        if known_pages > 0 && existing_count == i64::from(known_pages) {
            jobs.update_status(arcid, EmbeddingJobStatus::Skipped, None)
                .await?;
            return Ok(false);
        }
        if existing_count > 0 {
            pages_store.delete_by_archive_id(arcid).await?;
        }

        let archive_bytes = match self.lrr.download_archive(arcid).await {
            Ok(bytes) => bytes,
            Err(Error::NotFoundRemote(_)) => {
                jobs.update_status(arcid, EmbeddingJobStatus::NotFound, None)
                    .await?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let members = extract_image_members(archive_bytes)?;
        if members.is_empty() {
            jobs.update_status(
                arcid,
                EmbeddingJobStatus::Failed,
                Some("no image members found"),
            )
            .await?;
            return Ok(false);
        }

        let mut pages: Vec<(String, i32, Vec<f32>)> = Vec::with_capacity(members.len());
        for (batch_index, batch) in members.chunks(BATCH_SIZE).enumerate() {
            let embeddings = self
                .img2vec
                .create_batch_embeddings(batch.to_vec())
                .await?;
            for (offset, embedding) in embeddings.into_iter().enumerate() {
                #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
                let page_no = (batch_index * BATCH_SIZE + offset + 1) as i32;
                pages.push((arcid.to_string(), page_no, embedding));
            }
        }

        pages_store.insert_many(&pages).await?;
        jobs.update_status(arcid, EmbeddingJobStatus::Success, None)
            .await?;
        Ok(true)
    }
}

/// Opens `bytes` as a zip archive and returns every PNG/JPEG member's raw
/// bytes, sorted lexicographically by member name (page order).
fn extract_image_members(bytes: Vec<u8>) -> Result<Vec<Vec<u8>>> {
    tokio::task::block_in_place(move || {
        let cursor = std::io::Cursor::new(bytes);
        let mut archive = zip::ZipArchive::new(cursor)
            .map_err(|e| Error::CorruptInput(format!("not a valid archive: {e}")))?;

        let mut names: Vec<String> = (0..archive.len())
            .filter_map(|i| archive.by_index(i).ok().map(|e| e.name().to_string()))
            .filter(|name| {
                let lower = name.to_ascii_lowercase();
                lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg")
            })
            .collect();
        names.sort();

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let mut entry = archive
                .by_name(&name)
                .map_err(|e| Error::CorruptInput(format!("missing member {name}: {e}")))?;
            let mut bytes = Vec::new();
            std::io::Read::read_to_end(&mut entry, &mut bytes)?;
            out.push(bytes);
        }
        Ok(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_image_members_sorts_lexicographically() {
        let mut buf = Vec::new();
        {
            let cursor = std::io::Cursor::new(&mut buf);
            let mut writer = zip::ZipWriter::new(cursor);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("002.jpg", options).unwrap();
            std::io::Write::write_all(&mut writer, b"b").unwrap();
            writer.start_file("001.png", options).unwrap();
            std::io::Write::write_all(&mut writer, b"a").unwrap();
            writer.finish().unwrap();
        }
        let members = extract_image_members(buf).unwrap();
        assert_eq!(members, vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
