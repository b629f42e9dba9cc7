//! CRUD for `page` backing `Page`, ported from `nhdd.py`'s page
//! methods, plus the two first-page candidate-peer queries that drive
//! subarchive computation.

use crate::schema::{pgvector_literal_to_vec, vec_to_pgvector_literal};
use crate::SharedClient;
use satellite_core::error::{Error, Result};
use satellite_core::types::Page;
use std::sync::Arc;

fn row_to_page(row: &postgres::Row) -> Page {
    let embedding_text: String = row.get(2);
    Page {
        arcid: row.get(0),
        page_no: row.get(1),
        embedding: pgvector_literal_to_vec(&embedding_text),
    }
}

/// Table-scoped handle for `page` rows.
pub struct PageStore {
    client: SharedClient,
}

impl PageStore {
    pub(crate) fn new(client: SharedClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, arcid: &str, page_no: i32) -> Result<Option<Page>> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Page>> {
            let mut c = client.lock();
            let row = c
                .query_opt(
                    "SELECT archive_id, page_no, embedding::text
                     FROM page WHERE archive_id = $1 AND page_no = $2",
                    &[&arcid, &page_no],
                )
                .map_err(|e| Error::Storage(format!("query page failed: {e}")))?;
            Ok(row.as_ref().map(row_to_page))
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn by_archive_id(&self, arcid: &str) -> Result<Vec<Page>> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<Page>> {
            let mut c = client.lock();
            let rows = c
                .query(
                    "SELECT archive_id, page_no, embedding::text
                     FROM page WHERE archive_id = $1 ORDER BY page_no ASC",
                    &[&arcid],
                )
                .map_err(|e| Error::Storage(format!("query pages by archive_id failed: {e}")))?;
            Ok(rows.iter().map(row_to_page).collect())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    /// `get_embeddings_by_archive_id`: page embeddings only, in page order —
    /// the direct input to [`satellite_core::similarity::is_subarchive_of`].
    pub async fn embeddings_by_archive_id(&self, arcid: &str) -> Result<Vec<Vec<f32>>> {
        Ok(self
            .by_archive_id(arcid)
            .await?
            .into_iter()
            .map(|p| p.embedding)
            .collect())
    }

    pub async fn count_by_archive_id(&self, arcid: &str) -> Result<i64> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<i64> {
            let mut c = client.lock();
            let row = c
                .query_one("SELECT COUNT(*) FROM page WHERE archive_id = $1", &[&arcid])
                .map_err(|e| Error::Storage(format!("count pages failed: {e}")))?;
            Ok(row.get(0))
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn insert(&self, arcid: &str, page_no: i32, embedding: &[f32]) -> Result<()> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        let literal = vec_to_pgvector_literal(embedding);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            c.execute(
                "INSERT INTO page (archive_id, page_no, embedding)
                 VALUES ($1, $2, $3::vector)
                 ON CONFLICT (archive_id, page_no) DO NOTHING",
                &[&arcid, &page_no, &literal],
            )
            .map_err(|e| Error::Storage(format!("insert page failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    /// `insert_pages`: batch insert within a single transaction.
    pub async fn insert_many(&self, pages: &[(String, i32, Vec<f32>)]) -> Result<()> {
        if pages.is_empty() {
            return Ok(());
        }
        let client = Arc::clone(&self.client);
        let pages = pages.to_vec();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            let mut tx = c
                .transaction()
                .map_err(|e| Error::Storage(format!("begin page batch insert failed: {e}")))?;
            for (arcid, page_no, embedding) in &pages {
                let literal = vec_to_pgvector_literal(embedding);
                tx.execute(
                    "INSERT INTO page (archive_id, page_no, embedding)
                     VALUES ($1, $2, $3::vector)
                     ON CONFLICT (archive_id, page_no) DO NOTHING",
                    &[arcid, page_no, &literal],
                )
                .map_err(|e| Error::Storage(format!("insert page in batch failed: {e}")))?;
            }
            tx.commit()
                .map_err(|e| Error::Storage(format!("commit page batch insert failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn delete_by_archive_id(&self, arcid: &str) -> Result<()> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            c.execute("DELETE FROM page WHERE archive_id = $1", &[&arcid])
                .map_err(|e| Error::Storage(format!("delete pages failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    /// `get_arcids_by_similar_first_page`: other archives whose page 1 is
    /// within `min_similarity` cosine similarity of `arcid`'s page 1.
    pub async fn arcids_by_similar_first_page(
        &self,
        arcid: &str,
        min_similarity: f64,
        restrict_language: bool,
    ) -> Result<Vec<String>> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        let max_distance = 1.0 - min_similarity;
        tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut c = client.lock();
            let base = "SELECT p2.archive_id
                 FROM page p1
                 JOIN nhentai_archive na1 ON na1.archive_id = p1.archive_id
                 JOIN page p2 ON p2.page_no = 1
                 JOIN nhentai_archive na2 ON na2.archive_id = p2.archive_id
                 WHERE p1.archive_id = $1
                 AND p1.page_no = 1
                 AND p2.archive_id <> na1.archive_id
                 AND (p1.embedding <=> p2.embedding) < $2";
            let rows = if restrict_language {
                let query = format!("{base} AND na2.language = na1.language");
                c.query(&query, &[&arcid, &max_distance])
            } else {
                c.query(base, &[&arcid, &max_distance])
            }
            .map_err(|e| Error::Storage(format!("arcids_by_similar_first_page failed: {e}")))?;
            Ok(rows.iter().map(|r| r.get(0)).collect())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    /// `get_arcids_by_page_similar_to_first_page_2`: other archives with
    /// *any* page close to `arcid`'s first page (subarchive-candidate scan).
    pub async fn arcids_by_page_similar_to_first_page(
        &self,
        arcid: &str,
        min_similarity: f64,
        restrict_language: bool,
    ) -> Result<Vec<String>> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        let max_distance = 1.0 - min_similarity;
        tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut c = client.lock();
            let base = "SELECT DISTINCT p2.archive_id
                 FROM page p1
                 JOIN nhentai_archive na1 ON na1.archive_id = p1.archive_id
                 JOIN page p2 ON p2.archive_id <> p1.archive_id
                 JOIN nhentai_archive na2 ON na2.archive_id = p2.archive_id
                 WHERE p1.archive_id = $1
                 AND p1.page_no = 1
                 AND (p1.embedding <=> p2.embedding) < $2";
            let rows = if restrict_language {
                let query = format!("{base} AND na2.language = na1.language");
                c.query(&query, &[&arcid, &max_distance])
            } else {
                c.query(base, &[&arcid, &max_distance])
            }
            .map_err(|e| {
                Error::Storage(format!("arcids_by_page_similar_to_first_page failed: {e}"))
            })?;
            Ok(rows.iter().map(|r| r.get(0)).collect())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }
}
