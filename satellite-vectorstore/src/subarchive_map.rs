//! CRUD for `subarchive_map` backing `SubarchiveMapRow`, the
//! union-find-like table recording each archive's "less-equal" duplicate
//! parent. Ported from `nhdd.py`'s proper-subarchive methods.

use crate::SharedClient;
use satellite_core::error::{Error, Result};
use satellite_core::types::SubarchiveMapRow;
use std::sync::Arc;

/// Table-scoped handle for `subarchive_map` rows.
pub struct SubarchiveMapStore {
    client: SharedClient,
}

impl SubarchiveMapStore {
    pub(crate) fn new(client: SharedClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, arcid: &str) -> Result<Option<SubarchiveMapRow>> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<SubarchiveMapRow>> {
            let mut c = client.lock();
            let row = c
                .query_opt(
                    "SELECT archive_id, leq FROM subarchive_map WHERE archive_id = $1",
                    &[&arcid],
                )
                .map_err(|e| Error::Storage(format!("get subarchive_map failed: {e}")))?;
            Ok(row.map(|r| SubarchiveMapRow {
                arcid: r.get(0),
                leq: r.get(1),
            }))
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    /// `get_root_suparchive`: follow the chain `(S, S1) -> (S1, S2) -> ...`
    /// to the root `T` for which `(T, T)` holds.
    ///
    /// Implemented as a recursive CTE walking to the terminal self-loop row,
    /// same technique as `nhdd.py`. A `depth` column is carried through the
    /// recursion and used to pick the *deepest* (most fully chased) row per
    /// `archive_id` in the final `DISTINCT ON`, since picking an arbitrary
    /// intermediate row would return a non-root ancestor for chains longer
    /// than one hop.
    pub async fn root(&self, arcid: &str) -> Result<Option<String>> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let mut c = client.lock();
            let row = c
                .query_opt(
                    "WITH RECURSIVE chain AS (
                        SELECT archive_id, leq, 0 AS depth FROM subarchive_map
                        UNION ALL
                        SELECT c.archive_id, psm.leq, c.depth + 1
                        FROM chain AS c
                        JOIN subarchive_map AS psm ON c.leq = psm.archive_id
                        WHERE psm.archive_id <> psm.leq
                     )
                     SELECT DISTINCT ON (archive_id) archive_id, leq AS root
                     FROM chain
                     WHERE archive_id = $1
                     ORDER BY archive_id, depth DESC",
                    &[&arcid],
                )
                .map_err(|e| Error::Storage(format!("get_root_suparchive failed: {e}")))?;
            Ok(row.map(|r| r.get::<_, String>(1)))
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn children(&self, arcid: &str) -> Result<Vec<String>> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut c = client.lock();
            let rows = c
                .query(
                    "SELECT archive_id FROM subarchive_map WHERE leq = $1 AND archive_id <> $1",
                    &[&arcid],
                )
                .map_err(|e| Error::Storage(format!("subarchive_map children failed: {e}")))?;
            Ok(rows.iter().map(|r| r.get(0)).collect())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    /// Archives marked as duplicates of some other root (`archive_id <> leq`).
    pub async fn duplicates(&self) -> Result<Vec<String>> {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut c = client.lock();
            let rows = c
                .query(
                    "SELECT archive_id FROM subarchive_map WHERE archive_id <> leq",
                    &[],
                )
                .map_err(|e| Error::Storage(format!("get_duplicate_archives failed: {e}")))?;
            Ok(rows.iter().map(|r| r.get(0)).collect())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn insert(&self, arcid: &str, leq: &str) -> Result<()> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        let leq = leq.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            c.execute(
                "INSERT INTO subarchive_map (archive_id, leq) VALUES ($1, $2)
                 ON CONFLICT (archive_id) DO NOTHING",
                &[&arcid, &leq],
            )
            .map_err(|e| Error::Storage(format!("insert subarchive_map failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn update(&self, arcid: &str, leq: &str) -> Result<()> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        let leq = leq.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            c.execute(
                "UPDATE subarchive_map SET leq = $1 WHERE archive_id = $2",
                &[&leq, &arcid],
            )
            .map_err(|e| Error::Storage(format!("update subarchive_map failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn delete(&self, arcid: &str) -> Result<()> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            c.execute("DELETE FROM subarchive_map WHERE archive_id = $1", &[&arcid])
                .map_err(|e| Error::Storage(format!("delete subarchive_map failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn delete_children(&self, arcid: &str) -> Result<()> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            c.execute(
                "DELETE FROM subarchive_map WHERE leq = $1 AND archive_id <> $1",
                &[&arcid],
            )
            .map_err(|e| Error::Storage(format!("delete subarchive_map children failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    /// Archives with page embeddings but no `subarchive_map` row yet —
    /// `get_archives_not_in_subarchive_map`, the work queue for
    /// `compute_subarchives`.
    pub async fn archives_not_mapped(
        &self,
        language: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<String>> {
        let client = Arc::clone(&self.client);
        let language = language.map(str::to_string);
        tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut c = client.lock();
            let mut query = String::from(
                "SELECT archive_id FROM nhentai_archive
                 WHERE EXISTS (
                     SELECT 1 FROM archive_embedding_job
                     WHERE archive_embedding_job.archive_id = nhentai_archive.archive_id
                     AND archive_embedding_job.status IN ('SUCCESS', 'SKIPPED')
                 )
                 AND NOT EXISTS (
                     SELECT 1 FROM subarchive_map
                     WHERE subarchive_map.archive_id = nhentai_archive.archive_id
                 )",
            );
            let mut params: Vec<&(dyn postgres::types::ToSql + Sync)> = Vec::new();
            if let Some(language) = &language {
                query.push_str(" AND language = $1");
                params.push(language);
            }
            if let Some(limit) = &limit {
                query.push_str(if language.is_some() { " LIMIT $2" } else { " LIMIT $1" });
                params.push(limit);
            }
            let rows = c
                .query(&query, &params)
                .map_err(|e| Error::Storage(format!("archives_not_mapped failed: {e}")))?;
            Ok(rows.iter().map(|r| r.get(0)).collect())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }
}
