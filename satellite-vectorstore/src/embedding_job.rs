//! CRUD for `archive_embedding_job` backing `ArchiveEmbeddingJob`,
//! ported from `nhdd.py`'s `*_archive_embedding_job*` methods.

use crate::{now_epoch_secs, SharedClient};
use satellite_core::error::{Error, Result};
use satellite_core::types::{ArchiveEmbeddingJob, EmbeddingJobStatus};

fn status_name(status: EmbeddingJobStatus) -> &'static str {
    match status {
        EmbeddingJobStatus::Success => "SUCCESS",
        EmbeddingJobStatus::Failed => "FAILED",
        EmbeddingJobStatus::Pending => "PENDING",
        EmbeddingJobStatus::NotFound => "NOT_FOUND",
        EmbeddingJobStatus::Skipped => "SKIPPED",
    }
}

fn status_from_name(raw: &str) -> Result<EmbeddingJobStatus> {
    match raw {
        "SUCCESS" => Ok(EmbeddingJobStatus::Success),
        "FAILED" => Ok(EmbeddingJobStatus::Failed),
        "PENDING" => Ok(EmbeddingJobStatus::Pending),
        "NOT_FOUND" => Ok(EmbeddingJobStatus::NotFound),
        "SKIPPED" => Ok(EmbeddingJobStatus::Skipped),
        other => Err(Error::Storage(format!(
            "unknown archive_embedding_job status {other}"
        ))),
    }
}

fn row_to_job(row: &postgres::Row) -> ArchiveEmbeddingJob {
    let status_raw: String = row.get(2);
    ArchiveEmbeddingJob {
        arcid: row.get(0),
        pages: row.get(1),
        status: status_from_name(&status_raw).unwrap_or(EmbeddingJobStatus::Failed),
        last_updated: row.get(3),
        message: row.get(4),
    }
}

/// Table-scoped handle for `archive_embedding_job` rows.
pub struct EmbeddingJobStore {
    client: SharedClient,
}

impl EmbeddingJobStore {
    pub(crate) fn new(client: SharedClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, arcid: &str) -> Result<Option<ArchiveEmbeddingJob>> {
        let client = std::sync::Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<ArchiveEmbeddingJob>> {
            let mut c = client.lock();
            let row = c
                .query_opt(
                    "SELECT archive_id, pages, status, last_updated, message
                     FROM archive_embedding_job WHERE archive_id = $1",
                    &[&arcid],
                )
                .map_err(|e| Error::Storage(format!("query archive_embedding_job failed: {e}")))?;
            Ok(row.as_ref().map(row_to_job))
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn by_status(
        &self,
        status: EmbeddingJobStatus,
        limit: Option<i64>,
    ) -> Result<Vec<ArchiveEmbeddingJob>> {
        let client = std::sync::Arc::clone(&self.client);
        let status = status_name(status).to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<ArchiveEmbeddingJob>> {
            let mut c = client.lock();
            let rows = if let Some(limit) = limit {
                c.query(
                    "SELECT archive_id, pages, status, last_updated, message
                     FROM archive_embedding_job WHERE status = $1 ORDER BY archive_id ASC LIMIT $2",
                    &[&status, &limit],
                )
            } else {
                c.query(
                    "SELECT archive_id, pages, status, last_updated, message
                     FROM archive_embedding_job WHERE status = $1 ORDER BY archive_id ASC",
                    &[&status],
                )
            }
            .map_err(|e| Error::Storage(format!("query archive_embedding_job by status failed: {e}")))?;
            Ok(rows.iter().map(row_to_job).collect())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn count_by_status(&self, status: EmbeddingJobStatus) -> Result<i64> {
        let client = std::sync::Arc::clone(&self.client);
        let status = status_name(status).to_string();
        tokio::task::spawn_blocking(move || -> Result<i64> {
            let mut c = client.lock();
            let row = c
                .query_one(
                    "SELECT COUNT(*) FROM archive_embedding_job WHERE status = $1",
                    &[&status],
                )
                .map_err(|e| Error::Storage(format!("count archive_embedding_job failed: {e}")))?;
            Ok(row.get(0))
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn insert(
        &self,
        arcid: &str,
        pages: i32,
        status: EmbeddingJobStatus,
        message: Option<&str>,
    ) -> Result<()> {
        let client = std::sync::Arc::clone(&self.client);
        let arcid = arcid.to_string();
        let status = status_name(status).to_string();
        let message = message.map(str::to_string);
        let now = now_epoch_secs();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            c.execute(
                "INSERT INTO archive_embedding_job (archive_id, pages, status, last_updated, message)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (archive_id) DO NOTHING",
                &[&arcid, &pages, &status, &now, &message],
            )
            .map_err(|e| Error::Storage(format!("insert archive_embedding_job failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn update_status(
        &self,
        arcid: &str,
        status: EmbeddingJobStatus,
        message: Option<&str>,
    ) -> Result<()> {
        let client = std::sync::Arc::clone(&self.client);
        let arcid = arcid.to_string();
        let status = status_name(status).to_string();
        let message = message.map(str::to_string);
        let now = now_epoch_secs();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            c.execute(
                "UPDATE archive_embedding_job SET status = $1, last_updated = $2, message = $3
                 WHERE archive_id = $4",
                &[&status, &now, &message, &arcid],
            )
            .map_err(|e| Error::Storage(format!("update archive_embedding_job failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips() {
        for status in [
            EmbeddingJobStatus::Success,
            EmbeddingJobStatus::Failed,
            EmbeddingJobStatus::Pending,
            EmbeddingJobStatus::NotFound,
            EmbeddingJobStatus::Skipped,
        ] {
            assert_eq!(status_from_name(status_name(status)).unwrap(), status);
        }
    }
}
