//! CRUD for `archive_metadata_job` (C7's nhentai-archivist favourites/metadata
//! pass state, distinct from the LRR-plugin `metadata_plugin_task` table in
//! `satellite-jobstore`). Ported from `nhdd.py`'s `*_archive_metadata_job*`
//! methods.

use crate::{now_epoch_secs, SharedClient};
use satellite_core::error::{Error, Result};
use std::sync::Arc;

/// Status of one `archive_metadata_job` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataJobStatus {
    Success,
    Failed,
    Pending,
    NotFound,
}

fn status_name(status: MetadataJobStatus) -> &'static str {
    match status {
        MetadataJobStatus::Success => "SUCCESS",
        MetadataJobStatus::Failed => "FAILED",
        MetadataJobStatus::Pending => "PENDING",
        MetadataJobStatus::NotFound => "NOT_FOUND",
    }
}

fn status_from_name(raw: &str) -> Result<MetadataJobStatus> {
    match raw {
        "SUCCESS" => Ok(MetadataJobStatus::Success),
        "FAILED" => Ok(MetadataJobStatus::Failed),
        "PENDING" => Ok(MetadataJobStatus::Pending),
        "NOT_FOUND" => Ok(MetadataJobStatus::NotFound),
        other => Err(Error::Storage(format!(
            "unknown archive_metadata_job status {other}"
        ))),
    }
}

/// One `archive_metadata_job` row.
#[derive(Debug, Clone)]
pub struct ArchiveMetadataJob {
    pub arcid: String,
    pub status: MetadataJobStatus,
    pub message: Option<String>,
    pub last_updated: f64,
}

fn row_to_job(row: &postgres::Row) -> Result<ArchiveMetadataJob> {
    let status_raw: String = row.get(1);
    Ok(ArchiveMetadataJob {
        arcid: row.get(0),
        status: status_from_name(&status_raw)?,
        message: row.get(2),
        last_updated: row.get(3),
    })
}

/// Table-scoped handle for `archive_metadata_job` rows.
pub struct MetadataJobStore {
    client: SharedClient,
}

impl MetadataJobStore {
    pub(crate) fn new(client: SharedClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, arcid: &str) -> Result<Option<ArchiveMetadataJob>> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<ArchiveMetadataJob>> {
            let mut c = client.lock();
            let row = c
                .query_opt(
                    "SELECT archive_id, status, message, last_updated
                     FROM archive_metadata_job WHERE archive_id = $1",
                    &[&arcid],
                )
                .map_err(|e| Error::Storage(format!("get archive_metadata_job failed: {e}")))?;
            row.as_ref().map(row_to_job).transpose()
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn upsert(
        &self,
        arcid: &str,
        status: MetadataJobStatus,
        message: Option<&str>,
    ) -> Result<()> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        let status = status_name(status).to_string();
        let message = message.map(str::to_string);
        let now = now_epoch_secs();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            c.execute(
                "INSERT INTO archive_metadata_job (archive_id, status, message, last_updated)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (archive_id) DO UPDATE SET
                   status = excluded.status,
                   message = excluded.message,
                   last_updated = excluded.last_updated",
                &[&arcid, &status, &message, &now],
            )
            .map_err(|e| Error::Storage(format!("upsert archive_metadata_job failed: {e}")))?;
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
            c.execute(
                "DELETE FROM archive_metadata_job WHERE archive_id = $1",
                &[&arcid],
            )
            .map_err(|e| Error::Storage(format!("delete archive_metadata_job failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    /// Every arcid currently at `status` (nhentai-favorites sweep's queue
    /// scan).
    pub async fn by_status(&self, status: MetadataJobStatus) -> Result<Vec<String>> {
        let client = Arc::clone(&self.client);
        let status = status_name(status).to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut c = client.lock();
            let rows = c
                .query(
                    "SELECT archive_id FROM archive_metadata_job WHERE status = $1",
                    &[&status],
                )
                .map_err(|e| Error::Storage(format!("by_status archive_metadata_job failed: {e}")))?;
            Ok(rows.iter().map(|r| r.get(0)).collect())
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
            MetadataJobStatus::Success,
            MetadataJobStatus::Failed,
            MetadataJobStatus::Pending,
            MetadataJobStatus::NotFound,
        ] {
            assert_eq!(status_from_name(status_name(status)).unwrap(), status);
        }
    }
}
