//! CRUD for the C1 `metadata_plugin_task` table backing the
//! `MetadataPluginTask` state machine.

use crate::JobStore;
use satellite_core::error::{Error, Result};
use satellite_core::types::{MetadataNamespace, MetadataPluginTask, MetadataPluginTaskStatus};

fn status_to_i64(status: MetadataPluginTaskStatus) -> i64 {
    match status {
        MetadataPluginTaskStatus::Ok => 0,
        MetadataPluginTaskStatus::NotFound => 1,
        MetadataPluginTaskStatus::Pending => 2,
        MetadataPluginTaskStatus::DoNotScan => 3,
        MetadataPluginTaskStatus::Error => 4,
    }
}

fn status_from_i64(raw: i64) -> Result<MetadataPluginTaskStatus> {
    match raw {
        0 => Ok(MetadataPluginTaskStatus::Ok),
        1 => Ok(MetadataPluginTaskStatus::NotFound),
        2 => Ok(MetadataPluginTaskStatus::Pending),
        3 => Ok(MetadataPluginTaskStatus::DoNotScan),
        4 => Ok(MetadataPluginTaskStatus::Error),
        other => Err(Error::Storage(format!(
            "unknown metadata_plugin_task status {other}"
        ))),
    }
}

/// Table-scoped handle for `metadata_plugin_task` rows.
pub struct MetadataPluginTaskStore {
    store: JobStore,
}

impl MetadataPluginTaskStore {
    pub(crate) fn new(store: JobStore) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, task: &MetadataPluginTask) -> Result<()> {
        let conn = self.store.connection().await?;
        conn.execute(
            "INSERT OR IGNORE INTO metadata_plugin_task
               (arcid, source, namespace, status, last_updated, num_failures)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(arcid) DO UPDATE SET
               source = excluded.source,
               namespace = excluded.namespace,
               status = excluded.status,
               last_updated = excluded.last_updated,
               num_failures = excluded.num_failures",
            libsql::params![
                task.arcid.clone(),
                task.source.clone(),
                task.namespace.as_str().to_string(),
                status_to_i64(task.status),
                task.last_updated,
                i64::from(task.num_failures),
            ],
        )
        .await
        .map_err(|e| Error::Storage(format!("upsert metadata_plugin_task failed: {e}")))?;
        Ok(())
    }

    pub async fn get(&self, arcid: &str) -> Result<Option<MetadataPluginTask>> {
        let conn = self.store.connection().await?;
        let mut rows = conn
            .query(
                "SELECT arcid, source, namespace, status, last_updated, num_failures
                 FROM metadata_plugin_task WHERE arcid = ?1",
                libsql::params![arcid.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("query metadata_plugin_task failed: {e}")))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(format!("fetch metadata_plugin_task row failed: {e}")))?
        {
            Ok(Some(Self::row_to_task(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Fetch order: OK (if `retry_ok`), then PENDING, then expired
    /// NOT_FOUND — callers compose these three queries in that order.
    pub async fn by_status_and_namespace(
        &self,
        status: MetadataPluginTaskStatus,
        namespace: MetadataNamespace,
        limit: usize,
    ) -> Result<Vec<MetadataPluginTask>> {
        let conn = self.store.connection().await?;
        let mut rows = if limit > 0 {
            conn.query(
                "SELECT arcid, source, namespace, status, last_updated, num_failures
                 FROM metadata_plugin_task WHERE status = ?1 AND namespace = ?2 LIMIT ?3",
                libsql::params![
                    status_to_i64(status),
                    namespace.as_str().to_string(),
                    i64::try_from(limit).unwrap_or(i64::MAX)
                ],
            )
            .await
        } else {
            conn.query(
                "SELECT arcid, source, namespace, status, last_updated, num_failures
                 FROM metadata_plugin_task WHERE status = ?1 AND namespace = ?2",
                libsql::params![status_to_i64(status), namespace.as_str().to_string()],
            )
            .await
        }
        .map_err(|e| Error::Storage(format!("query metadata_plugin_task failed: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(format!("fetch metadata_plugin_task row failed: {e}")))?
        {
            out.push(Self::row_to_task(&row)?);
        }
        Ok(out)
    }

    /// `get_metadata_plugin_task_expired`: NOT_FOUND rows whose backoff has
    /// expired. Filtered in Rust rather than SQL so the `2^num_failures`
    /// formula lives in exactly one place ([`MetadataPluginTask::is_expired`]).
    pub async fn expired_not_found(&self, now: f64) -> Result<Vec<MetadataPluginTask>> {
        let all = self
            .by_status_and_namespace_any(MetadataPluginTaskStatus::NotFound)
            .await?;
        Ok(all.into_iter().filter(|t| t.is_expired(now)).collect())
    }

    async fn by_status_and_namespace_any(
        &self,
        status: MetadataPluginTaskStatus,
    ) -> Result<Vec<MetadataPluginTask>> {
        let conn = self.store.connection().await?;
        let mut rows = conn
            .query(
                "SELECT arcid, source, namespace, status, last_updated, num_failures
                 FROM metadata_plugin_task WHERE status = ?1",
                libsql::params![status_to_i64(status)],
            )
            .await
            .map_err(|e| Error::Storage(format!("query metadata_plugin_task failed: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(format!("fetch metadata_plugin_task row failed: {e}")))?
        {
            out.push(Self::row_to_task(&row)?);
        }
        Ok(out)
    }

    pub async fn delete(&self, arcid: &str) -> Result<()> {
        let conn = self.store.connection().await?;
        conn.execute(
            "DELETE FROM metadata_plugin_task WHERE arcid = ?1",
            libsql::params![arcid.to_string()],
        )
        .await
        .map_err(|e| Error::Storage(format!("delete metadata_plugin_task failed: {e}")))?;
        Ok(())
    }

    fn row_to_task(row: &libsql::Row) -> Result<MetadataPluginTask> {
        let namespace_raw: String = row
            .get(2)
            .map_err(|e| Error::Storage(format!("metadata_plugin_task.namespace: {e}")))?;
        let namespace = MetadataNamespace::parse(&namespace_raw).ok_or_else(|| {
            Error::Storage(format!("unknown metadata_plugin_task namespace {namespace_raw}"))
        })?;
        let status_raw: i64 = row
            .get(3)
            .map_err(|e| Error::Storage(format!("metadata_plugin_task.status: {e}")))?;
        let num_failures_raw: i64 = row
            .get(5)
            .map_err(|e| Error::Storage(format!("metadata_plugin_task.num_failures: {e}")))?;
        Ok(MetadataPluginTask {
            arcid: row
                .get(0)
                .map_err(|e| Error::Storage(format!("metadata_plugin_task.arcid: {e}")))?,
            source: row
                .get(1)
                .map_err(|e| Error::Storage(format!("metadata_plugin_task.source: {e}")))?,
            namespace,
            status: status_from_i64(status_raw)?,
            last_updated: row
                .get(4)
                .map_err(|e| Error::Storage(format!("metadata_plugin_task.last_updated: {e}")))?,
            num_failures: u32::try_from(num_failures_raw).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn not_found_backoff_expiry() {
        let store = JobStore::open_in_memory().await.unwrap();
        let tasks = store.metadata_plugin_task();
        let now = 1_000_000.0;

        // num_failures = 1 ⇒ needs >= 2 * 86400 elapsed; only 1 day elapsed here.
        tasks
            .upsert(&MetadataPluginTask {
                arcid: "a".into(),
                source: Some("src".into()),
                namespace: MetadataNamespace::Nhentai,
                status: MetadataPluginTaskStatus::NotFound,
                last_updated: now - 86400.0,
                num_failures: 1,
            })
            .await
            .unwrap();

        // num_failures = 0 ⇒ always expired once last_updated is in the past.
        tasks
            .upsert(&MetadataPluginTask {
                arcid: "b".into(),
                source: Some("src".into()),
                namespace: MetadataNamespace::Nhentai,
                status: MetadataPluginTaskStatus::NotFound,
                last_updated: now - 1.0,
                num_failures: 0,
            })
            .await
            .unwrap();

        let expired = tasks.expired_not_found(now).await.unwrap();
        let arcids: Vec<_> = expired.iter().map(|t| t.arcid.as_str()).collect();
        assert!(arcids.contains(&"b"));
        assert!(!arcids.contains(&"a"));
    }
}
