//! CRUD for the C1 `archive_scan` table backing `ArchiveScan`.

use crate::JobStore;
use satellite_core::error::{Error, Result};
use satellite_core::types::{ArchiveScan, ScanStatus};

fn status_to_i64(status: ScanStatus) -> i64 {
    match status {
        ScanStatus::Ok => 0,
        ScanStatus::Corrupted => 1,
        ScanStatus::Pending => 2,
        ScanStatus::DoNotScan => 3,
        ScanStatus::Error => 4,
    }
}

fn status_from_i64(raw: i64) -> Result<ScanStatus> {
    match raw {
        0 => Ok(ScanStatus::Ok),
        1 => Ok(ScanStatus::Corrupted),
        2 => Ok(ScanStatus::Pending),
        3 => Ok(ScanStatus::DoNotScan),
        4 => Ok(ScanStatus::Error),
        other => Err(Error::Storage(format!("unknown archive_scan status {other}"))),
    }
}

/// Table-scoped handle for `archive_scan` rows.
pub struct ArchiveScanStore {
    store: JobStore,
}

impl ArchiveScanStore {
    pub(crate) fn new(store: JobStore) -> Self {
        Self { store }
    }

    /// Upsert a row. Matches `database.py::update_archive_scan`'s
    /// `INSERT OR IGNORE ... ON CONFLICT DO UPDATE` pattern.
    pub async fn upsert(&self, row: &ArchiveScan) -> Result<()> {
        let conn = self.store.connection().await?;
        conn.execute(
            "INSERT OR IGNORE INTO archive_scan (md5, path, status, mtime)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(md5) DO UPDATE SET
               path = excluded.path,
               status = excluded.status,
               mtime = excluded.mtime",
            libsql::params![
                row.md5.clone(),
                row.path.clone(),
                status_to_i64(row.status),
                row.mtime
            ],
        )
        .await
        .map_err(|e| Error::Storage(format!("upsert archive_scan failed: {e}")))?;
        Ok(())
    }

    pub async fn get(&self, md5: &str) -> Result<Option<ArchiveScan>> {
        let conn = self.store.connection().await?;
        let mut rows = conn
            .query(
                "SELECT md5, path, status, mtime FROM archive_scan WHERE md5 = ?1",
                libsql::params![md5.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("query archive_scan failed: {e}")))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(format!("fetch archive_scan row failed: {e}")))?
        {
            Ok(Some(Self::row_to_scan(&row)?))
        } else {
            Ok(None)
        }
    }

    /// `get_archive_scans_by_status` — `limit = 0` means unbounded.
    pub async fn by_status(&self, status: ScanStatus, limit: usize) -> Result<Vec<ArchiveScan>> {
        let conn = self.store.connection().await?;
        let mut rows = if limit > 0 {
            conn.query(
                "SELECT md5, path, status, mtime FROM archive_scan WHERE status = ?1 LIMIT ?2",
                libsql::params![status_to_i64(status), i64::try_from(limit).unwrap_or(i64::MAX)],
            )
            .await
        } else {
            conn.query(
                "SELECT md5, path, status, mtime FROM archive_scan WHERE status = ?1",
                libsql::params![status_to_i64(status)],
            )
            .await
        }
        .map_err(|e| Error::Storage(format!("query archive_scan by status failed: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(format!("fetch archive_scan row failed: {e}")))?
        {
            out.push(Self::row_to_scan(&row)?);
        }
        Ok(out)
    }

    pub async fn delete(&self, md5: &str) -> Result<()> {
        let conn = self.store.connection().await?;
        conn.execute(
            "DELETE FROM archive_scan WHERE md5 = ?1",
            libsql::params![md5.to_string()],
        )
        .await
        .map_err(|e| Error::Storage(format!("delete archive_scan failed: {e}")))?;
        Ok(())
    }

    fn row_to_scan(row: &libsql::Row) -> Result<ArchiveScan> {
        let status_raw: i64 = row
            .get(2)
            .map_err(|e| Error::Storage(format!("archive_scan.status column: {e}")))?;
        Ok(ArchiveScan {
            md5: row
                .get(0)
                .map_err(|e| Error::Storage(format!("archive_scan.md5 column: {e}")))?,
            path: row
                .get(1)
                .map_err(|e| Error::Storage(format!("archive_scan.path column: {e}")))?,
            status: status_from_i64(status_raw)?,
            mtime: row
                .get(3)
                .map_err(|e| Error::Storage(format!("archive_scan.mtime column: {e}")))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let store = JobStore::open_in_memory().await.unwrap();
        let scans = store.archive_scan();
        let row = ArchiveScan {
            md5: "abc".into(),
            path: "/tmp/a.zip".into(),
            status: ScanStatus::Pending,
            mtime: 123.0,
        };
        scans.upsert(&row).await.unwrap();
        let fetched = scans.get("abc").await.unwrap().unwrap();
        assert_eq!(fetched.status, ScanStatus::Pending);
        assert!((fetched.mtime - 123.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn unchanged_mtime_upsert_is_idempotent() {
        let store = JobStore::open_in_memory().await.unwrap();
        let scans = store.archive_scan();
        let row = ArchiveScan {
            md5: "abc".into(),
            path: "/tmp/a.zip".into(),
            status: ScanStatus::Pending,
            mtime: 123.0,
        };
        scans.upsert(&row).await.unwrap();
        scans.upsert(&row).await.unwrap();
        assert_eq!(scans.by_status(ScanStatus::Pending, 0).await.unwrap().len(), 1);
    }
}
