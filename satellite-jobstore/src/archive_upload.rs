//! CRUD for the C1 `archive_upload` table backing `ArchiveUpload`.

use crate::JobStore;
use satellite_core::error::Error;
use satellite_core::error::Result;
use satellite_core::types::ArchiveUpload;

/// Table-scoped handle for `archive_upload` rows.
pub struct ArchiveUploadStore {
    store: JobStore,
}

impl ArchiveUploadStore {
    pub(crate) fn new(store: JobStore) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, row: &ArchiveUpload) -> Result<()> {
        let conn = self.store.connection().await?;
        conn.execute(
            "INSERT OR IGNORE INTO archive_upload (md5, path, mtime)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(md5) DO UPDATE SET
               path = excluded.path,
               mtime = excluded.mtime",
            libsql::params![row.md5.clone(), row.path.clone(), row.mtime],
        )
        .await
        .map_err(|e| Error::Storage(format!("upsert archive_upload failed: {e}")))?;
        Ok(())
    }

    /// Row existence at the matching mtime means "already uploaded (or
    /// server-duplicate)" — callers should compare `row.mtime` against the
    /// candidate file's observed mtime themselves.
    pub async fn get(&self, md5: &str) -> Result<Option<ArchiveUpload>> {
        let conn = self.store.connection().await?;
        let mut rows = conn
            .query(
                "SELECT md5, path, mtime FROM archive_upload WHERE md5 = ?1",
                libsql::params![md5.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("query archive_upload failed: {e}")))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(format!("fetch archive_upload row failed: {e}")))?
        {
            Ok(Some(ArchiveUpload {
                md5: row
                    .get(0)
                    .map_err(|e| Error::Storage(format!("archive_upload.md5: {e}")))?,
                path: row
                    .get(1)
                    .map_err(|e| Error::Storage(format!("archive_upload.path: {e}")))?,
                mtime: row
                    .get(2)
                    .map_err(|e| Error::Storage(format!("archive_upload.mtime: {e}")))?,
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn delete(&self, md5: &str) -> Result<()> {
        let conn = self.store.connection().await?;
        conn.execute(
            "DELETE FROM archive_upload WHERE md5 = ?1",
            libsql::params![md5.to_string()],
        )
        .await
        .map_err(|e| Error::Storage(format!("delete archive_upload failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn skip_on_unchanged_mtime() {
        let store = JobStore::open_in_memory().await.unwrap();
        let uploads = store.archive_upload();
        let row = ArchiveUpload {
            md5: "abc".into(),
            path: "/tmp/a.zip".into(),
            mtime: 42.0,
        };
        uploads.upsert(&row).await.unwrap();
        let fetched = uploads.get("abc").await.unwrap().unwrap();
        assert!((fetched.mtime - 42.0).abs() < f64::EPSILON);
    }
}
