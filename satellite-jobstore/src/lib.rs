//! C1: relational job store for scan/upload/metadata-plugin/auth rows,
//! backed by `libsql` in local-file mode (the SQLite-compatible embedded
//! engine already used by the rest of this workspace).
//!
//! Grounded on `memory_storage_turso::TursoStorage` for connection
//! management and query style; the schema and operations themselves are
//! ported from `examples/original_source/src/satellite_server/service/database.py`.

mod archive_scan;
mod archive_upload;
mod auth;
mod metadata_plugin_task;
mod schema;

pub use archive_scan::ArchiveScanStore;
pub use archive_upload::ArchiveUploadStore;
pub use auth::AuthStore;
pub use metadata_plugin_task::MetadataPluginTaskStore;
pub use schema::JobTable;

use satellite_core::error::{Error, Result};
use std::sync::Arc;

/// Handle to the job-store database. Cheap to clone (wraps an `Arc`).
#[derive(Clone)]
pub struct JobStore {
    db: Arc<libsql::Database>,
}

impl JobStore {
    /// Open (creating if absent) the SQLite file at `path` and ensure the
    /// schema exists.
    pub async fn open(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| Error::Storage(format!("failed to open job store: {e}")))?;
        let store = Self { db: Arc::new(db) };
        store.initialize_schema().await?;
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub async fn open_in_memory() -> Result<Self> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| Error::Storage(format!("failed to open in-memory job store: {e}")))?;
        let store = Self { db: Arc::new(db) };
        store.initialize_schema().await?;
        Ok(store)
    }

    pub(crate) async fn connection(&self) -> Result<libsql::Connection> {
        self.db
            .connect()
            .map_err(|e| Error::Storage(format!("failed to open connection: {e}")))
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connection().await?;
        for stmt in schema::ALL_TABLES {
            conn.execute(stmt, ())
                .await
                .map_err(|e| Error::Storage(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn archive_scan(&self) -> ArchiveScanStore {
        ArchiveScanStore::new(self.clone())
    }

    #[must_use]
    pub fn archive_upload(&self) -> ArchiveUploadStore {
        ArchiveUploadStore::new(self.clone())
    }

    #[must_use]
    pub fn metadata_plugin_task(&self) -> MetadataPluginTaskStore {
        MetadataPluginTaskStore::new(self.clone())
    }

    #[must_use]
    pub fn auth(&self) -> AuthStore {
        AuthStore::new(self.clone())
    }

    /// `DELETE /api/database/{table}`: drop and recreate one table, wiping
    /// all rows but leaving the others untouched.
    pub async fn reset_table(&self, table: JobTable) -> Result<()> {
        let conn = self.connection().await?;
        conn.execute(&format!("DROP TABLE IF EXISTS {}", table.name()), ())
            .await
            .map_err(|e| Error::Storage(format!("drop {} failed: {e}", table.name())))?;
        conn.execute(table.create_stmt(), ())
            .await
            .map_err(|e| Error::Storage(format!("recreate {} failed: {e}", table.name())))?;
        Ok(())
    }
}
