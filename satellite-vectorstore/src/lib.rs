//! C2: Postgres+pgvector storage for embedding jobs, page embeddings,
//! the subarchive union-find map and the nhentai catalogue.
//!
//! Grounded on `examples/other_examples/.../pgvector.rs`'s `PgVectorStore`
//! pattern (crates.io `postgres` + `NoTls`, blocking calls wrapped in
//! `spawn_blocking`, vectors passed as pgvector literal strings cast to
//! `::vector` in SQL). Table layout and queries are ported from
//! `examples/original_source/src/satellite/service/nhdd.py::PostgresDatabaseService`.

mod embedding_job;
mod metadata_job;
mod nhentai_archive;
mod page;
mod schema;
mod subarchive_map;

pub use embedding_job::EmbeddingJobStore;
pub use metadata_job::{ArchiveMetadataJob, MetadataJobStatus, MetadataJobStore};
pub use nhentai_archive::NhentaiArchiveStore;
pub use page::PageStore;
pub use schema::{pgvector_literal_to_vec, vec_to_pgvector_literal};
pub use subarchive_map::SubarchiveMapStore;

use parking_lot::Mutex;
use postgres::{Client, NoTls};
use satellite_core::error::{Error, Result};
use std::sync::Arc;

pub(crate) type SharedClient = Arc<Mutex<Client>>;

/// Handle to the Postgres vector-store connection. Cheap to clone.
#[derive(Clone)]
pub struct VectorStore {
    client: SharedClient,
    embedding_dim: usize,
}

impl VectorStore {
    /// Connect and ensure the schema (tables + HNSW index) exists.
    ///
    /// Mirrors `setup_database`: the `vector` extension and five tables are
    /// created idempotently, then the HNSW index is attempted separately so
    /// a pgvector<0.5 server still leaves the rest of the schema usable.
    pub async fn connect(conn_str: &str, embedding_dim: usize) -> Result<Self> {
        let conn_str = conn_str.to_string();
        let do_connect = move || -> Result<Client> {
            let mut client = Client::connect(&conn_str, NoTls)
                .map_err(|e| Error::Storage(format!("failed to connect to vector store: {e}")))?;
            Self::init_schema(&mut client, embedding_dim)?;
            Ok(client)
        };

        let client = if tokio::runtime::Handle::try_current().is_ok() {
            tokio::task::block_in_place(do_connect)
        } else {
            do_connect()
        }?;

        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            embedding_dim,
        })
    }

    fn init_schema(client: &mut Client, embedding_dim: usize) -> Result<()> {
        client
            .batch_execute("CREATE EXTENSION IF NOT EXISTS vector")
            .map_err(|e| Error::Storage(format!("failed to enable pgvector extension: {e}")))?;

        client
            .batch_execute(schema::CREATE_ARCHIVE_EMBEDDING_JOB_TABLE)
            .map_err(|e| Error::Storage(format!("create archive_embedding_job failed: {e}")))?;
        client
            .batch_execute(schema::CREATE_ARCHIVE_METADATA_JOB_TABLE)
            .map_err(|e| Error::Storage(format!("create archive_metadata_job failed: {e}")))?;
        client
            .batch_execute(&schema::create_page_table(embedding_dim))
            .map_err(|e| Error::Storage(format!("create page table failed: {e}")))?;
        client
            .batch_execute(schema::CREATE_SUBARCHIVE_MAP_TABLE)
            .map_err(|e| Error::Storage(format!("create subarchive_map failed: {e}")))?;
        client
            .batch_execute(schema::CREATE_NHENTAI_ARCHIVE_TABLE)
            .map_err(|e| Error::Storage(format!("create nhentai_archive failed: {e}")))?;

        if let Err(e) = client.batch_execute(schema::CREATE_PAGE_INDEX) {
            tracing::warn!("could not create HNSW index on page.embedding (pgvector >= 0.5 required): {e}");
        }

        Ok(())
    }

    fn client(&self) -> SharedClient {
        Arc::clone(&self.client)
    }

    #[must_use]
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    #[must_use]
    pub fn embedding_jobs(&self) -> EmbeddingJobStore {
        EmbeddingJobStore::new(self.client())
    }

    #[must_use]
    pub fn pages(&self) -> PageStore {
        PageStore::new(self.client())
    }

    #[must_use]
    pub fn subarchive_map(&self) -> SubarchiveMapStore {
        SubarchiveMapStore::new(self.client())
    }

    #[must_use]
    pub fn nhentai_archives(&self) -> NhentaiArchiveStore {
        NhentaiArchiveStore::new(self.client())
    }

    #[must_use]
    pub fn metadata_jobs(&self) -> MetadataJobStore {
        MetadataJobStore::new(self.client())
    }
}

pub(crate) fn now_epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
