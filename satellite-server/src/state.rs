//! Shared application state: the lock gate plus every engine the
//! routes dispatch to. Built once in `main` and cloned into every request
//! via axum's `State` extractor.

use satellite_core::config::Config;
use satellite_core::error::Result;
use satellite_engine::{
    DedupEngine, EmbeddingEngine, MetadataEngine, NhentaiInventoryEngine, PipelineRunner,
    ScanEngine, SimilarityEngine, UploadEngine,
};
use satellite_jobstore::JobStore;
use satellite_remote::{Img2VecClient, LrrClient};
use satellite_vectorstore::VectorStore;
use std::sync::Arc;

/// Everything a route handler needs: the config it was built from, the two
/// stores, the remote clients, the pipeline's lock gate, and one instance
/// of every engine.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jobstore: JobStore,
    pub vectors: VectorStore,
    pub lrr: Arc<LrrClient>,
    pub pipeline: PipelineRunner,

    pub scan: ScanEngine,
    pub upload: UploadEngine,
    pub metadata: MetadataEngine,
    pub embedding: EmbeddingEngine,
    pub similarity: SimilarityEngine,
    pub dedup: DedupEngine,
    pub nhentai_inventory: NhentaiInventoryEngine,
}

impl AppState {
    /// Build every engine from a loaded [`Config`]. Opens the C1 SQLite
    /// file and connects to C2 Postgres; both failures are fatal at
    /// startup. Lifespan logging and continuing for optional deps applies
    /// to img2vec/NHDD reachability, not to the stores themselves being
    /// openable.
    pub async fn build(config: Config) -> Result<Self> {
        let jobstore = JobStore::open(&config.db_path).await?;
        let vectors = VectorStore::connect(
            &config.nhdd_connection_string(),
            satellite_core::types::DEFAULT_EMBEDDING_DIM,
        )
        .await?;

        let lrr = Arc::new(LrrClient::new(&config.lrr_host, &config.lrr_api_key)?);
        let img2vec = Arc::new(Img2VecClient::new(&config.img2vec_host)?);

        if let Some(api_key) = &config.api_key {
            jobstore.auth().register_api_key(api_key).await?;
        }

        let scan = ScanEngine::new(jobstore.clone());
        let upload = UploadEngine::new(jobstore.clone(), Arc::clone(&lrr));
        let metadata = MetadataEngine::new(jobstore.clone(), Arc::clone(&lrr));
        let embedding = EmbeddingEngine::new(
            vectors.clone(),
            Arc::clone(&lrr),
            img2vec,
            config.img2vec_workers,
        );
        let similarity = SimilarityEngine::new(vectors.clone(), Arc::clone(&lrr));
        let dedup = DedupEngine::new(vectors.clone(), Arc::clone(&lrr));
        let nhentai_inventory = NhentaiInventoryEngine::new(vectors.clone(), Arc::clone(&lrr));

        Ok(Self {
            config: Arc::new(config),
            jobstore,
            vectors,
            lrr,
            pipeline: PipelineRunner::new(),
            scan,
            upload,
            metadata,
            embedding,
            similarity,
            dedup,
            nhentai_inventory,
        })
    }
}
