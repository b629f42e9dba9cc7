//! Route handlers for the HTTP surface. Each handler either
//! dispatches a background job through [`PipelineRunner`] (returning 200
//! once queued, 423 if the relevant lock is busy) or answers a read query
//! directly.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post};
use axum::Router;
use satellite_core::error::Error;
use satellite_core::lock::NamedLock;
use satellite_core::types::{MetadataNamespace, ScanStatus};
use satellite_engine::{
    DownloaderMetadataEngine, NhentaiArchivistDb, PixivUtil2Db, UploadMode,
};
use satellite_jobstore::JobTable;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let authenticated = Router::new()
        .route("/api/archives/scan", post(scan_archives))
        .route("/api/archives", get(list_archives))
        .route("/api/archives/corrupted", delete(delete_corrupted))
        .route("/api/upload", post(upload_archives))
        .route(
            "/api/metadata/plugins/:namespace",
            post(run_metadata_plugin),
        )
        .route(
            "/api/metadata/:downloader",
            post(run_downloader_metadata),
        )
        .route("/api/nhdd/page-embeddings", post(run_page_embeddings))
        .route("/api/nhdd/subarchives", post(run_subarchives))
        .route("/api/nhdd/nhentai-archives", post(run_nhentai_archives))
        .route("/api/nhdd/duplicates", get(list_duplicates))
        .route("/api/nhdd/duplicates", delete(remove_duplicates))
        .route("/api/database/:table", delete(reset_database_table))
        .route_layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            crate::auth::auth_middleware,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(authenticated)
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let lrr_ok = state.lrr.get_server_info().await.is_ok();
    let status = if lrr_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "lrr_reachable": lrr_ok })))
}

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// 0 = every available core, 1 = in-process, k = pool of k.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
}

fn default_batch_size() -> usize {
    1000
}

fn default_num_workers() -> usize {
    1
}

async fn scan_archives(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScanQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let contents_dir = state.config.lrr_contents_dir.clone();
    if !contents_dir.exists() {
        return Err(ApiError(Error::NotFound(format!(
            "LRR_CONTENTS_DIR does not exist: {}",
            contents_dir.display()
        ))));
    }

    let scan = state.scan.clone();
    state.pipeline.submit_writer_job(move || async move {
        match scan.discover(&contents_dir).await {
            Ok(summary) => tracing::info!(
                new_or_changed = summary.new_or_changed,
                unchanged = summary.unchanged,
                "archive scan: discovery complete"
            ),
            Err(e) => {
                tracing::warn!("archive scan: discovery failed: {e}");
                return;
            }
        }
        match scan.analyze(query.batch_size, query.num_workers).await {
            Ok(summary) => tracing::info!(
                ok = summary.ok,
                corrupted = summary.corrupted,
                error = summary.error,
                missing = summary.missing,
                "archive scan: analysis complete"
            ),
            Err(e) => tracing::warn!("archive scan: analysis failed: {e}"),
        }
    })?;

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct ListArchivesQuery {
    pub status: ScanStatus,
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_list_limit() -> usize {
    100
}

async fn list_archives(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListArchivesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let _guard = state.pipeline.acquire_reader().await?;
    let rows = state
        .jobstore
        .archive_scan()
        .by_status(query.status, query.limit)
        .await?;
    Ok(Json(rows))
}

async fn delete_corrupted(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let scan = state.scan.clone();
    state.pipeline.submit_writer_job(move || async move {
        match scan.delete_corrupted().await {
            Ok(count) => tracing::info!(count, "deleted corrupted archives"),
            Err(e) => tracing::warn!("delete corrupted archives failed: {e}"),
        }
    })?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub archive_is_dir: bool,
    #[serde(default = "default_concurrency")]
    pub semaphore_val: usize,
}

fn default_concurrency() -> usize {
    8
}

async fn upload_archives(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(upload_dir) = state.config.upload_dir.clone() else {
        return Err(ApiError(Error::Configuration(
            "UPLOAD_DIR is not configured".into(),
        )));
    };
    let mode = if query.archive_is_dir {
        UploadMode::LeafFolder
    } else {
        UploadMode::ArchiveFile
    };

    let upload = state.upload.clone();
    state.pipeline.submit_writer_job(move || async move {
        match upload.run(&upload_dir, mode, query.semaphore_val).await {
            Ok(summary) => tracing::info!(
                uploaded = summary.uploaded,
                skipped = summary.skipped,
                failed = summary.failed,
                "upload run complete"
            ),
            Err(e) => tracing::warn!("upload run failed: {e}"),
        }
    })?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct MetadataPluginQuery {
    #[serde(default)]
    pub retry_ok: bool,
    #[serde(default = "default_sleep_time")]
    pub sleep_time: f64,
}

fn default_sleep_time() -> f64 {
    1.0
}

async fn run_metadata_plugin(
    State(state): State<Arc<AppState>>,
    Path(namespace): Path<String>,
    Query(query): Query<MetadataPluginQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(namespace) = MetadataNamespace::parse(&namespace) else {
        return Err(ApiError(Error::InvalidInput(format!(
            "unknown metadata namespace: {namespace}"
        ))));
    };

    let metadata = state.metadata.clone();
    state.pipeline.submit_writer_job(move || async move {
        match metadata.run(namespace, query.retry_ok, query.sleep_time).await {
            Ok(summary) => tracing::info!(
                ok = summary.ok,
                not_found = summary.not_found,
                failed = summary.failed,
                "metadata plugin run complete"
            ),
            Err(e) => tracing::warn!("metadata plugin run failed: {e}"),
        }
    })?;
    Ok(StatusCode::OK)
}

async fn run_downloader_metadata(
    State(state): State<Arc<AppState>>,
    Path(downloader): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = DownloaderMetadataEngine::new(Arc::clone(&state.lrr));

    match downloader.as_str() {
        "nhentai-archivist" => {
            let Some(db_path) = state.config.metadata_nhentai_archivist_db.clone() else {
                return Err(ApiError(Error::Configuration(
                    "METADATA_NHENTAI_ARCHIVIST_DB is not configured".into(),
                )));
            };
            state.pipeline.submit_writer_job(move || async move {
                let service = match NhentaiArchivistDb::open(&db_path).await {
                    Ok(db) => Arc::new(db),
                    Err(e) => {
                        tracing::warn!("failed to open nhentai-archivist db: {e}");
                        return;
                    }
                };
                match engine.run(service).await {
                    Ok(summary) => tracing::info!(
                        updated = summary.updated,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "nhentai-archivist metadata sync complete"
                    ),
                    Err(e) => tracing::warn!("nhentai-archivist metadata sync failed: {e}"),
                }
            })?;
        }
        "pixivutil2" => {
            let Some(db_path) = state.config.metadata_pixivutil2_db.clone() else {
                return Err(ApiError(Error::Configuration(
                    "METADATA_PIXIVUTIL2_DB is not configured".into(),
                )));
            };
            state.pipeline.submit_writer_job(move || async move {
                let service = match PixivUtil2Db::open(&db_path).await {
                    Ok(db) => Arc::new(db),
                    Err(e) => {
                        tracing::warn!("failed to open pixivutil2 db: {e}");
                        return;
                    }
                };
                match engine.run(service).await {
                    Ok(summary) => tracing::info!(
                        updated = summary.updated,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "pixivutil2 metadata sync complete"
                    ),
                    Err(e) => tracing::warn!("pixivutil2 metadata sync failed: {e}"),
                }
            })?;
        }
        other => {
            return Err(ApiError(Error::InvalidInput(format!(
                "unknown downloader: {other}"
            ))));
        }
    }
    Ok(StatusCode::OK)
}

async fn run_page_embeddings(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let embedding = state.embedding.clone();
    state
        .pipeline
        .submit_named_job(NamedLock::PageEmbeddings, move || async move {
            if let Err(e) = embedding.create_jobs().await {
                tracing::warn!("embedding job creation failed: {e}");
                return;
            }
            match embedding.run().await {
                Ok(summary) => tracing::info!(
                    ingested = summary.ingested,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "page-embedding run complete"
                ),
                Err(e) => tracing::warn!("page-embedding run failed: {e}"),
            }
        })?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct SubarchivesQuery {
    #[serde(default)]
    pub per_language: bool,
}

async fn run_subarchives(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubarchivesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let similarity = state.similarity.clone();
    state
        .pipeline
        .submit_named_job(NamedLock::Subarchives, move || async move {
            match similarity.compute_subarchives(query.per_language).await {
                Ok(summary) => tracing::info!(
                    roots = summary.roots,
                    duplicates = summary.duplicates,
                    "subarchive computation complete"
                ),
                Err(e) => tracing::warn!("subarchive computation failed: {e}"),
            }
        })?;
    Ok(StatusCode::OK)
}

async fn run_nhentai_archives(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let inventory = state.nhentai_inventory.clone();
    state
        .pipeline
        .submit_named_job(NamedLock::NhentaiArchivesData, move || async move {
            match inventory.discover_archives().await {
                Ok(summary) => tracing::info!(
                    inserted = summary.inserted,
                    skipped_untagged = summary.skipped_untagged,
                    "nhentai-archive discovery complete"
                ),
                Err(e) => {
                    tracing::warn!("nhentai-archive discovery failed: {e}");
                    return;
                }
            }
            match inventory.fetch_favorites(false).await {
                Ok(summary) => tracing::info!(
                    updated = summary.updated,
                    failed = summary.failed,
                    "nhentai favorites fetch complete"
                ),
                Err(e) => tracing::warn!("nhentai favorites fetch failed: {e}"),
            }
        })?;
    Ok(StatusCode::OK)
}

async fn list_duplicates(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let _guard = state.pipeline.acquire_reader().await?;
    let arcids = state.vectors.subarchive_map().duplicates().await?;
    Ok(Json(arcids))
}

#[derive(Debug, Deserialize)]
pub struct DuplicatesQuery {
    #[serde(default)]
    pub is_dry_run: bool,
}

async fn remove_duplicates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DuplicatesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(dndm_path) = state.config.nhentai_archivist_dndm.clone() else {
        return Err(ApiError(Error::Configuration(
            "no do-not-download path configured".into(),
        )));
    };
    // Holds the `contents` named mutex for the duration of the call so
    // concurrent removal requests get 423 rather than racing the same
    // on-disk files (the contents directory is single-writer).
    let _guard = state.pipeline.lock_state().try_acquire_named(NamedLock::Contents)?;
    let contents_dir = state.config.lrr_contents_dir.clone();
    let convention = satellite_engine::NhentaiArchivist;
    let summary = state
        .dedup
        .remove_duplicates(&convention, &dndm_path, &contents_dir, query.is_dry_run)
        .await?;
    Ok(Json(json!({
        "deleted_count": summary.deleted_count,
        "deleted_bytes": summary.deleted_bytes,
        "failed_count": summary.failed_count,
        "total_bytes": summary.total_bytes,
    })))
}

async fn reset_database_table(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(table) = JobTable::from_path_segment(&table) else {
        return Err(ApiError(Error::InvalidInput(format!(
            "unknown database table: {table}"
        ))));
    };
    state.jobstore.reset_table(table).await?;
    Ok(StatusCode::OK)
}
