//! One handler per subcommand. Each builds the engine(s) it needs from the
//! already-constructed [`satellite_server::AppState`] and runs synchronously
//! to completion, unlike the HTTP surface's fire-and-forget dispatch
//! through `PipelineRunner` -- a one-shot CLI invocation has no concurrent
//! request to protect itself from.

use clap::{Subcommand, ValueEnum};
use satellite_core::error::Result;
use satellite_core::types::{MetadataNamespace, ScanStatus};
use satellite_engine::{DownloaderMetadataEngine, NhentaiArchivistDb, PixivUtil2Db, UploadMode};
use satellite_jobstore::JobTable;
use satellite_server::AppState;
use serde_json::json;
use std::sync::Arc;

use crate::output::OutputFormat;

#[derive(Subcommand)]
pub enum ArchivesCommands {
    /// Walk `LRR_CONTENTS_DIR`, classify new/changed archives.
    Scan {
        #[arg(long, default_value_t = 1000)]
        batch_size: usize,
        /// 0 = every available core, 1 = in-process, k = pool of k.
        #[arg(long, default_value_t = 1)]
        num_workers: usize,
    },
    /// List archives by scan status.
    List {
        #[arg(long, value_enum)]
        status: CliScanStatus,
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
    /// Delete every CORRUPTED archive and its row.
    DeleteCorrupted,
}

#[derive(Subcommand)]
pub enum UploadCommands {
    /// Upload every candidate under `UPLOAD_DIR` to LRR.
    Run {
        #[arg(long)]
        archive_is_dir: bool,
        #[arg(long, default_value_t = 8)]
        concurrency: usize,
    },
}

#[derive(Subcommand)]
pub enum MetadataCommands {
    /// Run an LRR metadata plugin over untagged archives.
    Plugin {
        namespace: String,
        #[arg(long)]
        retry_ok: bool,
        #[arg(long, default_value_t = 1.0)]
        sleep_time: f64,
    },
    /// Sync metadata from a downloader's local database.
    Downloader { name: String },
}

#[derive(Subcommand)]
pub enum NhddCommands {
    /// Create and ingest missing page-embedding jobs.
    PageEmbeddings,
    /// Recompute SubarchiveMap roots/duplicates.
    Subarchives {
        #[arg(long)]
        per_language: bool,
    },
    /// Refresh the nhentai-archive catalogue and its favourite counts.
    NhentaiArchives,
    /// List current duplicate arcids.
    ListDuplicates,
    /// Delete duplicate archives from disk.
    RemoveDuplicates {
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum DatabaseCommands {
    /// Drop and recreate one C1 table.
    Reset { table: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliScanStatus {
    Ok,
    Corrupted,
    Pending,
    DoNotScan,
    Error,
}

impl From<CliScanStatus> for ScanStatus {
    fn from(value: CliScanStatus) -> Self {
        match value {
            CliScanStatus::Ok => Self::Ok,
            CliScanStatus::Corrupted => Self::Corrupted,
            CliScanStatus::Pending => Self::Pending,
            CliScanStatus::DoNotScan => Self::DoNotScan,
            CliScanStatus::Error => Self::Error,
        }
    }
}

pub async fn handle_archives(
    command: ArchivesCommands,
    state: &AppState,
    format: OutputFormat,
) -> Result<()> {
    match command {
        ArchivesCommands::Scan { batch_size, num_workers } => {
            let discovery = state.scan.discover(&state.config.lrr_contents_dir).await?;
            let analysis = state.scan.analyze(batch_size, num_workers).await?;
            format.print(
                &format!(
                    "discovered {} new/changed, {} unchanged; analysis: {} ok, {} corrupted, {} error, {} missing",
                    discovery.new_or_changed,
                    discovery.unchanged,
                    analysis.ok,
                    analysis.corrupted,
                    analysis.error,
                    analysis.missing
                ),
                &json!({
                    "new_or_changed": discovery.new_or_changed,
                    "unchanged": discovery.unchanged,
                    "ok": analysis.ok,
                    "corrupted": analysis.corrupted,
                    "error": analysis.error,
                    "missing": analysis.missing,
                }),
            );
        }
        ArchivesCommands::List { status, limit } => {
            let rows = state
                .jobstore
                .archive_scan()
                .by_status(status.into(), limit)
                .await?;
            format.print(&format!("{} archives", rows.len()), &json!(rows));
        }
        ArchivesCommands::DeleteCorrupted => {
            let count = state.scan.delete_corrupted().await?;
            format.print(
                &format!("deleted {count} corrupted archives"),
                &json!({ "deleted": count }),
            );
        }
    }
    Ok(())
}

pub async fn handle_upload(
    command: UploadCommands,
    state: &AppState,
    format: OutputFormat,
) -> Result<()> {
    let UploadCommands::Run {
        archive_is_dir,
        concurrency,
    } = command;
    let Some(upload_dir) = state.config.upload_dir.clone() else {
        return Err(satellite_core::error::Error::Configuration(
            "UPLOAD_DIR is not configured".into(),
        ));
    };
    let mode = if archive_is_dir {
        UploadMode::LeafFolder
    } else {
        UploadMode::ArchiveFile
    };
    let summary = state.upload.run(&upload_dir, mode, concurrency).await?;
    format.print(
        &format!(
            "uploaded {}, skipped {}, failed {}",
            summary.uploaded, summary.skipped, summary.failed
        ),
        &json!({
            "uploaded": summary.uploaded,
            "skipped": summary.skipped,
            "failed": summary.failed,
        }),
    );
    Ok(())
}

pub async fn handle_metadata(
    command: MetadataCommands,
    state: &AppState,
    format: OutputFormat,
) -> Result<()> {
    match command {
        MetadataCommands::Plugin {
            namespace,
            retry_ok,
            sleep_time,
        } => {
            let Some(namespace) = MetadataNamespace::parse(&namespace) else {
                return Err(satellite_core::error::Error::InvalidInput(format!(
                    "unknown metadata namespace: {namespace}"
                )));
            };
            let summary = state.metadata.run(namespace, retry_ok, sleep_time).await?;
            format.print(
                &format!(
                    "ok {}, not found {}, failed {}",
                    summary.ok, summary.not_found, summary.failed
                ),
                &json!({
                    "ok": summary.ok,
                    "not_found": summary.not_found,
                    "failed": summary.failed,
                }),
            );
        }
        MetadataCommands::Downloader { name } => {
            let engine = DownloaderMetadataEngine::new(Arc::clone(&state.lrr));
            let summary = match name.as_str() {
                "nhentai-archivist" => {
                    let Some(path) = state.config.metadata_nhentai_archivist_db.clone() else {
                        return Err(satellite_core::error::Error::Configuration(
                            "METADATA_NHENTAI_ARCHIVIST_DB is not configured".into(),
                        ));
                    };
                    let db = NhentaiArchivistDb::open(&path).await?;
                    engine.run(Arc::new(db)).await?
                }
                "pixivutil2" => {
                    let Some(path) = state.config.metadata_pixivutil2_db.clone() else {
                        return Err(satellite_core::error::Error::Configuration(
                            "METADATA_PIXIVUTIL2_DB is not configured".into(),
                        ));
                    };
                    let db = PixivUtil2Db::open(&path).await?;
                    engine.run(Arc::new(db)).await?
                }
                other => {
                    return Err(satellite_core::error::Error::InvalidInput(format!(
                        "unknown downloader: {other}"
                    )))
                }
            };
            format.print(
                &format!(
                    "updated {}, skipped {}, failed {}",
                    summary.updated, summary.skipped, summary.failed
                ),
                &json!({
                    "updated": summary.updated,
                    "skipped": summary.skipped,
                    "failed": summary.failed,
                }),
            );
        }
    }
    Ok(())
}

pub async fn handle_nhdd(
    command: NhddCommands,
    state: &AppState,
    format: OutputFormat,
) -> Result<()> {
    match command {
        NhddCommands::PageEmbeddings => {
            let created = state.embedding.create_jobs().await?;
            let run = state.embedding.run().await?;
            format.print(
                &format!(
                    "created {} jobs ({} already present); ingested {}, skipped {}, failed {}",
                    created.created, created.already_present, run.ingested, run.skipped, run.failed
                ),
                &json!({
                    "created": created.created,
                    "already_present": created.already_present,
                    "ingested": run.ingested,
                    "skipped": run.skipped,
                    "failed": run.failed,
                }),
            );
        }
        NhddCommands::Subarchives { per_language } => {
            let summary = state.similarity.compute_subarchives(per_language).await?;
            format.print(
                &format!(
                    "{} roots, {} duplicates",
                    summary.roots, summary.duplicates
                ),
                &json!({ "roots": summary.roots, "duplicates": summary.duplicates }),
            );
        }
        NhddCommands::NhentaiArchives => {
            let discovery = state.nhentai_inventory.discover_archives().await?;
            let favorites = state.nhentai_inventory.fetch_favorites(false).await?;
            format.print(
                &format!(
                    "inserted {} ({} skipped untagged); favorites updated {}, failed {}",
                    discovery.inserted,
                    discovery.skipped_untagged,
                    favorites.updated,
                    favorites.failed
                ),
                &json!({
                    "inserted": discovery.inserted,
                    "skipped_untagged": discovery.skipped_untagged,
                    "favorites_updated": favorites.updated,
                    "favorites_failed": favorites.failed,
                }),
            );
        }
        NhddCommands::ListDuplicates => {
            let arcids = state.vectors.subarchive_map().duplicates().await?;
            format.print(&format!("{} duplicates", arcids.len()), &json!(arcids));
        }
        NhddCommands::RemoveDuplicates { dry_run } => {
            let Some(dndm_path) = state.config.nhentai_archivist_dndm.clone() else {
                return Err(satellite_core::error::Error::Configuration(
                    "no do-not-download path configured".into(),
                ));
            };
            let convention = satellite_engine::NhentaiArchivist;
            let summary = state
                .dedup
                .remove_duplicates(
                    &convention,
                    &dndm_path,
                    &state.config.lrr_contents_dir,
                    dry_run,
                )
                .await?;
            format.print(
                &format!(
                    "deleted {} archives ({} bytes), {} failed, {} total bytes",
                    summary.deleted_count, summary.deleted_bytes, summary.failed_count, summary.total_bytes
                ),
                &json!({
                    "deleted_count": summary.deleted_count,
                    "deleted_bytes": summary.deleted_bytes,
                    "failed_count": summary.failed_count,
                    "total_bytes": summary.total_bytes,
                }),
            );
        }
    }
    Ok(())
}

pub async fn handle_database(
    command: DatabaseCommands,
    state: &AppState,
    format: OutputFormat,
) -> Result<()> {
    let DatabaseCommands::Reset { table } = command;
    let Some(table) = JobTable::from_path_segment(&table) else {
        return Err(satellite_core::error::Error::InvalidInput(format!(
            "unknown database table: {table}"
        )));
    };
    state.jobstore.reset_table(table).await?;
    format.print(
        &format!("reset table {}", table.name()),
        &json!({ "table": table.name() }),
    );
    Ok(())
}
