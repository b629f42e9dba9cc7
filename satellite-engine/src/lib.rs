//! Background job engines (C4-C7): the pipeline runner plus the scan,
//! upload, metadata, embedding, similarity and dedup engines it dispatches.

mod dedup;
mod downloader_metadata;
mod embedding;
mod fsutil;
mod metadata;
mod nhentai_inventory;
mod pipeline;
mod scan;
mod similarity_engine;
mod upload;

pub use dedup::{DedupEngine, DedupSummary, DownloaderConvention, NhentaiArchivist};
pub use downloader_metadata::{
    DownloaderMetadataEngine, DownloaderMetadataService, DownloaderMetadataSummary,
    ExternalMetadata, NhentaiArchivistDb, PixivUtil2Db,
};
pub use embedding::{EmbeddingEngine, EmbeddingRunSummary, JobCreationSummary};
pub use metadata::{extract_source_id, extract_source_tag, merge_tags, MetadataEngine, MetadataRunSummary};
pub use nhentai_inventory::{FavoritesSummary, NhentaiDiscoverySummary, NhentaiInventoryEngine};
pub use pipeline::PipelineRunner;
pub use scan::{AnalysisSummary, DiscoverySummary, ScanEngine};
pub use similarity_engine::{KeepReason, SimilarityEngine, StaticCategories, SubarchiveRunSummary};
pub use upload::{UploadEngine, UploadMode, UploadSummary};
