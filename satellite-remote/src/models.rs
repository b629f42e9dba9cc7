//! Response shapes for the LRR HTTP API, ported from
//! `examples/original_source/satellite/utils/lanraragi/models.py`.
//!
//! The Python client dynamically copies every key of the decoded JSON body
//! onto the response object (`for key in data: response.__setattr__(...)`);
//! here each field is named explicitly and unknown keys are discarded,
//! which is the idiomatic `serde` equivalent.

use serde::Deserialize;

/// Generic envelope returned by most LRR endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanraragiResponse {
    #[serde(default)]
    pub success: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub operation: Option<String>,
}

/// `GET /api/archives/:id/metadata`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanraragiArchiveMetadataResponse {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Reading-progress page number, used by the `HAS_READING_PROGRESS`
    /// keep-reason; absent or `0` means unread.
    #[serde(default)]
    pub progress: Option<i64>,
}

/// `GET /api/info`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanraragiServerInfoResponse {
    #[serde(default)]
    pub archives_per_page: Option<i64>,
    #[serde(default)]
    pub cache_last_cleared: Option<i64>,
    #[serde(default)]
    pub debug_mode: Option<bool>,
    #[serde(default)]
    pub has_password: Option<bool>,
    #[serde(default)]
    pub motd: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nofun_mode: Option<bool>,
    #[serde(default)]
    pub server_resizes_images: Option<bool>,
    #[serde(default)]
    pub server_tracks_progress: Option<bool>,
    #[serde(default)]
    pub total_archives: Option<i64>,
    #[serde(default)]
    pub total_pages_read: Option<i64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub version_desc: Option<String>,
    #[serde(default)]
    pub version_name: Option<String>,
}

/// `GET /api/categories` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub pinned: Option<String>,
    #[serde(default)]
    pub archives: Vec<String>,
}

/// One entry of `GET /api/archives`, used by the embedding job-creation
/// pass and the nhentai-archive inventory pass
/// (`/api/nhdd/nhentai-archives`).
#[derive(Debug, Clone, Deserialize)]
pub struct LanraragiArchiveSummary {
    pub arcid: String,
    #[serde(default)]
    pub pagecount: Option<i32>,
    #[serde(default)]
    pub tags: Option<String>,
}

/// img2vec `/api/embeddings`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmbeddingResponse {
    pub embeddings: Vec<f32>,
}

/// img2vec `/api/embeddings-batch`.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchCreateEmbeddingResponse {
    pub embeddings_list: Vec<Vec<f32>>,
}
