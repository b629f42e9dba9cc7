//! Entities and enums making up the persisted data model.

use serde::{Deserialize, Serialize};

/// Status of a C1 `ArchiveScan` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Ok,
    Corrupted,
    Pending,
    DoNotScan,
    Error,
}

/// One row of the C1 job table keyed by `md5(absolute path)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveScan {
    pub md5: String,
    pub path: String,
    pub status: ScanStatus,
    pub mtime: f64,
}

/// C1: `path` already uploaded (or server-duplicate) as of `mtime`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveUpload {
    pub md5: String,
    pub path: String,
    pub mtime: f64,
}

/// Namespace of a metadata-plugin task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataNamespace {
    #[serde(rename = "pixivmetadata")]
    Pixiv,
    #[serde(rename = "nhplugin")]
    Nhentai,
}

impl MetadataNamespace {
    /// Parse the HTTP path segment used by `POST /api/metadata/plugins/{namespace}`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pixivmetadata" => Some(Self::Pixiv),
            "nhplugin" => Some(Self::Nhentai),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pixiv => "pixivmetadata",
            Self::Nhentai => "nhplugin",
        }
    }
}

/// Status of a C1 `MetadataPluginTask` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataPluginTaskStatus {
    Ok,
    NotFound,
    Pending,
    DoNotScan,
    Error,
}

/// One row of the C1 metadata-plugin job table, keyed by `arcid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataPluginTask {
    pub arcid: String,
    pub source: Option<String>,
    pub namespace: MetadataNamespace,
    pub status: MetadataPluginTaskStatus,
    pub last_updated: f64,
    pub num_failures: u32,
}

impl MetadataPluginTask {
    /// Backoff-expiry predicate:
    /// `last_updated + 86400 * 2^num_failures < now`.
    #[must_use]
    pub fn is_expired(&self, now: f64) -> bool {
        let backoff = 86400.0 * 2f64.powi(i32::try_from(self.num_failures).unwrap_or(i32::MAX));
        self.last_updated + backoff < now
    }
}

/// Single auth row (`user_id = 0`), C1.
#[derive(Debug, Clone)]
pub struct AuthRecord {
    pub salt: String,
    pub bcrypt_hash: String,
    pub last_updated: f64,
}

/// Status of a C2 `ArchiveEmbeddingJob` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmbeddingJobStatus {
    Success,
    Failed,
    Pending,
    NotFound,
    Skipped,
}

/// One row of the C2 embedding job table, keyed by `arcid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEmbeddingJob {
    pub arcid: String,
    pub pages: i32,
    pub status: EmbeddingJobStatus,
    pub last_updated: f64,
    pub message: Option<String>,
}

/// Default embedding dimensionality (512 by default).
pub const DEFAULT_EMBEDDING_DIM: usize = 512;

/// One page of an archive, C2, composite key `(arcid, page_no)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub arcid: String,
    pub page_no: i32,
    pub embedding: Vec<f32>,
}

/// Language tag used by the nhentai archive catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    En,
    Jp,
    Cn,
    Other,
    Untranslated,
}

/// A row of the nhentai-archive metadata catalogue, C2, keyed by `arcid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NhentaiArchive {
    pub arcid: String,
    pub nhentai_id: Option<String>,
    /// -1 means "unknown".
    pub favorites: i64,
    pub language: Language,
    pub last_updated: f64,
}

/// One row of the `SubarchiveMap` union-find table, C2, keyed by `arcid`.
///
/// `leq(arcid) == arcid` marks a root (an archive kept rather than a
/// duplicate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubarchiveMapRow {
    pub arcid: String,
    pub leq: String,
}

impl SubarchiveMapRow {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.arcid == self.leq
    }
}
