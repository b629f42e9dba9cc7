//! DDL for the C1 job tables, ported from
//! `database.py::create_{archive_scan,archive_upload,metadata_plugin_task,auth}_table`.

pub const CREATE_ARCHIVE_SCAN_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS archive_scan (
    md5    TEXT PRIMARY KEY,
    path   TEXT NOT NULL,
    status INTEGER NOT NULL,
    mtime  REAL NOT NULL
)
";

pub const CREATE_ARCHIVE_UPLOAD_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS archive_upload (
    md5   TEXT PRIMARY KEY,
    path  TEXT NOT NULL,
    mtime REAL NOT NULL
)
";

pub const CREATE_METADATA_PLUGIN_TASK_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata_plugin_task (
    arcid        TEXT PRIMARY KEY,
    source       TEXT,
    namespace    TEXT NOT NULL,
    status       INTEGER NOT NULL,
    last_updated REAL NOT NULL,
    num_failures INTEGER NOT NULL
)
";

pub const CREATE_AUTH_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS auth (
    user_id      INTEGER PRIMARY KEY,
    salt         TEXT NOT NULL,
    hash         TEXT NOT NULL,
    last_updated REAL NOT NULL
)
";

pub const ALL_TABLES: &[&str] = &[
    CREATE_ARCHIVE_SCAN_TABLE,
    CREATE_ARCHIVE_UPLOAD_TABLE,
    CREATE_METADATA_PLUGIN_TASK_TABLE,
    CREATE_AUTH_TABLE,
];

/// One of the C1 tables, resettable individually via
/// `DELETE /api/database/{table}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTable {
    Auth,
    ArchiveScan,
    ArchiveUpload,
    MetadataPluginTask,
}

impl JobTable {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::ArchiveScan => "archive_scan",
            Self::ArchiveUpload => "archive_upload",
            Self::MetadataPluginTask => "metadata_plugin_task",
        }
    }

    #[must_use]
    pub fn create_stmt(self) -> &'static str {
        match self {
            Self::Auth => CREATE_AUTH_TABLE,
            Self::ArchiveScan => CREATE_ARCHIVE_SCAN_TABLE,
            Self::ArchiveUpload => CREATE_ARCHIVE_UPLOAD_TABLE,
            Self::MetadataPluginTask => CREATE_METADATA_PLUGIN_TASK_TABLE,
        }
    }

    /// Parse the `{table}` path segment of `DELETE /api/database/{table}`.
    #[must_use]
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "auth" => Some(Self::Auth),
            "archive_scan" => Some(Self::ArchiveScan),
            "archive_upload" => Some(Self::ArchiveUpload),
            "metadata_plugin_task" => Some(Self::MetadataPluginTask),
            _ => None,
        }
    }
}
