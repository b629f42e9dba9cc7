//! DDL for the C2 vector-store tables, ported from
//! `nhdd.py::PostgresDatabaseService.setup_database`.

/// `VECTOR(n)` column width; 512 is the default but callers may
/// configure a different `img2vec` model dimensionality.
pub fn create_page_table(embedding_dim: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS page (
            archive_id VARCHAR(255),
            page_no INTEGER,
            embedding VECTOR({embedding_dim}),
            CONSTRAINT unique_archive_page UNIQUE (archive_id, page_no)
        )"
    )
}

pub const CREATE_ARCHIVE_EMBEDDING_JOB_TABLE: &str = "
CREATE TABLE IF NOT EXISTS archive_embedding_job (
    archive_id VARCHAR(255) PRIMARY KEY,
    pages INTEGER,
    status VARCHAR(255),
    last_updated REAL,
    message TEXT
)
";

pub const CREATE_ARCHIVE_METADATA_JOB_TABLE: &str = "
CREATE TABLE IF NOT EXISTS archive_metadata_job (
    archive_id VARCHAR(255) PRIMARY KEY,
    status VARCHAR(255),
    message TEXT,
    last_updated REAL
)
";

pub const CREATE_SUBARCHIVE_MAP_TABLE: &str = "
CREATE TABLE IF NOT EXISTS subarchive_map (
    archive_id VARCHAR(255) PRIMARY KEY,
    leq VARCHAR(255)
)
";

pub const CREATE_NHENTAI_ARCHIVE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS nhentai_archive (
    archive_id VARCHAR(255) PRIMARY KEY,
    nhentai_id VARCHAR(255),
    favorites INTEGER,
    language VARCHAR(255),
    last_updated REAL
)
";

/// HNSW index on `page.embedding`. Requires pgvector >= 0.5; run as a
/// separate statement so a failure gives a clear diagnostic instead of
/// rolling back the whole schema init.
pub const CREATE_PAGE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS page_index ON page USING hnsw (embedding vector_cosine_ops)";

/// Serialise a `Vec<f32>` to the pgvector literal format `[x1,x2,...]`.
pub fn vec_to_pgvector_literal(v: &[f32]) -> String {
    let inner: Vec<String> = v.iter().map(std::string::ToString::to_string).collect();
    format!("[{}]", inner.join(","))
}

/// Parse a pgvector literal (`[x1,x2,...]`) back into floats. `postgres`
/// returns the `vector` column as its textual representation when not
/// using a dedicated binary codec.
pub fn pgvector_literal_to_vec(raw: &str) -> Vec<f32> {
    raw.trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<f32>().ok())
        .collect()
}
