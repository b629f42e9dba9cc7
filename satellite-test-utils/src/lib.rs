//! Shared fixtures for satellite-* crate tests: an in-memory C1 job store,
//! sample archive files exercising the scan engine's classification rules,
//! and a wiremock-backed stand-in for LRR's HTTP API.

use satellite_jobstore::JobStore;
use satellite_remote::LrrClient;
use std::io::Write;
use std::path::{Path, PathBuf};
use wiremock::MockServer;

/// A PNG trailer that passes [`satellite_core::signature::image_completeness`].
const PNG_IEND: [u8; 8] = [0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82];

/// Fresh in-memory libsql job store with the C1 schema already applied.
pub async fn in_memory_jobstore() -> JobStore {
    JobStore::open_in_memory()
        .await
        .expect("in-memory jobstore should always open")
}

/// Write a `.zip` at `dir/{name}.zip` containing one complete, well-formed
/// PNG member -- the scan engine should classify this `Ok`.
pub fn write_valid_archive(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(format!("{name}.zip"));
    let file = std::fs::File::create(&path).expect("create archive file");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("page_001.png", options).expect("start zip entry");
    let mut png_bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    png_bytes.extend_from_slice(&PNG_IEND);
    zip.write_all(&png_bytes).expect("write png bytes");
    zip.finish().expect("finish zip");
    path
}

/// Write a `.zip` at `dir/{name}.zip` containing one truncated PNG member
/// (missing its `IEND` trailer) -- the scan engine should classify this
/// `Corrupted`.
pub fn write_archive_with_incomplete_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(format!("{name}.zip"));
    let file = std::fs::File::create(&path).expect("create archive file");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("page_001.png", options).expect("start zip entry");
    zip.write_all(&[0x89, 0x50, 0x4E, 0x47])
        .expect("write truncated png bytes");
    zip.finish().expect("finish zip");
    path
}

/// Write a file at `dir/{name}.zip` that isn't a zip at all -- the scan
/// engine should classify this `Corrupted` without opening any entries.
pub fn write_non_zip_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(format!("{name}.zip"));
    std::fs::write(&path, b"this is not a zip archive").expect("write non-zip file");
    path
}

/// Start a bare wiremock server to stand in for LRR's HTTP API. Callers
/// mount the routes their test exercises.
pub async fn mock_lrr_server() -> MockServer {
    MockServer::start().await
}

/// An [`LrrClient`] pointed at `server`, authenticated with a throwaway key.
pub fn lrr_client_for(server: &MockServer) -> LrrClient {
    LrrClient::new(&server.uri(), "test-api-key").expect("client construction should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn jobstore_fixture_opens() {
        let store = in_memory_jobstore().await;
        let scans = store.archive_scan();
        assert!(scans.get("nonexistent").await.unwrap().is_none());
    }

    #[test]
    fn valid_archive_round_trips_through_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_valid_archive(dir.path(), "sample");
        let file = std::fs::File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 1);
        let entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "page_001.png");
    }
}
