//! Typed client for the upstream LRR archive server, ported from
//! `examples/original_source/src/lanraragi/client.py::LRRClient`.
//!
//! HTTP plumbing uses a pooled `reqwest::Client`, a `Bearer` auth header
//! and JSON decode through a typed error path, rather than the Python
//! client's per-call session.

use crate::models::{
    Category, LanraragiArchiveMetadataResponse, LanraragiArchiveSummary, LanraragiResponse,
    LanraragiServerInfoResponse,
};
use satellite_core::error::{Error, Result};

/// `Bearer base64(api_key)`, ported from `client.py::build_auth_header`.
#[must_use]
pub fn build_auth_header(api_key: &str) -> String {
    use base64::Engine;
    let encoded = base64::engine::general_purpose::STANDARD.encode(api_key.as_bytes());
    format!("Bearer {encoded}")
}

/// HTTP client for the LRR archive server.
pub struct LrrClient {
    host: String,
    http: reqwest::Client,
    auth_header: String,
}

impl LrrClient {
    /// # Errors
    /// Returns [`Error::Configuration`] if the client cannot be built.
    pub fn new(host: &str, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build LRR HTTP client: {e}")))?;
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            http,
            auth_header: build_auth_header(api_key),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("Authorization", &self.auth_header)
    }

    /// `GET /api/archives`. Used by the embedding job-creation pass (C6) to
    /// inventory every archive and its server-reported page count.
    pub async fn get_all_archives(&self) -> Result<Vec<LanraragiArchiveSummary>> {
        let resp = self
            .authed(self.http.get(self.url("/api/archives")))
            .send()
            .await
            .map_err(Self::classify_sync)?;
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode all archives failed: {e}")))
    }

    /// `GET /api/archives/untagged`.
    pub async fn get_untagged_archives(&self) -> Result<Vec<String>> {
        let resp = self
            .authed(self.http.get(self.url("/api/archives/untagged")))
            .send()
            .await
            .map_err(Self::classify_sync)?;
        let archives: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| Error::Fatal(format!("decode untagged archives failed: {e}")))?;
        Ok(archives
            .into_iter()
            .filter_map(|v| v.get("arcid").and_then(|a| a.as_str()).map(str::to_string))
            .collect())
    }

    /// `GET /api/archives/:id/metadata`.
    pub async fn get_archive_metadata(
        &self,
        archive_id: &str,
    ) -> Result<LanraragiArchiveMetadataResponse> {
        let resp = self
            .authed(
                self.http
                    .get(self.url(&format!("/api/archives/{archive_id}/metadata"))),
            )
            .send()
            .await
            .map_err(Self::classify_sync)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFoundRemote(archive_id.to_string()));
        }
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode archive metadata failed: {e}")))
    }

    /// `GET /api/archives/:id/download`. Returns the raw archive bytes.
    pub async fn download_archive(&self, archive_id: &str) -> Result<Vec<u8>> {
        let resp = self
            .authed(
                self.http
                    .get(self.url(&format!("/api/archives/{archive_id}/download"))),
            )
            .send()
            .await
            .map_err(Self::classify_sync)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFoundRemote(archive_id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(Error::Fatal(format!(
                "download_archive failed with status {}",
                resp.status()
            )));
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Transient(format!("download_archive body read failed: {e}")))
    }

    /// `PUT /api/archives/upload`. Returns the HTTP status code (callers
    /// dispatch on 200/409/417/other).
    pub async fn upload_archive(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        checksum: Option<&str>,
    ) -> Result<(reqwest::StatusCode, LanraragiResponse)> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| Error::Fatal(format!("invalid upload mime: {e}")))?;
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(checksum) = checksum {
            form = form.text("file_checksum", checksum.to_string());
        }
        let resp = self
            .authed(self.http.put(self.url("/api/archives/upload")))
            .multipart(form)
            .send()
            .await
            .map_err(Self::classify_sync)?;
        let status = resp.status();
        let body = resp.json().await.unwrap_or_default();
        Ok((status, body))
    }

    /// `PUT /api/archives/:id/metadata`. Used by the metadata-plugin engine
    /// (C5) to write back merged tags.
    pub async fn update_archive_metadata(
        &self,
        archive_id: &str,
        title: Option<&str>,
        tags: Option<&str>,
        summary: Option<&str>,
    ) -> Result<LanraragiResponse> {
        let mut form = reqwest::multipart::Form::new();
        if let Some(title) = title {
            form = form.text("title", title.to_string());
        }
        if let Some(tags) = tags {
            form = form.text("tags", tags.to_string());
        }
        if let Some(summary) = summary {
            form = form.text("summary", summary.to_string());
        }
        let resp = self
            .authed(
                self.http
                    .put(self.url(&format!("/api/archives/{archive_id}/metadata"))),
            )
            .multipart(form)
            .send()
            .await
            .map_err(Self::classify_sync)?;
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode update_archive_metadata response failed: {e}")))
    }

    /// `DELETE /api/archives/:id`.
    pub async fn delete_archive(&self, archive_id: &str) -> Result<LanraragiResponse> {
        let resp = self
            .authed(self.http.delete(self.url(&format!("/api/archives/{archive_id}"))))
            .send()
            .await
            .map_err(Self::classify_sync)?;
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode delete_archive response failed: {e}")))
    }

    /// `GET /api/categories`.
    pub async fn get_all_categories(&self) -> Result<Vec<Category>> {
        let resp = self
            .authed(self.http.get(self.url("/api/categories")))
            .send()
            .await
            .map_err(Self::classify_sync)?;
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode categories failed: {e}")))
    }

    /// `GET /api/shinobu`.
    pub async fn get_shinobu_status(&self) -> Result<LanraragiResponse> {
        let resp = self
            .authed(self.http.get(self.url("/api/shinobu")))
            .send()
            .await
            .map_err(Self::classify_sync)?;
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode shinobu status failed: {e}")))
    }

    /// `POST /api/shinobu/stop`.
    pub async fn stop_shinobu(&self) -> Result<LanraragiResponse> {
        let resp = self
            .authed(self.http.post(self.url("/api/shinobu/stop")))
            .send()
            .await
            .map_err(Self::classify_sync)?;
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode shinobu stop failed: {e}")))
    }

    /// `POST /api/shinobu/restart`.
    pub async fn restart_shinobu(&self) -> Result<LanraragiResponse> {
        let resp = self
            .authed(self.http.post(self.url("/api/shinobu/restart")))
            .send()
            .await
            .map_err(Self::classify_sync)?;
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode shinobu restart failed: {e}")))
    }

    /// `GET /api/info`.
    pub async fn get_server_info(&self) -> Result<LanraragiServerInfoResponse> {
        let resp = self
            .authed(self.http.get(self.url("/api/info")))
            .send()
            .await
            .map_err(Self::classify_sync)?;
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode server info failed: {e}")))
    }

    /// `GET /api/plugins/:type`.
    pub async fn get_available_plugins(&self, plugin_type: &str) -> Result<serde_json::Value> {
        let resp = self
            .authed(self.http.get(self.url(&format!("/api/plugins/{plugin_type}"))))
            .send()
            .await
            .map_err(Self::classify_sync)?;
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode available plugins failed: {e}")))
    }

    /// `POST /api/plugins/use`. Used by the metadata-plugin engine (C5).
    pub async fn use_plugin(
        &self,
        plugin: &str,
        arcid: Option<&str>,
        arg: Option<&str>,
    ) -> Result<LanraragiResponse> {
        let mut query = vec![("plugin", plugin.to_string())];
        if let Some(arcid) = arcid {
            query.push(("id", arcid.to_string()));
        }
        if let Some(arg) = arg {
            query.push(("arg", arg.to_string()));
        }
        let resp = self
            .authed(self.http.post(self.url("/api/plugins/use")))
            .query(&query)
            .send()
            .await
            .map_err(Self::classify_sync)?;
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode use_plugin response failed: {e}")))
    }

    /// `DELETE /api/tempfolder`.
    pub async fn clean_tempfolder(&self) -> Result<LanraragiResponse> {
        let resp = self
            .authed(self.http.delete(self.url("/api/tempfolder")))
            .send()
            .await
            .map_err(Self::classify_sync)?;
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode clean_tempfolder response failed: {e}")))
    }

    /// `POST /api/regen_thumbs`.
    pub async fn regenerate_thumbnails(&self) -> Result<LanraragiResponse> {
        let resp = self
            .authed(self.http.post(self.url("/api/regen_thumbs")))
            .send()
            .await
            .map_err(Self::classify_sync)?;
        resp.json()
            .await
            .map_err(|e| Error::Fatal(format!("decode regenerate_thumbnails response failed: {e}")))
    }

    fn classify_sync(e: reqwest::Error) -> Error {
        if e.is_connect() || e.is_timeout() {
            Error::Transient(e.to_string())
        } else {
            Error::Fatal(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_header_matches_bearer_base64() {
        let header = build_auth_header("mykey");
        assert!(header.starts_with("Bearer "));
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(header.trim_start_matches("Bearer "))
            .unwrap();
        assert_eq!(decoded, b"mykey");
    }
}
