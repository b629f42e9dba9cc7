//! Typed client for the `img2vec` embedding service, ported from
//! `examples/original_source/src/satellite/service/nhdd.py::Img2VecClient`.

use crate::models::{BatchCreateEmbeddingResponse, CreateEmbeddingResponse};
use satellite_core::error::{Error, Result};

/// HTTP client for the img2vec embedding service.
pub struct Img2VecClient {
    host: String,
    http: reqwest::Client,
}

impl Img2VecClient {
    /// # Errors
    /// Returns [`Error::Configuration`] if the client cannot be built.
    pub fn new(host: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build img2vec client: {e}")))?;
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn classify(e: &reqwest::Error) -> Error {
        if e.is_connect() || e.is_timeout() {
            Error::Transient(e.to_string())
        } else {
            Error::Fatal(e.to_string())
        }
    }

    /// `GET /api/healthcheck`.
    pub async fn healthcheck(&self) -> bool {
        self.http
            .get(self.url("/api/healthcheck"))
            .send()
            .await
            .is_ok_and(|r| r.status() == reqwest::StatusCode::OK)
    }

    /// `POST /api/embeddings`, single PNG-encoded page.
    pub async fn create_embedding(&self, png_bytes: Vec<u8>) -> Result<Vec<f32>> {
        let part = reqwest::multipart::Part::bytes(png_bytes)
            .file_name("page.png")
            .mime_str("image/png")
            .map_err(|e| Error::Fatal(format!("invalid embedding upload mime: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let resp = self
            .http
            .post(self.url("/api/embeddings"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::classify(&e))?;
        if !resp.status().is_success() {
            return Err(Error::Transient(format!(
                "img2vec create_embedding failed with status {}",
                resp.status()
            )));
        }
        let parsed: CreateEmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| Error::Fatal(format!("decode img2vec embedding response failed: {e}")))?;
        Ok(parsed.embeddings)
    }

    /// `POST /api/embeddings-batch`, multiple PNG-encoded pages.
    pub async fn create_batch_embeddings(&self, pages: Vec<Vec<u8>>) -> Result<Vec<Vec<f32>>> {
        let mut form = reqwest::multipart::Form::new();
        for (i, png_bytes) in pages.into_iter().enumerate() {
            let part = reqwest::multipart::Part::bytes(png_bytes)
                .file_name(format!("image_{i}.png"))
                .mime_str("image/png")
                .map_err(|e| Error::Fatal(format!("invalid batch upload mime: {e}")))?;
            form = form.part("files", part);
        }
        let resp = self
            .http
            .post(self.url("/api/embeddings-batch"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::classify(&e))?;
        if !resp.status().is_success() {
            return Err(Error::Transient(format!(
                "img2vec create_batch_embeddings failed with status {}",
                resp.status()
            )));
        }
        let parsed: BatchCreateEmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| Error::Fatal(format!("decode img2vec batch response failed: {e}")))?;
        Ok(parsed.embeddings_list)
    }
}
