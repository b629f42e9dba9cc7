//! C3: typed HTTP clients for the upstream LRR archive server and the
//! img2vec embedding service.
//!
//! Both wrap a pooled `reqwest::Client` behind a typed-error surface;
//! endpoint surface and request bodies are ported from
//! `examples/original_source/src/lanraragi/client.py` and
//! `.../satellite/service/nhdd.py::Img2VecClient`.

mod img2vec;
mod lrr;
mod models;

pub use img2vec::Img2VecClient;
pub use lrr::{build_auth_header, LrrClient};
pub use models::{
    BatchCreateEmbeddingResponse, Category, CreateEmbeddingResponse,
    LanraragiArchiveMetadataResponse, LanraragiArchiveSummary, LanraragiResponse,
    LanraragiServerInfoResponse,
};
