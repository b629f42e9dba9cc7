//! Environment-variable configuration, loaded with a loader/validator split
//! so malformed input is reported in one place.

use crate::error::Result;
use std::path::PathBuf;

/// Fully resolved runtime configuration for a Satellite process.
#[derive(Debug, Clone)]
pub struct Config {
    /// `SATELLITE_HOME`, default `$HOME/.satellite`.
    pub satellite_home: PathBuf,
    /// `SATELLITE_DB_PATH`, default `<home>/db/db.sqlite`.
    pub db_path: PathBuf,
    /// `SATELLITE_API_KEY`. Absent only if auth is disabled.
    pub api_key: Option<String>,
    /// `SATELLITE_DISABLE_API_KEY`.
    pub disable_api_key: bool,

    pub lrr_host: String,
    pub lrr_api_key: String,
    pub lrr_ssl_verify: bool,
    pub lrr_contents_dir: PathBuf,

    pub upload_dir: Option<PathBuf>,

    /// `METADATA_NHENTAI_ARCHIVIST_DB`: nhentai-archivist's own SQLite file.
    pub metadata_nhentai_archivist_db: Option<PathBuf>,
    /// `METADATA_PIXIVUTIL2_DB`: PixivUtil2's own SQLite file.
    pub metadata_pixivutil2_db: Option<PathBuf>,
    /// `NHENTAI_ARCHIVIST_DONOTDOWNLOADME_PATH`: newline-delimited blacklist
    /// of nhentai-archivist ids, distinct from the downloader's SQLite file.
    pub nhentai_archivist_dndm: Option<PathBuf>,

    pub nhdd_db: String,
    pub nhdd_db_host: String,
    pub nhdd_db_user: String,
    pub nhdd_db_pass: String,

    pub img2vec_host: String,
    pub img2vec_workers: usize,
}

impl Config {
    /// Load from the process environment, applying defaults and then
    /// validating required combinations.
    pub fn from_env() -> Result<Self> {
        let loaded = loader::load_raw();
        validator::validate(loaded)
    }

    /// Postgres connection string for `satellite-vectorstore`.
    #[must_use]
    pub fn nhdd_connection_string(&self) -> String {
        format!(
            "host={} user={} password={} dbname={}",
            self.nhdd_db_host, self.nhdd_db_user, self.nhdd_db_pass, self.nhdd_db
        )
    }
}

mod loader {
    use std::path::PathBuf;

    /// Raw, unvalidated environment readout. Every field is optional; the
    /// validator fills defaults and rejects inconsistent combinations.
    #[derive(Debug, Default)]
    pub struct RawConfig {
        pub satellite_home: Option<String>,
        pub db_path: Option<String>,
        pub api_key: Option<String>,
        pub disable_api_key: Option<String>,
        pub lrr_host: Option<String>,
        pub lrr_api_key: Option<String>,
        pub lrr_ssl_verify: Option<String>,
        pub lrr_contents_dir: Option<String>,
        pub upload_dir: Option<String>,
        pub metadata_nhentai_archivist_db: Option<String>,
        pub metadata_pixivutil2_db: Option<String>,
        pub nhentai_archivist_dndm: Option<String>,
        pub nhdd_db: Option<String>,
        pub nhdd_db_host: Option<String>,
        pub nhdd_db_user: Option<String>,
        pub nhdd_db_pass: Option<String>,
        pub img2vec_host: Option<String>,
        pub img2vec_workers: Option<String>,
    }

    pub fn load_raw() -> RawConfig {
        RawConfig {
            satellite_home: std::env::var("SATELLITE_HOME").ok(),
            db_path: std::env::var("SATELLITE_DB_PATH").ok(),
            api_key: std::env::var("SATELLITE_API_KEY").ok(),
            disable_api_key: std::env::var("SATELLITE_DISABLE_API_KEY").ok(),
            lrr_host: std::env::var("LRR_HOST").ok(),
            lrr_api_key: std::env::var("LRR_API_KEY").ok(),
            lrr_ssl_verify: std::env::var("LRR_SSL_VERIFY").ok(),
            lrr_contents_dir: std::env::var("LRR_CONTENTS_DIR").ok(),
            upload_dir: std::env::var("UPLOAD_DIR").ok(),
            metadata_nhentai_archivist_db: std::env::var("METADATA_NHENTAI_ARCHIVIST_DB").ok(),
            metadata_pixivutil2_db: std::env::var("METADATA_PIXIVUTIL2_DB").ok(),
            nhentai_archivist_dndm: std::env::var("NHENTAI_ARCHIVIST_DONOTDOWNLOADME_PATH").ok(),
            nhdd_db: std::env::var("NHDD_DB").ok(),
            nhdd_db_host: std::env::var("NHDD_DB_HOST").ok(),
            nhdd_db_user: std::env::var("NHDD_DB_USER").ok(),
            nhdd_db_pass: std::env::var("NHDD_DB_PASS").ok(),
            img2vec_host: std::env::var("IMG2VEC_HOST").ok(),
            img2vec_workers: std::env::var("IMG2VEC_WORKERS").ok(),
        }
    }

    pub fn default_home() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".satellite")
    }
}

mod validator {
    use super::loader::RawConfig;
    use super::Config;
    use crate::error::{Error, Result};
    use std::path::PathBuf;

    fn parse_bool(raw: Option<String>, default: bool) -> bool {
        match raw.as_deref() {
            Some("1" | "true" | "TRUE" | "True") => true,
            Some("0" | "false" | "FALSE" | "False") => false,
            _ => default,
        }
    }

    pub fn validate(raw: RawConfig) -> Result<Config> {
        let satellite_home = raw
            .satellite_home
            .map(PathBuf::from)
            .unwrap_or_else(super::loader::default_home);

        let db_path = raw
            .db_path
            .map(PathBuf::from)
            .unwrap_or_else(|| satellite_home.join("db").join("db.sqlite"));

        let disable_api_key = parse_bool(raw.disable_api_key, false);
        if !disable_api_key && raw.api_key.is_none() {
            return Err(Error::Configuration(
                "SATELLITE_API_KEY must be set unless SATELLITE_DISABLE_API_KEY is true".into(),
            ));
        }

        // LRR_HOST and LRR_API_KEY are required together: the remote client
        // cannot be constructed with only one of them.
        let lrr_host = raw
            .lrr_host
            .ok_or_else(|| Error::Configuration("LRR_HOST is required".into()))?;
        let lrr_api_key = raw
            .lrr_api_key
            .ok_or_else(|| Error::Configuration("LRR_API_KEY is required".into()))?;
        let lrr_contents_dir = raw
            .lrr_contents_dir
            .map(PathBuf::from)
            .ok_or_else(|| Error::Configuration("LRR_CONTENTS_DIR is required".into()))?;

        let nhdd_db = raw.nhdd_db.unwrap_or_else(|| "nhdd".to_string());
        let nhdd_db_host = raw.nhdd_db_host.unwrap_or_else(|| "localhost".to_string());
        let nhdd_db_user = raw.nhdd_db_user.unwrap_or_else(|| "postgres".to_string());
        let nhdd_db_pass = raw.nhdd_db_pass.unwrap_or_default();

        let img2vec_host = raw
            .img2vec_host
            .unwrap_or_else(|| "http://localhost:7895".to_string());
        let img2vec_workers = raw
            .img2vec_workers
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8);

        Ok(Config {
            satellite_home,
            db_path,
            api_key: raw.api_key,
            disable_api_key,
            lrr_host,
            lrr_api_key,
            lrr_ssl_verify: parse_bool(raw.lrr_ssl_verify, true),
            lrr_contents_dir,
            upload_dir: raw.upload_dir.map(PathBuf::from),
            metadata_nhentai_archivist_db: raw.metadata_nhentai_archivist_db.map(PathBuf::from),
            metadata_pixivutil2_db: raw.metadata_pixivutil2_db.map(PathBuf::from),
            nhentai_archivist_dndm: raw.nhentai_archivist_dndm.map(PathBuf::from),
            nhdd_db,
            nhdd_db_host,
            nhdd_db_user,
            nhdd_db_pass,
            img2vec_host,
            img2vec_workers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_required_unless_disabled() {
        let raw = loader::RawConfig {
            lrr_host: Some("http://x".into()),
            lrr_api_key: Some("k".into()),
            lrr_contents_dir: Some("/tmp".into()),
            ..Default::default()
        };
        let err = validator::validate(raw).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
