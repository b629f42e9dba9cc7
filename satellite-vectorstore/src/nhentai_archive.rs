//! CRUD for `nhentai_archive` backing `NhentaiArchive`, ported from
//! `nhdd.py`'s nhentai-archive-catalogue methods.

use crate::{now_epoch_secs, SharedClient};
use satellite_core::error::{Error, Result};
use satellite_core::types::{Language, NhentaiArchive};
use std::sync::Arc;

fn language_name(language: Language) -> &'static str {
    match language {
        Language::En => "EN",
        Language::Jp => "JP",
        Language::Cn => "CN",
        Language::Other => "OTHER",
        Language::Untranslated => "UNTRANSLATED",
    }
}

fn language_from_name(raw: &str) -> Result<Language> {
    match raw {
        "EN" => Ok(Language::En),
        "JP" => Ok(Language::Jp),
        "CN" => Ok(Language::Cn),
        "OTHER" => Ok(Language::Other),
        "UNTRANSLATED" => Ok(Language::Untranslated),
        other => Err(Error::Storage(format!("unknown nhentai_archive language {other}"))),
    }
}

fn row_to_archive(row: &postgres::Row) -> Result<NhentaiArchive> {
    let language_raw: String = row.get(3);
    Ok(NhentaiArchive {
        arcid: row.get(0),
        nhentai_id: row.get(1),
        favorites: row.get(2),
        language: language_from_name(&language_raw)?,
        last_updated: row.get(4),
    })
}

/// Table-scoped handle for `nhentai_archive` rows.
pub struct NhentaiArchiveStore {
    client: SharedClient,
}

impl NhentaiArchiveStore {
    pub(crate) fn new(client: SharedClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, arcid: &str) -> Result<Option<NhentaiArchive>> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<NhentaiArchive>> {
            let mut c = client.lock();
            let row = c
                .query_opt(
                    "SELECT archive_id, nhentai_id, favorites, language, last_updated
                     FROM nhentai_archive WHERE archive_id = $1",
                    &[&arcid],
                )
                .map_err(|e| Error::Storage(format!("get nhentai_archive failed: {e}")))?;
            row.as_ref().map(row_to_archive).transpose()
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    /// `get_nhentai_archive_favorites`: defaults to `0` (not `-1`) when the
    /// row is absent, matching `nhdd.py`.
    pub async fn favorites(&self, arcid: &str) -> Result<i64> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<i64> {
            let mut c = client.lock();
            let row = c
                .query_opt(
                    "SELECT favorites FROM nhentai_archive WHERE archive_id = $1",
                    &[&arcid],
                )
                .map_err(|e| Error::Storage(format!("get favorites failed: {e}")))?;
            Ok(row.map_or(0, |r| r.get(0)))
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    /// `get_nhentai_archives_by_favorites`: archives at a given favorites
    /// value (e.g. `-1` = unknown) with no metadata task yet queued.
    pub async fn by_favorites_without_metadata_task(
        &self,
        favorites: i64,
        limit: i64,
    ) -> Result<Vec<NhentaiArchive>> {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || -> Result<Vec<NhentaiArchive>> {
            let mut c = client.lock();
            let rows = c
                .query(
                    "SELECT archive_id, nhentai_id, favorites, language, last_updated
                     FROM nhentai_archive nha
                     WHERE favorites = $1
                     AND NOT EXISTS (
                         SELECT 1 FROM archive_metadata_job amj WHERE amj.archive_id = nha.archive_id
                     )
                     LIMIT $2",
                    &[&favorites, &limit],
                )
                .map_err(|e| Error::Storage(format!("by_favorites_without_metadata_task failed: {e}")))?;
            rows.iter().map(row_to_archive).collect()
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn insert(
        &self,
        arcid: &str,
        nhentai_id: Option<&str>,
        favorites: i64,
        language: Language,
    ) -> Result<()> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        let nhentai_id = nhentai_id.map(str::to_string);
        let language = language_name(language).to_string();
        let now = now_epoch_secs();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            c.execute(
                "INSERT INTO nhentai_archive (archive_id, nhentai_id, favorites, language, last_updated)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (archive_id) DO NOTHING",
                &[&arcid, &nhentai_id, &favorites, &language, &now],
            )
            .map_err(|e| Error::Storage(format!("insert nhentai_archive failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn update_favorites(&self, arcid: &str, favorites: i64) -> Result<()> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        let now = now_epoch_secs();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            c.execute(
                "UPDATE nhentai_archive SET favorites = $1, last_updated = $2 WHERE archive_id = $3",
                &[&favorites, &now, &arcid],
            )
            .map_err(|e| Error::Storage(format!("update nhentai_archive favorites failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }

    pub async fn delete(&self, arcid: &str) -> Result<()> {
        let client = Arc::clone(&self.client);
        let arcid = arcid.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut c = client.lock();
            c.execute("DELETE FROM nhentai_archive WHERE archive_id = $1", &[&arcid])
                .map_err(|e| Error::Storage(format!("delete nhentai_archive failed: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(format!("join error: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_roundtrips() {
        for language in [
            Language::En,
            Language::Jp,
            Language::Cn,
            Language::Other,
            Language::Untranslated,
        ] {
            assert_eq!(language_from_name(language_name(language)).unwrap(), language);
        }
    }
}
