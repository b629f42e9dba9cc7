//! Single-row `auth` table backing `AuthRecord`, bootstrapped with
//! `bcrypt` exactly as `database.py::register_api_key`/`verify_api_key` do,
//! but without the dormant bug of hashing against the wrong salt type —
//! `bcrypt` in this crate generates and stores its own salt internally.

use crate::JobStore;
use satellite_core::error::{Error, Result};

const SINGLE_USER_ID: i64 = 0;
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Table-scoped handle for the single `auth` row.
pub struct AuthStore {
    store: JobStore,
}

impl AuthStore {
    pub(crate) fn new(store: JobStore) -> Self {
        Self { store }
    }

    /// Bootstrap or rotate the bearer token. Idempotent: always overwrites
    /// the single row (`user_id = 0`).
    pub async fn register_api_key(&self, api_key: &str) -> Result<()> {
        let hash = bcrypt::hash(api_key, BCRYPT_COST)
            .map_err(|e| Error::Storage(format!("bcrypt hash failed: {e}")))?;
        let last_updated = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        let conn = self.store.connection().await?;
        conn.execute(
            "INSERT OR IGNORE INTO auth (user_id, salt, hash, last_updated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
               salt = excluded.salt,
               hash = excluded.hash,
               last_updated = excluded.last_updated",
            // bcrypt's hash format embeds its own salt; the separate `salt`
            // column is kept for schema parity with `AuthRecord` but unused
            // for verification.
            libsql::params![SINGLE_USER_ID, String::new(), hash, last_updated],
        )
        .await
        .map_err(|e| Error::Storage(format!("register_api_key failed: {e}")))?;
        Ok(())
    }

    /// `verify_api_key`: compares `bcrypt(presented) == stored_hash`.
    /// Returns `Ok(false)` (not an error) if no auth row is bootstrapped
    /// yet — callers decide whether that means "reject" or "disabled".
    pub async fn verify_api_key(&self, presented: &str) -> Result<bool> {
        let conn = self.store.connection().await?;
        let mut rows = conn
            .query(
                "SELECT hash FROM auth WHERE user_id = ?1",
                libsql::params![SINGLE_USER_ID],
            )
            .await
            .map_err(|e| Error::Storage(format!("query auth failed: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Storage(format!("fetch auth row failed: {e}")))?
        else {
            return Ok(false);
        };

        let stored_hash: String = row
            .get(0)
            .map_err(|e| Error::Storage(format!("auth.hash column: {e}")))?;
        bcrypt::verify(presented, &stored_hash)
            .map_err(|e| Error::Storage(format!("bcrypt verify failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_verify() {
        let store = JobStore::open_in_memory().await.unwrap();
        let auth = store.auth();
        auth.register_api_key("secret-token").await.unwrap();
        assert!(auth.verify_api_key("secret-token").await.unwrap());
        assert!(!auth.verify_api_key("wrong-token").await.unwrap());
    }

    #[tokio::test]
    async fn verify_without_bootstrap_is_false() {
        let store = JobStore::open_in_memory().await.unwrap();
        let auth = store.auth();
        assert!(!auth.verify_api_key("anything").await.unwrap());
    }
}
