//! Background-job dispatch (C4): wraps
//! [`satellite_core::lock::LockState`] so every engine submission is either
//! accepted and spawned immediately, or rejected with [`Error::Busy`]
//! without queuing.

use satellite_core::error::Result;
use satellite_core::lock::{LockState, NamedLock};
use std::future::Future;
use std::sync::Arc;

/// Shared handle to the process-wide RW lock plus the four named mutexes.
/// Cheap to clone.
#[derive(Clone)]
pub struct PipelineRunner {
    lock: Arc<LockState>,
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRunner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lock: Arc::new(LockState::new()),
        }
    }

    #[must_use]
    pub fn lock_state(&self) -> Arc<LockState> {
        Arc::clone(&self.lock)
    }

    /// Scan, delete-corrupted, upload and metadata-plugin jobs all require
    /// the writer role. Returns immediately: `Ok(())` once
    /// the job has been spawned, `Err(Error::Busy)` if the writer role is
    /// already held.
    pub fn submit_writer_job<F, Fut>(&self, job: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let guard = self.lock.try_acquire_writer()?;
        tokio::spawn(async move {
            job().await;
            drop(guard);
        });
        Ok(())
    }

    /// Embedding-ingestion, favourites-update, subarchive-compute and
    /// duplicate-removal each require a distinct named mutex.
    pub fn submit_named_job<F, Fut>(&self, which: NamedLock, job: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let guard = self.lock.try_acquire_named(which)?;
        tokio::spawn(async move {
            job().await;
            drop(guard);
        });
        Ok(())
    }

    /// Read-only query APIs may run concurrently with a held writer lock's
    /// *readers*, but not while a writer itself is mid-acquisition; callers
    /// that only read C1/C2 state should still take the reader role so a
    /// scan/upload/metadata run can't observe a half-written row.
    pub async fn acquire_reader(&self) -> Result<tokio::sync::OwnedRwLockReadGuard<()>> {
        self.lock.try_acquire_reader()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_writer_jobs_reject_with_busy() {
        let runner = PipelineRunner::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        runner
            .submit_writer_job(|| async move {
                let _ = rx.await;
            })
            .unwrap();

        let err = runner.submit_writer_job(|| async {}).unwrap_err();
        assert!(matches!(err, satellite_core::error::Error::Busy));
        let _ = tx.send(());
    }

    #[tokio::test]
    async fn distinct_named_locks_do_not_conflict() {
        let runner = PipelineRunner::new();
        runner
            .submit_named_job(NamedLock::PageEmbeddings, || async {})
            .unwrap();
        runner
            .submit_named_job(NamedLock::Subarchives, || async {})
            .unwrap();
    }
}
