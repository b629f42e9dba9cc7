//! Pipeline-runner lock gate.
//!
//! One process-wide reader-writer lock guards scan/upload/metadata jobs
//! against concurrent readers of the query APIs. Four additional named
//! mutexes guard the NHDD jobs (`page_embeddings`, `subarchives`,
//! `nhentai_archives_data`, `contents`) so they may run in parallel with
//! scan/upload but not with each other. Every acquisition here is
//! non-blocking: on contention the caller gets `Error::Busy` (surfaced by
//! the HTTP layer as 423) rather than queuing, matching the Python
//! source's `lock.writer.locked or lock.reader.locked` pre-check before
//! `async with lock.writer_lock`.

use crate::error::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// RAII guard released when a background job completes; holding it keeps
/// the writer role of the shared [`LockState`] acquired.
pub struct WriterGuard(#[allow(dead_code)] tokio::sync::OwnedRwLockWriteGuard<()>);

/// RAII guard for one of the four named mutexes.
pub struct NamedGuard(#[allow(dead_code)] OwnedMutexGuard<()>);

/// The four independent job classes that must not run concurrently with
/// themselves, but may run alongside scan/upload/metadata and each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedLock {
    PageEmbeddings,
    Subarchives,
    NhentaiArchivesData,
    Contents,
}

/// Process-wide lock state shared by every pipeline-runner job.
pub struct LockState {
    rw: std::sync::Arc<RwLock<()>>,
    page_embeddings: std::sync::Arc<Mutex<()>>,
    subarchives: std::sync::Arc<Mutex<()>>,
    nhentai_archives_data: std::sync::Arc<Mutex<()>>,
    contents: std::sync::Arc<Mutex<()>>,
}

impl Default for LockState {
    fn default() -> Self {
        Self::new()
    }
}

impl LockState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rw: std::sync::Arc::new(RwLock::new(())),
            page_embeddings: std::sync::Arc::new(Mutex::new(())),
            subarchives: std::sync::Arc::new(Mutex::new(())),
            nhentai_archives_data: std::sync::Arc::new(Mutex::new(())),
            contents: std::sync::Arc::new(Mutex::new(())),
        }
    }

    /// Try to acquire the writer role (scan, upload, metadata-plugin jobs).
    /// Rejects immediately if any reader or writer currently holds the lock.
    pub fn try_acquire_writer(&self) -> Result<WriterGuard, Error> {
        self.rw
            .clone()
            .try_write_owned()
            .map(WriterGuard)
            .map_err(|_| Error::Busy)
    }

    /// Try to acquire a reader role (query APIs). Rejects only if a writer
    /// currently holds the lock.
    pub fn try_acquire_reader(
        &self,
    ) -> Result<tokio::sync::OwnedRwLockReadGuard<()>, Error> {
        self.rw.clone().try_read_owned().map_err(|_| Error::Busy)
    }

    /// Try to acquire one of the four named mutexes non-blockingly.
    pub fn try_acquire_named(&self, which: NamedLock) -> Result<NamedGuard, Error> {
        let mutex = match which {
            NamedLock::PageEmbeddings => &self.page_embeddings,
            NamedLock::Subarchives => &self.subarchives,
            NamedLock::NhentaiArchivesData => &self.nhentai_archives_data,
            NamedLock::Contents => &self.contents,
        };
        mutex
            .clone()
            .try_lock_owned()
            .map(NamedGuard)
            .map_err(|_| Error::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_rejects_second_writer() {
        let state = LockState::new();
        let _first = state.try_acquire_writer().unwrap();
        assert!(matches!(state.try_acquire_writer(), Err(Error::Busy)));
    }

    #[test]
    fn named_locks_are_independent() {
        let state = LockState::new();
        let _a = state.try_acquire_named(NamedLock::Subarchives).unwrap();
        // A different named mutex is unaffected.
        assert!(state.try_acquire_named(NamedLock::Contents).is_ok());
        // The same one is rejected.
        assert!(matches!(
            state.try_acquire_named(NamedLock::Subarchives),
            Err(Error::Busy)
        ));
    }
}
