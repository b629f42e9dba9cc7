//! Domain types, error taxonomy and concurrency primitives shared by every
//! Satellite crate.
//!
//! `satellite-core` has no I/O dependencies of its own (no SQL driver, no
//! HTTP client) — it is the vocabulary the storage, remote-client and engine
//! crates build on.

pub mod config;
pub mod error;
pub mod lock;
pub mod retry;
pub mod signature;
pub mod similarity;
pub mod types;

pub use error::{Error, Result};
