//! Durable persistence of [`UploadSession`] records keyed by a caller-chosen
//! record id.
//!
//! Every operation is idempotent and "not found" is never an error. Records
//! older than the staleness window are deleted when encountered and reported
//! as absent.

mod file;
mod memory;

use std::future::Future;
use std::pin::Pin;

use ferry_protocol::UploadSession;

pub use file::{FileSessionStore, default_state_dir};
pub use memory::MemorySessionStore;

/// Errors from session store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid record id: {0:?}")]
    InvalidRecordId(String),
}

/// Boxed future returned by [`SessionStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Key-value persistence of upload sessions.
///
/// Implementations must tolerate concurrent operations on distinct record
/// ids. Callers guarantee at most one writer per record id.
pub trait SessionStore: Send + Sync {
    /// Creates or replaces the session for `record_id`.
    fn save<'a>(&'a self, record_id: &'a str, session: &'a UploadSession) -> StoreFuture<'a, ()>;

    /// Returns the session for `record_id`, or `None` if absent or stale.
    fn load<'a>(&'a self, record_id: &'a str) -> StoreFuture<'a, Option<UploadSession>>;

    /// Removes the session for `record_id`; absent records are ignored.
    fn delete<'a>(&'a self, record_id: &'a str) -> StoreFuture<'a, ()>;

    /// Returns every non-stale session, sorted by record id.
    fn list_all(&self) -> StoreFuture<'_, Vec<(String, UploadSession)>>;
}

pub(crate) fn check_record_id(record_id: &str) -> Result<(), StoreError> {
    if record_id.trim().is_empty() {
        return Err(StoreError::InvalidRecordId(record_id.to_string()));
    }
    Ok(())
}
