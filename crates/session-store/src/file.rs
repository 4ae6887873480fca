//! File-backed session store: one JSON record per record id.
//!
//! Records live under a single directory as `session_<hash>.json`, where the
//! hash is derived from the record id. Writes go to a unique temporary file
//! that is renamed into place, so readers never observe a torn record.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use ferry_protocol::{STALENESS_WINDOW, UploadSession};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{SessionStore, StoreError, StoreFuture, check_record_id};

const FILE_PREFIX: &str = "session_";
const FILE_SUFFIX: &str = ".json";

/// On-disk record: the session plus the record id it is keyed by.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    record_id: String,
    #[serde(flatten)]
    session: UploadSession,
}

/// [`SessionStore`] persisting each session to its own JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
    staleness_window: Duration,
}

/// What reading one record file produced.
enum ReadOutcome {
    Missing,
    Fresh(StoredSession),
    Reaped,
}

impl FileSessionStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            staleness_window: STALENESS_WINDOW,
        }
    }

    /// Overrides the 24 hour staleness window.
    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `record_id`.
    pub fn record_path(&self, record_id: &str) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", hash_record_id(record_id)))
    }

    async fn save_impl(&self, record_id: &str, session: &UploadSession) -> Result<(), StoreError> {
        check_record_id(record_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let record = StoredSession {
            record_id: record_id.to_string(),
            session: session.clone(),
        };
        let json = serde_json::to_vec_pretty(&record)?;

        let path = self.record_path(record_id);
        let tmp = path.with_extension(format!("json.tmp-{}", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, &json).await?;
        set_permissions_0600(&tmp);
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(
            record_id,
            parts = session.completed_count(),
            total = session.total_parts,
            "session saved"
        );
        Ok(())
    }

    async fn load_impl(&self, record_id: &str) -> Result<Option<UploadSession>, StoreError> {
        check_record_id(record_id)?;
        let path = self.record_path(record_id);
        match self.read_record(&path).await? {
            ReadOutcome::Fresh(stored) if stored.record_id == record_id => Ok(Some(stored.session)),
            ReadOutcome::Fresh(stored) => {
                warn!(
                    record_id,
                    stored_id = %stored.record_id,
                    "record file belongs to another id, ignoring"
                );
                Ok(None)
            }
            ReadOutcome::Missing | ReadOutcome::Reaped => Ok(None),
        }
    }

    async fn delete_impl(&self, record_id: &str) -> Result<(), StoreError> {
        check_record_id(record_id)?;
        remove_if_exists(&self.record_path(record_id)).await?;
        debug!(record_id, "session deleted");
        Ok(())
    }

    async fn list_impl(&self) -> Result<Vec<(String, UploadSession)>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(FILE_PREFIX) || !name.ends_with(FILE_SUFFIX) {
                continue;
            }
            if let ReadOutcome::Fresh(stored) = self.read_record(&entry.path()).await? {
                sessions.push((stored.record_id, stored.session));
            }
        }

        sessions.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(sessions)
    }

    /// Reads one record file, reaping it if it is stale or unreadable.
    async fn read_record(&self, path: &Path) -> Result<ReadOutcome, StoreError> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ReadOutcome::Missing),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredSession = match serde_json::from_slice(&data) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable session record, removing");
                remove_if_exists(path).await?;
                return Ok(ReadOutcome::Reaped);
            }
        };

        if let Err(e) = stored.session.validate() {
            warn!(record_id = %stored.record_id, error = %e, "invalid session record, removing");
            remove_if_exists(path).await?;
            return Ok(ReadOutcome::Reaped);
        }

        if stored.session.is_stale_at(Utc::now(), self.staleness_window) {
            debug!(
                record_id = %stored.record_id,
                created_at = %stored.session.created_at,
                "stale session removed"
            );
            remove_if_exists(path).await?;
            return Ok(ReadOutcome::Reaped);
        }

        Ok(ReadOutcome::Fresh(stored))
    }
}

impl SessionStore for FileSessionStore {
    fn save<'a>(&'a self, record_id: &'a str, session: &'a UploadSession) -> StoreFuture<'a, ()> {
        Box::pin(self.save_impl(record_id, session))
    }

    fn load<'a>(&'a self, record_id: &'a str) -> StoreFuture<'a, Option<UploadSession>> {
        Box::pin(self.load_impl(record_id))
    }

    fn delete<'a>(&'a self, record_id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(self.delete_impl(record_id))
    }

    fn list_all(&self) -> StoreFuture<'_, Vec<(String, UploadSession)>> {
        Box::pin(self.list_impl())
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Creates a deterministic file name component from a record id.
///
/// Uses first 16 bytes of SHA-256 (32 hex characters).
fn hash_record_id(record_id: &str) -> String {
    let hash = Sha256::digest(record_id.as_bytes());
    hex::encode(&hash[..16])
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

/// Returns the default session directory: `<config dir>/ferry/sessions`.
pub fn default_state_dir() -> Option<PathBuf> {
    config_dir().map(|d| d.join("ferry").join("sessions"))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}
