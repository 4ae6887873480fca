use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use ferry_protocol::{STALENESS_WINDOW, UploadSession};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{SessionStore, StoreError, StoreFuture, check_record_id};

/// Process-local [`SessionStore`]; sessions do not survive a restart.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, UploadSession>>,
    staleness_window: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            staleness_window: STALENESS_WINDOW,
        }
    }

    /// Overrides the 24 hour staleness window.
    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    /// Number of records currently held, stale ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn save_impl(&self, record_id: &str, session: &UploadSession) -> Result<(), StoreError> {
        check_record_id(record_id)?;
        self.sessions
            .write()
            .await
            .insert(record_id.to_string(), session.clone());
        Ok(())
    }

    async fn load_impl(&self, record_id: &str) -> Result<Option<UploadSession>, StoreError> {
        check_record_id(record_id)?;
        let mut map = self.sessions.write().await;
        let stale = match map.get(record_id) {
            None => return Ok(None),
            Some(s) => s.is_stale_at(Utc::now(), self.staleness_window),
        };
        if stale {
            map.remove(record_id);
            debug!(record_id, "stale session removed");
            return Ok(None);
        }
        Ok(map.get(record_id).cloned())
    }

    async fn delete_impl(&self, record_id: &str) -> Result<(), StoreError> {
        check_record_id(record_id)?;
        self.sessions.write().await.remove(record_id);
        Ok(())
    }

    async fn list_impl(&self) -> Result<Vec<(String, UploadSession)>, StoreError> {
        let now = Utc::now();
        let mut map = self.sessions.write().await;
        map.retain(|_, s| !s.is_stale_at(now, self.staleness_window));
        let mut all: Vec<(String, UploadSession)> =
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(all)
    }
}

impl SessionStore for MemorySessionStore {
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
