//! Options, outcomes and observable state of an upload run.

use std::fmt;
use std::sync::Arc;

use ferry_protocol::{MediaKind, UploadProgress, UploadSession};

/// Receives a progress update after every completed or skipped part.
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Parameters of one upload run.
#[derive(Clone)]
pub struct UploadOptions {
    /// Logical id the session is persisted under.
    pub record_id: String,
    pub kind: MediaKind,
    pub content_type: String,
    pub file_name: Option<String>,
    pub on_progress: Option<ProgressCallback>,
    /// A previously persisted session to continue instead of initiating.
    pub resume_from: Option<UploadSession>,
}

impl UploadOptions {
    pub fn new(record_id: impl Into<String>, kind: MediaKind, content_type: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            kind,
            content_type: content_type.into(),
            file_name: None,
            on_progress: None,
            resume_from: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn resume_from(mut self, session: UploadSession) -> Self {
        self.resume_from = Some(session);
        self
    }
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("record_id", &self.record_id)
            .field("kind", &self.kind)
            .field("content_type", &self.content_type)
            .field("file_name", &self.file_name)
            .field("on_progress", &self.on_progress.is_some())
            .field("resume_from", &self.resume_from.as_ref().map(|s| &s.session_id))
            .finish()
    }
}

/// Result of a finalized upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub object_key: String,
    /// The session as it was finalized, every part recorded.
    pub final_session: UploadSession,
}

/// Phase of an upload run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Planning,
    Initiating,
    Resuming,
    Transferring,
    Completing,
    Done,
    Aborting,
    Aborted,
    Failed,
}

impl UploadState {
    /// Returns `true` once the run can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Done | UploadState::Aborted | UploadState::Failed
        )
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadState::Planning => "planning",
            UploadState::Initiating => "initiating",
            UploadState::Resuming => "resuming",
            UploadState::Transferring => "transferring",
            UploadState::Completing => "completing",
            UploadState::Done => "done",
            UploadState::Aborting => "aborting",
            UploadState::Aborted => "aborted",
            UploadState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a running upload.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: UploadState,
    /// `None` until a session has been initiated or adopted.
    pub session: Option<UploadSession>,
    pub progress: Option<UploadProgress>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn builder_sets_optional_fields() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let opts = UploadOptions::new("rec-1", MediaKind::Video, "video/mp4")
            .with_file_name("clip.mp4")
            .with_progress(move |p| sink.lock().unwrap().push(p.percentage));

        assert_eq!(opts.file_name.as_deref(), Some("clip.mp4"));
        (opts.on_progress.as_ref().unwrap())(UploadProgress::new(1, 2, 5, 10));
        assert_eq!(*seen.lock().unwrap(), vec![50.0]);
        assert!(format!("{opts:?}").contains("on_progress: true"));
    }

    #[test]
    fn terminal_states() {
        assert!(UploadState::Done.is_terminal());
        assert!(UploadState::Aborted.is_terminal());
        assert!(UploadState::Failed.is_terminal());
        assert!(!UploadState::Aborting.is_terminal());
        assert_eq!(UploadState::Transferring.to_string(), "transferring");
    }
}
