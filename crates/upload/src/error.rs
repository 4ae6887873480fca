//! Upload error taxonomy.

use std::path::PathBuf;

use ferry_control_plane::ControlPlaneError;
use ferry_protocol::SessionError;
use ferry_session_store::StoreError;
use ferry_transfer::{PolicyViolation, TransferError};

/// Local checks that failed before any network call.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("source {path} is unavailable: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source {0} is not a regular file")]
    NotAFile(PathBuf),

    #[error(transparent)]
    Policy(#[from] PolicyViolation),
}

/// Errors surfaced by an upload run.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The control plane rejected the caller's credential. Not retried.
    ///
    /// `session_kept` is set when the failure came after initiate, so the
    /// persisted session survives for a resume once re-authenticated.
    #[error("authentication failed: {message}")]
    Authentication { message: String, session_kept: bool },

    /// A part exhausted its attempt budget.
    #[error("part {part_number} failed after {attempts} attempt(s): {source}")]
    PartUploadFailed {
        part_number: u32,
        attempts: u32,
        #[source]
        source: TransferError,
    },

    /// The caller cancelled the upload.
    #[error("upload cancelled")]
    Cancelled,

    /// The resume request does not match the persisted session.
    #[error("cannot resume: {0}")]
    ResumeMismatch(String),

    /// The source changed size while the upload was running.
    #[error("source changed during upload: expected {expected} bytes, found {actual}")]
    SourceChanged { expected: u64, actual: u64 },

    /// Every part is stored but the finalize call failed.
    #[error("finalize failed: {0}")]
    Finalization(#[source] ControlPlaneError),

    /// A non-credential control-plane failure before finalize.
    #[error("control plane error{}: {source}", part_suffix(.part_number))]
    ControlPlane {
        part_number: Option<u32>,
        #[source]
        source: ControlPlaneError,
    },

    #[error("invalid session: {0}")]
    Session(#[from] SessionError),

    #[error("session store error: {0}")]
    Store(#[from] StoreError),

    /// The multipart object was opened but its session could not be saved.
    /// The object has been aborted and nothing is persisted.
    #[error("session could not be persisted after initiate: {0}")]
    NotPersisted(#[source] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The upload task ended without producing a result.
    #[error("upload task failed: {0}")]
    Task(String),
}

fn part_suffix(part_number: &Option<u32>) -> String {
    match part_number {
        Some(n) => format!(" at part {n}"),
        None => String::new(),
    }
}

impl UploadError {
    /// Whether the persisted session was kept as a resumption point.
    ///
    /// Store and I/O failures only occur once a session exists, so they
    /// count as resumable.
    pub fn is_resumable(&self) -> bool {
        match self {
            UploadError::PartUploadFailed { .. }
            | UploadError::Finalization(_)
            | UploadError::Store(_)
            | UploadError::Io(_) => true,
            UploadError::ControlPlane { part_number, .. } => part_number.is_some(),
            UploadError::Authentication { session_kept, .. } => *session_kept,
            _ => false,
        }
    }

    /// Maps a control-plane failure before finalize, lifting credential
    /// errors out. A session exists once a part number is involved.
    pub(crate) fn control(part_number: Option<u32>, err: ControlPlaneError) -> Self {
        match err {
            ControlPlaneError::Unauthorized(message) => UploadError::Authentication {
                message,
                session_kept: part_number.is_some(),
            },
            source => UploadError::ControlPlane {
                part_number,
                source,
            },
        }
    }

    pub(crate) fn read(err: TransferError) -> Self {
        match err {
            TransferError::Io(e) => UploadError::Io(e),
            TransferError::SourceChanged { expected, actual } => {
                UploadError::SourceChanged { expected, actual }
            }
            TransferError::Cancelled => UploadError::Cancelled,
            other => UploadError::Io(std::io::Error::other(other)),
        }
    }
}
