//! Part-level transfer for resumable chunked uploads.
//!
//! - [`ChunkPlan`] splits a file into fixed-size, 1-indexed parts.
//! - [`PartReader`] reads exactly one part's byte range from the source.
//! - [`PartTransport`] performs a single PUT of a part; [`HttpPartTransport`]
//!   is the reqwest-backed implementation.
//! - [`RetryingPartUploader`] adds bounded retry with exponential backoff and
//!   cancellation on top of any transport.
//! - [`UploadPolicy`] enforces per-kind size and content-type limits locally.

mod chunked;
mod progress;
mod retry;
mod transport;
mod validation;

pub use chunked::{ChunkPlan, PartRange, PartReader};
pub use progress::{SpeedCalculator, progress_for};
pub use retry::{RetryConfig, RetryError, RetryingPartUploader};
pub use transport::{HttpPartTransport, PartTransport, TransportFuture};
pub use validation::{KindPolicy, PolicyViolation, UploadPolicy, detect_content_type};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("destination responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response carried no integrity tag")]
    MissingIntegrityTag,

    #[error("file is empty")]
    EmptyFile,

    #[error("part {part_number} outside 1..={total_parts}")]
    PartOutOfRange { part_number: u32, total_parts: u32 },

    #[error("source changed size: expected {expected} bytes, found {actual}")]
    SourceChanged { expected: u64, actual: u64 },

    #[error("cancelled")]
    Cancelled,
}

impl TransferError {
    /// Returns `true` for a 4xx response that retrying cannot fix.
    ///
    /// 408 and 429 are treated as transient.
    pub fn is_permanent_client_error(&self) -> bool {
        match self {
            TransferError::Status { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            _ => false,
        }
    }
}
