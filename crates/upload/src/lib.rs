//! Resumable chunked media uploads.
//!
//! [`UploadOrchestrator`] drives one upload session end to end:
//!
//! 1. **Plan**: check the source and the per-kind size/type policy
//! 2. **Initiate or resume**: open a multipart object, or adopt a persisted session
//! 3. **Transfer**: upload parts in ascending order, persisting after each
//! 4. **Complete**: finalize with every integrity tag, then drop the record
//!
//! Cancellation aborts the server-side object and discards the record.
//! Any other failure leaves the record in place for a later resume.

pub mod controller;
pub mod error;
pub mod orchestrator;
pub mod types;

#[cfg(test)]
mod mock;

pub use controller::UploadController;
pub use error::{UploadError, ValidationError};
pub use orchestrator::{UploadOrchestrator, persisted_progress};
pub use types::{
    ProgressCallback, SessionSnapshot, UploadOptions, UploadOutcome, UploadState,
};
