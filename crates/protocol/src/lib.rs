//! Data model and wire types for resumable chunked media uploads.
//!
//! Nothing in this crate performs I/O. It defines the persisted
//! [`UploadSession`] record, the transient [`UploadProgress`] value, and the
//! request/response shapes exchanged with the upload control plane.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod session;
pub mod types;

pub use constants::{CHUNK_SIZE, MAX_PART_NUMBER, STALENESS_WINDOW};
pub use envelope::{ControlReply, ErrorBody};
pub use messages::{
    AbortRequest, AbortResponse, CompleteRequest, CompleteResponse, ControlRequest,
    InitiateRequest, InitiateResponse, PartUrlRequest, PartUrlResponse,
};
pub use session::{CompletedPart, SessionError, UploadSession};
pub use types::{MediaKind, UploadProgress};
