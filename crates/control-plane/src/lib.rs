//! Upload control-plane client.
//!
//! [`ControlPlane`] is the four-operation contract the upload orchestrator
//! drives: open a multipart object, fetch a pre-signed destination per part,
//! finalize, and abort. [`HttpControlPlane`] implements it over a single JSON
//! endpoint with an `action` discriminator and bearer authorization.

mod credentials;
mod http;

use std::future::Future;
use std::pin::Pin;

use ferry_protocol::{CompletedPart, ErrorBody, InitiateRequest, InitiateResponse};

pub use credentials::{CredentialSource, CredentialsFuture, StaticToken};
pub use http::HttpControlPlane;

/// Errors produced by control-plane calls.
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// Missing, expired or rejected credential. Never retried here.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The control plane answered with an error payload.
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },

    /// Non-2xx response without a recognizable error payload.
    #[error("control plane responded {status}: {body}")]
    Status { status: u16, body: String },

    /// The request violates the contract and was not sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ControlPlaneError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ControlPlaneError::Unauthorized(_))
    }
}

impl From<ErrorBody> for ControlPlaneError {
    fn from(body: ErrorBody) -> Self {
        if body.is_unauthorized() {
            ControlPlaneError::Unauthorized(body.error)
        } else {
            ControlPlaneError::Rejected {
                code: body.code,
                message: body.error,
            }
        }
    }
}

/// Boxed future returned by [`ControlPlane`] operations.
pub type ControlFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ControlPlaneError>> + Send + 'a>>;

/// The remote authority that issues part destinations and finalizes objects.
///
/// Every call requires a valid caller identity.
pub trait ControlPlane: Send + Sync {
    /// Opens a multipart object and returns its session id and object key.
    fn initiate<'a>(&'a self, request: &'a InitiateRequest) -> ControlFuture<'a, InitiateResponse>;

    /// Returns a pre-signed write URL for `part_number` (1..=10 000).
    fn part_destination<'a>(
        &'a self,
        session_id: &'a str,
        object_key: &'a str,
        part_number: u32,
    ) -> ControlFuture<'a, String>;

    /// Finalizes the object from a non-empty list of parts; returns the object key.
    fn complete<'a>(
        &'a self,
        session_id: &'a str,
        object_key: &'a str,
        parts: &'a [CompletedPart],
    ) -> ControlFuture<'a, String>;

    /// Releases server-side resources of an unfinished object.
    fn abort<'a>(&'a self, session_id: &'a str, object_key: &'a str) -> ControlFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_protocol::constants::error_codes;

    #[test]
    fn error_body_maps_to_unauthorized() {
        let err: ControlPlaneError = ErrorBody::new(error_codes::UNAUTHORIZED, "expired").into();
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "unauthorized: expired");
    }

    #[test]
    fn error_body_maps_to_rejected() {
        let err: ControlPlaneError =
            ErrorBody::new(error_codes::VALIDATION_ERROR, "file too large").into();
        assert!(!err.is_unauthorized());
        assert!(matches!(err, ControlPlaneError::Rejected { ref code, .. } if code == "VALIDATION_ERROR"));
    }
}
