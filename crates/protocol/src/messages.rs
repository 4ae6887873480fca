//! Control-plane request and response payloads.
//!
//! The four operations share one endpoint; requests are discriminated by an
//! `action` field.

use serde::{Deserialize, Serialize};

use crate::session::CompletedPart;
use crate::types::MediaKind;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Opens a server-side multipart object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub kind: MediaKind,
    pub file_size: u64,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Asks for a pre-signed write destination for one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrlRequest {
    pub session_id: String,
    pub object_key: String,
    pub part_number: u32,
}

/// Finalizes the object from its parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub session_id: String,
    pub object_key: String,
    pub parts: Vec<CompletedPart>,
}

/// Releases the server-side multipart object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortRequest {
    pub session_id: String,
    pub object_key: String,
}

/// Any control-plane request, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ControlRequest {
    #[serde(rename = "initiate")]
    Initiate(InitiateRequest),
    #[serde(rename = "getPartUrl")]
    GetPartUrl(PartUrlRequest),
    #[serde(rename = "complete")]
    Complete(CompleteRequest),
    #[serde(rename = "abort")]
    Abort(AbortRequest),
}

impl ControlRequest {
    /// Wire value of the `action` discriminator.
    pub fn action(&self) -> &'static str {
        match self {
            ControlRequest::Initiate(_) => "initiate",
            ControlRequest::GetPartUrl(_) => "getPartUrl",
            ControlRequest::Complete(_) => "complete",
            ControlRequest::Abort(_) => "abort",
        }
    }
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub session_id: String,
    pub object_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartUrlResponse {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    pub object_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbortResponse {
    #[serde(default)]
    pub success: bool,
}
