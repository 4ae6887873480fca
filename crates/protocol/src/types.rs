use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Caller-declared category of the uploaded media.
///
/// Each kind carries its own size limit and content-type allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown media kind.
#[derive(Debug, thiserror::Error)]
#[error("unknown media kind: {0}")]
pub struct UnknownMediaKind(pub String);

impl FromStr for MediaKind {
    type Err = UnknownMediaKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            _ => Err(UnknownMediaKind(s.to_string())),
        }
    }
}

/// Progress of a single upload, emitted after every completed part.
///
/// Never persisted; recomputed from the session on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    /// 0.0 to 100.0, derived from `bytes_uploaded / total_bytes`.
    pub percentage: f64,
    /// Part the update refers to (0 before any part has been visited).
    pub current_part: u32,
    pub total_parts: u32,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Builds a progress value, deriving the percentage from the byte counts.
    pub fn new(current_part: u32, total_parts: u32, bytes_uploaded: u64, total_bytes: u64) -> Self {
        let percentage = if total_bytes == 0 {
            0.0
        } else {
            bytes_uploaded as f64 / total_bytes as f64 * 100.0
        };
        Self {
            percentage,
            current_part,
            total_parts,
            bytes_uploaded,
            total_bytes,
        }
    }

    /// Returns `true` once every byte is covered.
    pub fn is_complete(&self) -> bool {
        self.total_bytes > 0 && self.bytes_uploaded >= self.total_bytes
    }
}
