use std::path::Path;

use ferry_protocol::{MAX_PART_NUMBER, MediaKind};

use crate::ChunkPlan;

/// Size and content-type limits for one media kind.
#[derive(Debug, Clone, PartialEq)]
pub struct KindPolicy {
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl KindPolicy {
    fn allows(&self, content_type: &str) -> bool {
        let essence = essence(content_type);
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(essence))
    }
}

/// A local policy check that failed before any network call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("file is empty")]
    EmptyFile,

    #[error("{kind} of {size} bytes exceeds the {max} byte limit")]
    TooLarge { kind: MediaKind, size: u64, max: u64 },

    #[error("content type {content_type} is not allowed for {kind}")]
    ContentTypeNotAllowed {
        kind: MediaKind,
        content_type: String,
    },

    #[error("file needs {parts} parts, limit is {max}")]
    TooManyParts { parts: u32, max: u32 },
}

/// Per-kind upload limits, enforced locally and again by the control plane.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub photo: KindPolicy,
    pub video: KindPolicy,
}

const MIB: u64 = 1024 * 1024;

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            photo: KindPolicy {
                max_bytes: 50 * MIB,
                allowed_content_types: to_strings(&[
                    "image/jpeg",
                    "image/png",
                    "image/heic",
                    "image/heif",
                    "image/webp",
                ]),
            },
            video: KindPolicy {
                max_bytes: 500 * MIB,
                allowed_content_types: to_strings(&[
                    "video/mp4",
                    "video/quicktime",
                    "video/x-m4v",
                    "video/3gpp",
                    "video/webm",
                ]),
            },
        }
    }
}

impl UploadPolicy {
    /// Limits for `kind`.
    pub fn for_kind(&self, kind: MediaKind) -> &KindPolicy {
        match kind {
            MediaKind::Photo => &self.photo,
            MediaKind::Video => &self.video,
        }
    }

    /// Checks `(kind, file_size, content_type)` against the policy.
    ///
    /// Content types are compared case-insensitively, ignoring parameters
    /// such as `; codecs=...`.
    pub fn validate(
        &self,
        kind: MediaKind,
        file_size: u64,
        content_type: &str,
    ) -> Result<(), PolicyViolation> {
        if file_size == 0 {
            return Err(PolicyViolation::EmptyFile);
        }

        let limits = self.for_kind(kind);
        if file_size > limits.max_bytes {
            return Err(PolicyViolation::TooLarge {
                kind,
                size: file_size,
                max: limits.max_bytes,
            });
        }

        if !limits.allows(content_type) {
            return Err(PolicyViolation::ContentTypeNotAllowed {
                kind,
                content_type: content_type.to_string(),
            });
        }

        let parts = ChunkPlan::for_file(file_size)
            .map(|p| p.total_parts())
            .map_err(|_| PolicyViolation::EmptyFile)?;
        if parts > MAX_PART_NUMBER {
            return Err(PolicyViolation::TooManyParts {
                parts,
                max: MAX_PART_NUMBER,
            });
        }

        Ok(())
    }
}

/// Guesses a content type from the file extension.
///
/// Returns `None` for extensions with no media mapping.
pub fn detect_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let ct = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "m4v" => "video/x-m4v",
        "3gp" => "video/3gpp",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(ct)
}

fn essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
