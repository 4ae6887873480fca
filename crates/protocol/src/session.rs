//! The durable unit of resumable work.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::MediaKind;

/// Confirmation that one part is stored remotely.
///
/// The integrity tag is passed back verbatim when finalizing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: u32,
    pub integrity_tag: String,
}

/// Violations of the session invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("part {part_number} outside 1..={total_parts}")]
    PartOutOfRange { part_number: u32, total_parts: u32 },

    #[error("part {0} already recorded")]
    DuplicatePart(u32),

    #[error("session has no parts")]
    Empty,
}

/// An in-progress or resumable upload.
///
/// Serialized as the persisted session record (camelCase keys, `createdAt`
/// as an RFC 3339 timestamp).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub session_id: String,
    pub object_key: String,
    pub source_ref: String,
    pub file_size: u64,
    pub content_type: String,
    pub kind: MediaKind,
    pub total_parts: u32,
    #[serde(default)]
    completed_parts: Vec<CompletedPart>,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    /// Creates a fresh session with no completed parts, stamped now.
    pub fn new(
        session_id: impl Into<String>,
        object_key: impl Into<String>,
        source_ref: impl Into<String>,
        file_size: u64,
        content_type: impl Into<String>,
        kind: MediaKind,
        total_parts: u32,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            object_key: object_key.into(),
            source_ref: source_ref.into(),
            file_size,
            content_type: content_type.into(),
            kind,
            total_parts,
            completed_parts: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Parts recorded so far, in insertion order.
    pub fn completed_parts(&self) -> &[CompletedPart] {
        &self.completed_parts
    }

    /// Records a completed part.
    ///
    /// Rejects part numbers outside `1..=total_parts` and duplicates, leaving
    /// the session untouched.
    pub fn record_part(&mut self, part: CompletedPart) -> Result<(), SessionError> {
        if part.part_number == 0 || part.part_number > self.total_parts {
            return Err(SessionError::PartOutOfRange {
                part_number: part.part_number,
                total_parts: self.total_parts,
            });
        }
        if self.contains_part(part.part_number) {
            return Err(SessionError::DuplicatePart(part.part_number));
        }
        self.completed_parts.push(part);
        Ok(())
    }

    /// Returns `true` if `part_number` has already been recorded.
    pub fn contains_part(&self, part_number: u32) -> bool {
        self.completed_parts
            .iter()
            .any(|p| p.part_number == part_number)
    }

    /// Part numbers already recorded.
    pub fn completed_part_numbers(&self) -> BTreeSet<u32> {
        self.completed_parts.iter().map(|p| p.part_number).collect()
    }

    pub fn completed_count(&self) -> u32 {
        self.completed_parts.len() as u32
    }

    /// Finalize may only be called from this state.
    pub fn is_complete(&self) -> bool {
        self.total_parts > 0 && self.completed_count() == self.total_parts
    }

    /// Completed parts sorted by part number, as sent to finalize.
    pub fn sorted_parts(&self) -> Vec<CompletedPart> {
        let mut parts = self.completed_parts.clone();
        parts.sort_by_key(|p| p.part_number);
        parts
    }

    /// Age of the session relative to `now` (zero if `created_at` is in the future).
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    /// Returns `true` if the session is older than `window` at `now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.age_at(now) > window
    }

    /// Checks the invariants of a record read back from storage.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.total_parts == 0 {
            return Err(SessionError::Empty);
        }
        let mut seen = BTreeSet::new();
        for part in &self.completed_parts {
            if part.part_number == 0 || part.part_number > self.total_parts {
                return Err(SessionError::PartOutOfRange {
                    part_number: part.part_number,
                    total_parts: self.total_parts,
                });
            }
            if !seen.insert(part.part_number) {
                return Err(SessionError::DuplicatePart(part.part_number));
            }
        }
        Ok(())
    }
}
