use serde::{Deserialize, Serialize};

use crate::constants::error_codes;

/// Error reply from the control plane: `{ "error": ..., "code": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    /// Returns `true` if the reply rejects the caller's credential.
    pub fn is_unauthorized(&self) -> bool {
        self.code == error_codes::UNAUTHORIZED
    }
}

/// A control-plane reply: either the success payload or an [`ErrorBody`].
///
/// The error shape is tried first, so a success payload must not carry both
/// an `error` and a `code` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply<T> {
    Failure(ErrorBody),
    Success(T),
}

impl<T> ControlReply<T> {
    /// Converts the reply into a `Result`.
    pub fn into_result(self) -> Result<T, ErrorBody> {
        match self {
            ControlReply::Failure(err) => Err(err),
            ControlReply::Success(value) => Ok(value),
        }
    }
}
