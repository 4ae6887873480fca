use std::future::Future;
use std::pin::Pin;

use crate::ControlPlaneError;

/// Boxed future returned by [`CredentialSource::bearer_token`].
pub type CredentialsFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, ControlPlaneError>> + Send + 'a>>;

/// Supplies the bearer credential attached to every control-plane call.
///
/// Acquisition is external; a failure is reported as
/// [`ControlPlaneError::Unauthorized`].
pub trait CredentialSource: Send + Sync {
    fn bearer_token(&self) -> CredentialsFuture<'_>;
}

/// A fixed bearer token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

impl CredentialSource for StaticToken {
    fn bearer_token(&self) -> CredentialsFuture<'_> {
        Box::pin(async move {
            if self.0.trim().is_empty() {
                Err(ControlPlaneError::Unauthorized("no credential configured".into()))
            } else {
                Ok(self.0.clone())
            }
        })
    }
}
