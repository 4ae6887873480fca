//! Single-shot part transport.
//!
//! A transport performs exactly one PUT and has no retry logic of its own.
//! Dropping the returned future aborts the request, which is how callers
//! cancel an in-flight transfer.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, ETAG};
use tracing::trace;

use crate::TransferError;

/// Boxed future returned by [`PartTransport::put_part`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'a>>;

/// Uploads one part to a caller-supplied destination.
///
/// Implementations return the integrity tag the destination assigned to the
/// stored bytes. Any non-2xx response or network failure is an error.
pub trait PartTransport: Send + Sync {
    fn put_part<'a>(
        &'a self,
        destination: &'a str,
        body: Bytes,
        content_type: &'a str,
    ) -> TransportFuture<'a>;
}

/// Longest error body kept in [`TransferError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Default timeout for one part PUT.
const DEFAULT_PUT_TIMEOUT: Duration = Duration::from_secs(120);

/// [`PartTransport`] backed by a `reqwest` client.
///
/// The integrity tag is the response's `ETag` header, returned verbatim
/// (quotes included).
#[derive(Clone)]
pub struct HttpPartTransport {
    client: reqwest::Client,
}

impl HttpPartTransport {
    /// Creates a transport with its own client and the default timeout.
    pub fn new() -> Result<Self, TransferError> {
        Self::with_timeout(DEFAULT_PUT_TIMEOUT)
    }

    /// Creates a transport whose requests time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransferError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn put(
        &self,
        destination: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String, TransferError> {
        let length = body.len();
        let resp = self
            .client
            .put(destination)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(TransferError::Status {
                status: status.as_u16(),
                body: truncate_body(text),
            });
        }

        let tag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(TransferError::MissingIntegrityTag)?;

        trace!(bytes = length, tag = %tag, "part stored");
        Ok(tag)
    }
}

impl PartTransport for HttpPartTransport {
    fn put_part<'a>(
        &'a self,
        destination: &'a str,
        body: Bytes,
        content_type: &'a str,
    ) -> TransportFuture<'a> {
        Box::pin(self.put(destination, body, content_type))
    }
}

fn truncate_body(mut text: String) -> String {
    if text.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}
