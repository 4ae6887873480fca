use std::sync::Arc;
use std::time::Duration;

use ferry_protocol::{
    AbortRequest, AbortResponse, CompleteRequest, CompleteResponse, CompletedPart, ControlReply,
    ControlRequest, InitiateRequest, InitiateResponse, MAX_PART_NUMBER, PartUrlRequest,
    PartUrlResponse,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{ControlFuture, ControlPlane, ControlPlaneError, CredentialSource};

/// Default timeout for one control-plane call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest raw body kept in [`ControlPlaneError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// [`ControlPlane`] over a single JSON endpoint.
///
/// Every request is a `POST` of a [`ControlRequest`] with an
/// `Authorization: Bearer` header taken from the configured
/// [`CredentialSource`].
#[derive(Clone)]
pub struct HttpControlPlane {
    client: reqwest::Client,
    endpoint: String,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpControlPlane {
    pub fn new(
        endpoint: impl Into<String>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, ControlPlaneError> {
        Self::with_timeout(endpoint, credentials, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        credentials: Arc<dyn CredentialSource>,
        timeout: Duration,
    ) -> Result<Self, ControlPlaneError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            credentials,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: ControlRequest,
    ) -> Result<T, ControlPlaneError> {
        let token = self.credentials.bearer_token().await?;
        let action = request.action();
        debug!(action, "control-plane request");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        let body: &[u8] = if bytes.is_empty() { b"{}" } else { &bytes };

        let parsed = serde_json::from_slice::<ControlReply<T>>(body);

        if status == StatusCode::UNAUTHORIZED {
            let message = match parsed {
                Ok(ControlReply::Failure(err)) => err.error,
                _ => "credential rejected".to_string(),
            };
            warn!(action, "control-plane credential rejected");
            return Err(ControlPlaneError::Unauthorized(message));
        }

        match parsed {
            Ok(ControlReply::Failure(err)) => {
                let err = ControlPlaneError::from(err);
                warn!(action, status = status.as_u16(), error = %err, "control-plane request rejected");
                Err(err)
            }
            _ if !status.is_success() => Err(ControlPlaneError::Status {
                status: status.as_u16(),
                body: truncate_body(String::from_utf8_lossy(&bytes).into_owned()),
            }),
            Ok(ControlReply::Success(value)) => Ok(value),
            Err(e) => Err(e.into()),
        }
    }

    async fn initiate_impl(
        &self,
        request: &InitiateRequest,
    ) -> Result<InitiateResponse, ControlPlaneError> {
        self.call(ControlRequest::Initiate(request.clone())).await
    }

    async fn part_destination_impl(
        &self,
        session_id: &str,
        object_key: &str,
        part_number: u32,
    ) -> Result<String, ControlPlaneError> {
        if !(1..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(ControlPlaneError::InvalidRequest(format!(
                "part number {part_number} outside 1..={MAX_PART_NUMBER}"
            )));
        }
        let resp: PartUrlResponse = self
            .call(ControlRequest::GetPartUrl(PartUrlRequest {
                session_id: session_id.to_string(),
                object_key: object_key.to_string(),
                part_number,
            }))
            .await?;
        Ok(resp.url)
    }

    async fn complete_impl(
        &self,
        session_id: &str,
        object_key: &str,
        parts: &[CompletedPart],
    ) -> Result<String, ControlPlaneError> {
        if parts.is_empty() {
            return Err(ControlPlaneError::InvalidRequest(
                "complete requires at least one part".to_string(),
            ));
        }
        let resp: CompleteResponse = self
            .call(ControlRequest::Complete(CompleteRequest {
                session_id: session_id.to_string(),
                object_key: object_key.to_string(),
                parts: parts.to_vec(),
            }))
            .await?;
        Ok(resp.object_key)
    }

    async fn abort_impl(&self, session_id: &str, object_key: &str) -> Result<(), ControlPlaneError> {
        let _: AbortResponse = self
            .call(ControlRequest::Abort(AbortRequest {
                session_id: session_id.to_string(),
                object_key: object_key.to_string(),
            }))
            .await?;
        Ok(())
    }
}

impl ControlPlane for HttpControlPlane {
    fn initiate<'a>(&'a self, request: &'a InitiateRequest) -> ControlFuture<'a, InitiateResponse> {
        Box::pin(self.initiate_impl(request))
    }

    fn part_destination<'a>(
        &'a self,
        session_id: &'a str,
        object_key: &'a str,
        part_number: u32,
    ) -> ControlFuture<'a, String> {
        Box::pin(self.part_destination_impl(session_id, object_key, part_number))
    }

    fn complete<'a>(
        &'a self,
        session_id: &'a str,
        object_key: &'a str,
        parts: &'a [CompletedPart],
    ) -> ControlFuture<'a, String> {
        Box::pin(self.complete_impl(session_id, object_key, parts))
    }

    fn abort<'a>(&'a self, session_id: &'a str, object_key: &'a str) -> ControlFuture<'a, ()> {
        Box::pin(self.abort_impl(session_id, object_key))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticToken;
    use ferry_protocol::MediaKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers one request with `status` and a JSON `body`; yields the raw request.
    async fn json_server(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = sock.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received);
                if let Some(idx) = text.find("\r\n\r\n") {
                    let len = text[..idx]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if received.len() >= idx + 4 + len {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.unwrap();
            String::from_utf8_lossy(&received).into_owned()
        });
        (format!("http://{addr}/uploads"), handle)
    }

    fn client(endpoint: &str, token: &str) -> HttpControlPlane {
        HttpControlPlane::new(endpoint, Arc::new(StaticToken::new(token))).unwrap()
    }

    fn request_body(raw: &str) -> serde_json::Value {
        let idx = raw.find("\r\n\r\n").unwrap();
        serde_json::from_str(&raw[idx + 4..]).unwrap()
    }

    #[tokio::test]
    async fn initiate_posts_tagged_request_with_bearer() {
        let (url, server) =
            json_server("200 OK", r#"{"sessionId":"u-1","objectKey":"videos/u-1.mp4"}"#).await;
        let cp = client(&url, "tok-9");

        let resp = cp
            .initiate(&InitiateRequest {
                kind: MediaKind::Video,
                file_size: 23 * 1024 * 1024,
                content_type: "video/mp4".into(),
                file_name: Some("clip.mp4".into()),
            })
            .await
            .unwrap();
        assert_eq!(resp.session_id, "u-1");
        assert_eq!(resp.object_key, "videos/u-1.mp4");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /uploads"));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer tok-9"));
        let body = request_body(&raw);
        assert_eq!(body["action"], "initiate");
        assert_eq!(body["kind"], "video");
        assert_eq!(body["fileSize"], 23 * 1024 * 1024);
        assert_eq!(body["fileName"], "clip.mp4");
    }

    #[tokio::test]
    async fn part_destination_returns_url() {
        let (url, server) =
            json_server("200 OK", r#"{"url":"https://bucket.example/p?partNumber=4"}"#).await;
        let cp = client(&url, "tok");

        let dest = cp.part_destination("u-1", "k", 4).await.unwrap();
        assert_eq!(dest, "https://bucket.example/p?partNumber=4");

        let body = request_body(&server.await.unwrap());
        assert_eq!(body["action"], "getPartUrl");
        assert_eq!(body["partNumber"], 4);
    }

    #[tokio::test]
    async fn complete_sends_parts_and_returns_key() {
        let (url, server) = json_server("200 OK", r#"{"objectKey":"photos/a.jpg"}"#).await;
        let cp = client(&url, "tok");
        let parts = vec![CompletedPart {
            part_number: 1,
            integrity_tag: "\"e1\"".into(),
        }];

        let key = cp.complete("u-1", "photos/a.jpg", &parts).await.unwrap();
        assert_eq!(key, "photos/a.jpg");

        let body = request_body(&server.await.unwrap());
        assert_eq!(body["action"], "complete");
        assert_eq!(body["parts"][0]["partNumber"], 1);
    }

    #[tokio::test]
    async fn abort_accepts_empty_body() {
        let (url, _server) = json_server("200 OK", "").await;
        let cp = client(&url, "tok");
        cp.abort("u-1", "k").await.unwrap();
    }

    #[tokio::test]
    async fn unauthorized_code_maps_to_unauthorized() {
        let (url, _server) =
            json_server("200 OK", r#"{"error":"token expired","code":"UNAUTHORIZED"}"#).await;
        let cp = client(&url, "tok");
        let err = cp.part_destination("u-1", "k", 1).await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn status_401_without_body_maps_to_unauthorized() {
        let (url, _server) = json_server("401 Unauthorized", "").await;
        let cp = client(&url, "tok");
        let err = cp.abort("u-1", "k").await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn error_payload_maps_to_rejected() {
        let (url, _server) = json_server(
            "400 Bad Request",
            r#"{"error":"file too large","code":"VALIDATION_ERROR"}"#,
        )
        .await;
        let cp = client(&url, "tok");
        let err = cp
            .initiate(&InitiateRequest {
                kind: MediaKind::Photo,
                file_size: 1,
                content_type: "image/png".into(),
                file_name: None,
            })
            .await
            .unwrap_err();
        match err {
            ControlPlaneError::Rejected { code, message } => {
                assert_eq!(code, "VALIDATION_ERROR");
                assert_eq!(message, "file too large");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn opaque_failure_maps_to_status() {
        let (url, _server) = json_server("502 Bad Gateway", "upstream down").await;
        let cp = client(&url, "tok");
        let err = cp.part_destination("u-1", "k", 2).await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn rejects_out_of_range_part_without_network() {
        // Nothing listens on the discard port; a request would fail with Http.
        let cp = client("http://127.0.0.1:9/uploads", "tok");
        for n in [0, MAX_PART_NUMBER + 1] {
            let err = cp.part_destination("u-1", "k", n).await.unwrap_err();
            assert!(matches!(err, ControlPlaneError::InvalidRequest(_)));
        }
    }

    #[tokio::test]
    async fn rejects_empty_complete_without_network() {
        let cp = client("http://127.0.0.1:9/uploads", "tok");
        let err = cp.complete("u-1", "k", &[]).await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn missing_credential_is_unauthorized_without_network() {
        let cp = client("http://127.0.0.1:9/uploads", " ");
        let err = cp.abort("u-1", "k").await.unwrap_err();
        assert!(err.is_unauthorized());
    }
}
