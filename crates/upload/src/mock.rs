//! Recording doubles for the control plane, the part transport and the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use bytes::Bytes;
use ferry_control_plane::{ControlFuture, ControlPlane, ControlPlaneError};
use ferry_protocol::{CompletedPart, InitiateRequest, InitiateResponse, UploadSession};
use ferry_session_store::{SessionStore, StoreError, StoreFuture};
use ferry_transfer::{PartTransport, TransferError, TransportFuture};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCall {
    Initiate(InitiateRequest),
    PartDestination(u32),
    Complete(Vec<CompletedPart>),
    Abort,
}

#[derive(Default)]
pub struct MockControlPlane {
    calls: Mutex<Vec<ControlCall>>,
    complete_failures: Mutex<u32>,
    unauthorized_part: Option<u32>,
    reject_initiate: bool,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` complete calls fail with a 503.
    pub fn failing_complete(self, n: u32) -> Self {
        *self.complete_failures.lock().unwrap() = n;
        self
    }

    /// The destination request for `part` is rejected as unauthorized.
    pub fn unauthorized_at(mut self, part: u32) -> Self {
        self.unauthorized_part = Some(part);
        self
    }

    pub fn rejecting_initiate(mut self) -> Self {
        self.reject_initiate = true;
        self
    }

    pub fn calls(&self) -> Vec<ControlCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn part_requests(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ControlCall::PartDestination(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn initiated(&self) -> bool {
        self.calls()
            .iter()
            .any(|c| matches!(c, ControlCall::Initiate(_)))
    }

    pub fn aborts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ControlCall::Abort))
            .count()
    }

    /// Parts sent with the last complete call.
    pub fn completed_with(&self) -> Option<Vec<CompletedPart>> {
        self.calls().into_iter().rev().find_map(|c| match c {
            ControlCall::Complete(parts) => Some(parts),
            _ => None,
        })
    }

    fn record(&self, call: ControlCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ControlPlane for MockControlPlane {
    fn initiate<'a>(&'a self, request: &'a InitiateRequest) -> ControlFuture<'a, InitiateResponse> {
        Box::pin(async move {
            self.record(ControlCall::Initiate(request.clone()));
            if self.reject_initiate {
                return Err(ControlPlaneError::Rejected {
                    code: "VALIDATION_ERROR".into(),
                    message: "rejected by server policy".into(),
                });
            }
            Ok(InitiateResponse {
                session_id: "sess-1".into(),
                object_key: format!("{}s/obj-1", request.kind),
            })
        })
    }

    fn part_destination<'a>(
        &'a self,
        session_id: &'a str,
        _object_key: &'a str,
        part_number: u32,
    ) -> ControlFuture<'a, String> {
        Box::pin(async move {
            self.record(ControlCall::PartDestination(part_number));
            if self.unauthorized_part == Some(part_number) {
                return Err(ControlPlaneError::Unauthorized("token expired".into()));
            }
            Ok(format!("mock://{session_id}/part/{part_number}"))
        })
    }

    fn complete<'a>(
        &'a self,
        _session_id: &'a str,
        object_key: &'a str,
        parts: &'a [CompletedPart],
    ) -> ControlFuture<'a, String> {
        Box::pin(async move {
            self.record(ControlCall::Complete(parts.to_vec()));
            let mut failures = self.complete_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ControlPlaneError::Status {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            Ok(object_key.to_string())
        })
    }

    fn abort<'a>(&'a self, _session_id: &'a str, _object_key: &'a str) -> ControlFuture<'a, ()> {
        Box::pin(async move {
            self.record(ControlCall::Abort);
            Ok(())
        })
    }
}

/// Transport that stores nothing and answers with `"etag-<part>"`.
#[derive(Default)]
pub struct MockTransport {
    attempts: Mutex<Vec<(u32, usize)>>,
    failures: Mutex<HashMap<u32, u32>>,
    hang_on: Option<u32>,
    entered: Arc<Notify>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` attempts for `part` fail with a 500.
    pub fn failing(self, part: u32, times: u32) -> Self {
        self.failures.lock().unwrap().insert(part, times);
        self
    }

    /// Attempts for `part` never finish; `entered` is notified when one starts.
    pub fn hanging_on(mut self, part: u32) -> Self {
        self.hang_on = Some(part);
        self
    }

    pub fn entered(&self) -> Arc<Notify> {
        self.entered.clone()
    }

    /// `(part, body length)` for every attempt, in order.
    pub fn attempts(&self) -> Vec<(u32, usize)> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempted_parts(&self) -> Vec<u32> {
        self.attempts().into_iter().map(|(n, _)| n).collect()
    }
}

pub fn tag_for(part: u32) -> String {
    format!("\"etag-{part}\"")
}

impl PartTransport for MockTransport {
    fn put_part<'a>(
        &'a self,
        destination: &'a str,
        body: Bytes,
        _content_type: &'a str,
    ) -> TransportFuture<'a> {
        Box::pin(async move {
            let part: u32 = destination
                .rsplit('/')
                .next()
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| TransferError::Status {
                    status: 404,
                    body: format!("unknown destination {destination}"),
                })?;
            self.attempts.lock().unwrap().push((part, body.len()));

            if self.hang_on == Some(part) {
                self.entered.notify_one();
                std::future::pending::<()>().await;
            }

            {
                let mut failures = self.failures.lock().unwrap();
                if let Some(left) = failures.get_mut(&part)
                    && *left > 0
                {
                    *left -= 1;
                    return Err(TransferError::Status {
                        status: 500,
                        body: "flaky".into(),
                    });
                }
            }

            Ok(tag_for(part))
        })
    }
}

/// Store that delegates to `inner` but can fail saves or fire a cancel token
/// when a given save (1-based) starts.
pub struct ScriptedStore {
    inner: Arc<dyn SessionStore>,
    saves: Mutex<usize>,
    fail_saves: bool,
    cancel_at: Option<(usize, CancellationToken)>,
}

impl ScriptedStore {
    pub fn new(inner: Arc<dyn SessionStore>) -> Self {
        Self {
            inner,
            saves: Mutex::new(0),
            fail_saves: false,
            cancel_at: None,
        }
    }

    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub fn cancelling_on_save(mut self, n: usize, cancel: CancellationToken) -> Self {
        self.cancel_at = Some((n, cancel));
        self
    }
}

impl SessionStore for ScriptedStore {
    fn save<'a>(&'a self, record_id: &'a str, session: &'a UploadSession) -> StoreFuture<'a, ()> {
        let n = {
            let mut saves = self.saves.lock().unwrap();
            *saves += 1;
            *saves
        };
        if let Some((at, cancel)) = &self.cancel_at
            && *at == n
        {
            cancel.cancel();
        }
        if self.fail_saves {
            return Box::pin(async { Err(StoreError::Io(std::io::Error::other("disk full"))) });
        }
        self.inner.save(record_id, session)
    }

    fn load<'a>(&'a self, record_id: &'a str) -> StoreFuture<'a, Option<UploadSession>> {
        self.inner.load(record_id)
    }

    fn delete<'a>(&'a self, record_id: &'a str) -> StoreFuture<'a, ()> {
        self.inner.delete(record_id)
    }

    fn list_all(&self) -> StoreFuture<'_, Vec<(String, UploadSession)>> {
        self.inner.list_all()
    }
}
