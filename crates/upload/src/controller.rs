use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::UploadError;
use crate::types::{SessionSnapshot, UploadOutcome};

/// Handle to an upload started with [`UploadOrchestrator::start`].
///
/// Dropping the controller does not stop the upload; call
/// [`cancel`](Self::cancel) for that.
///
/// [`UploadOrchestrator::start`]: crate::UploadOrchestrator::start
pub struct UploadController {
    handle: JoinHandle<Result<UploadOutcome, UploadError>>,
    cancel: CancellationToken,
    state: watch::Receiver<Option<SessionSnapshot>>,
}

impl UploadController {
    pub(crate) fn new(
        handle: JoinHandle<Result<UploadOutcome, UploadError>>,
        cancel: CancellationToken,
        state: watch::Receiver<Option<SessionSnapshot>>,
    ) -> Self {
        Self {
            handle,
            cancel,
            state,
        }
    }

    /// Requests cancellation. The result resolves to [`UploadError::Cancelled`]
    /// once the server-side object has been released.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Latest snapshot, or `None` before planning has started.
    pub fn current_state(&self) -> Option<SessionSnapshot> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state or progress change.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionSnapshot>> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the upload to finish.
    pub async fn result(self) -> Result<UploadOutcome, UploadError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(UploadError::Cancelled),
            Err(e) => Err(UploadError::Task(e.to_string())),
        }
    }
}
